use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::text::Normalizer;

/// Fields of one API item as returned by `/item/{id}.json`.
///
/// Every field is optional here; which ones are required depends on whether
/// the item becomes a story or a comment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub by: Option<String>,
    pub time: Option<i64>,
    pub score: Option<i64>,
    pub descendants: Option<i64>,
    #[serde(default)]
    pub kids: Vec<i64>,
    pub parent: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl RawItem {
    pub fn from_payload(payload: Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }

    /// Deleted or dead items are withheld by the source
    pub fn is_withheld(&self) -> bool {
        self.deleted || self.dead
    }

    fn required<T>(&self, value: Option<T>, field: &str) -> Result<T> {
        value.ok_or_else(|| Error::missing_field(self.id, field))
    }

    /// Checks the fields a comment cannot be built without
    pub fn check_comment_fields(&self) -> Result<()> {
        self.required(self.id, "id")?;
        self.timestamp()?;
        Ok(())
    }

    /// Checks the fields a story cannot be built without
    pub fn check_story_fields(&self) -> Result<()> {
        self.required(self.id, "id")?;
        self.required(self.title.as_ref(), "title")?;
        self.required(self.by.as_ref(), "by")?;
        self.required(self.score, "score")?;
        self.timestamp()?;
        Ok(())
    }

    fn timestamp(&self) -> Result<DateTime<Utc>> {
        let secs = self.required(self.time, "time")?;
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| Error::Decode(format!("item {:?} has out of range time {}", self.id, secs)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub by: Option<String>,
    pub time: DateTime<Utc>,
    pub kids: Vec<i64>,
    pub parent: Option<i64>,
    pub deleted: bool,
    pub dead: bool,
    /// Resolved children, in `kids` order with withheld ones dropped
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn from_raw(raw: RawItem, replies: Vec<Comment>, normalizer: &Normalizer) -> Result<Self> {
        let id = raw.required(raw.id, "id")?;
        let time = raw.timestamp()?;

        Ok(Self {
            id,
            text: normalizer.normalize(raw.text.as_deref().unwrap_or_default()),
            by: raw.by,
            time,
            kids: raw.kids,
            parent: raw.parent,
            deleted: raw.deleted,
            dead: raw.dead,
            replies,
        })
    }

    /// Lines for this comment and its replies, pre-order
    pub fn format_tree(&self, max_length: usize, depth: usize) -> Vec<String> {
        let indent = "│  ".repeat(depth);
        let text = truncate(&self.text, max_length).replace('\n', &format!("\n{}│  ", indent));
        let author = self.by.as_deref().unwrap_or("[unknown]");

        let mut lines = vec![format!("{}├─ {}: [{}] {}", indent, author, self.id, text)];
        for reply in &self.replies {
            lines.extend(reply.format_tree(max_length, depth + 1));
        }
        lines
    }

    /// This comment plus all materialized replies
    pub fn tree_size(&self) -> usize {
        1 + self.replies.iter().map(Comment::tree_size).sum::<usize>()
    }

    /// Number of levels below and including this comment
    pub fn depth(&self) -> usize {
        1 + self.replies.iter().map(Comment::depth).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub by: String,
    pub time: DateTime<Utc>,
    pub score: i64,
    /// Total comment count reported by the source
    pub descendants: i64,
    pub kids: Vec<i64>,
    pub comments: Vec<Comment>,
}

impl Story {
    pub fn from_raw(raw: RawItem, comments: Vec<Comment>, normalizer: &Normalizer) -> Result<Self> {
        let id = raw.required(raw.id, "id")?;
        let title = raw.required(raw.title.clone(), "title")?;
        let by = raw.required(raw.by.clone(), "by")?;
        let score = raw.required(raw.score, "score")?;
        let time = raw.timestamp()?;

        Ok(Self {
            id,
            title,
            url: raw.url,
            text: normalizer.normalize_opt(raw.text.as_deref()),
            by,
            time,
            score,
            descendants: raw.descendants.unwrap_or(0),
            kids: raw.kids,
            comments,
        })
    }

    /// Materialized comments at every level
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(Comment::tree_size).sum()
    }

    /// Header followed by the comment tree, each comment cut to `max_length`
    /// characters
    pub fn render(&self, max_length: usize) -> String {
        let mut lines = vec![
            format!("{} [{}] by {}", self.title, self.id, self.by),
            format!("Score: {}, Comments: {}", self.score, self.descendants),
        ];
        if let Some(url) = &self.url {
            lines.push(format!("URL: {}", url));
        }

        if !self.comments.is_empty() {
            lines.push(String::new());
            lines.push("Comments:".to_string());
            for comment in &self.comments {
                lines.extend(comment.format_tree(max_length, 0));
            }
        }

        lines.join("\n")
    }
}

/// Stories in source ranking order, stamped with the time of the fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub updated_at: DateTime<Utc>,
    pub stories: Vec<Story>,
}

impl Response {
    pub fn render(&self, max_length: usize) -> String {
        self.stories
            .iter()
            .map(|story| story.render(max_length))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn truncate(text: &str, max_length: usize) -> String {
    let total = text.chars().count();
    if total <= max_length {
        return text.to_string();
    }

    let kept: String = text.chars().take(max_length).collect();
    format!("{}... [+{} chars]", kept, total - max_length)
}
