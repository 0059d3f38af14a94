use chrono::Utc;
use futures::future::{join_all, try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::db::ItemCache;
use crate::error::{Error, Result};
use crate::models::{Comment, RawItem, Response, Story};
use crate::text::Normalizer;
use crate::transport::{ReqwestTransport, Transport};

/// Fetches stories and their comment trees.
///
/// At most `max_concurrent_requests` network calls run at once across every
/// in-flight operation of one client; further calls wait for a free slot.
/// Items are read from the cache first when one is configured.
pub struct HackerNewsClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    limiter: Semaphore,
    cache: Option<ItemCache>,
    normalizer: Normalizer,
}

impl HackerNewsClient {
    /// HTTP client, plus the cache at `config.cache_path` if one is set
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        let cache = match &config.cache_path {
            Some(path) => Some(ItemCache::open(path)?),
            None => None,
        };
        Ok(Self::with_transport(config, Arc::new(transport), cache))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Option<ItemCache>,
    ) -> Self {
        let limiter = Semaphore::new(config.max_concurrent_requests.max(1));
        Self {
            config,
            transport,
            limiter,
            cache,
            normalizer: Normalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ItemCache> {
        self.cache.as_ref()
    }

    async fn request(&self, url: &str) -> Result<Value> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| Error::Transport("request limiter closed".to_string()))?;

        match tokio::time::timeout(self.config.timeout, self.transport.get_json(url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Transport(format!(
                "GET {}: timed out after {:?}",
                url, self.config.timeout
            ))),
        }
    }

    /// Ranked top story ids, cut to `limit`
    pub async fn top_story_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let payload = self.request(&self.config.top_stories_url()).await?;
        let mut ids: Vec<i64> = serde_json::from_value(payload)?;
        ids.truncate(limit);
        Ok(ids)
    }

    /// Raw payload of one item, `None` when the API has nothing for `id`
    pub async fn fetch_item(&self, id: i64) -> Result<Option<Value>> {
        if let Some(payload) = self.cached(id).await {
            debug!(item_id = id, "cache hit");
            return Ok(Some(payload));
        }

        let payload = self.request(&self.config.item_url(id)).await?;
        if is_empty_payload(&payload) {
            return Ok(None);
        }

        self.store(id, &payload).await;
        Ok(Some(payload))
    }

    async fn cached(&self, id: i64) -> Option<Value> {
        let cache = self.cache.clone()?;
        match tokio::task::spawn_blocking(move || cache.get(id)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                warn!(item_id = id, error = %e, "cache read failed, using network");
                None
            }
            Err(e) => {
                warn!(item_id = id, error = %e, "cache read task failed, using network");
                None
            }
        }
    }

    async fn store(&self, id: i64, payload: &Value) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let payload = payload.clone();
        match tokio::task::spawn_blocking(move || cache.put(id, &payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(item_id = id, error = %e, "cache write failed"),
            Err(e) => warn!(item_id = id, error = %e, "cache write task failed"),
        }
    }

    /// Resolves `ids` and their replies down to `max_depth` levels.
    ///
    /// `max_depth == 0` means no limit. Siblings are fetched concurrently and
    /// returned in `ids` order. Missing, deleted and dead comments are
    /// dropped along with their subtrees, and so is any comment whose fetch
    /// or decode fails.
    pub fn resolve_comments<'a>(
        &'a self,
        story_id: i64,
        ids: &'a [i64],
        depth: usize,
        max_depth: usize,
    ) -> BoxFuture<'a, Vec<Comment>> {
        async move {
            if ids.is_empty() || (max_depth != 0 && depth >= max_depth) {
                return Vec::new();
            }

            debug!(story_id, depth, count = ids.len(), "resolving comments");
            let branches = ids
                .iter()
                .map(|&id| self.resolve_comment(story_id, id, depth, max_depth));

            join_all(branches).await.into_iter().flatten().collect()
        }
        .boxed()
    }

    async fn resolve_comment(
        &self,
        story_id: i64,
        id: i64,
        depth: usize,
        max_depth: usize,
    ) -> Option<Comment> {
        let payload = match self.fetch_item(id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(story_id, item_id = id, depth, "comment missing, dropped");
                return None;
            }
            Err(e) => {
                warn!(story_id, item_id = id, depth, error = %e, "comment fetch failed, dropped");
                return None;
            }
        };

        let raw = match RawItem::from_payload(payload).and_then(|raw| {
            raw.check_comment_fields()?;
            Ok(raw)
        }) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(story_id, item_id = id, depth, error = %e, "comment undecodable, dropped");
                return None;
            }
        };

        if raw.is_withheld() {
            debug!(story_id, item_id = id, depth, "comment deleted or dead, dropped");
            return None;
        }

        let replies = self
            .resolve_comments(story_id, &raw.kids, depth + 1, max_depth)
            .await;

        match Comment::from_raw(raw, replies, &self.normalizer) {
            Ok(comment) => Some(comment),
            Err(e) => {
                warn!(story_id, item_id = id, depth, error = %e, "comment undecodable, dropped");
                None
            }
        }
    }

    /// One story with `comment_levels` levels of comments; 0 fetches none
    pub async fn fetch_story(&self, id: i64, comment_levels: usize) -> Result<Story> {
        debug!(story_id = id, "fetching story");
        let payload = self
            .fetch_item(id)
            .await?
            .ok_or_else(|| Error::Decode(format!("item {} not found", id)))?;
        let raw = RawItem::from_payload(payload)?;
        raw.check_story_fields()?;

        let comments = if comment_levels == 0 {
            Vec::new()
        } else {
            self.resolve_comments(id, &raw.kids, 0, comment_levels).await
        };

        debug!(
            story_id = id,
            root_comments = comments.len(),
            requested = raw.kids.len(),
            descendants = raw.descendants.unwrap_or(0),
            "story resolved"
        );
        Story::from_raw(raw, comments, &self.normalizer)
    }

    /// The first `top_n` ranked stories, in ranking order.
    ///
    /// Stories are fetched concurrently; the first failed story fails the
    /// whole response.
    pub async fn fetch_top_stories(&self, top_n: usize, comment_levels: usize) -> Result<Response> {
        info!(top_n, comment_levels, "fetching top stories");
        let ids = self.top_story_ids(top_n).await?;

        let stories =
            try_join_all(ids.iter().map(|&id| self.fetch_story(id, comment_levels))).await?;

        info!(top_n, count = stories.len(), "fetched top stories");
        Ok(Response {
            updated_at: Utc::now(),
            stories,
        })
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
