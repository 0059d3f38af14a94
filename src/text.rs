//! HTML to plain text normalization for item `text` fields.
//!
//! Markup is handed to an [`Extractor`] first. When the extractor yields
//! nothing, a fixed set of regex rules produces best-effort text instead.

use std::collections::HashSet;

use html_escape::decode_html_entities;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

lazy_static! {
    static ref BLOCK_CLOSE: Regex = Regex::new(r"(?i)</(?:p|div|pre|br)\s*>|<br\s*/?>").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref HORIZONTAL_SPACE: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref NEWLINE_INDENT: Regex = Regex::new(r"\n\s+").unwrap();
    static ref NEWLINE_RUN: Regex = Regex::new(r"\n+").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "pre", "br", "li", "ul", "ol", "blockquote", "table", "tr",
    "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Turns a markup fragment into plain text, or gives up with `None`
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<String>;
}

/// Walks the parsed DOM and keeps text nodes only.
///
/// Block elements start new lines, comments and scripts are skipped,
/// prose lines that repeat an earlier line are dropped, and `<pre>` keeps
/// its own line breaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScraperExtractor;

impl Extractor for ScraperExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        let fragment = Html::parse_fragment(html);
        let mut lines = LineCollector::default();
        lines.walk(fragment.root_element());
        lines.finish()
    }
}

#[derive(Default)]
struct LineCollector {
    lines: Vec<String>,
    seen: HashSet<String>,
    current: String,
    pre_depth: usize,
}

impl LineCollector {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(el) => {
                    let name = el.name();
                    if SKIPPED_TAGS.contains(&name) {
                        continue;
                    }
                    let Some(child_element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let is_block = BLOCK_TAGS.contains(&name);
                    let is_pre = name == "pre";

                    if is_block {
                        self.break_line();
                    }
                    if is_pre {
                        self.pre_depth += 1;
                    }
                    self.walk(child_element);
                    if is_block {
                        self.break_line();
                    }
                    if is_pre {
                        self.pre_depth -= 1;
                    }
                }
                _ => {}
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.pre_depth == 0 {
            self.current.push_str(text);
            return;
        }

        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.current.push_str(first);
        }
        for part in parts {
            self.break_line();
            self.current.push_str(part);
        }
    }

    fn break_line(&mut self) {
        let raw = std::mem::take(&mut self.current);
        if self.pre_depth > 0 {
            let line = raw.trim_end();
            if !line.trim().is_empty() {
                self.lines.push(line.to_string());
            }
            return;
        }

        let line = WHITESPACE_RUN.replace_all(&raw, " ");
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        // dedupe prose only; repeated code lines are meaningful
        if self.seen.insert(line.to_string()) {
            self.lines.push(line.to_string());
        }
    }

    fn finish(mut self) -> Option<String> {
        self.break_line();
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.join("\n"))
        }
    }
}

/// Normalizes item text with a configurable extraction pass
pub struct Normalizer {
    extractor: Box<dyn Extractor>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ScraperExtractor)
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer").finish_non_exhaustive()
    }
}

impl Normalizer {
    pub fn new(extractor: impl Extractor + 'static) -> Self {
        Self {
            extractor: Box::new(extractor),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        // checked before decoding so escaped tags stay literal text
        if !has_markup(raw) {
            return decode_html_entities(raw).into_owned();
        }

        match self.extractor.extract(raw) {
            Some(text) if !text.trim().is_empty() => text,
            _ => fallback_strip(raw),
        }
    }

    /// `None` stays `None`
    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|text| self.normalize(text))
    }
}

/// Normalizes with the default extractor
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

fn has_markup(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

/// Deterministic rule pass used when extraction yields nothing
pub fn fallback_strip(raw: &str) -> String {
    let text = decode_html_entities(raw);
    let text = BLOCK_CLOSE.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = NEWLINE_INDENT.replace_all(&text, "\n");
    let text = NEWLINE_RUN.replace_all(&text, "\n");
    text.trim().to_string()
}
