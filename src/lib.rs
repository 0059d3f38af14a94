//! Hacker News stories with their comment trees.
//!
//! [`HackerNewsClient`] resolves a story (or the top-N stories) and walks its
//! comment tree level by level up to a requested depth, with a shared cap on
//! concurrent requests and an optional SQLite cache of raw items. The result
//! is a [`Story`] / [`Response`] tree that renders to indented text.
//!
//! ```ignore
//! use hacker_news_tree::{ClientConfig, HackerNewsClient};
//!
//! let client = HackerNewsClient::new(ClientConfig::default())?;
//! let story = client.fetch_story(8863, 2).await?;
//! println!("{}", story.render(140));
//! ```
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application.

pub mod config;
pub mod db;
pub mod error;
pub mod hn_client;
pub mod models;
pub mod text;
pub mod transport;

pub use config::ClientConfig;
pub use db::ItemCache;
pub use error::{Error, Result};
pub use hn_client::HackerNewsClient;
pub use models::{Comment, RawItem, Response, Story};
pub use text::{normalize, Extractor, Normalizer, ScraperExtractor};
pub use transport::{ReqwestTransport, Transport};
