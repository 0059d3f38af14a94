//! Shared test utilities for client integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hacker_news_tree::{ClientConfig, Error, HackerNewsClient, ItemCache, Result, Transport};

pub const BASE_URL: &str = "http://hn.test/v0";

#[derive(Clone)]
enum Reply {
    Json(Value),
    Fail(String),
    Malformed,
}

#[derive(Clone)]
struct Route {
    reply: Reply,
    delay: Duration,
}

/// In-process stand-in for the HTTP API.
///
/// Unknown URLs fail like a 404. Every call is recorded, and so is the peak
/// number of calls running at the same time.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

pub fn item_url(id: i64) -> String {
    format!("{}/item/{}.json", BASE_URL, id)
}

pub fn top_url() -> String {
    format!("{}/topstories.json", BASE_URL)
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, url: String, reply: Reply, delay: Duration) {
        self.routes
            .lock()
            .unwrap()
            .insert(url, Route { reply, delay });
    }

    pub fn top_stories(&self, ids: &[i64]) {
        self.route(top_url(), Reply::Json(json!(ids)), Duration::ZERO);
    }

    pub fn top_stories_payload(&self, payload: Value) {
        self.route(top_url(), Reply::Json(payload), Duration::ZERO);
    }

    pub fn item(&self, id: i64, payload: Value) {
        self.route(item_url(id), Reply::Json(payload), Duration::ZERO);
    }

    pub fn item_delayed(&self, id: i64, payload: Value, delay: Duration) {
        self.route(item_url(id), Reply::Json(payload), delay);
    }

    pub fn fail(&self, url: String, message: &str) {
        self.route(url, Reply::Fail(message.to_string()), Duration::ZERO);
    }

    pub fn malformed(&self, url: String) {
        self.route(url, Reply::Malformed, Duration::ZERO);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.calls.lock().unwrap().push(url.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let route = self.routes.lock().unwrap().get(url).cloned();
        let result = match route {
            None => Err(Error::Transport(format!("GET {}: HTTP 404 Not Found", url))),
            Some(route) => {
                if !route.delay.is_zero() {
                    tokio::time::sleep(route.delay).await;
                }
                match route.reply {
                    Reply::Json(value) => Ok(value),
                    Reply::Fail(message) => Err(Error::Transport(message)),
                    Reply::Malformed => Err(Error::Decode(format!("GET {}: expected value at line 1", url))),
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(url.to_string());
        result
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::default().base_url(BASE_URL)
}

pub fn client(transport: &Arc<FakeTransport>) -> HackerNewsClient {
    HackerNewsClient::with_transport(config(), transport.clone(), None)
}

pub fn client_with_cache(transport: &Arc<FakeTransport>, cache: ItemCache) -> HackerNewsClient {
    HackerNewsClient::with_transport(config(), transport.clone(), Some(cache))
}

pub fn story_json(id: i64, kids: &[i64]) -> Value {
    json!({
        "id": id,
        "type": "story",
        "title": format!("Story {}", id),
        "url": format!("https://example.com/{}", id),
        "by": "pg",
        "time": 1_700_000_000 + id,
        "score": 100 + id,
        "descendants": kids.len() * 3,
        "kids": kids,
    })
}

pub fn comment_json(id: i64, parent: i64, kids: &[i64]) -> Value {
    json!({
        "id": id,
        "type": "comment",
        "by": format!("user{}", id),
        "text": format!("comment <i>{}</i>", id),
        "time": 1_700_000_100 + id,
        "parent": parent,
        "kids": kids,
    })
}

/// Registers a comment tree where every node has `breadth` children, down
/// to `levels` levels under the story. Ids are allocated sequentially from
/// `story_id + 1`.
pub fn full_tree(transport: &FakeTransport, story_id: i64, breadth: usize, levels: usize) {
    fn build(
        transport: &FakeTransport,
        parent: i64,
        breadth: usize,
        remaining: usize,
        next_id: &mut i64,
    ) -> Vec<i64> {
        if remaining == 0 {
            return Vec::new();
        }
        let ids: Vec<i64> = (0..breadth)
            .map(|_| {
                *next_id += 1;
                *next_id
            })
            .collect();
        for &id in &ids {
            let kids = build(transport, id, breadth, remaining - 1, next_id);
            transport.item(id, comment_json(id, parent, &kids));
        }
        ids
    }

    let mut next_id = story_id;
    let kids = build(transport, story_id, breadth, levels, &mut next_id);
    transport.item(story_id, story_json(story_id, &kids));
}
