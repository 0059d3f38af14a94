use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use hacker_news_tree::config::{DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT_SECS};
use hacker_news_tree::{ClientConfig, HackerNewsClient, ItemCache};

#[derive(Parser, Debug)]
#[command(name = "hacker_news_tree", version, about = "Print Hacker News stories with their comment trees")]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// API base URL
    #[arg(long, env = "HN_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Maximum number of requests in flight
    #[arg(long, env = "HN_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENT_REQUESTS, global = true)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "HN_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    /// Item cache location (defaults to ~/.hn_reader/hn_cache.sqlite3)
    #[arg(long, env = "HN_CACHE_PATH", global = true)]
    cache: Option<PathBuf>,

    /// Always go to the network and never write the cache
    #[arg(long, conflicts_with = "cache", global = true)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one story by id
    Story {
        id: i64,
        /// Comment levels to fetch (0 = none)
        #[arg(long, default_value_t = 1)]
        levels: usize,
        /// Characters of comment text shown per line
        #[arg(long, default_value_t = 140)]
        max_length: usize,
        /// Print JSON instead of the text tree
        #[arg(long)]
        json: bool,
    },
    /// Fetch the current top stories
    Top {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long, default_value_t = 2)]
        levels: usize,
        #[arg(long, default_value_t = 100)]
        max_length: usize,
        #[arg(long)]
        json: bool,
    },
    /// Remove old entries from the item cache
    Purge {
        /// Remove entries written more than this many days ago
        #[arg(long)]
        older_than_days: Option<u32>,
        /// Remove entries whose id is below this value
        #[arg(long)]
        below_id: Option<i64>,
    },
}

impl ClientArgs {
    fn cache_path(&self) -> Result<Option<PathBuf>> {
        if self.no_cache {
            return Ok(None);
        }
        match &self.cache {
            Some(path) => Ok(Some(path.clone())),
            None => Ok(Some(ClientConfig::default_cache_path()?)),
        }
    }

    fn to_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::default()
            .base_url(self.base_url.as_str())
            .max_concurrent_requests(self.concurrency)
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(path) = self.cache_path()? {
            config = config.cache_path(path);
        }
        Ok(config)
    }
}

fn purge_age(days: u32) -> Result<chrono::TimeDelta> {
    chrono::TimeDelta::try_days(i64::from(days))
        .with_context(|| format!("--older-than-days {} is out of range", days))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LOGLEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Story {
            id,
            levels,
            max_length,
            json,
        } => {
            let client = HackerNewsClient::new(cli.client.to_config()?)
                .context("Failed to create Hacker News client")?;
            let story = client
                .fetch_story(id, levels)
                .await
                .with_context(|| format!("Failed to fetch story {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&story)?);
            } else {
                println!("{}", story.render(max_length));
            }
        }
        Command::Top {
            count,
            levels,
            max_length,
            json,
        } => {
            let client = HackerNewsClient::new(cli.client.to_config()?)
                .context("Failed to create Hacker News client")?;
            let response = client
                .fetch_top_stories(count, levels)
                .await
                .context("Failed to fetch top stories")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.render(max_length));
            }
        }
        Command::Purge {
            older_than_days,
            below_id,
        } => {
            let Some(path) = cli.client.cache_path()? else {
                bail!("purge needs a cache; drop --no-cache");
            };
            let cache = ItemCache::open(&path)
                .with_context(|| format!("Failed to open cache at {}", path.display()))?;
            let older_than = older_than_days.map(purge_age).transpose()?;
            let removed = cache.purge(older_than, below_id)?;
            println!(
                "Removed {} cached items, {} remaining",
                removed,
                cache.len()?
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_days_parse_as_unsigned() {
        let cli = Cli::try_parse_from(["hacker_news_tree", "purge", "--older-than-days", "30"]).unwrap();
        match cli.command {
            Command::Purge { older_than_days, below_id } => {
                assert_eq!(older_than_days, Some(30));
                assert_eq!(below_id, None);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["hacker_news_tree", "purge", "--older-than-days", "-1"]).is_err());
    }

    #[test]
    fn largest_purge_age_converts_without_panicking() {
        assert_eq!(purge_age(30).unwrap(), chrono::TimeDelta::days(30));
        assert!(purge_age(u32::MAX).is_ok());
    }
}
