/// Result type for fetch, decode and cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the fetch pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure, timeout or non-2xx status
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed JSON or a required field missing from an item
    #[error("decode error: {0}")]
    Decode(String),

    /// The item cache could not be opened, read or written
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    pub fn missing_field(item_id: Option<i64>, field: &str) -> Self {
        match item_id {
            Some(id) => Error::Decode(format!("item {} is missing required field `{}`", id, field)),
            None => Error::Decode(format!("item is missing required field `{}`", field)),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Cache(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
