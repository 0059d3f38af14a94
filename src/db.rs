use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

const ITEM_TABLE_NAME: &str = "hn_cache_item";

/// Raw item payloads keyed by item id.
///
/// Payloads are stored as opaque JSON text, so new upstream fields never
/// require a schema change. Every write is committed before it returns.
#[derive(Clone)]
pub struct ItemCache {
    conn: Arc<Mutex<Connection>>,
}

impl ItemCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {ITEM_TABLE_NAME} (
                    id INTEGER PRIMARY KEY,
                    data TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{ITEM_TABLE_NAME}_created_at
                 ON {ITEM_TABLE_NAME}(created_at)"
            ),
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Cache("failed to lock cache connection".to_string()))
    }

    pub fn get(&self, id: i64) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                &format!("SELECT data FROM {ITEM_TABLE_NAME} WHERE id = ?1"),
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Upsert; the write timestamp is refreshed
    pub fn put(&self, id: i64, payload: &Value) -> Result<()> {
        self.put_at(id, payload, Utc::now())
    }

    pub fn put_at(&self, id: i64, payload: &Value, written_at: DateTime<Utc>) -> Result<()> {
        let data = serde_json::to_string(payload)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {ITEM_TABLE_NAME} (id, data, created_at) VALUES (?1, ?2, ?3)"
            ),
            params![id, data, written_at.timestamp()],
        )?;
        Ok(())
    }

    /// Removes entries written before `now - older_than` OR with an id below
    /// `below_id`. Returns the number of removed entries; with neither
    /// condition it does nothing.
    ///
    /// A negative `older_than` is rejected. An age reaching back past the
    /// earliest representable time matches nothing.
    pub fn purge(&self, older_than: Option<Duration>, below_id: Option<i64>) -> Result<usize> {
        let mut conditions = Vec::new();
        let mut values: Vec<i64> = Vec::new();

        if let Some(age) = older_than {
            if age < Duration::zero() {
                return Err(Error::Cache(format!("purge age must not be negative, got {}", age)));
            }
            if let Some(cutoff) = Utc::now().checked_sub_signed(age) {
                conditions.push(format!("created_at < ?{}", values.len() + 1));
                values.push(cutoff.timestamp());
            }
        }
        if let Some(id) = below_id {
            conditions.push(format!("id < ?{}", values.len() + 1));
            values.push(id);
        }

        if conditions.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM {ITEM_TABLE_NAME} WHERE {}",
            conditions.join(" OR ")
        );
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();

        let conn = self.lock()?;
        let removed = conn.execute(&sql, params.as_slice())?;
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {ITEM_TABLE_NAME}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
