//! Cached entity snapshot repository

use chrono::{DateTime, Utc};
use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Entity kinds with a cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Tasks,
    Projects,
    Users,
}

impl CacheKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Projects => "projects",
            Self::Users => "users",
        }
    }
}

/// A cached snapshot with its fetch timestamp.
///
/// The timestamp is diagnostic only; snapshots never expire.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Trait for snapshot storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CacheRepository {
    /// Replace the snapshot for one entity kind.
    async fn save_snapshot<T: Serialize + Sync>(&self, kind: CacheKind, items: &[T]) -> Result<()>;

    /// Load the snapshot for one entity kind, if one was ever written.
    async fn load_snapshot<T: DeserializeOwned>(&self, kind: CacheKind)
        -> Result<Option<Snapshot<T>>>;
}

/// libSQL implementation of `CacheRepository`
pub struct LibSqlCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CacheRepository for LibSqlCacheRepository<'_> {
    async fn save_snapshot<T: Serialize + Sync>(&self, kind: CacheKind, items: &[T]) -> Result<()> {
        let payload = serde_json::to_string(items)?;
        let fetched_at = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT OR REPLACE INTO entity_cache (kind, payload, fetched_at) VALUES (?, ?, ?)",
                [kind.as_str(), payload.as_str(), fetched_at.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn load_snapshot<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
    ) -> Result<Option<Snapshot<T>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload, fetched_at FROM entity_cache WHERE kind = ?",
                [kind.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let payload: String = row.get(0)?;
        let fetched_at_raw: String = row.get(1)?;

        let items = serde_json::from_str(&payload)?;
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at_raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc));

        Ok(Some(Snapshot { items, fetched_at }))
    }
}
