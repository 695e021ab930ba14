//! Seen-timestamp repository
//!
//! One row per task GID holding the `modified_at` value observed when the
//! user last opened that task's activity view. Point lookups and updates
//! never rewrite the rest of the table; rows persist indefinitely.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use libsql::Connection;

use crate::error::Result;

/// Trait for seen-timestamp storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SeenRepository {
    /// All recorded timestamps, keyed by task GID.
    async fn all(&self) -> Result<HashMap<String, DateTime<Utc>>>;

    /// The timestamp recorded for one task, if any.
    async fn get(&self, task_gid: &str) -> Result<Option<DateTime<Utc>>>;

    /// Record (or overwrite) the timestamp for one task.
    async fn set(&self, task_gid: &str, seen_at: DateTime<Utc>) -> Result<()>;
}

/// libSQL implementation of `SeenRepository`
pub struct LibSqlSeenRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSeenRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SeenRepository for LibSqlSeenRepository<'_> {
    async fn all(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query("SELECT task_gid, last_seen_at FROM seen_tasks", ())
            .await?;

        let mut timestamps = HashMap::new();
        while let Some(row) = rows.next().await? {
            let task_gid: String = row.get(0)?;
            let raw: String = row.get(1)?;
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(parsed) => {
                    timestamps.insert(task_gid, parsed.with_timezone(&Utc));
                }
                Err(error) => {
                    tracing::warn!("dropping unparseable seen-timestamp for {task_gid}: {error}");
                }
            }
        }

        Ok(timestamps)
    }

    async fn get(&self, task_gid: &str) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_seen_at FROM seen_tasks WHERE task_gid = ?",
                [task_gid],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let raw: String = row.get(0)?;
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)))
    }

    async fn set(&self, task_gid: &str, seen_at: DateTime<Utc>) -> Result<()> {
        let seen_value = seen_at.to_rfc3339();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO seen_tasks (task_gid, last_seen_at) VALUES (?, ?)",
                [task_gid, seen_value.as_str()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_timestamp() {
        let db = setup().await;
        let repo = LibSqlSeenRepository::new(db.connection());

        assert!(repo.get("1").await.unwrap().is_none());
        assert!(repo.all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_and_get_round_trip() {
        let db = setup().await;
        let repo = LibSqlSeenRepository::new(db.connection());

        let seen_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 30, 0).unwrap();
        repo.set("1204986300417316", seen_at).await.unwrap();

        assert_eq!(repo.get("1204986300417316").await.unwrap(), Some(seen_at));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_overwrites_previous_value() {
        let db = setup().await;
        let repo = LibSqlSeenRepository::new(db.connection());

        let first = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        repo.set("1", first).await.unwrap();
        repo.set("1", second).await.unwrap();

        assert_eq!(repo.get("1").await.unwrap(), Some(second));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_all_returns_every_row() {
        let db = setup().await;
        let repo = LibSqlSeenRepository::new(db.connection());

        let seen_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        repo.set("1", seen_at).await.unwrap();
        repo.set("2", seen_at).await.unwrap();

        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("2"), Some(&seen_at));
    }
}
