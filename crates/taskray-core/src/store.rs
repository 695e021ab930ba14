//! Persistent store service.
//!
//! Wraps the database in shared async access and exposes the read/update
//! interface consumed by the sync engine and by UI-facing read paths. The
//! engine is the sole writer of cached entity sets; settings and
//! seen-timestamp writes touch independent keys, so the single mutex is
//! enough to serialize every mutation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{
    CacheKind, CacheRepository, Database, LibSqlCacheRepository, LibSqlSeenRepository,
    LibSqlSettingsRepository, SeenRepository, SettingsRepository,
};
use crate::error::Result;
use crate::models::{Project, Settings, Task, User};

/// Service for database operations
///
/// Cloning is cheap; all clones share one connection.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    /// Open (or create) the store at the given path.
    ///
    /// Goes through the recovery cascade, so this only fails when even a
    /// fresh empty database cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Latest committed settings snapshot.
    pub async fn settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.load().await
    }

    /// Persist a full settings record.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.save(settings).await
    }

    /// Apply a batch of raw settings updates atomically.
    ///
    /// This is the write path used by the external settings surface.
    pub async fn apply_settings(&self, pairs: &[(String, String)]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.apply(pairs).await
    }

    /// Cached tasks from the last completed poll (empty before the first).
    pub async fn cached_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        Ok(repo
            .load_snapshot(CacheKind::Tasks)
            .await?
            .map(|snapshot| snapshot.items)
            .unwrap_or_default())
    }

    /// Replace the cached task set.
    pub async fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        repo.save_snapshot(CacheKind::Tasks, tasks).await
    }

    /// Cached projects from the last completed poll.
    pub async fn cached_projects(&self) -> Result<Vec<Project>> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        Ok(repo
            .load_snapshot(CacheKind::Projects)
            .await?
            .map(|snapshot| snapshot.items)
            .unwrap_or_default())
    }

    /// Replace the cached project set.
    pub async fn save_projects(&self, projects: &[Project]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        repo.save_snapshot(CacheKind::Projects, projects).await
    }

    /// Cached workspace members.
    pub async fn cached_users(&self) -> Result<Vec<User>> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        Ok(repo
            .load_snapshot(CacheKind::Users)
            .await?
            .map(|snapshot| snapshot.items)
            .unwrap_or_default())
    }

    /// Replace the cached user set.
    pub async fn save_users(&self, users: &[User]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        repo.save_snapshot(CacheKind::Users, users).await
    }

    /// When the snapshot for one entity kind was last written, if ever.
    ///
    /// Diagnostic only; snapshots never expire.
    pub async fn snapshot_fetched_at(&self, kind: CacheKind) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        Ok(repo
            .load_snapshot::<serde_json::Value>(kind)
            .await?
            .and_then(|snapshot| snapshot.fetched_at))
    }

    /// All seen-timestamps, keyed by task GID.
    pub async fn seen_timestamps(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlSeenRepository::new(db.connection());
        repo.all().await
    }

    /// The seen-timestamp for one task.
    pub async fn seen_timestamp(&self, task_gid: &str) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlSeenRepository::new(db.connection());
        repo.get(task_gid).await
    }

    /// Record that the user viewed a task's activity at the given
    /// modified-timestamp. The sole write path into highlight state.
    pub async fn set_seen_timestamp(&self, task_gid: &str, seen_at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSeenRepository::new(db.connection());
        repo.set(task_gid, seen_at).await
    }

    /// Force buffered writes to disk; called on shutdown.
    pub async fn flush(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.flush().await
    }
}
