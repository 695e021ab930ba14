//! Database connection management with defensive recovery.

use std::path::{Path, PathBuf};

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use crate::error::{Error, Result};

use super::migrations;

/// Database wrapper for libSQL connections.
///
/// Opening goes through a three-tier cascade so the process always reaches
/// a usable store: open the primary file (after copying it aside), restore
/// from the backup copy if the primary fails its integrity check, and fall
/// back to a fresh empty database if the backup fails too.
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open the database at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically. Never fails on a corrupt file; the
    /// worst case is an empty store (and a warning in the log).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let backup = backup_path(path);

        // Snapshot the current file before libsql touches it.
        if path.exists() {
            std::fs::copy(path, &backup)?;
        }

        match Self::try_open(path).await {
            Ok(database) => return Ok(database),
            Err(error) => {
                tracing::warn!("primary database failed to open cleanly: {error}");
            }
        }

        if backup.exists() {
            remove_db_files(path);
            std::fs::copy(&backup, path)?;
            match Self::try_open(path).await {
                Ok(database) => {
                    tracing::warn!("database restored from backup copy");
                    return Ok(database);
                }
                Err(error) => {
                    tracing::warn!("backup copy failed to open cleanly: {error}");
                }
            }
        }

        // Last resort: start over. Losing the cache is recoverable (the next
        // poll repopulates it); crashing on startup is not.
        tracing::error!("discarding corrupt database and starting empty");
        remove_db_files(path);
        Self::try_open(path).await
    }

    /// Open an in-memory database (useful for testing).
    pub async fn open_in_memory() -> Result<Self> {
        Self::try_open(Path::new(":memory:")).await
    }

    async fn try_open(path: &Path) -> Result<Self> {
        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.check_integrity().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for the app's single-writer access pattern.
    async fn configure(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok(); // in-memory databases reject this
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        Ok(())
    }

    /// Quick integrity check; any verdict other than "ok" is a failure.
    async fn check_integrity(&self) -> Result<()> {
        let mut rows = self.conn.query("PRAGMA integrity_check", ()).await?;
        let verdict: String = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => String::new(),
        };

        if verdict.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(Error::Database(format!("integrity check failed: {verdict}")))
        }
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Force buffered writes to durable storage.
    ///
    /// Called on shutdown so the last in-memory mutation survives.
    pub async fn flush(&self) -> Result<()> {
        let mut rows = self
            .conn
            .query("PRAGMA wal_checkpoint(TRUNCATE)", ())
            .await?;
        rows.next().await.ok();
        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn backup_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.backup", path.display()))
}

fn remove_db_files(path: &Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(format!("{}-wal", path.display()));
    let _ = std::fs::remove_file(format!("{}-shm", path.display()));
}
