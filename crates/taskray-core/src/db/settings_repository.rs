//! Settings repository implementation

use libsql::Connection;

use crate::error::Result;
use crate::models::Settings;
use crate::util::normalize_text_option;

/// Trait for settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load settings from the database
    async fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    async fn save(&self, settings: &Settings) -> Result<()>;

    /// Apply a batch of raw key/value updates atomically.
    ///
    /// All keys become visible together or none; unrelated keys are never
    /// touched.
    async fn apply(&self, pairs: &[(String, String)]) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        // Load each setting individually, tolerating absent or stale values
        if let Ok(value) = self.get_setting("poll_interval_minutes").await {
            if let Ok(minutes) = value.parse() {
                settings.poll_interval_minutes = minutes;
            }
        }

        if let Ok(value) = self.get_setting("current_user_gid").await {
            settings.current_user_gid = normalize_text_option(Some(value));
        }

        if let Ok(value) = self.get_setting("assignee_scope").await {
            settings.assignee_scope =
                serde_json::from_str(&format!("\"{value}\"")).unwrap_or_default();
        }

        if let Ok(value) = self.get_setting("selected_user_gids").await {
            settings.selected_user_gids = parse_list(&value);
        }

        if let Ok(value) = self.get_setting("task_include_names").await {
            settings.task_filters.include_names = parse_list(&value);
        }
        if let Ok(value) = self.get_setting("task_exclude_gids").await {
            settings.task_filters.exclude_gids = parse_list(&value);
        }
        if let Ok(value) = self.get_setting("task_exclude_names").await {
            settings.task_filters.exclude_names = parse_list(&value);
        }

        if let Ok(value) = self.get_setting("project_include_names").await {
            settings.project_filters.include_names = parse_list(&value);
        }
        if let Ok(value) = self.get_setting("project_exclude_gids").await {
            settings.project_filters.exclude_gids = parse_list(&value);
        }
        if let Ok(value) = self.get_setting("project_exclude_names").await {
            settings.project_filters.exclude_names = parse_list(&value);
        }

        if let Ok(value) = self.get_setting("pinned_task_gids").await {
            settings.pinned_task_gids = parse_list(&value);
        }
        if let Ok(value) = self.get_setting("pinned_project_gids").await {
            settings.pinned_project_gids = parse_list(&value);
        }

        if let Ok(value) = self.get_setting("show_completed").await {
            settings.show_completed = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let scope = serde_json::to_string(&settings.assignee_scope)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();

        let pairs = [
            (
                "poll_interval_minutes",
                settings.poll_interval_minutes.to_string(),
            ),
            (
                "current_user_gid",
                settings.current_user_gid.clone().unwrap_or_default(),
            ),
            ("assignee_scope", scope),
            (
                "selected_user_gids",
                serde_json::to_string(&settings.selected_user_gids)?,
            ),
            (
                "task_include_names",
                serde_json::to_string(&settings.task_filters.include_names)?,
            ),
            (
                "task_exclude_gids",
                serde_json::to_string(&settings.task_filters.exclude_gids)?,
            ),
            (
                "task_exclude_names",
                serde_json::to_string(&settings.task_filters.exclude_names)?,
            ),
            (
                "project_include_names",
                serde_json::to_string(&settings.project_filters.include_names)?,
            ),
            (
                "project_exclude_gids",
                serde_json::to_string(&settings.project_filters.exclude_gids)?,
            ),
            (
                "project_exclude_names",
                serde_json::to_string(&settings.project_filters.exclude_names)?,
            ),
            (
                "pinned_task_gids",
                serde_json::to_string(&settings.pinned_task_gids)?,
            ),
            (
                "pinned_project_gids",
                serde_json::to_string(&settings.pinned_project_gids)?,
            ),
            (
                "show_completed",
                if settings.show_completed {
                    "true".to_string()
                } else {
                    "false".to_string()
                },
            ),
        ];

        let owned: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        self.apply(&owned).await
    }

    async fn apply(&self, pairs: &[(String, String)]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        for (key, value) in pairs {
            if let Err(e) = self
                .conn
                .execute(
                    "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                    [key.as_str(), value.as_str()],
                )
                .await
            {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(())
    }
}

impl LibSqlSettingsRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<String> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(value)
        } else {
            Err(crate::error::Error::NotFound(key.to_string()))
        }
    }
}

/// Parse a JSON-array setting value, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(value)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| normalize_text_option(Some(entry)))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::models::AssigneeScope;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_default_settings() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        let settings = repo.load().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load_settings() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        let mut settings = Settings {
            poll_interval_minutes: 10,
            current_user_gid: Some("88".to_string()),
            assignee_scope: AssigneeScope::Selected,
            selected_user_gids: vec!["88".to_string(), "89".to_string()],
            show_completed: true,
            ..Settings::default()
        };
        settings.task_filters.include_names = vec!["launch".to_string()];
        settings.project_filters.exclude_gids = vec!["42".to_string()];

        repo.save(&settings).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_preserves_unrelated_keys() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.apply(&[("poll_interval_minutes".to_string(), "7".to_string())])
            .await
            .unwrap();
        repo.apply(&[("current_user_gid".to_string(), "88".to_string())])
            .await
            .unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.poll_interval_minutes, 7);
        assert_eq!(loaded.current_user_gid.as_deref(), Some("88"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_batch_is_atomic_in_one_statement_group() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.apply(&[
            ("poll_interval_minutes".to_string(), "3".to_string()),
            ("assignee_scope".to_string(), "everyone".to_string()),
        ])
        .await
        .unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.poll_interval_minutes, 3);
        assert_eq!(loaded.assignee_scope, AssigneeScope::Everyone);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_values_fall_back_to_defaults() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.apply(&[
            ("poll_interval_minutes".to_string(), "not-a-number".to_string()),
            ("assignee_scope".to_string(), "sideways".to_string()),
            ("selected_user_gids".to_string(), "{broken".to_string()),
        ])
        .await
        .unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.poll_interval_minutes, 5);
        assert_eq!(loaded.assignee_scope, AssigneeScope::Mine);
        assert!(loaded.selected_user_gids.is_empty());
    }
}
