//! Sync engine: the periodic reconciliation loop.
//!
//! Each cycle resolves the workspace, fetches the configured slice of tasks
//! plus all active projects, applies the filter policy, writes the result to
//! the store, and publishes exactly one event to the single subscriber. A
//! failed cycle publishes an error event and leaves the previous cached
//! snapshot untouched; the next cycle retries from scratch.

mod filter;
mod scheduler;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::models::{AssigneeScope, Project, Task};
use crate::store::Store;

pub use filter::{dedupe_by_gid, retain_assigned_to, FilterPolicy, Filterable};
pub use scheduler::PollScheduler;

/// Outcome of one poll cycle, delivered to the single subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The cache was replaced with these freshly fetched, filtered sets.
    Updated {
        tasks: Vec<Task>,
        projects: Vec<Project>,
    },
    /// The cycle failed; prior cached data remains valid and displayed.
    Error { message: String },
}

/// The periodic reconciliation engine.
///
/// Constructed once at startup and shared by reference; there are no
/// ambient singletons. The engine owns the fetched sets for the duration of
/// a cycle and hands them to the store (single writer) on completion.
pub struct SyncEngine<C: CredentialStore> {
    api: ApiClient<C>,
    store: Store,
    events: UnboundedSender<SyncEvent>,
    in_flight: AtomicBool,
}

impl<C: CredentialStore> SyncEngine<C> {
    /// Create the engine and the single-consumer event channel.
    pub fn new(api: ApiClient<C>, store: Store) -> (Arc<Self>, UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            api,
            store,
            events,
            in_flight: AtomicBool::new(false),
        });
        (engine, receiver)
    }

    /// The store this engine writes to.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Run one poll cycle, unless one is already in flight.
    ///
    /// Returns whether a cycle actually ran. Overlapping triggers (timer
    /// tick during a manual refresh, or vice versa) are no-ops; the engine
    /// never runs two cycles concurrently.
    pub async fn poll_once(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("poll cycle already in flight; ignoring trigger");
            return false;
        }

        match self.run_cycle().await {
            Ok((tasks, projects)) => {
                tracing::info!(
                    tasks = tasks.len(),
                    projects = projects.len(),
                    "poll cycle completed"
                );
                let _ = self.events.send(SyncEvent::Updated { tasks, projects });
            }
            Err(error) => {
                tracing::warn!("poll cycle failed: {error}");
                let _ = self.events.send(SyncEvent::Error {
                    message: error.to_string(),
                });
            }
        }

        self.in_flight.store(false, Ordering::SeqCst);
        true
    }

    async fn run_cycle(&self) -> Result<(Vec<Task>, Vec<Project>)> {
        // Settings are re-read each cycle; a change takes effect on the
        // next poll without any live subscription.
        let settings = self.store.settings().await?;

        // The first workspace returned by the account is authoritative.
        // Multi-workspace accounts are a documented limitation, not a bug.
        let workspace = self
            .api
            .workspaces()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("no workspace visible to this account".to_string()))?;
        tracing::debug!("polling workspace {} ({})", workspace.name, workspace.gid);

        // Users are cached indefinitely; only an empty cache is populated.
        let users = self.store.cached_users().await?;
        if users.is_empty() {
            let fetched = self.api.workspace_users(&workspace.gid).await?;
            self.store.save_users(&fetched).await?;
        }

        let tasks = match settings.assignee_scope {
            AssigneeScope::Mine => {
                let me = match settings.current_user_gid.clone() {
                    Some(gid) => gid,
                    None => self.api.me().await?.gid,
                };
                let fetched = self.api.assigned_tasks(&workspace.gid, &me).await?;
                let allowed: HashSet<String> = std::iter::once(me).collect();
                retain_assigned_to(fetched, &allowed)
            }
            AssigneeScope::Selected => {
                let selected = &settings.selected_user_gids;
                // Independent reads against the same resource; fetch them
                // concurrently and join.
                let fetches: Vec<_> = selected
                    .iter()
                    .map(|gid| self.api.assigned_tasks(&workspace.gid, gid))
                    .collect();
                let mut merged = Vec::new();
                for result in join_all(fetches).await {
                    merged.extend(result?);
                }
                let allowed: HashSet<String> = selected.iter().cloned().collect();
                retain_assigned_to(dedupe_by_gid(merged), &allowed)
            }
            AssigneeScope::Everyone => self.api.incomplete_tasks(&workspace.gid).await?,
        };

        let tasks = FilterPolicy::new(&settings.task_filters).apply(tasks);
        let projects = FilterPolicy::new(&settings.project_filters)
            .apply(self.api.active_projects(&workspace.gid).await?);

        self.store.save_tasks(&tasks).await?;
        self.store.save_projects(&projects).await?;

        Ok((tasks, projects))
    }
}
