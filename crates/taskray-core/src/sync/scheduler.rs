//! Periodic poll scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::credentials::CredentialStore;
use crate::models::clamp_poll_minutes;

use super::SyncEngine;

/// Explicit, cancellable handle over the polling timer.
///
/// Reconfiguring the interval tears the timer down and reschedules it;
/// an in-flight cycle is never cancelled and the cached snapshot is never
/// touched. Manual refreshes run out of band and leave the timer's own
/// schedule alone.
pub struct PollScheduler<C: CredentialStore> {
    engine: Arc<SyncEngine<C>>,
    handle: Option<JoinHandle<()>>,
}

impl<C: CredentialStore> PollScheduler<C> {
    #[must_use]
    pub const fn new(engine: Arc<SyncEngine<C>>) -> Self {
        Self {
            engine,
            handle: None,
        }
    }

    /// Start (or restart) periodic polling at the given cadence.
    ///
    /// The interval is clamped to the supported 1-60 minute range. The
    /// first tick fires immediately so a fresh snapshot is available right
    /// after startup or reconfiguration.
    pub fn start(&mut self, interval_minutes: u32) {
        self.stop();

        let minutes = clamp_poll_minutes(interval_minutes);
        let period = Duration::from_secs(u64::from(minutes) * 60);
        let engine = Arc::clone(&self.engine);
        tracing::debug!("scheduling a poll every {minutes} minute(s)");

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                engine.poll_once().await;
            }
        }));
    }

    /// Change the polling cadence.
    ///
    /// Only future scheduling is affected; a cycle already in flight
    /// completes (or fails) on its own.
    pub fn set_interval(&mut self, interval_minutes: u32) {
        self.start(interval_minutes);
    }

    /// Trigger one out-of-band cycle without disturbing the timer.
    ///
    /// A no-op if a cycle is already in flight (the engine's re-entrance
    /// guard applies).
    pub fn refresh_now(&self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.poll_once().await;
        });
    }

    /// Cancel the timer. Does not affect an in-flight cycle.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<C: CredentialStore> Drop for PollScheduler<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::credentials::MemoryCredentialStore;
    use crate::store::Store;
    use crate::sync::SyncEngine;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_stop() {
        let store = Store::in_memory().await.unwrap();
        // Port 9 is the discard service; the immediate first poll fails
        // fast, which is all this test needs.
        let api = ApiClient::with_base_url(
            MemoryCredentialStore::new("test-token"),
            "http://127.0.0.1:9",
        )
        .unwrap();
        let (engine, _events) = SyncEngine::new(api, store);

        let mut scheduler = PollScheduler::new(engine);
        assert!(!scheduler.is_running());

        scheduler.start(0); // clamps to one minute
        assert!(scheduler.is_running());

        scheduler.set_interval(30);
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
