//! Retention rules for stored notifications.
//!
//! Every destructive operation here is a sweep: a filtered delete that can be re-run at any
//! time. Sweeps never return errors to their caller; failures are logged and the next
//! scheduled run acts as the retry.

use crate::domain::NotificationStats;
use crate::store::{NotificationStore, StoreError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Any notification older than this is deleted.
    pub old_after: chrono::Duration,
    /// Read notifications older than this are deleted.
    pub read_after: chrono::Duration,
    /// Rows kept per user by the global cap.
    pub per_user_cap: usize,
    /// Delay between marking a notification read and deleting it.
    pub read_grace: Duration,
    /// Users capped in parallel during a global cap.
    pub sweep_concurrency: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            old_after: chrono::Duration::days(7),
            read_after: chrono::Duration::days(3),
            per_user_cap: 100,
            read_grace: Duration::from_secs(5),
            sweep_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepOutcome {
    pub deleted: usize,
    pub failures: usize,
}

impl SweepOutcome {
    fn completed(deleted: usize) -> Self {
        Self {
            deleted,
            failures: 0,
        }
    }

    fn failed() -> Self {
        Self {
            deleted: 0,
            failures: 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    fn merge(self, other: SweepOutcome) -> Self {
        Self {
            deleted: self.deleted + other.deleted,
            failures: self.failures + other.failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub old: SweepOutcome,
    pub read: SweepOutcome,
    pub capped: SweepOutcome,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.old.is_success() && self.read.is_success() && self.capped.is_success()
    }
}

/// A pending "delete once read" task. Dropping the handle detaches the task; it still fires.
pub struct DelayedDelete {
    notification_id: Uuid,
    handle: JoinHandle<()>,
}

impl DelayedDelete {
    pub fn notification_id(&self) -> Uuid {
        self.notification_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Gives up the handle; the delete still runs when its grace period ends.
    pub fn detach(self) {
        drop(self.handle);
    }

    /// Waits for the delete to run (or be cancelled).
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

#[derive(Clone)]
pub struct RetentionEngine {
    store: Arc<dyn NotificationStore>,
    policy: RetentionPolicy,
}

fn log_failure(sweep: &'static str, error: &StoreError) {
    tracing::error!(error.cause_chain = ?error, sweep, "Retention sweep failed");
}

impl RetentionEngine {
    pub fn new(store: Arc<dyn NotificationStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Deletes every notification older than the old-age horizon, read or not.
    #[tracing::instrument(name = "Purging old notifications", skip(self))]
    pub async fn purge_old(&self) -> SweepOutcome {
        let cutoff = Utc::now() - self.policy.old_after;
        match self.store.delete_created_before(cutoff, false).await {
            Ok(deleted) => {
                tracing::info!(deleted, "Purged old notifications");
                SweepOutcome::completed(deleted)
            }
            Err(e) => {
                log_failure("old", &e);
                SweepOutcome::failed()
            }
        }
    }

    /// Deletes read notifications older than the read horizon.
    #[tracing::instrument(name = "Purging read notifications", skip(self))]
    pub async fn purge_read(&self) -> SweepOutcome {
        let cutoff = Utc::now() - self.policy.read_after;
        match self.store.delete_created_before(cutoff, true).await {
            Ok(deleted) => {
                tracing::info!(deleted, "Purged read notifications");
                SweepOutcome::completed(deleted)
            }
            Err(e) => {
                log_failure("read", &e);
                SweepOutcome::failed()
            }
        }
    }

    /// Keeps the `limit` most recent notifications of a user and deletes the rest.
    #[tracing::instrument(name = "Capping notifications of a user", skip(self))]
    pub async fn cap_user(&self, user_id: Uuid, limit: usize) -> SweepOutcome {
        match self.try_cap_user(user_id, limit).await {
            Ok(deleted) => SweepOutcome::completed(deleted),
            Err(e) => {
                log_failure("per-user cap", &e);
                SweepOutcome::failed()
            }
        }
    }

    async fn try_cap_user(&self, user_id: Uuid, limit: usize) -> Result<usize, StoreError> {
        let ids = self.store.notification_ids(user_id).await?;
        if ids.len() <= limit {
            return Ok(0);
        }
        let deleted = self.store.delete_notifications(&ids[limit..]).await?;
        tracing::info!(deleted, kept = limit, "Trimmed notifications beyond the cap");
        Ok(deleted)
    }

    /// Applies the per-user cap to every user that has notifications.
    ///
    /// Users are processed a few at a time. The user listing itself is not paginated, so
    /// cost still grows with the number of distinct users.
    #[tracing::instrument(name = "Capping notifications of all users", skip(self))]
    pub async fn cap_all_users(&self) -> SweepOutcome {
        let users = match self.store.distinct_user_ids().await {
            Ok(users) => users,
            Err(e) => {
                log_failure("global cap", &e);
                return SweepOutcome::failed();
            }
        };
        let limit = self.policy.per_user_cap;
        stream::iter(users)
            .map(|user_id| self.cap_user(user_id, limit))
            .buffer_unordered(self.policy.sweep_concurrency.max(1))
            .fold(SweepOutcome::default(), |total, outcome| async move {
                total.merge(outcome)
            })
            .await
    }

    /// Old purge, then read purge, then the global cap.
    #[tracing::instrument(name = "Running full notification cleanup", skip(self))]
    pub async fn full_cleanup(&self) -> CleanupReport {
        let old = self.purge_old().await;
        let read = self.purge_read().await;
        let capped = self.cap_all_users().await;
        let report = CleanupReport { old, read, capped };
        tracing::info!(?report, "Notification cleanup finished");
        report
    }

    /// Deletes the notification after the read grace period, if it is still marked read.
    pub fn schedule_delayed_delete(&self, notification_id: Uuid) -> DelayedDelete {
        let store = Arc::clone(&self.store);
        let grace = self.policy.read_grace;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            match store.delete_if_read(notification_id).await {
                Ok(deleted) => {
                    tracing::debug!(%notification_id, deleted, "Delayed delete of a read notification ran")
                }
                Err(e) => log_failure("delayed delete", &e),
            }
        });
        DelayedDelete {
            notification_id,
            handle,
        }
    }

    /// Counts for one user, or for every user when `user_id` is `None`.
    #[tracing::instrument(name = "Computing notification stats", skip(self))]
    pub async fn stats(&self, user_id: Option<Uuid>) -> Result<NotificationStats, StoreError> {
        let counts = self.store.count_notifications(user_id).await?;
        Ok(counts.into())
    }
}
