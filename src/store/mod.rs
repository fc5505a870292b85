mod memory;
mod postgres;

use crate::domain::{
    NewNotification, NewPushSubscription, Notification, NotificationCounts, PushSubscription,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Capacity of the realtime insert channel before slow receivers start lagging.
const REALTIME_CAPACITY: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to acquire a connection from the database pool.")]
    Unavailable(#[source] diesel::r2d2::PoolError),
    #[error("Failed to execute a query.")]
    Query(#[from] diesel::result::Error),
    #[error("A stored row could not be decoded: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores a notification, assigning its id and timestamps, and publishes it to
    /// realtime subscribers.
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;

    /// Up to `limit` notifications of a user, newest first.
    async fn recent_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Every notification id of a user, newest first.
    async fn notification_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn distinct_user_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<usize, StoreError>;

    /// Deletes the given rows, skipping any that belong to another user.
    async fn delete_for_user(&self, user_id: Uuid, ids: &[Uuid]) -> Result<usize, StoreError>;

    /// Deletes rows created before `cutoff`; only read rows when `read_only` is set.
    async fn delete_created_before(
        &self,
        cutoff: DateTime<Utc>,
        read_only: bool,
    ) -> Result<usize, StoreError>;

    /// Deletes a single row, but only while it is still marked read.
    async fn delete_if_read(&self, id: Uuid) -> Result<usize, StoreError>;

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize, StoreError>;

    /// Marks one of the user's rows read; a row owned by someone else is not touched.
    async fn mark_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn count_notifications(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<NotificationCounts, StoreError>;

    /// Opens a realtime feed of inserts for one user.
    fn subscribe_inserts(&self, user_id: Uuid) -> InsertFeed;
}

#[async_trait]
pub trait PushSubscriptionStore: Send + Sync {
    /// Creates the user's subscription or overwrites the existing one.
    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError>;

    async fn delete_push_subscription(&self, user_id: Uuid) -> Result<usize, StoreError>;

    async fn push_subscriptions_for(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<PushSubscription>, StoreError>;
}

pub(crate) fn realtime_channel() -> broadcast::Sender<Notification> {
    broadcast::channel(REALTIME_CAPACITY).0
}

/// Realtime insert events for a single user.
pub struct InsertFeed {
    user_id: Uuid,
    receiver: broadcast::Receiver<Notification>,
}

impl InsertFeed {
    pub(crate) fn new(user_id: Uuid, receiver: broadcast::Receiver<Notification>) -> Self {
        Self { user_id, receiver }
    }

    /// Waits for the next insert addressed to this feed's user.
    /// Returns `None` once the store side of the channel is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.user_id == self.user_id => {
                    return Some(notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        user_id = %self.user_id,
                        skipped,
                        "Realtime feed lagged behind, some inserts were not delivered"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
