use crate::domain::{
    NewNotification, NewPushSubscription, Notification, NotificationCounts, PushSubscription,
};
use crate::store::{
    realtime_channel, InsertFeed, NotificationStore, PushSubscriptionStore, StoreError,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    notifications: Vec<Notification>,
    push_subscriptions: HashMap<Uuid, PushSubscription>,
}

/// Process-local store with the same semantics as [`PgStore`](crate::store::PgStore).
///
/// Used for local runs without a database and by the test suites, which can seed rows
/// with arbitrary timestamps and simulate an unreachable backend.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    inserts: broadcast::Sender<Notification>,
    offline: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            inserts: realtime_channel(),
            offline: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Inserts a fully-formed row as-is, without publishing it to realtime subscribers.
    pub fn seed(&self, notification: Notification) -> Result<(), StoreError> {
        self.tables()?.notifications.push(notification);
        Ok(())
    }

    /// Publishes an existing row to realtime subscribers again, without storing anything.
    pub fn publish(&self, notification: Notification) {
        let _ = self.inserts.send(notification);
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, StoreError> {
        Ok(self.tables()?.notifications.clone())
    }

    pub fn push_subscriptions(&self) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(self.tables()?.push_subscriptions.values().cloned().collect())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(anyhow!("The store is offline.")));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unexpected(anyhow!("The store lock was poisoned.")))
    }
}

fn newest_first(rows: &mut [&Notification]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn retain_counting<F>(rows: &mut Vec<Notification>, mut delete: F) -> usize
where
    F: FnMut(&Notification) -> bool,
{
    let before = rows.len();
    rows.retain(|n| !delete(n));
    before - rows.len()
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let now = Utc::now();
        let stored = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            data: notification.data,
            read: false,
            created_at: now,
            updated_at: now,
        };
        self.tables()?.notifications.push(stored.clone());
        let _ = self.inserts.send(stored.clone());
        Ok(stored)
    }

    async fn recent_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<&Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        newest_first(&mut rows);
        Ok(rows
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn notification_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<&Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        newest_first(&mut rows);
        Ok(rows.into_iter().map(|n| n.id).collect())
    }

    async fn distinct_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables()?;
        let users: BTreeSet<Uuid> = tables.notifications.iter().map(|n| n.user_id).collect();
        Ok(users.into_iter().collect())
    }

    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        Ok(retain_counting(&mut tables.notifications, |n| {
            ids.contains(&n.id)
        }))
    }

    async fn delete_for_user(&self, user_id: Uuid, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        Ok(retain_counting(&mut tables.notifications, |n| {
            n.user_id == user_id && ids.contains(&n.id)
        }))
    }

    async fn delete_created_before(
        &self,
        cutoff: DateTime<Utc>,
        read_only: bool,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        Ok(retain_counting(&mut tables.notifications, |n| {
            n.created_at < cutoff && (n.read || !read_only)
        }))
    }

    async fn delete_if_read(&self, id: Uuid) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        Ok(retain_counting(&mut tables.notifications, |n| {
            n.id == id && n.read
        }))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        Ok(retain_counting(&mut tables.notifications, |n| {
            n.user_id == user_id
        }))
    }

    async fn mark_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let mut updated = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.id == id && n.user_id == user_id)
        {
            notification.read = true;
            notification.updated_at = at;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let mut updated = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            notification.updated_at = at;
            updated += 1;
        }
        Ok(updated)
    }

    async fn count_notifications(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<NotificationCounts, StoreError> {
        let tables = self.tables()?;
        let scoped = tables
            .notifications
            .iter()
            .filter(|n| user_id.map_or(true, |user_id| n.user_id == user_id));
        let mut counts = NotificationCounts::default();
        for notification in scoped {
            counts.total += 1;
            if notification.read {
                counts.read += 1;
            }
        }
        Ok(counts)
    }

    fn subscribe_inserts(&self, user_id: Uuid) -> InsertFeed {
        InsertFeed::new(user_id, self.inserts.subscribe())
    }
}

#[async_trait]
impl PushSubscriptionStore for InMemoryStore {
    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        let stored = PushSubscription {
            user_id: subscription.user_id,
            endpoint: subscription.endpoint,
            p256dh: subscription.p256dh,
            auth: subscription.auth,
            user_agent: subscription.user_agent,
            created_at: Utc::now(),
        };
        self.tables()?
            .push_subscriptions
            .insert(stored.user_id, stored.clone());
        Ok(stored)
    }

    async fn delete_push_subscription(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let removed = self.tables()?.push_subscriptions.remove(&user_id);
        Ok(removed.map_or(0, |_| 1))
    }

    async fn push_subscriptions_for(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let tables = self.tables()?;
        let wanted: BTreeSet<&Uuid> = user_ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|user_id| tables.push_subscriptions.get(user_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationKind;
    use claim::{assert_err, assert_ok, assert_ok_eq, assert_some_eq};
    use tokio::time::{timeout, Duration};

    fn new_notification(user_id: Uuid) -> NewNotification {
        NewNotification::new(
            user_id,
            NotificationKind::PaymentMade,
            "Payment made",
            "A payment of 120.00 was recorded",
        )
    }

    #[tokio::test]
    async fn inserts_are_delivered_only_to_the_owning_users_feed() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let mut feed = store.subscribe_inserts(owner);

        store
            .insert_notification(new_notification(Uuid::new_v4()))
            .await
            .unwrap();
        let mine = store
            .insert_notification(new_notification(owner))
            .await
            .unwrap();

        let delivered = timeout(Duration::from_secs(1), feed.recv()).await.unwrap();
        assert_some_eq!(delivered, mine);
    }

    #[tokio::test]
    async fn seeded_rows_are_not_published() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let mut feed = store.subscribe_inserts(owner);
        let now = Utc::now();
        store
            .seed(Notification {
                id: Uuid::new_v4(),
                user_id: owner,
                kind: NotificationKind::SupplierAdded,
                title: "Supplier added".into(),
                message: "Acme".into(),
                data: None,
                read: false,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        assert_err!(timeout(Duration::from_millis(20), feed.recv()).await);
    }

    #[tokio::test]
    async fn upserting_replaces_the_previous_device_of_a_user() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        for endpoint in ["https://push.example.com/laptop", "https://push.example.com/phone"] {
            store
                .upsert_push_subscription(NewPushSubscription {
                    user_id,
                    endpoint: endpoint.into(),
                    p256dh: "BPk3".into(),
                    auth: "c2VjcmV0".into(),
                    user_agent: None,
                })
                .await
                .unwrap();
        }

        let subscriptions = store.push_subscriptions_for(&[user_id]).await.unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].endpoint, "https://push.example.com/phone");
    }

    fn seeded(store: &InMemoryStore, user_id: Uuid) -> Notification {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: NotificationKind::TransactionUpdated,
            title: "Transaction updated".into(),
            message: "The due for Acme Ltd changed".into(),
            data: None,
            read: false,
            created_at: now,
            updated_at: now,
        };
        store.seed(notification.clone()).unwrap();
        notification
    }

    #[tokio::test]
    async fn owner_scoped_writes_leave_other_users_rows_alone() {
        let store = InMemoryStore::new();
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mine = seeded(&store, owner);
        let theirs = seeded(&store, other);

        assert_ok_eq!(store.mark_read(owner, theirs.id, Utc::now()).await, 0);
        assert_ok_eq!(store.delete_for_user(owner, &[mine.id, theirs.id]).await, 1);

        assert_eq!(store.notifications().unwrap(), vec![theirs]);
    }

    #[tokio::test]
    async fn repeated_user_ids_yield_each_subscription_once() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .upsert_push_subscription(NewPushSubscription {
                user_id,
                endpoint: "https://push.example.com/phone".into(),
                p256dh: "BPk3".into(),
                auth: "c2VjcmV0".into(),
                user_agent: None,
            })
            .await
            .unwrap();

        let subscriptions = store
            .push_subscriptions_for(&[user_id, user_id])
            .await
            .unwrap();

        assert_eq!(subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn an_offline_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert_err!(store.distinct_user_ids().await);
        store.set_offline(false);
        assert_ok!(store.distinct_user_ids().await);
    }
}
