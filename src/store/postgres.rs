use crate::configuration::DatabaseSettings;
use crate::domain::{
    NewNotification, NewPushSubscription, Notification, NotificationCounts, PushSubscription,
};
use crate::models::{NewNotificationRow, NewPushSubscriptionRow, NotificationRow, PushSubscriptionRow};
use crate::store::{
    realtime_channel, InsertFeed, NotificationStore, PushSubscriptionStore, StoreError,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

embed_migrations!("migrations");

/// Postgres-backed store. Queries run on the blocking pool; inserts made through this
/// instance are published to its realtime subscribers.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<ConnectionManager<PgConnection>>,
    inserts: broadcast::Sender<Notification>,
}

impl PgStore {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self {
            pool,
            inserts: realtime_channel(),
        }
    }

    pub fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(settings.connection_string());
        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .connection_timeout(Duration::from_millis(settings.connect_timeout_milliseconds))
            .build(manager)
            .map_err(StoreError::Unavailable)?;
        Ok(Self::new(pool))
    }

    #[tracing::instrument(name = "Running pending database migrations", skip(self))]
    pub fn run_migrations(&self) -> anyhow::Result<()> {
        let conn = self.pool.get()?;
        embedded_migrations::run(&*conn)?;
        Ok(())
    }

    async fn run<F, T>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(StoreError::Unavailable)?;
            query(&conn)
        })
        .await
        .map_err(|e| StoreError::Unexpected(anyhow!(e)))?
    }
}

fn decode(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, StoreError> {
    rows.into_iter()
        .map(|row| Notification::try_from(row).map_err(StoreError::Corrupt))
        .collect()
}

#[async_trait]
impl NotificationStore for PgStore {
    #[tracing::instrument(name = "Saving a new notification", skip(self, notification), fields(user_id = %notification.user_id))]
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        use crate::schema::notifications;
        let row = self
            .run(move |conn| {
                let id = Uuid::new_v4();
                let now = Utc::now();
                diesel::insert_into(notifications::table)
                    .values(NewNotificationRow::new(&id, &notification, &now))
                    .get_result::<NotificationRow>(conn)
                    .map_err(StoreError::from)
            })
            .await?;
        let notification = Notification::try_from(row).map_err(StoreError::Corrupt)?;
        // No receivers is fine; nobody is watching this user right now.
        let _ = self.inserts.send(notification.clone());
        Ok(notification)
    }

    #[tracing::instrument(name = "Loading recent notifications", skip(self))]
    async fn recent_notifications(
        &self,
        owner: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        use crate::schema::notifications::dsl::*;
        let rows = self
            .run(move |conn| {
                notifications
                    .filter(user_id.eq(owner))
                    .order(created_at.desc())
                    .limit(limit)
                    .load::<NotificationRow>(conn)
                    .map_err(StoreError::from)
            })
            .await?;
        decode(rows)
    }

    #[tracing::instrument(name = "Listing notification ids", skip(self))]
    async fn notification_ids(&self, owner: Uuid) -> Result<Vec<Uuid>, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            notifications
                .select(id)
                .filter(user_id.eq(owner))
                .order(created_at.desc())
                .load::<Uuid>(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Listing users with notifications", skip(self))]
    async fn distinct_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(|conn| {
            notifications
                .select(user_id)
                .distinct()
                .load::<Uuid>(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting notifications by id", skip(self, ids), fields(count = ids.len()))]
    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.run(move |conn| {
            diesel::delete(notifications.filter(id.eq_any(ids)))
                .execute(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting notifications of a user by id", skip(self, ids), fields(count = ids.len()))]
    async fn delete_for_user(&self, owner: Uuid, ids: &[Uuid]) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.run(move |conn| {
            diesel::delete(
                notifications
                    .filter(user_id.eq(owner))
                    .filter(id.eq_any(ids)),
            )
            .execute(conn)
            .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting notifications older than a cutoff", skip(self))]
    async fn delete_created_before(
        &self,
        cutoff: DateTime<Utc>,
        read_only: bool,
    ) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            let query = notifications.filter(created_at.lt(cutoff));
            let deleted = if read_only {
                diesel::delete(query.filter(read.eq(true))).execute(conn)?
            } else {
                diesel::delete(query).execute(conn)?
            };
            Ok(deleted)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting a read notification", skip(self))]
    async fn delete_if_read(&self, notification_id: Uuid) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            diesel::delete(
                notifications
                    .filter(id.eq(notification_id))
                    .filter(read.eq(true)),
            )
            .execute(conn)
            .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting all notifications of a user", skip(self))]
    async fn delete_all_for_user(&self, owner: Uuid) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            diesel::delete(notifications.filter(user_id.eq(owner)))
                .execute(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Marking a notification as read", skip(self))]
    async fn mark_read(
        &self,
        owner: Uuid,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            diesel::update(
                notifications
                    .filter(id.eq(notification_id))
                    .filter(user_id.eq(owner)),
            )
                .set((read.eq(true), updated_at.eq(at)))
                .execute(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Marking all notifications of a user as read", skip(self))]
    async fn mark_all_read(&self, owner: Uuid, at: DateTime<Utc>) -> Result<usize, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            diesel::update(
                notifications
                    .filter(user_id.eq(owner))
                    .filter(read.eq(false)),
            )
            .set((read.eq(true), updated_at.eq(at)))
            .execute(conn)
            .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Counting notifications", skip(self))]
    async fn count_notifications(
        &self,
        owner: Option<Uuid>,
    ) -> Result<NotificationCounts, StoreError> {
        use crate::schema::notifications::dsl::*;
        self.run(move |conn| {
            let mut total_query = notifications.count().into_boxed();
            let mut read_query = notifications.filter(read.eq(true)).count().into_boxed();
            if let Some(owner) = owner {
                total_query = total_query.filter(user_id.eq(owner));
                read_query = read_query.filter(user_id.eq(owner));
            }
            let total = total_query.get_result::<i64>(conn)?;
            let read_count = read_query.get_result::<i64>(conn)?;
            Ok(NotificationCounts {
                total: total as u64,
                read: read_count as u64,
            })
        })
        .await
    }

    fn subscribe_inserts(&self, owner: Uuid) -> InsertFeed {
        InsertFeed::new(owner, self.inserts.subscribe())
    }
}

#[async_trait]
impl PushSubscriptionStore for PgStore {
    #[tracing::instrument(name = "Saving a push subscription", skip(self, subscription), fields(user_id = %subscription.user_id))]
    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        use crate::schema::push_subscriptions;
        self.run(move |conn| {
            let now = Utc::now();
            let row = NewPushSubscriptionRow::new(&subscription, &now);
            diesel::insert_into(push_subscriptions::table)
                .values(&row)
                .on_conflict(push_subscriptions::user_id)
                .do_update()
                .set(&row)
                .get_result::<PushSubscriptionRow>(conn)
                .map(PushSubscription::from)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Deleting a push subscription", skip(self))]
    async fn delete_push_subscription(&self, owner: Uuid) -> Result<usize, StoreError> {
        use crate::schema::push_subscriptions::dsl::*;
        self.run(move |conn| {
            diesel::delete(push_subscriptions.filter(user_id.eq(owner)))
                .execute(conn)
                .map_err(StoreError::from)
        })
        .await
    }

    #[tracing::instrument(name = "Looking up push subscriptions", skip(self, user_ids), fields(users = user_ids.len()))]
    async fn push_subscriptions_for(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<PushSubscription>, StoreError> {
        use crate::schema::push_subscriptions::dsl::*;
        let owners = user_ids.to_vec();
        self.run(move |conn| {
            push_subscriptions
                .filter(user_id.eq_any(owners))
                .load::<PushSubscriptionRow>(conn)
                .map(|rows| rows.into_iter().map(PushSubscription::from).collect())
                .map_err(StoreError::from)
        })
        .await
    }
}
