use crate::domain::{NewPushSubscription, PushSubscription};
use crate::schema::push_subscriptions;
use chrono::offset::Utc;
use chrono::DateTime;

#[derive(Queryable)]
pub struct PushSubscriptionRow {
    pub user_id: uuid::Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Doubles as the changeset on upsert, so a new device replaces the old one.
#[derive(Insertable, AsChangeset)]
#[table_name = "push_subscriptions"]
#[changeset_options(treat_none_as_null = "true")]
pub struct NewPushSubscriptionRow<'a> {
    pub user_id: &'a uuid::Uuid,
    pub endpoint: &'a str,
    pub p256dh: &'a str,
    pub auth: &'a str,
    pub user_agent: Option<&'a str>,
    pub created_at: &'a DateTime<Utc>,
}

impl<'a> NewPushSubscriptionRow<'a> {
    pub fn new(subscription: &'a NewPushSubscription, now: &'a DateTime<Utc>) -> Self {
        Self {
            user_id: &subscription.user_id,
            endpoint: &subscription.endpoint,
            p256dh: &subscription.p256dh,
            auth: &subscription.auth,
            user_agent: subscription.user_agent.as_deref(),
            created_at: now,
        }
    }
}

impl From<PushSubscriptionRow> for PushSubscription {
    fn from(row: PushSubscriptionRow) -> Self {
        PushSubscription {
            user_id: row.user_id,
            endpoint: row.endpoint,
            p256dh: row.p256dh,
            auth: row.auth,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}
