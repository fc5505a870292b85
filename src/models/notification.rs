use crate::domain::{NewNotification, Notification};
use crate::schema::notifications;
use chrono::offset::Utc;
use chrono::DateTime;

#[derive(Queryable, Debug)]
pub struct NotificationRow {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "notifications"]
pub struct NewNotificationRow<'a> {
    pub id: &'a uuid::Uuid,
    pub user_id: &'a uuid::Uuid,
    pub kind: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub data: Option<&'a serde_json::Value>,
    pub read: bool,
    pub created_at: &'a DateTime<Utc>,
    pub updated_at: &'a DateTime<Utc>,
}

impl<'a> NewNotificationRow<'a> {
    pub fn new(
        id: &'a uuid::Uuid,
        notification: &'a NewNotification,
        now: &'a DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: &notification.user_id,
            kind: notification.kind.as_str(),
            title: &notification.title,
            message: &notification.message,
            data: notification.data.as_ref(),
            read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = String;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            data: row.data,
            read: row.read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
