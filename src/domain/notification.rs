use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The bookkeeping event a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TransactionCreated,
    TransactionUpdated,
    TransactionDeleted,
    SupplierAdded,
    PaymentMade,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TransactionCreated => "transaction_created",
            NotificationKind::TransactionUpdated => "transaction_updated",
            NotificationKind::TransactionDeleted => "transaction_deleted",
            NotificationKind::SupplierAdded => "supplier_added",
            NotificationKind::PaymentMade => "payment_made",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction_created" => Ok(Self::TransactionCreated),
            "transaction_updated" => Ok(Self::TransactionUpdated),
            "transaction_deleted" => Ok(Self::TransactionDeleted),
            "supplier_added" => Ok(Self::SupplierAdded),
            "payment_made" => Ok(Self::PaymentMade),
            other => Err(format!("{} is not a known notification type.", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notification that has not been stored yet; the store assigns its id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, title: &str, message: &str) -> Self {
        Self {
            user_id,
            kind,
            title: title.to_string(),
            message: message.to_string(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Raw read/unread counts as returned by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NotificationCounts {
    pub total: u64,
    pub read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: u64,
    pub read: u64,
    pub unread: u64,
    pub read_percentage: u32,
}

impl From<NotificationCounts> for NotificationStats {
    fn from(counts: NotificationCounts) -> Self {
        let read_percentage = match counts.total {
            0 => 0,
            total => ((counts.read as f64 / total as f64) * 100.0).round() as u32,
        };
        Self {
            total: counts.total,
            read: counts.read,
            unread: counts.total.saturating_sub(counts.read),
            read_percentage,
        }
    }
}
