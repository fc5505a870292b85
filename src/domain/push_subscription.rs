use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A device registered to receive push messages for a user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    pub user_id: Uuid,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub user_agent: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
}

impl TryFrom<SubscribeBody> for NewPushSubscription {
    type Error = String;

    fn try_from(body: SubscribeBody) -> Result<Self, Self::Error> {
        for (field, value) in [
            ("endpoint", &body.endpoint),
            ("keys.p256dh", &body.keys.p256dh),
            ("keys.auth", &body.keys.auth),
        ] {
            if value.trim().is_empty() {
                return Err(format!("'{}' must not be empty.", field));
            }
        }
        Ok(Self {
            user_id: body.user_id,
            endpoint: body.endpoint,
            p256dh: body.keys.p256dh,
            auth: body.keys.auth,
            user_agent: body.user_agent.filter(|agent| !agent.trim().is_empty()),
        })
    }
}
