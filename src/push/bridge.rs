use crate::domain::{PushRequest, PushSubscription};
use crate::push::PushTransport;
use crate::store::{PushSubscriptionStore, StoreError};
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetail {
    pub user_id: Uuid,
    pub endpoint: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct DeliveryReport {
    pub message: String,
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub details: Vec<DeliveryDetail>,
}

impl DeliveryReport {
    fn empty() -> Self {
        Self {
            message: "No subscriptions found".into(),
            successful: 0,
            failed: 0,
            total: 0,
            details: vec![],
        }
    }

    fn from_details(details: Vec<DeliveryDetail>) -> Self {
        let successful = details.iter().filter(|d| d.success).count();
        let total = details.len();
        Self {
            message: format!("Sent {} of {} push notifications", successful, total),
            successful,
            failed: total - successful,
            total,
            details,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to look up push subscriptions.")]
    Lookup(#[from] StoreError),
    #[error("Failed to serialize the push payload.")]
    Payload(#[from] serde_json::Error),
}

/// Fans a push message out to every registered device of the targeted users.
pub struct PushBridge {
    subscriptions: Arc<dyn PushSubscriptionStore>,
    transport: Arc<dyn PushTransport>,
    icon: String,
}

impl PushBridge {
    pub fn new(
        subscriptions: Arc<dyn PushSubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        icon: String,
    ) -> Self {
        Self {
            subscriptions,
            transport,
            icon,
        }
    }

    /// Attempts every device independently; individual failures end up in the report and
    /// failing subscriptions are kept.
    #[tracing::instrument(
        name = "Delivering a push notification",
        skip(self, request),
        fields(title = %request.title.as_ref())
    )]
    pub async fn deliver(&self, request: &PushRequest) -> Result<DeliveryReport, DeliveryError> {
        let user_ids = request.targets.user_ids();
        let subscriptions = self.subscriptions.push_subscriptions_for(&user_ids).await?;
        if subscriptions.is_empty() {
            tracing::info!(users = user_ids.len(), "No push subscriptions for the targeted users");
            return Ok(DeliveryReport::empty());
        }

        let payload = serde_json::to_vec(&request.payload(&self.icon))?;
        let attempts = subscriptions
            .iter()
            .map(|subscription| self.attempt(subscription, &payload));
        let report = DeliveryReport::from_details(join_all(attempts).await);
        tracing::info!(
            successful = report.successful,
            failed = report.failed,
            "Push fan-out finished"
        );
        Ok(report)
    }

    async fn attempt(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryDetail {
        let result = self.transport.send(subscription, payload).await;
        if let Err(error) = &result {
            tracing::warn!(
                error.cause_chain = ?error,
                user_id = %subscription.user_id,
                "Push delivery to a device failed"
            );
        }
        DeliveryDetail {
            user_id: subscription.user_id,
            endpoint: subscription.endpoint.clone(),
            success: result.is_ok(),
            error: result.err().map(|e| format!("{:#}", e)),
        }
    }
}
