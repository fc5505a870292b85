use crate::domain::{NewPushSubscription, PushSubscription, SubscribeBody};
use crate::routes::{error_chain_fmt, json_error};
use crate::store::{PushSubscriptionStore, StoreError};
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use std::sync::Arc;
use uuid::Uuid;

#[tracing::instrument(
    name = "Registering a push subscription",
    skip(body, store),
    fields(user_id = %body.user_id)
)]
#[post("/push_subscriptions", data = "<body>")]
pub async fn subscribe_device(
    body: Json<SubscribeBody>,
    store: &State<Arc<dyn PushSubscriptionStore>>,
) -> Result<Json<PushSubscription>, SubscriptionError> {
    let subscription = NewPushSubscription::try_from(body.into_inner())
        .map_err(SubscriptionError::ValidationError)?;
    let stored = store.upsert_push_subscription(subscription).await?;
    Ok(Json(stored))
}

#[tracing::instrument(name = "Removing a push subscription", skip(store))]
#[delete("/push_subscriptions/<user_id>")]
pub async fn unsubscribe_device(
    user_id: &str,
    store: &State<Arc<dyn PushSubscriptionStore>>,
) -> Result<(), SubscriptionError> {
    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| SubscriptionError::ValidationError(format!("{} is not a valid user id.", user_id)))?;
    let removed = store.delete_push_subscription(user_id).await?;
    tracing::info!(removed, "Push subscription removed");
    Ok(())
}

#[derive(thiserror::Error)]
pub enum SubscriptionError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to update push subscriptions.")]
    UnexpectedError(#[from] StoreError),
}

impl std::fmt::Debug for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for SubscriptionError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("SubscriptionError: {:?}", self);
        let status = match self {
            SubscriptionError::ValidationError(_) => Status::BadRequest,
            SubscriptionError::UnexpectedError(_) => Status::InternalServerError,
        };
        json_error(request, status, self.to_string())
    }
}
