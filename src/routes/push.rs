use crate::domain::{PushRequest, PushRequestBody};
use crate::push::{DeliveryError, DeliveryReport, PushBridge};
use crate::routes::{error_chain_fmt, json_error};
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use uuid::Uuid;

/// The public half of the VAPID key pair, handed to devices when they subscribe.
pub struct VapidPublicKey(pub String);

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    public_key: String,
}

#[tracing::instrument(
    name = "Sending a push notification",
    skip(body, bridge),
    fields(request_id = %Uuid::new_v4())
)]
#[post("/push", data = "<body>")]
pub async fn send_push(
    body: Json<PushRequestBody>,
    bridge: &State<PushBridge>,
) -> Result<Json<DeliveryReport>, PushError> {
    let request = PushRequest::try_from(body.into_inner()).map_err(PushError::ValidationError)?;
    let report = bridge.deliver(&request).await?;
    Ok(Json(report))
}

#[options("/push")]
pub fn push_preflight() {}

#[get("/push/public_key")]
pub fn vapid_public_key(key: &State<VapidPublicKey>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: key.0.clone(),
    })
}

#[derive(thiserror::Error)]
pub enum PushError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to deliver the push notification.")]
    UnexpectedError(#[from] DeliveryError),
}

impl std::fmt::Debug for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for PushError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("PushError: {:?}", self);
        let status = match self {
            PushError::ValidationError(_) => Status::BadRequest,
            PushError::UnexpectedError(_) => Status::InternalServerError,
        };
        json_error(request, status, self.to_string())
    }
}
