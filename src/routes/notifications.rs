use crate::domain::NotificationStats;
use crate::guards::Admin;
use crate::retention::{CleanupReport, RetentionEngine};
use crate::routes::{error_chain_fmt, json_error};
use crate::store::StoreError;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use uuid::Uuid;

/// Manual trigger for the full retention cleanup. Sweep failures are reported in the body.
#[tracing::instrument(name = "Manual notification cleanup", skip(admin, retention), fields(admin = %admin.username))]
#[post("/notifications/cleanup")]
pub async fn cleanup(admin: Admin, retention: &State<RetentionEngine>) -> Json<CleanupReport> {
    Json(retention.full_cleanup().await)
}

#[tracing::instrument(name = "Notification stats", skip(_admin, retention))]
#[get("/notifications/stats?<user_id>")]
pub async fn stats(
    _admin: Admin,
    user_id: Option<&str>,
    retention: &State<RetentionEngine>,
) -> Result<Json<NotificationStats>, StatsError> {
    let user_id = user_id
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|_| StatsError::ValidationError(format!("{} is not a valid user id.", id)))
        })
        .transpose()?;
    let stats = retention.stats(user_id).await?;
    Ok(Json(stats))
}

#[derive(thiserror::Error)]
pub enum StatsError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to count notifications.")]
    UnexpectedError(#[from] StoreError),
}

impl std::fmt::Debug for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for StatsError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("StatsError: {:?}", self);
        let status = match self {
            StatsError::ValidationError(_) => Status::BadRequest,
            StatsError::UnexpectedError(_) => Status::InternalServerError,
        };
        json_error(request, status, self.to_string())
    }
}
