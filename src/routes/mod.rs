mod health_check;
mod notifications;
mod push;
mod push_subscriptions;

pub use health_check::*;
pub use notifications::*;
pub use push::*;
pub use push_subscriptions::*;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// Responds with `{"error": message}` and the given status.
fn json_error<'r>(
    request: &'r rocket::Request<'_>,
    status: rocket::http::Status,
    message: String,
) -> rocket::response::Result<'static> {
    use rocket::response::Responder;
    use rocket::serde::json::{json, Json};
    (status, Json(json!({ "error": message }))).respond_to(request)
}
