use crate::guards::OrStatus;
use anyhow::{anyhow, Context};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::Request;
use secrecy::Secret;

/// Credentials sent with the `Basic` authorization scheme.
pub struct BasicAuth {
    pub username: String,
    pub password: Secret<String>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BasicAuth {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match basic_credentials(request) {
            Ok(auth) => Outcome::Success(auth),
            Err(e) => Outcome::Error(e),
        }
    }
}

fn basic_credentials(request: &Request) -> Result<BasicAuth, (Status, anyhow::Error)> {
    let header_value = request
        .headers()
        .get_one("Authorization")
        .or_status(Status::Unauthorized, "The 'Authorization' header was missing")?;

    let base64encoded_segment = header_value
        .strip_prefix("Basic ")
        .or_status(Status::Unauthorized, "The authorization scheme was not 'Basic'.")?;

    let decoded_bytes = base64::decode_config(base64encoded_segment, base64::STANDARD)
        .or_status(Status::Unauthorized, "Failed to base64-decode 'Basic' credentials.")?;

    let decoded_credentials = String::from_utf8(decoded_bytes)
        .context("The decoded credential string is not valid UTF8.")
        .map_err(|e| (Status::Unauthorized, e))?;

    let (username, password) = decoded_credentials.split_once(':').ok_or_else(|| {
        (
            Status::Unauthorized,
            anyhow!("A username and a password must be provided in 'Basic' auth."),
        )
    })?;

    Ok(BasicAuth {
        username: username.to_string(),
        password: Secret::new(password.to_string()),
    })
}
