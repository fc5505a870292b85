use crate::guards::{BasicAuth, OrStatus};
use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest};
use rocket::{Request, State};
use secrecy::{ExposeSecret, Secret};

/// The configured operator account allowed to trigger maintenance.
pub struct AdminCredentials {
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: Secret<String>,
}

/// A request authenticated as the operator.
#[derive(Debug)]
pub struct Admin {
    pub username: String,
    // prevents construction outside of this module
    _private: (),
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let credentials = try_outcome!(request.guard::<&State<AdminCredentials>>().await.map_error(
            |_| (
                Status::InternalServerError,
                anyhow!("Admin credentials are not configured.")
            )
        ));
        let basic_auth = try_outcome!(request.guard::<BasicAuth>().await);

        let username = credentials.username.clone();
        let password_hash = credentials.password_hash.clone();
        // argon2 is CPU-bound
        let verified = tokio::task::spawn_blocking(move || {
            verify(basic_auth, &username, &password_hash)
        })
        .await;
        match verified {
            Ok(Ok(admin)) => Outcome::Success(admin),
            Ok(Err(e)) => Outcome::Error(e),
            Err(e) => Outcome::Error((
                Status::InternalServerError,
                anyhow::Error::new(e).context("Failed to verify admin credentials."),
            )),
        }
    }
}

fn verify(
    basic_auth: BasicAuth,
    username: &str,
    password_hash: &Secret<String>,
) -> Result<Admin, (Status, anyhow::Error)> {
    let expected = PasswordHash::new(password_hash.expose_secret()).or_status(
        Status::InternalServerError,
        "The configured admin password hash is not a valid PHC string.",
    )?;
    let password_matches = Argon2::default()
        .verify_password(basic_auth.password.expose_secret().as_bytes(), &expected)
        .is_ok();
    if basic_auth.username != username || !password_matches {
        return Err((
            Status::Unauthorized,
            anyhow!("Invalid username or password."),
        ));
    }
    Ok(Admin {
        username: basic_auth.username,
        _private: (),
    })
}
