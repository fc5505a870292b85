use crate::retention::RetentionPolicy;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use serde_aux::field_attributes::deserialize_option_number_from_string;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub enum Environment {
    Local,
    Production,
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub retention: RetentionSettings,
    pub push: PushSettings,
    pub preferences: PreferencesSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    pub port: Option<u16>,
    pub host: IpAddr,
    pub admin_username: String,
    /// Argon2 PHC string of the admin password.
    pub admin_password_hash: Secret<String>,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    pub max_connections: u32,
    pub connect_timeout_milliseconds: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct RetentionSettings {
    pub old_after_days: i64,
    pub read_after_days: i64,
    pub per_user_cap: usize,
    pub read_grace_seconds: u64,
    pub sweep_concurrency: usize,
    /// How often the background sweeper runs a full cleanup; absent disables it.
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub sweep_interval_seconds: Option<u64>,
}

#[derive(serde::Deserialize, Clone)]
pub struct PushSettings {
    pub vapid_public_key: String,
    pub vapid_private_key: Secret<String>,
    /// Contact URI sent in the VAPID `sub` claim, e.g. `mailto:ops@example.com`.
    pub vapid_subject: String,
    pub ttl_seconds: u32,
    pub icon: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct PreferencesSettings {
    pub path: PathBuf,
}

impl RetentionSettings {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            old_after: chrono::Duration::days(self.old_after_days),
            read_after: chrono::Duration::days(self.read_after_days),
            per_user_cap: self.per_user_cap,
            read_grace: Duration::from_secs(self.read_grace_seconds),
            sweep_concurrency: self.sweep_concurrency.max(1),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_seconds.map(Duration::from_secs)
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either 'local' or 'production'.",
                other
            )),
        }
    }
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name,
            ssl_mode(self.require_ssl)
        )
    }
}

fn ssl_mode(require_ssl: bool) -> &'static str {
    match require_ssl {
        true => "require",
        false => "prefer",
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT");

    let mut settings = config::Config::default();
    settings.merge(config::File::from(configuration_directory.join("base")).required(true))?;
    settings.merge(
        config::File::from(configuration_directory.join(environment.as_str())).required(true),
    )?;
    settings.merge(config::Environment::with_prefix("app").separator("__"))?;
    settings.try_into()
}
