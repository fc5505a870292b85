use anyhow::anyhow;
use async_trait::async_trait;
use ledger_notify::configuration::get_configuration;
use ledger_notify::domain::{NewPushSubscription, PushSubscription};
use ledger_notify::push::PushTransport;
use ledger_notify::startup::Application;
use ledger_notify::store::{InMemoryStore, PushSubscriptionStore};
use ledger_notify::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".into();
    let subscriber_name = "test".into();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

/// Records payloads instead of talking to a push service. Endpoints marked expired fail
/// the way a push service reports a revoked subscription.
#[derive(Default)]
pub struct RecordingTransport {
    pub expired: Mutex<HashSet<String>>,
    pub delivered: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTransport {
    pub fn expire(&self, endpoint: &str) {
        self.expired.lock().unwrap().insert(endpoint.to_string());
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), anyhow::Error> {
        if self.expired.lock().unwrap().contains(&subscription.endpoint) {
            return Err(anyhow!("410 Gone: the subscription has expired"));
        }
        let payload = serde_json::from_slice(payload)?;
        self.delivered
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload));
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub transport: Arc<RecordingTransport>,
    pub admin_username: String,
    pub admin_password: String,
    pub vapid_public_key: String,
}

impl TestApp {
    pub async fn post_push(&self, body: &serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/push", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_push_subscription(&self, body: &serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/push_subscriptions", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_cleanup(&self) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/notifications/cleanup", &self.address))
            .basic_auth(&self.admin_username, Some(&self.admin_password))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Registers a device directly in the store and returns the owning user.
    pub async fn register_device(&self, endpoint: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.store
            .upsert_push_subscription(NewPushSubscription {
                user_id,
                endpoint: endpoint.into(),
                p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".into(),
                auth: "tBHItJI5svbpez7KI4CCXg".into(),
                user_agent: None,
            })
            .await
            .unwrap();
        user_id
    }
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.application.port = None;
        c.retention.sweep_interval_seconds = None;
        c
    };

    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());

    let Application { server, port } =
        Application::build(&configuration, store.clone(), transport.clone())
            .await
            .unwrap();
    let _ = tokio::spawn(server.launch());
    TestApp {
        address: format!("http://127.0.0.1:{}", port.get().await.unwrap()),
        store,
        transport,
        admin_username: configuration.application.admin_username.clone(),
        // base.yaml stores the argon2 hash of this password.
        admin_password: "change-me".into(),
        vapid_public_key: configuration.push.vapid_public_key.clone(),
    }
}
