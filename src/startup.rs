use crate::catchers::*;
use crate::configuration::Settings;
use crate::cors::Cors;
use crate::guards::AdminCredentials;
use crate::port_saver::{self, Port};
use crate::preferences::PreferencesFile;
use crate::push::{PushBridge, PushTransport};
use crate::retention::RetentionEngine;
use crate::routes::*;
use crate::store::{NotificationStore, PushSubscriptionStore};
use crate::sweeper::RetentionSweeper;
use rocket::{Config, Ignite, Rocket};
use std::sync::Arc;

pub struct Application {
    pub server: Rocket<Ignite>,
    pub port: Port,
}

impl Application {
    pub async fn build<S>(
        configuration: &Settings,
        store: Arc<S>,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self, rocket::Error>
    where
        S: NotificationStore + PushSubscriptionStore + 'static,
    {
        let (port_saver, port) = port_saver::create_pair();
        let notifications: Arc<dyn NotificationStore> = store.clone();
        let subscriptions: Arc<dyn PushSubscriptionStore> = store;
        let retention = RetentionEngine::new(notifications, configuration.retention.policy());
        let bridge = PushBridge::new(
            subscriptions.clone(),
            transport,
            configuration.push.icon.clone(),
        );
        let admin = AdminCredentials {
            username: configuration.application.admin_username.clone(),
            password_hash: configuration.application.admin_password_hash.clone(),
        };

        let mut rocket = rocket::custom(Config {
            address: configuration.application.host,
            port: configuration.application.port.unwrap_or(0),
            ..Config::debug_default()
        })
        .attach(port_saver)
        .attach(Cors)
        .manage(bridge)
        .manage(subscriptions)
        .manage(retention.clone())
        .manage(admin)
        .manage(VapidPublicKey(configuration.push.vapid_public_key.clone()))
        .mount(
            "/",
            routes![
                health,
                send_push,
                push_preflight,
                vapid_public_key,
                subscribe_device,
                unsubscribe_device,
                cleanup,
                stats
            ],
        )
        .register(
            "/",
            catchers![
                unprocessable_entity_to_bad_request,
                unauthorized_request_credentials
            ],
        );

        if let Some(every) = configuration.retention.sweep_interval() {
            let preferences = PreferencesFile::new(configuration.preferences.path.clone());
            rocket = rocket.attach(RetentionSweeper::new(retention, preferences, every));
        }

        let server = rocket.ignite().await?;
        Ok(Self { server, port })
    }
}
