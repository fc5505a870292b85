use crate::configuration::PushSettings;
use crate::domain::PushSubscription;
use crate::push::PushTransport;
use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};

/// Sends Web Push messages, signed with the server's VAPID key pair.
pub struct WebPushTransport {
    client: WebPushClient,
    private_key: Secret<String>,
    subject: String,
    ttl: u32,
}

impl WebPushTransport {
    pub fn new(settings: &PushSettings) -> Result<Self, anyhow::Error> {
        let client = WebPushClient::new().context("Failed to build the web push client.")?;
        Ok(Self {
            client,
            private_key: settings.vapid_private_key.clone(),
            subject: settings.vapid_subject.clone(),
            ttl: settings.ttl_seconds,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), anyhow::Error> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let mut signature = VapidSignatureBuilder::from_base64(
            self.private_key.expose_secret(),
            base64::URL_SAFE_NO_PAD,
            &info,
        )
        .context("The VAPID private key is not valid.")?;
        signature.add_claim("sub", self.subject.as_str());
        let signature = signature
            .build()
            .context("Failed to sign the push message.")?;

        let mut message = WebPushMessageBuilder::new(&info)
            .context("The push subscription is not valid.")?;
        message.set_payload(ContentEncoding::Aes128Gcm, payload);
        message.set_ttl(self.ttl);
        message.set_vapid_signature(signature);
        let message = message
            .build()
            .context("Failed to encrypt the push message.")?;

        self.client
            .send(message)
            .await
            .with_context(|| format!("Push service rejected delivery to {}", subscription.endpoint))?;
        Ok(())
    }
}
