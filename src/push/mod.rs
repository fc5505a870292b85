mod bridge;
mod web_push_client;

use crate::domain::PushSubscription;
use async_trait::async_trait;
pub use bridge::*;
pub use web_push_client::WebPushTransport;

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Delivers one encrypted payload to one device.
    async fn send(&self, subscription: &PushSubscription, payload: &[u8])
        -> Result<(), anyhow::Error>;
}
