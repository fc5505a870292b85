//! Per-user view of the notification list, kept in step with the store.

mod alert;
mod session;

use crate::retention::RetentionEngine;
use crate::store::{NotificationStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use alert::{LocalAlert, TracingAlert};
pub use session::FeedSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Unattached,
    Loading,
    Attached,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Most notifications held in memory, and the size of a load.
    pub list_limit: usize,
    /// Per-user cap applied by the periodic maintenance.
    pub maintenance_cap: usize,
    pub maintenance_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            list_limit: 50,
            maintenance_cap: 50,
            maintenance_interval: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("No user is attached to the notification feed.")]
    Unattached,
    #[error("The notification feed session has stopped.")]
    SessionClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the feed session of whichever user is currently signed in.
pub struct FeedManager {
    store: Arc<dyn NotificationStore>,
    retention: RetentionEngine,
    alert: Arc<dyn LocalAlert>,
    settings: FeedSettings,
    session: Option<FeedSession>,
}

impl FeedManager {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        retention: RetentionEngine,
        alert: Arc<dyn LocalAlert>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            store,
            retention,
            alert,
            settings,
            session: None,
        }
    }

    /// Switches the feed to another user (or to none), tearing down the previous session
    /// before the next one starts.
    #[tracing::instrument(name = "Switching the notification feed user", skip(self))]
    pub async fn set_user(&mut self, user_id: Option<Uuid>) {
        if self.session.as_ref().map(FeedSession::user_id) == user_id {
            return;
        }
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        self.session = user_id.map(|user_id| {
            FeedSession::start(
                user_id,
                Arc::clone(&self.store),
                self.retention.clone(),
                Arc::clone(&self.alert),
                self.settings.clone(),
            )
        });
    }

    pub async fn detach(&mut self) {
        self.set_user(None).await
    }

    pub fn state(&self) -> FeedState {
        self.session
            .as_ref()
            .map_or(FeedState::Unattached, FeedSession::state)
    }

    pub fn session(&self) -> Result<&FeedSession, FeedError> {
        self.session.as_ref().ok_or(FeedError::Unattached)
    }
}
