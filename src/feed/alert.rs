use crate::domain::Notification;

/// Raises a local, OS-level alert for a freshly delivered notification.
pub trait LocalAlert: Send + Sync {
    fn permission_granted(&self) -> bool;

    fn show(&self, notification: &Notification);
}

/// Reports alerts through the log instead of a desktop notification centre.
pub struct TracingAlert {
    granted: bool,
}

impl TracingAlert {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl LocalAlert for TracingAlert {
    fn permission_granted(&self) -> bool {
        self.granted
    }

    fn show(&self, notification: &Notification) {
        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            title = %notification.title,
            "New notification"
        );
    }
}
