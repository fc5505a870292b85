use crate::domain::{NewNotification, Notification};
use crate::feed::{FeedError, FeedSettings, FeedState, LocalAlert};
use crate::retention::{DelayedDelete, RetentionEngine};
use crate::store::{InsertFeed, NotificationStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, FeedError>>;

enum Command {
    Load(Reply<()>),
    Add(NewNotification, Reply<Notification>),
    MarkRead(Uuid, Reply<()>),
    MarkAllRead(Reply<()>),
    Clear(Uuid, Reply<()>),
    ClearAll(Reply<()>),
    Snapshot(Reply<Vec<Notification>>),
    UnreadCount(Reply<usize>),
}

/// Handle to a running feed session for one user.
///
/// All state lives in a single task; the handle only sends it commands. Once the task has
/// stopped, neither commands nor realtime events can touch the list any more.
pub struct FeedSession {
    user_id: Uuid,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<FeedState>,
    revision: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl FeedSession {
    pub(crate) fn start(
        user_id: Uuid,
        store: Arc<dyn NotificationStore>,
        retention: RetentionEngine,
        alert: Arc<dyn LocalAlert>,
        settings: FeedSettings,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state) = watch::channel(FeedState::Loading);
        let (revision_tx, revision) = watch::channel(0);
        let inserts = store.subscribe_inserts(user_id);
        let task = SessionTask {
            user_id,
            store,
            retention,
            alert,
            settings,
            notifications: Vec::new(),
            pending_deletes: Vec::new(),
            state: state_tx,
            revision: revision_tx,
        };
        let task = tokio::spawn(task.run(receiver, inserts));
        Self {
            user_id,
            commands,
            state,
            revision,
            task,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Resolves once the initial load has finished and realtime events are flowing.
    pub async fn attached(&self) -> Result<(), FeedError> {
        let mut state = self.state.clone();
        loop {
            if *state.borrow_and_update() == FeedState::Attached {
                return Ok(());
            }
            state
                .changed()
                .await
                .map_err(|_| FeedError::SessionClosed)?;
        }
    }

    pub async fn load(&self) -> Result<(), FeedError> {
        self.request(Command::Load).await
    }

    pub async fn add(&self, notification: NewNotification) -> Result<Notification, FeedError> {
        self.request(|reply| Command::Add(notification, reply)).await
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> Result<(), FeedError> {
        self.request(|reply| Command::MarkRead(notification_id, reply))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<(), FeedError> {
        self.request(Command::MarkAllRead).await
    }

    pub async fn clear(&self, notification_id: Uuid) -> Result<(), FeedError> {
        self.request(|reply| Command::Clear(notification_id, reply))
            .await
    }

    pub async fn clear_all(&self) -> Result<(), FeedError> {
        self.request(Command::ClearAll).await
    }

    /// The in-memory list, newest first.
    pub async fn notifications(&self) -> Result<Vec<Notification>, FeedError> {
        self.request(Command::Snapshot).await
    }

    pub async fn unread_count(&self) -> Result<usize, FeedError> {
        self.request(Command::UnreadCount).await
    }

    /// Waits until the in-memory list satisfies `condition` and returns it.
    pub async fn wait_for<F>(&self, condition: F) -> Result<Vec<Notification>, FeedError>
    where
        F: Fn(&[Notification]) -> bool,
    {
        let mut revision = self.revision.clone();
        loop {
            revision.borrow_and_update();
            let list = self.notifications().await?;
            if condition(&list) {
                return Ok(list);
            }
            revision
                .changed()
                .await
                .map_err(|_| FeedError::SessionClosed)?;
        }
    }

    /// Stops the session: closes its realtime subscription and maintenance timer and waits
    /// for the task to exit. Scheduled deletes are left to run.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::error!(error = ?e, user_id = %self.user_id, "Feed session task failed");
        }
    }

    async fn request<T, F>(&self, command: F) -> Result<T, FeedError>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| FeedError::SessionClosed)?;
        response.await.map_err(|_| FeedError::SessionClosed)?
    }
}

struct SessionTask {
    user_id: Uuid,
    store: Arc<dyn NotificationStore>,
    retention: RetentionEngine,
    alert: Arc<dyn LocalAlert>,
    settings: FeedSettings,
    notifications: Vec<Notification>,
    pending_deletes: Vec<DelayedDelete>,
    state: watch::Sender<FeedState>,
    revision: watch::Sender<u64>,
}

impl SessionTask {
    #[tracing::instrument(name = "Notification feed session", skip_all, fields(user_id = %self.user_id))]
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut inserts: InsertFeed) {
        // Subscribed before loading, so inserts racing the load are de-duplicated rather than lost.
        let _ = self.load().await;
        self.maintain().await;
        let _ = self.state.send(FeedState::Attached);

        let period = self.settings.maintenance_interval.max(Duration::from_secs(1));
        let mut maintenance = tokio::time::interval_at(Instant::now() + period, period);
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut realtime_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                inserted = inserts.recv(), if realtime_open => match inserted {
                    Some(notification) => self.on_insert(notification),
                    None => {
                        tracing::warn!("Realtime feed closed; the list will only change on reload");
                        realtime_open = false;
                    }
                },
                _ = maintenance.tick() => self.maintain().await,
            }
        }

        for pending in self.pending_deletes.drain(..) {
            pending.detach();
        }
        let _ = self.state.send(FeedState::Unattached);
        tracing::info!("Feed session stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Load(reply) => {
                let _ = reply.send(self.load().await);
            }
            Command::Add(notification, reply) => {
                let _ = reply.send(self.add(notification).await);
            }
            Command::MarkRead(id, reply) => {
                let _ = reply.send(self.mark_read(id).await);
            }
            Command::MarkAllRead(reply) => {
                let _ = reply.send(self.mark_all_read().await);
            }
            Command::Clear(id, reply) => {
                let _ = reply.send(self.clear(id).await);
            }
            Command::ClearAll(reply) => {
                let _ = reply.send(self.clear_all().await);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.notifications.clone()));
            }
            Command::UnreadCount(reply) => {
                let unread = self.notifications.iter().filter(|n| !n.read).count();
                let _ = reply.send(Ok(unread));
            }
        }
    }

    fn changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    async fn load(&mut self) -> Result<(), FeedError> {
        let limit = self.settings.list_limit as i64;
        match self.store.recent_notifications(self.user_id, limit).await {
            Ok(notifications) => {
                self.notifications = notifications;
                self.changed();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Failed to load notifications");
                Err(e.into())
            }
        }
    }

    fn on_insert(&mut self, notification: Notification) {
        if self.notifications.iter().any(|n| n.id == notification.id) {
            tracing::debug!(notification_id = %notification.id, "Skipping an insert already in the list");
            return;
        }
        if self.alert.permission_granted() {
            self.alert.show(&notification);
        }
        self.notifications.insert(0, notification);
        self.notifications.truncate(self.settings.list_limit);
        self.changed();
    }

    async fn add(&mut self, notification: NewNotification) -> Result<Notification, FeedError> {
        let stored = self
            .store
            .insert_notification(notification)
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, "Failed to add a notification");
                e
            })?;
        if !self.notifications.iter().any(|n| n.id == stored.id) {
            self.notifications.insert(0, stored.clone());
            self.notifications.truncate(self.settings.list_limit);
            self.changed();
        }
        Ok(stored)
    }

    async fn mark_read(&mut self, id: Uuid) -> Result<(), FeedError> {
        let now = Utc::now();
        let updated = self
            .store
            .mark_read(self.user_id, id, now)
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, notification_id = %id, "Failed to mark a notification as read");
                e
            })?;
        if updated == 0 {
            tracing::warn!(notification_id = %id, "No notification of this user to mark as read");
            return Ok(());
        }
        for notification in self.notifications.iter_mut().filter(|n| n.id == id) {
            notification.read = true;
            notification.updated_at = now;
        }
        self.changed();
        self.pending_deletes.retain(|pending| !pending.is_finished());
        self.pending_deletes
            .push(self.retention.schedule_delayed_delete(id));
        Ok(())
    }

    async fn mark_all_read(&mut self) -> Result<(), FeedError> {
        let now = Utc::now();
        self.store
            .mark_all_read(self.user_id, now)
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, "Failed to mark all notifications as read");
                e
            })?;
        for notification in self.notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            notification.updated_at = now;
        }
        self.changed();
        Ok(())
    }

    async fn clear(&mut self, id: Uuid) -> Result<(), FeedError> {
        self.store
            .delete_for_user(self.user_id, &[id])
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, notification_id = %id, "Failed to clear a notification");
                e
            })?;
        self.notifications.retain(|n| n.id != id);
        self.changed();
        Ok(())
    }

    async fn clear_all(&mut self) -> Result<(), FeedError> {
        self.store
            .delete_all_for_user(self.user_id)
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, "Failed to clear notifications");
                e
            })?;
        self.notifications.clear();
        self.changed();
        Ok(())
    }

    async fn maintain(&self) {
        self.retention
            .cap_user(self.user_id, self.settings.maintenance_cap)
            .await;
    }
}
