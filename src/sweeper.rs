use crate::preferences::{PreferencesError, PreferencesFile};
use crate::retention::{CleanupReport, RetentionEngine};
use anyhow::Context;
use chrono::Utc;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

const MAX_CHECK_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Runs a full cleanup in the background whenever the last recorded one is older than
/// `every`. The last run is kept in the preferences file so restarts don't re-sweep.
pub struct RetentionSweeper {
    engine: RetentionEngine,
    preferences: Arc<PreferencesFile>,
    every: Duration,
}

impl RetentionSweeper {
    pub fn new(engine: RetentionEngine, preferences: PreferencesFile, every: Duration) -> Self {
        Self {
            engine,
            preferences: Arc::new(preferences),
            every,
        }
    }
}

#[rocket::async_trait]
impl Fairing for RetentionSweeper {
    fn info(&self) -> Info {
        Info {
            name: "Retention Sweeper",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let engine = self.engine.clone();
        let preferences = Arc::clone(&self.preferences);
        let every = self.every;
        let shutdown = rocket.shutdown();
        tokio::spawn(async move {
            tokio::pin!(shutdown);
            let check_period = every.min(MAX_CHECK_PERIOD).max(Duration::from_secs(1));
            let mut ticker = tokio::time::interval(check_period);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {
                        sweep_if_due(&engine, &preferences, every).await;
                    }
                }
            }
            tracing::info!("Retention sweeper stopped");
        });
    }
}

/// Runs the full cleanup if it is due. A successful run is recorded; a failed one is retried
/// at the next check.
pub async fn sweep_if_due(
    engine: &RetentionEngine,
    preferences: &PreferencesFile,
    every: Duration,
) -> Option<CleanupReport> {
    let now = Utc::now();
    let every = chrono::Duration::from_std(every).unwrap_or_else(|_| chrono::Duration::days(1));
    let due = match on_blocking_pool(preferences, |file| file.load()).await {
        Ok(preferences) => preferences.cleanup_due(now, every),
        Err(e) => {
            tracing::warn!(error.cause_chain = ?e, "Could not read preferences, sweeping anyway");
            true
        }
    };
    if !due {
        return None;
    }

    let report = engine.full_cleanup().await;
    if report.is_success() {
        if let Err(e) = on_blocking_pool(preferences, move |file| file.record_cleanup(now)).await {
            tracing::warn!(error.cause_chain = ?e, "Failed to record the cleanup time");
        }
    }
    Some(report)
}

/// Runs a file operation on the blocking thread pool.
async fn on_blocking_pool<T, F>(preferences: &PreferencesFile, op: F) -> Result<T, anyhow::Error>
where
    F: FnOnce(&PreferencesFile) -> Result<T, PreferencesError> + Send + 'static,
    T: Send + 'static,
{
    let file = preferences.clone();
    let result = tokio::task::spawn_blocking(move || op(&file))
        .await
        .context("The preferences task failed.")?;
    Ok(result?)
}
