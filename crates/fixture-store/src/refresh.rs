use crate::{AssetCatalog, LoadStats, Result, StoreError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

const DEFAULT_REASON: &str = "interval";

/// Shortest accepted poll interval; config files express it in whole milliseconds.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What counts as a change worth a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// Rebuild only when a file appears that the catalog does not hold.
    /// Deleted files stay in the catalog until some later rebuild.
    #[default]
    Additions,
    /// Rebuild when the file names differ from the catalog keys in either direction.
    AnyDifference,
}

/// What the loop does when a tick fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshErrorPolicy {
    /// Stop the loop and hand the error to whoever joins it.
    Abort,
    /// Log, skip this tick, try again on the next one.
    #[default]
    LogAndRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    pub interval: Duration,
    pub trigger: RefreshTrigger,
    pub on_error: RefreshErrorPolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            trigger: RefreshTrigger::default(),
            on_error: RefreshErrorPolicy::default(),
        }
    }
}

impl RefreshConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        // settings carry the interval in whole milliseconds
        if self.interval < MIN_INTERVAL {
            return Err(StoreError::invalid_config(format!(
                "refresh interval must be at least {MIN_INTERVAL:?}, got {:?}",
                self.interval
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Unchanged,
    Rebuilt {
        added: Vec<String>,
        removed: Vec<String>,
        stats: LoadStats,
    },
}

impl RefreshOutcome {
    #[must_use]
    pub fn rebuilt(&self) -> bool {
        matches!(self, Self::Rebuilt { .. })
    }
}

/// Run a single refresh check: list the directory, compare it with the
/// catalog and rebuild everything if `trigger` says so.
pub fn refresh_once(catalog: &AssetCatalog, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
    let entries = catalog.list()?;
    let diff = catalog.diff_listing(&entries);
    let should_rebuild = match trigger {
        RefreshTrigger::Additions => diff.has_additions(),
        RefreshTrigger::AnyDifference => !diff.is_empty(),
    };
    if !should_rebuild {
        return Ok(RefreshOutcome::Unchanged);
    }

    debug!(
        "Directory changed (added: {:?}, removed: {:?})",
        diff.added, diff.removed
    );
    let stats = catalog.rebuild()?;
    info!("Catalog refreshed: {} files", stats.files);
    Ok(RefreshOutcome::Rebuilt {
        added: diff.added,
        removed: diff.removed,
        stats,
    })
}

#[derive(Debug, Clone)]
pub struct RefreshUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub reason: String,
    pub success: bool,
    pub outcome: Option<RefreshOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub running: bool,
    pub ticks: u64,
    pub rebuilds: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_rebuild: Option<SystemTime>,
}

impl RefreshStatus {
    fn initial() -> Self {
        Self {
            running: true,
            ticks: 0,
            rebuilds: 0,
            consecutive_failures: 0,
            last_error: None,
            last_rebuild: None,
        }
    }
}

enum RefreshCommand {
    Trigger { reason: String },
    Shutdown,
}

/// Handle to a background refresh loop.
///
/// The loop stops on [`shutdown`](Self::shutdown), when every handle is
/// dropped, or after a failed tick under [`RefreshErrorPolicy::Abort`].
#[derive(Clone)]
pub struct RefreshLoop {
    inner: Arc<RefreshLoopInner>,
}

struct RefreshLoopInner {
    command_tx: mpsc::Sender<RefreshCommand>,
    update_tx: broadcast::Sender<RefreshUpdate>,
    status_rx: watch::Receiver<RefreshStatus>,
    task: TokioMutex<Option<JoinHandle<Result<()>>>>,
}

impl RefreshLoop {
    /// Spawn the loop on the current tokio runtime.
    ///
    /// The first check happens one `interval` after start; the catalog is
    /// expected to be loaded already.
    pub fn start(catalog: Arc<AssetCatalog>, config: RefreshConfig) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(RefreshStatus::initial());
        let (update_tx, _) = broadcast::channel(32);

        info!(
            "Starting refresh loop for {} every {:?} ({:?}, {:?})",
            catalog.location().display(),
            config.interval,
            config.trigger,
            config.on_error
        );
        let task = tokio::spawn(run_refresh_loop(
            catalog,
            config,
            command_rx,
            update_tx.clone(),
            status_tx,
        ));

        Ok(Self {
            inner: Arc::new(RefreshLoopInner {
                command_tx,
                update_tx,
                status_rx,
                task: TokioMutex::new(Some(task)),
            }),
        })
    }

    /// Run a check now instead of waiting for the next tick.
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(RefreshCommand::Trigger {
                reason: reason.into(),
            })
            .await
            .map_err(|e| StoreError::Other(format!("failed to send trigger: {e}")))?;
        Ok(())
    }

    /// Ask the loop to stop. A check already in progress runs to completion.
    pub async fn shutdown(&self) {
        // the loop may already be gone after an abort
        let _ = self.inner.command_tx.send(RefreshCommand::Shutdown).await;
    }

    /// Wait for the loop to exit and return how it ended.
    pub async fn join(&self) -> Result<()> {
        let task = self.inner.task.lock().await.take();
        let Some(task) = task else {
            return Err(StoreError::Other("refresh loop already joined".to_string()));
        };
        task.await
            .map_err(|e| StoreError::Other(format!("join refresh loop: {e}")))?
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RefreshUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        self.inner.status_rx.borrow().clone()
    }

    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<RefreshStatus> {
        self.inner.status_rx.clone()
    }
}

async fn run_refresh_loop(
    catalog: Arc<AssetCatalog>,
    config: RefreshConfig,
    mut command_rx: mpsc::Receiver<RefreshCommand>,
    update_tx: broadcast::Sender<RefreshUpdate>,
    status_tx: watch::Sender<RefreshStatus>,
) -> Result<()> {
    let mut ticker = time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status = RefreshStatus::initial();

    loop {
        let reason = tokio::select! {
            _ = ticker.tick() => DEFAULT_REASON.to_string(),
            cmd = command_rx.recv() => match cmd {
                Some(RefreshCommand::Trigger { reason }) => reason,
                Some(RefreshCommand::Shutdown) | None => break,
            },
        };

        debug!("Refreshing catalog ({reason})");
        let start = Instant::now();
        let result = run_tick(catalog.clone(), config.trigger).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        status.ticks += 1;

        match result {
            Ok(outcome) => {
                status.consecutive_failures = 0;
                status.last_error = None;
                if outcome.rebuilt() {
                    status.rebuilds += 1;
                    status.last_rebuild = Some(SystemTime::now());
                }
                let _ = status_tx.send(status.clone());
                let _ = update_tx.send(RefreshUpdate {
                    completed_at: SystemTime::now(),
                    duration_ms,
                    reason,
                    success: true,
                    outcome: Some(outcome),
                    error: None,
                });
            }
            Err(err) => {
                let message = err.to_string();
                status.consecutive_failures += 1;
                status.last_error = Some(message.clone());
                let abort = config.on_error == RefreshErrorPolicy::Abort;
                if abort {
                    error!("Refresh failed, stopping loop: {message}");
                    status.running = false;
                } else {
                    warn!(
                        "Refresh failed ({} in a row), retrying next tick: {message}",
                        status.consecutive_failures
                    );
                }
                let _ = status_tx.send(status.clone());
                let _ = update_tx.send(RefreshUpdate {
                    completed_at: SystemTime::now(),
                    duration_ms,
                    reason,
                    success: false,
                    outcome: None,
                    error: Some(message.clone()),
                });
                if abort {
                    return Err(StoreError::Refresh(message));
                }
            }
        }
    }

    status.running = false;
    let _ = status_tx.send(status);
    info!("Refresh loop for {} stopped", catalog.location().display());
    Ok(())
}

async fn run_tick(catalog: Arc<AssetCatalog>, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
    tokio::task::spawn_blocking(move || refresh_once(&catalog, trigger))
        .await
        .map_err(|e| StoreError::Other(format!("join refresh task: {e}")))?
}
