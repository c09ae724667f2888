use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::model::{MarketSnapshot, RefreshState, RefreshStatus};
use crate::pipeline::AggregationPipeline;

/// Holds the latest published snapshot. Builds happen off to the
/// side; `publish` replaces the whole snapshot in one swap, so a
/// reader never sees a partially populated instrument list.
pub struct SnapshotStore {
    snapshot: RwLock<Option<Arc<MarketSnapshot>>>,
    refreshing: AtomicBool,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    pub async fn latest(&self) -> Option<Arc<MarketSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn publish(&self, snapshot: MarketSnapshot) {
        let mut guard = self.snapshot.write().await;
        *guard = Some(Arc::new(snapshot));
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    fn set_refreshing(&self, value: bool) {
        self.refreshing.store(value, Ordering::SeqCst);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

struct CoordinatorInner {
    state: RefreshState,
    last_error: Option<String>,
    last_success: Option<DateTime<Utc>>,
}

/// Owns refresh state and enforces single-flight execution: manual
/// triggers and periodic ticks funnel through one check-and-set
/// critical section, so two builds can never overlap.
pub struct RefreshCoordinator {
    pipeline: AggregationPipeline,
    store: Arc<SnapshotStore>,
    inner: Mutex<CoordinatorInner>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    pub fn new(pipeline: AggregationPipeline, store: Arc<SnapshotStore>) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            store,
            inner: Mutex::new(CoordinatorInner {
                state: RefreshState::Idle,
                last_error: None,
                last_success: None,
            }),
            periodic: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub async fn status(&self) -> RefreshStatus {
        let inner = self.inner.lock().await;
        RefreshStatus {
            state: inner.state,
            last_error: inner.last_error.clone(),
            last_success: inner.last_success,
        }
    }

    /// Starts a refresh unless one is already running. Returns whether
    /// a build was started; a `false` return is the documented no-op,
    /// not an error — the in-flight build's result will arrive anyway.
    pub async fn request_refresh(self: &Arc<Self>, limit: usize) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == RefreshState::Running {
                return false;
            }
            inner.state = RefreshState::Running;
        }
        self.store.set_refreshing(true);

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run_build(limit).await;
        });

        true
    }

    async fn run_build(&self, limit: usize) {
        match self.pipeline.build_snapshot(limit).await {
            Ok(snapshot) => {
                let count = snapshot.instruments.len();
                self.store.publish(snapshot).await;
                self.store.set_refreshing(false);

                let mut inner = self.inner.lock().await;
                inner.last_error = None;
                inner.last_success = Some(Utc::now());
                inner.state = RefreshState::Idle;
                info!("refresh complete: {count} instruments published");
            }
            Err(e) => {
                // Previous snapshot stays untouched.
                self.store.set_refreshing(false);

                let mut inner = self.inner.lock().await;
                inner.last_error = Some(e.to_string());
                inner.state = RefreshState::Idle;
                warn!("refresh failed: {e}");
            }
        }
    }

    /// Begins the recurring refresh timer. A tick that fires while a
    /// build is running is dropped, not queued.
    pub async fn start_periodic(self: &Arc<Self>, interval: Duration, limit: usize) {
        let mut guard = self.periodic.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        info!(
            "periodic refresh started: every {}s, limit {limit}",
            interval.as_secs()
        );

        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                sleep(interval).await;
                if !coordinator.request_refresh(limit).await {
                    debug!("periodic tick dropped: refresh already running");
                }
            }
        });
        *guard = Some(handle);
    }

    /// Cancels future ticks only. Builds are spawned as detached
    /// tasks, so an in-flight build runs to completion and still
    /// publishes its result.
    pub async fn stop_periodic(&self) {
        let mut guard = self.periodic.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
            info!("periodic refresh stopped");
        }
    }
}
