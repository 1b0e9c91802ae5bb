// ── Sync loop ──
//
// Binds to the first device of a class, keeps a cached copy of one of its
// services fresh by polling, and forwards toggles. The poll timer is a
// spawned task owned through a `CancellationToken`; shutdown (explicit or
// on drop) cancels it along with every read still in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use aquila_api::{Device, DeviceQuery, PushNotification, ServicePatch, ServiceState};

use crate::channel::ServiceChannel;
use crate::config::{MergePolicy, SyncConfig};
use crate::directory::DeviceDirectory;
use crate::error::CoreError;

/// State assumed for the service before the first successful read.
/// A toggle issued that early therefore requests "off".
const ASSUMED_INITIAL_STATE: bool = true;

type PushReceiver = broadcast::Receiver<Arc<PushNotification>>;

// ── Observable state ─────────────────────────────────────────────────

/// Lifecycle phase of a sync binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncPhase {
    Uninitialized,
    Discovering,
    /// Bound with no read outstanding.
    Bound,
    /// At least one read is in flight.
    Refreshing,
    /// The last completed operation failed; the timer keeps ticking.
    Failed,
    /// Discovery found nothing or failed. Terminal.
    Unbound,
    /// Shut down. Terminal.
    Stopped,
}

/// What the front end renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub device: Option<Device>,
    pub last_state: Option<ServiceState>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Uninitialized,
            device: None,
            last_state: None,
            last_error: None,
            updated_at: None,
        }
    }
}

impl SyncSnapshot {
    /// Cached on/off value, if a read or write has succeeded.
    pub fn is_on(&self) -> Option<bool> {
        self.last_state.as_ref().map(|s| s.is_on)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum SyncOp {
    Read,
    Write,
}

// ── SyncLoop ─────────────────────────────────────────────────────────

/// One device binding with its refresh timer.
///
/// Not `Clone`: the loop is owned by the view that shows it, and dropping
/// it tears the binding down.
pub struct SyncLoop<D, S> {
    inner: Arc<SyncInner<D, S>>,
}

struct SyncInner<D, S> {
    directory: Arc<D>,
    channel: Arc<S>,
    config: SyncConfig,
    snapshot: watch::Sender<SyncSnapshot>,
    /// Sequence number of the most recently issued operation.
    issued: AtomicU64,
    /// Highest sequence number applied to the snapshot.
    applied: AtomicU64,
    /// Reads issued but not yet completed.
    reads_in_flight: AtomicUsize,
    initialized: AtomicBool,
    torn_down: AtomicBool,
    cancel: CancellationToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
    push_rx: Mutex<Option<PushReceiver>>,
}

impl<D, S> std::fmt::Debug for SyncLoop<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLoop")
            .field("config", &self.inner.config)
            .field("phase", &self.inner.snapshot.borrow().phase)
            .finish_non_exhaustive()
    }
}

impl<D, S> SyncLoop<D, S>
where
    D: DeviceDirectory,
    S: ServiceChannel,
{
    /// Create an unbound loop. Nothing touches the network until
    /// [`init`](Self::init).
    pub fn new(directory: Arc<D>, channel: Arc<S>, config: SyncConfig) -> Self {
        let (snapshot, _) = watch::channel(SyncSnapshot::default());
        Self {
            inner: Arc::new(SyncInner {
                directory,
                channel,
                config,
                snapshot,
                issued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                reads_in_flight: AtomicUsize::new(0),
                initialized: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                poll_handle: Mutex::new(None),
                push_rx: Mutex::new(None),
            }),
        }
    }

    /// Attach a push notification stream. Only consulted when
    /// `push_refresh` is enabled; must be called before [`init`](Self::init).
    #[must_use]
    pub fn with_push(self, receiver: PushReceiver) -> Self {
        *lock(&self.inner.push_rx) = Some(receiver);
        self
    }

    /// Discover devices and bind to the first one.
    ///
    /// On success an immediate read is issued and the refresh timer starts.
    /// With no devices, or when the listing fails, the loop becomes
    /// [`SyncPhase::Unbound`] for good and no timer is ever started.
    pub async fn init(&self) -> Result<Device, CoreError> {
        let inner = &self.inner;
        if inner.torn_down.load(Ordering::SeqCst) {
            return Err(CoreError::TornDown);
        }
        if inner.initialized.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Internal("sync loop already initialized".into()));
        }

        let class = inner.config.device_class.clone();
        inner.snapshot.send_modify(|snap| snap.phase = SyncPhase::Discovering);
        info!(class = %class, "discovering devices");

        let query = DeviceQuery::class(class.clone());
        let listed = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return Err(CoreError::TornDown),
            listed = inner.directory.all(&query) => listed,
        };

        let device = match listed {
            Ok(devices) => {
                debug!(count = devices.len(), "device listing received");
                match devices.into_iter().next() {
                    Some(device) => device,
                    None => {
                        let err = CoreError::NoDevice { class };
                        warn!(error = %err, "nothing to bind");
                        inner.unbind(&err);
                        return Err(err);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "device discovery failed");
                inner.unbind(&e);
                return Err(e);
            }
        };

        if inner.cancel.is_cancelled() {
            return Err(CoreError::TornDown);
        }

        info!(device = %device.id, service = %inner.config.service, "bound device");
        inner.snapshot.send_modify(|snap| {
            snap.phase = SyncPhase::Bound;
            snap.device = Some(device.clone());
            snap.last_error = None;
            snap.updated_at = Some(Utc::now());
        });

        let push_rx = if inner.config.push_refresh {
            lock(&inner.push_rx).take()
        } else {
            None
        };
        let handle = tokio::spawn(poll_task(
            Arc::clone(inner),
            Arc::from(device.id.as_str()),
            push_rx,
        ));
        *lock(&inner.poll_handle) = Some(handle);

        Ok(device)
    }

    /// Read the bound service now, outside the timer.
    pub async fn refresh(&self) -> Result<ServiceState, CoreError> {
        let device_id = self.bound_device_id()?;
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(CoreError::TornDown),
            result = self.inner.read(&device_id) => result,
        }
    }

    /// Flip the cached on/off value on the hub.
    ///
    /// Sends `{isOn: !current}` and adopts whatever state the hub answers
    /// with. The timer keeps its schedule.
    pub async fn toggle(&self) -> Result<ServiceState, CoreError> {
        let current = self
            .inner
            .snapshot
            .borrow()
            .is_on()
            .unwrap_or(ASSUMED_INITIAL_STATE);
        self.write(ServicePatch::is_on(!current)).await
    }

    /// Send an arbitrary partial update to the bound service.
    pub async fn write(&self, patch: ServicePatch) -> Result<ServiceState, CoreError> {
        let device_id = self.bound_device_id()?;
        let inner = &self.inner;

        let seq = inner.issue(SyncOp::Write);
        let result = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return Err(CoreError::TornDown),
            result = inner.channel.write(&device_id, &inner.config.service, &patch) => result,
        };
        inner.apply(seq, SyncOp::Write, &result);
        result
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Watch snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Whether the refresh timer is running.
    pub fn is_active(&self) -> bool {
        !self.inner.cancel.is_cancelled()
            && lock(&self.inner.poll_handle)
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and abandon in-flight calls. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn bound_device_id(&self) -> Result<String, CoreError> {
        if self.inner.torn_down.load(Ordering::SeqCst) {
            return Err(CoreError::TornDown);
        }
        self.inner
            .snapshot
            .borrow()
            .device
            .as_ref()
            .map(|d| d.id.clone())
            .ok_or(CoreError::NotBound)
    }
}

impl<D, S> Drop for SyncLoop<D, S> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl<D, S> SyncInner<D, S> {
    /// Take the next sequence number for an operation.
    fn issue(&self, op: SyncOp) -> u64 {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if op == SyncOp::Read {
            self.reads_in_flight.fetch_add(1, Ordering::SeqCst);
            self.snapshot.send_if_modified(|snap| {
                if matches!(snap.phase, SyncPhase::Bound | SyncPhase::Failed) {
                    snap.phase = SyncPhase::Refreshing;
                    true
                } else {
                    false
                }
            });
        }
        trace!(seq, op = %op, "operation issued");
        seq
    }

    /// Merge a completed operation into the snapshot. Returns whether it
    /// was applied.
    fn apply(&self, seq: u64, op: SyncOp, result: &Result<ServiceState, CoreError>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let policy = self.config.merge_policy;
        let reads_pending = self.reads_in_flight.load(Ordering::SeqCst) > 0;
        self.snapshot.send_if_modified(|snap| {
            let newest = self.applied.load(Ordering::SeqCst);
            if policy == MergePolicy::IssuanceOrder && seq < newest {
                debug!(seq, newest, op = %op, "discarding stale response");
                // The last outstanding read may be the stale one.
                if snap.phase == SyncPhase::Refreshing && !reads_pending {
                    snap.phase = if snap.last_error.is_some() {
                        SyncPhase::Failed
                    } else {
                        SyncPhase::Bound
                    };
                    return true;
                }
                return false;
            }
            self.applied.fetch_max(seq, Ordering::SeqCst);

            match result {
                Ok(state) => {
                    trace!(seq, op = %op, is_on = state.is_on, "state applied");
                    snap.last_state = Some(state.clone());
                    snap.last_error = None;
                    snap.phase = if reads_pending {
                        SyncPhase::Refreshing
                    } else {
                        SyncPhase::Bound
                    };
                }
                Err(e) => {
                    debug!(seq, op = %op, error = %e, "operation failed");
                    snap.last_error = Some(format!("communication error: {e}"));
                    snap.phase = SyncPhase::Failed;
                }
            }
            snap.updated_at = Some(Utc::now());
            true
        })
    }

    fn unbind(&self, err: &CoreError) {
        self.snapshot.send_modify(|snap| {
            snap.phase = SyncPhase::Unbound;
            snap.device = None;
            snap.last_error = Some(err.to_string());
            snap.updated_at = Some(Utc::now());
        });
    }

    fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(handle) = lock(&self.poll_handle).take() {
            handle.abort();
        }
        self.snapshot.send_modify(|snap| snap.phase = SyncPhase::Stopped);
        info!("sync loop stopped");
    }
}

impl<D, S: ServiceChannel> SyncInner<D, S> {
    async fn read(&self, device_id: &str) -> Result<ServiceState, CoreError> {
        let seq = self.issue(SyncOp::Read);
        let result = self.channel.read(device_id, &self.config.service).await;
        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.apply(seq, SyncOp::Read, &result);
        result
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Issues one read per tick, starting immediately. Reads run as separate
/// tasks so a slow hub never delays the next tick; all of them are
/// aborted when the loop is cancelled.
async fn poll_task<D, S>(
    inner: Arc<SyncInner<D, S>>,
    device_id: Arc<str>,
    mut push_rx: Option<PushReceiver>,
) where
    D: DeviceDirectory,
    S: ServiceChannel,
{
    let mut interval = tokio::time::interval(inner.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            _ = interval.tick() => {
                in_flight.spawn(read_task(Arc::clone(&inner), Arc::clone(&device_id)));
            }
            pushed = next_push(&mut push_rx) => {
                if pushed {
                    debug!("push notification, refreshing");
                    in_flight.spawn(read_task(Arc::clone(&inner), Arc::clone(&device_id)));
                } else {
                    debug!("push stream closed");
                    push_rx = None;
                }
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(error = %e, "refresh task panicked");
                    }
                }
            }
        }
    }

    in_flight.abort_all();
    debug!("poll task exiting");
}

async fn read_task<D, S: ServiceChannel>(inner: Arc<SyncInner<D, S>>, device_id: Arc<str>) {
    // Failures are recorded in the snapshot.
    let _ = inner.read(&device_id).await;
}

/// `true` for a notification (or a lagged burst), `false` once the stream
/// closes. Pends forever when no stream is attached.
async fn next_push(rx: &mut Option<PushReceiver>) -> bool {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };
    match receiver.recv().await {
        Ok(notification) => {
            trace!(channel = %notification.channel, event = ?notification.event, "push received");
            true
        }
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            debug!(skipped, "push receiver lagged");
            true
        }
        Err(broadcast::error::RecvError::Closed) => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
