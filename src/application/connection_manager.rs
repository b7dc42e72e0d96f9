//! Connection Manager - Datastore connection lifecycle
//!
//! Establishes, monitors, recovers and finally releases the pooled datastore
//! connection. Datastore errors never escape this boundary as faults; they
//! become state transitions plus log lines.
//!
//! Retry budget: `reconnect_attempts` is the number of the last failed attempt
//! on the backoff ladder since the link was last known good. A recovery
//! sequence launched by the probe resumes the ladder at the next rung, so
//! initial and probe-triggered sequences share one budget of
//! `max_attempts`. Only an observed success resets it.

use crate::domain::entities::ConnectionState;
use crate::domain::ports::{Datastore, DatastoreError, LivenessProbe};
use crate::domain::services::BackoffPolicy;
use crate::infrastructure::{
    HealthProbe, HealthProbeConfig, LeaseGuard, ShutdownController, ShutdownSignal,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Retry ladder for connect sequences
    pub backoff: BackoffPolicy,
    /// Interval of the periodic liveness probe
    pub health_check_interval: Duration,
    /// How long shutdown waits for outstanding leases
    pub drain_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            health_check_interval: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Pool closed cleanly
    Clean,
    /// Closing the pool failed
    Failed,
}

impl ShutdownOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Failed => 1,
        }
    }
}

struct Inner<D> {
    datastore: D,
    config: ManagerConfig,
    state: RwLock<ConnectionState>,
    reconnecting: Arc<AtomicBool>,
    shutdown: ShutdownController,
    probe: HealthProbe,
    /// Background connect sequence, if one was spawned
    recovery: Mutex<Option<JoinHandle<()>>>,
    outcome: OnceCell<ShutdownOutcome>,
}

/// Owner of the pooled datastore connection.
///
/// Cheap to clone; all clones share the same state.
pub struct ConnectionManager<D: Datastore> {
    inner: Arc<Inner<D>>,
}

impl<D: Datastore> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Clears the reconnect flag when a sequence ends, however it ends.
struct ReconnectGuard(Arc<AtomicBool>);

impl Drop for ReconnectGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<D: Datastore> ConnectionManager<D> {
    /// Create a manager around an unconnected datastore.
    pub fn new(datastore: D, config: ManagerConfig) -> Self {
        let probe = HealthProbe::new(HealthProbeConfig {
            interval: config.health_check_interval,
        });

        Self {
            inner: Arc::new(Inner {
                datastore,
                config,
                state: RwLock::new(ConnectionState::default()),
                reconnecting: Arc::new(AtomicBool::new(false)),
                shutdown: ShutdownController::new(),
                probe,
                recovery: Mutex::new(None),
                outcome: OnceCell::new(),
            }),
        }
    }

    /// The underlying adapter.
    pub fn datastore(&self) -> &D {
        &self.inner.datastore
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Whether the last connect or probe succeeded. Never blocks on I/O.
    pub fn is_connected(&self) -> bool {
        self.inner.state.read().connected
    }

    /// Whether a connect sequence is running.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::SeqCst)
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_shutdown()
    }

    /// Shutdown coordinator shared with the serving loop.
    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.inner.shutdown
    }

    /// Boot the manager: spawn the initial connect sequence and start the
    /// periodic probe. Returns immediately; an unreachable datastore leaves
    /// the manager running degraded.
    pub fn start(&self) {
        tracing::info!(
            "starting {} connection manager (probe every {:?})",
            self.inner.datastore.kind(),
            self.inner.config.health_check_interval
        );
        self.start_health_probe();
        if !self.spawn_connect(1) {
            tracing::debug!("connect sequence already running");
        }
    }

    /// Start the periodic liveness probe.
    pub fn start_health_probe(&self) {
        if self.is_shutting_down() {
            return;
        }
        let target = ProbeTarget(Arc::downgrade(&self.inner));
        self.inner
            .probe
            .start(target, self.inner.shutdown.subscribe());
    }

    /// Whether the periodic probe is running.
    pub fn is_probe_running(&self) -> bool {
        self.inner.probe.is_running()
    }

    fn try_begin_reconnect(&self) -> Option<ReconnectGuard> {
        self.inner
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ReconnectGuard(self.inner.reconnecting.clone()))
    }

    /// Mark the link up unless shutdown has started.
    ///
    /// Checked under the state lock: `close_pool` flags shutdown before it
    /// takes the same lock to mark the link down, so I/O finishing late can
    /// never leave the state connected after close. `None` means refused.
    fn mark_connected_if_open(&self) -> Option<bool> {
        let mut state = self.inner.state.write();
        if self.is_shutting_down() {
            return None;
        }
        Some(state.mark_connected())
    }

    /// Open the pooled connection, retrying with exponential backoff.
    ///
    /// `attempt` is the rung of the ladder to start on, clamped into
    /// `1..=max_attempts`. Returns the last error once the attempt numbered
    /// `max_attempts` fails. Only one sequence may run at a time.
    pub async fn connect_with_retry(&self, attempt: u32) -> Result<(), DatastoreError> {
        let guard = self
            .try_begin_reconnect()
            .ok_or(DatastoreError::ReconnectInProgress)?;
        self.run_connect_sequence(attempt, guard).await
    }

    async fn run_connect_sequence(
        &self,
        attempt: u32,
        _guard: ReconnectGuard,
    ) -> Result<(), DatastoreError> {
        let policy = self.inner.config.backoff;
        let mut shutdown = self.inner.shutdown.subscribe();
        let mut attempt = policy.clamp_attempt(attempt);

        loop {
            if self.is_shutting_down() {
                return Err(DatastoreError::ShuttingDown);
            }

            match self.inner.datastore.connect().await {
                Ok(()) => {
                    if self.mark_connected_if_open().is_none() {
                        tracing::debug!("connect finished after shutdown began, discarding");
                        return Err(DatastoreError::ShuttingDown);
                    }
                    tracing::info!(
                        "{} datastore connected (attempt {})",
                        self.inner.datastore.kind(),
                        attempt
                    );
                    return Ok(());
                }
                Err(e) => {
                    self.inner
                        .state
                        .write()
                        .record_failed_attempt(attempt, policy.max_attempts);

                    if !policy.should_retry(attempt) {
                        tracing::warn!(
                            "datastore unreachable after {} attempts, running degraded: {}",
                            attempt,
                            e
                        );
                        return Err(e);
                    }

                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "connect attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => {
                            tracing::debug!("connect sequence abandoned for shutdown");
                            return Err(DatastoreError::ShuttingDown);
                        }
                    }

                    attempt += 1;
                }
            }
        }
    }

    /// Launch a connect sequence in the background.
    ///
    /// Returns false without spawning when a sequence is already running or
    /// shutdown has started.
    fn spawn_connect(&self, attempt: u32) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        // Taken before spawning so only the live sequence owns the slot.
        let Some(guard) = self.try_begin_reconnect() else {
            return false;
        };

        let manager = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = manager.run_connect_sequence(attempt, guard).await {
                tracing::debug!("connect sequence ended without a connection: {}", e);
            }
        });

        *self.inner.recovery.lock() = Some(task);
        true
    }

    /// Run a liveness probe.
    ///
    /// Success after a disconnect marks the link recovered and resets the
    /// retry budget. Failure marks it disconnected and, while budget remains
    /// and no sequence is running, launches a recovery sequence in the
    /// background.
    pub async fn health_check(&self) -> bool {
        if self.is_shutting_down() {
            return false;
        }

        match self.inner.datastore.ping().await {
            Ok(()) => match self.mark_connected_if_open() {
                Some(true) => {
                    tracing::info!("datastore link recovered");
                    true
                }
                Some(false) => true,
                None => false,
            },
            Err(e) => {
                let state = {
                    let mut state = self.inner.state.write();
                    state.mark_disconnected();
                    *state
                };
                tracing::error!("datastore health check failed: {}", e);

                let ceiling = self.inner.config.backoff.max_attempts;
                if !state.has_retry_budget(ceiling) {
                    tracing::warn!(
                        "retry budget exhausted ({} attempts), not launching recovery",
                        state.reconnect_attempts
                    );
                } else if self.spawn_connect(state.reconnect_attempts + 1) {
                    tracing::info!(
                        "launched recovery at attempt {}",
                        state.reconnect_attempts + 1
                    );
                } else {
                    tracing::debug!("recovery not launched: sequence running or shutting down");
                }
                false
            }
        }
    }

    /// Borrow the datastore to issue queries.
    ///
    /// Refused while disconnected or once shutdown has started. Shutdown
    /// waits for outstanding leases before closing the pool.
    pub fn acquire(&self) -> Result<DatastoreLease<'_, D>, DatastoreError> {
        if self.is_shutting_down() {
            return Err(DatastoreError::ShuttingDown);
        }
        if !self.is_connected() {
            return Err(DatastoreError::Unavailable);
        }
        Ok(DatastoreLease {
            datastore: &self.inner.datastore,
            _guard: self.inner.shutdown.lease_guard(),
        })
    }

    /// Stop background work, drain leases and close the pool.
    ///
    /// Idempotent: concurrent or repeated calls wait for and return the
    /// outcome of the first, and the pool is closed exactly once.
    pub async fn graceful_shutdown(&self, signal: ShutdownSignal) -> ShutdownOutcome {
        *self
            .inner
            .outcome
            .get_or_init(|| self.close_pool(signal))
            .await
    }

    async fn close_pool(&self, signal: ShutdownSignal) -> ShutdownOutcome {
        tracing::info!("{} received, closing datastore connection", signal);

        self.inner.shutdown.shutdown();
        if self.inner.probe.stop() {
            tracing::debug!("health probe cancelled");
        }
        if let Some(task) = self.inner.recovery.lock().take() {
            task.abort();
        }

        if !self
            .inner
            .shutdown
            .wait_for_drain(self.inner.config.drain_timeout)
            .await
        {
            tracing::warn!(
                "closing datastore with {} leases outstanding",
                self.inner.shutdown.active_leases()
            );
        }

        let outcome = match self.inner.datastore.close().await {
            Ok(()) => {
                tracing::info!("datastore connection closed");
                ShutdownOutcome::Clean
            }
            Err(e) => {
                tracing::error!("error closing datastore connection: {}", e);
                ShutdownOutcome::Failed
            }
        };

        self.inner.state.write().mark_disconnected();
        outcome
    }
}

/// What the periodic probe holds: a weak handle, so dropping the last
/// manager drops the probe and aborts its task.
struct ProbeTarget<D>(Weak<Inner<D>>);

#[async_trait]
impl<D: Datastore> LivenessProbe for ProbeTarget<D> {
    async fn probe(&self) -> bool {
        match self.0.upgrade() {
            Some(inner) => ConnectionManager { inner }.health_check().await,
            None => false,
        }
    }
}

/// Borrowed access to the datastore, counted for shutdown drain.
pub struct DatastoreLease<'a, D> {
    datastore: &'a D,
    _guard: LeaseGuard,
}

impl<D> Deref for DatastoreLease<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.datastore
    }
}
