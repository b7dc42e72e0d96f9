//! Graceful Shutdown Handler
//!
//! Shutdown signalling and in-flight lease tracking for the datastore pool.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;

/// What asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// The serving loop returned on its own
    Exit,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Exit => write!(f, "exit"),
        }
    }
}

/// Shutdown coordinator.
///
/// Tracks leases on the pool and broadcasts shutdown to background tasks.
#[derive(Clone)]
pub struct ShutdownController {
    /// Whether shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Number of leases currently held
    active_leases: Arc<AtomicUsize>,
    /// Broadcast channel for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Notify when all leases are returned
    drain_complete: Arc<Notify>,
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            active_leases: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            drain_complete: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate shutdown.
    ///
    /// Returns true for the call that actually initiated it.
    pub fn shutdown(&self) -> bool {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
            true
        } else {
            false
        }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Get the number of leases currently held.
    pub fn active_leases(&self) -> usize {
        self.active_leases.load(Ordering::SeqCst)
    }

    fn lease_started(&self) {
        self.active_leases.fetch_add(1, Ordering::SeqCst);
    }

    fn lease_ended(&self) {
        let prev = self.active_leases.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 && self.is_shutdown() {
            self.drain_complete.notify_waiters();
        }
    }

    /// Wait for all leases to be returned (with timeout).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let notified = self.drain_complete.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.active_leases() == 0 {
            return true;
        }

        tokio::select! {
            _ = notified => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "drain timeout: {} leases still held",
                    self.active_leases()
                );
                false
            }
        }
    }

    /// Create a lease guard that auto-decrements on drop.
    pub fn lease_guard(&self) -> LeaseGuard {
        self.lease_started();
        LeaseGuard {
            controller: self.clone(),
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for an outstanding lease.
///
/// Automatically decrements the lease count when dropped.
pub struct LeaseGuard {
    controller: ShutdownController,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.controller.lease_ended();
    }
}

/// Wait for a termination signal.
///
/// Resolves to the first of SIGINT or SIGTERM. If a handler cannot be
/// installed that branch never resolves.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn wait_for_signal() -> ShutdownSignal {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C");
            ShutdownSignal::Interrupt
        }
        _ = terminate => {
            tracing::info!("received SIGTERM");
            ShutdownSignal::Terminate
        }
    }
}
