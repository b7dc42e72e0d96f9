//! Periodic Health Probe
//!
//! Polls a liveness target on a fixed interval until cancelled. Keeps idle
//! pooled sockets from silently timing out and drives self-healing.

use crate::domain::ports::LivenessProbe;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Health probe configuration.
#[derive(Debug, Clone)]
pub struct HealthProbeConfig {
    /// Interval between probes
    pub interval: Duration,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Cancellable scheduled probe task.
pub struct HealthProbe {
    config: HealthProbeConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthProbe {
    /// Create a new, not yet running, probe.
    pub fn new(config: HealthProbeConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    /// Probe interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Start the probe loop.
    ///
    /// The first probe fires one interval after start. The loop ends when
    /// `shutdown` fires or [`HealthProbe::stop`] is called. Starting an
    /// already running probe replaces the previous task.
    pub fn start<P: LivenessProbe>(&self, target: P, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let live = target.probe().await;
                        tracing::debug!("health probe: live={}", live);
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("health probe stopped by shutdown");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
        tracing::info!("health probe started, interval={:?}", interval);
    }

    /// Cancel the probe loop.
    ///
    /// Returns true if a running task was cancelled.
    pub fn stop(&self) -> bool {
        match self.handle.lock().take() {
            Some(task) => {
                let running = !task.is_finished();
                task.abort();
                running
            }
            None => false,
        }
    }

    /// Whether the probe loop is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for HealthProbe {
    fn drop(&mut self) {
        if let Some(task) = self.handle.get_mut().take() {
            task.abort();
        }
    }
}
