//! Scriptable datastore double shared by unit tests.

use crate::domain::ports::{Datastore, DatastoreError};
use crate::domain::value_objects::DatastoreKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const FOREVER: u32 = u32::MAX;

pub(crate) struct MockDatastore {
    /// Upcoming connect failures; `FOREVER` never succeeds
    connect_failures: AtomicU32,
    ping_ok: AtomicBool,
    close_ok: AtomicBool,
    connect_calls: AtomicU32,
    ping_calls: AtomicU32,
    close_calls: AtomicU32,
    connect_times: Mutex<Vec<Instant>>,
    /// Simulated round-trip time of connect and ping
    latency: Mutex<Duration>,
}

impl MockDatastore {
    fn build(connect_failures: u32, ping_ok: bool) -> Self {
        Self {
            connect_failures: AtomicU32::new(connect_failures),
            ping_ok: AtomicBool::new(ping_ok),
            close_ok: AtomicBool::new(true),
            connect_calls: AtomicU32::new(0),
            ping_calls: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
            connect_times: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    pub fn reachable() -> Self {
        Self::build(0, true)
    }

    pub fn unreachable() -> Self {
        Self::build(FOREVER, false)
    }

    /// Fail the next `n` connects, then succeed.
    pub fn failing_connects(n: u32) -> Self {
        Self::build(n, true)
    }

    pub fn set_reachable(&self, reachable: bool) {
        let failures = if reachable { 0 } else { FOREVER };
        self.connect_failures.store(failures, Ordering::SeqCst);
        self.ping_ok.store(reachable, Ordering::SeqCst);
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    async fn round_trip(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn fail_close(&self) {
        self.close_ok.store(false, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> u32 {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connect_times.lock().clone()
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    fn kind(&self) -> DatastoreKind {
        DatastoreKind::Postgres
    }

    async fn connect(&self) -> Result<(), DatastoreError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connect_times.lock().push(Instant::now());
        self.round_trip().await;

        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        if remaining != FOREVER {
            self.connect_failures.fetch_sub(1, Ordering::SeqCst);
        }
        Err(DatastoreError::Connect("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        if self.ping_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatastoreError::Query("server closed the connection".to_string()))
        }
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.close_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatastoreError::Close("socket already torn down".to_string()))
        }
    }
}
