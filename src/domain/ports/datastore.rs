//! Datastore Port
//!
//! Defines the interface to the pooled relational datastore.
//! Implementations may use PostgreSQL, SQLite, or a test double.

use crate::domain::value_objects::DatastoreKind;
use async_trait::async_trait;
use std::time::Duration;

/// Errors surfaced by datastore adapters and the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatastoreError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("query failed: {0}")]
    Query(String),
    #[error("close failed: {0}")]
    Close(String),
    #[error("datastore is closed")]
    Closed,
    #[error("datastore unavailable")]
    Unavailable,
    #[error("shutdown in progress")]
    ShuttingDown,
    #[error("reconnection already in progress")]
    ReconnectInProgress,
    #[error("invalid datastore configuration: {0}")]
    Config(String),
}

/// Pooled connection to a relational datastore.
///
/// This is an outbound port. The connection manager drives it through
/// connect, probe and close; application code borrows the concrete adapter
/// to issue queries.
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    /// Which datastore flavour this adapter talks to.
    fn kind(&self) -> DatastoreKind;

    /// Open (or re-open) the pooled connection.
    async fn connect(&self) -> Result<(), DatastoreError>;

    /// Trivial round-trip query used as a liveness probe.
    async fn ping(&self) -> Result<(), DatastoreError>;

    /// Release every pooled link.
    async fn close(&self) -> Result<(), DatastoreError>;
}
