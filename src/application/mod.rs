//! Application Layer
//!
//! Use cases that drive the domain ports.

pub mod connection_manager;

#[cfg(test)]
pub(crate) mod mock_datastore;

pub use connection_manager::{ConnectionManager, DatastoreLease, ManagerConfig, ShutdownOutcome};
