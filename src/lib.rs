//! storefront-db Library
//!
//! Connection lifecycle management for the storefront's relational
//! datastore, from the first backoff-driven connect to graceful shutdown.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::ApiServer;
pub use adapters::outbound::{DatastoreAdapter, PostgresDatastore, SqliteDatastore};
pub use application::{ConnectionManager, DatastoreLease, ManagerConfig, ShutdownOutcome};
pub use config::load_config;
pub use domain::entities::ConnectionState;
pub use domain::ports::{Datastore, DatastoreError};
pub use domain::services::BackoffPolicy;
pub use infrastructure::{ShutdownController, ShutdownSignal};
