//! Domain Layer
//!
//! Connection state, backoff policy and the ports the manager drives.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::ConnectionState;
pub use services::BackoffPolicy;
pub use value_objects::{DatastoreKind, DatastoreSettings, DatastoreUrl};
