//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP); outbound adapters are
//! driven by it (datastores).

pub mod inbound;
pub mod outbound;
