//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod health_probe;
pub mod shutdown;

pub use health_probe::{HealthProbe, HealthProbeConfig};
pub use shutdown::{wait_for_signal, LeaseGuard, ShutdownController, ShutdownSignal};
