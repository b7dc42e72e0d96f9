//! Liveness Probe Port
//!
//! Anything the periodic health probe can poll.

use async_trait::async_trait;

/// Target of the periodic health probe.
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    /// Run one probe and report whether the target is live.
    async fn probe(&self) -> bool;
}
