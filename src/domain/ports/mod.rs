mod datastore;
mod liveness_probe;

pub use datastore::{Datastore, DatastoreError};
pub use liveness_probe::LivenessProbe;
