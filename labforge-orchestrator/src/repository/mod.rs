//! Repository Module
//!
//! Job storage for the orchestrator: the in-memory registry and the
//! file-based snapshot store backing it.

pub mod job;
pub mod snapshot;

pub use job::{JobRegistry, RegistryError};
pub use snapshot::SnapshotStore;
