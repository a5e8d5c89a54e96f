//! Repository layer
//!
//! Seams between the execution driver and the state it reads and mutates.
//! The driver never owns job records or credentials; it reaches them through
//! these traits, implemented by the orchestrator's registry and credential
//! store (and by in-memory fakes in tests).

mod credentials;
mod jobs;

// Re-export traits
pub use credentials::{CredentialError, CredentialStore};
pub use jobs::JobRepository;

// Re-export implementations
pub use credentials::InMemoryCredentialStore;
