//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services validate requests against the registry and hand long-running
//! work to the execution driver.

pub mod job;

// Re-export for convenience
pub use job as job_service;
