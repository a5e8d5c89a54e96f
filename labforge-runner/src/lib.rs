//! Labforge Runner
//!
//! The execution driver for lab jobs. Given a job id it prepares an isolated
//! working directory, drives the infrastructure-as-code engine through
//! preview, apply or destroy, streams progress into the job transcript and
//! extracts the lab's access details.
//!
//! Architecture:
//! - Engine / Toolchain: child-process seams to Pulumi and Go
//! - Workspace / Environment: per-job directories and environment maps
//! - Stack / Outputs: stack lifecycle, config projection, result extraction
//! - Repositories: job records and credentials, owned by the caller
//! - Services: the driver and the startup prewarmer

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod outputs;
pub mod repository;
pub mod service;
pub mod stack;
pub mod toolchain;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::DriverError;
pub use service::{ExecutionDriver, Prewarmer};
