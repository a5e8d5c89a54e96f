//! Data Transfer Objects for the orchestrator API
//!
//! Lightweight request/response shapes exchanged between the orchestrator
//! HTTP surface and the CLI.

pub mod credentials;
pub mod job;
