//! Core domain types
//!
//! This module contains the core domain structures used across Labforge crates.
//! These types are shared between the orchestrator (registry and persistence)
//! and the runner (execution driver).

pub mod job;
pub mod lab;
pub mod outputs;
