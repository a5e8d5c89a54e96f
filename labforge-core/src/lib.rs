//! Labforge Core
//!
//! Core types and abstractions for the Labforge lab provisioning system.
//!
//! This crate contains:
//! - Domain types: Job records, their status machine, lab configuration and outputs
//! - DTOs: Data transfer objects for the orchestrator API and CLI

pub mod domain;
pub mod dto;
