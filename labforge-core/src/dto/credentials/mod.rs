//! Credential DTOs

use serde::{Deserialize, Serialize};

use crate::domain::lab::Provider;

/// Whether a provider has credentials configured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub provider: Provider,
    pub configured: bool,
}
