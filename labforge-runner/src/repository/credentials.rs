//! Credentials repository
//!
//! Provider credentials configured by the operator. The store is consulted
//! before every driver operation, so credentials rotated after a failure are
//! picked up by the retry.

use async_trait::async_trait;
use labforge_core::domain::lab::{Provider, ProviderCredentials};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Errors returned by a [`CredentialStore`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credentials for provider '{0}' are not configured")]
    NotConfigured(Provider),

    #[error("Invalid credentials: {0}")]
    Validation(String),
}

/// Store of provider credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the credentials configured for a provider
    async fn get(&self, provider: Provider) -> Result<ProviderCredentials, CredentialError>;

    /// Replaces the credentials of a provider
    ///
    /// Rejects credential sets with empty fields.
    async fn set(
        &self,
        provider: Provider,
        credentials: ProviderCredentials,
    ) -> Result<(), CredentialError>;
}

/// Process-local [`CredentialStore`]
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<HashMap<Provider, ProviderCredentials>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one provider's credentials
    pub fn with(provider: Provider, credentials: ProviderCredentials) -> Self {
        Self {
            entries: RwLock::new(HashMap::from([(provider, credentials)])),
        }
    }

    /// Whether credentials are configured for a provider
    pub async fn is_configured(&self, provider: Provider) -> bool {
        self.entries.read().await.contains_key(&provider)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, provider: Provider) -> Result<ProviderCredentials, CredentialError> {
        self.entries
            .read()
            .await
            .get(&provider)
            .cloned()
            .ok_or(CredentialError::NotConfigured(provider))
    }

    async fn set(
        &self,
        provider: Provider,
        credentials: ProviderCredentials,
    ) -> Result<(), CredentialError> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            return Err(CredentialError::Validation(format!(
                "missing fields: {}",
                missing.join(", ")
            )));
        }

        self.entries.write().await.insert(provider, credentials);
        info!("Updated credentials for provider {}", provider);
        Ok(())
    }
}
