//! API client module
//!
//! HTTP client for the Labforge orchestrator's JSON API.

use anyhow::{Context, Result};
use labforge_core::domain::job::Job;
use labforge_core::domain::lab::{LabConfig, Provider, ProviderCredentials};
use labforge_core::dto::credentials::CredentialStatus;
use labforge_core::dto::job::{CreateJob, JobOutput, JobSummary, StartMode};
use reqwest::{Client, Response};
use uuid::Uuid;

/// HTTP client for the orchestrator API
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a job, optionally starting a preview or apply
    pub async fn create_job(&self, config: LabConfig, start: Option<StartMode>) -> Result<Job> {
        let response = self
            .client
            .post(self.url("/job"))
            .json(&CreateJob { config, start })
            .send()
            .await
            .context("Failed to send create job request")?;

        handle_response(response).await
    }

    /// List all jobs, most recent first
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let response = self
            .client
            .get(self.url("/job/list"))
            .send()
            .await
            .context("Failed to send list jobs request")?;

        handle_response(response).await
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        let response = self
            .client
            .get(self.url(&format!("/job/{}", id)))
            .send()
            .await
            .context("Failed to send get job request")?;

        handle_response(response).await
    }

    /// Get a job's transcript
    pub async fn get_job_output(&self, id: Uuid) -> Result<JobOutput> {
        let response = self
            .client
            .get(self.url(&format!("/job/{}/output", id)))
            .send()
            .await
            .context("Failed to send get job output request")?;

        handle_response(response).await
    }

    /// Trigger a driver operation on a job
    ///
    /// # Arguments
    /// * `id` - The job UUID
    /// * `action` - One of preview, apply, launch, retry, destroy, recreate
    ///
    /// # Returns
    /// The job the operation runs on; for `recreate` this is the new job
    pub async fn job_action(&self, id: Uuid, action: &str) -> Result<Job> {
        let response = self
            .client
            .post(self.url(&format!("/job/{}/{}", id, action)))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", action))?;

        handle_response(response).await
    }

    /// Delete a job record
    pub async fn delete_job(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/job/{}", id)))
            .send()
            .await
            .context("Failed to send delete job request")?;

        check_status(response).await?;
        Ok(())
    }

    /// Replace a provider's credentials
    pub async fn set_credentials(
        &self,
        provider: Provider,
        credentials: &ProviderCredentials,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/credentials/{}", provider)))
            .json(credentials)
            .send()
            .await
            .context("Failed to send set credentials request")?;

        check_status(response).await?;
        Ok(())
    }

    /// Whether a provider has credentials configured
    pub async fn credential_status(&self, provider: Provider) -> Result<CredentialStatus> {
        let response = self
            .client
            .get(self.url(&format!("/credentials/{}", provider)))
            .send()
            .await
            .context("Failed to send credential status request")?;

        handle_response(response).await
    }
}

/// Fails with the server's error message on a non-success status
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    anyhow::bail!("Request failed with status {}: {}", status, message);
}

/// Deserialize a successful JSON response
async fn handle_response<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .context("Failed to parse response JSON")
}
