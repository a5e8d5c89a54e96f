//! Credentials API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use labforge_core::domain::lab::{Provider, ProviderCredentials};
use labforge_core::dto::credentials::CredentialStatus;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

fn parse_provider(provider: &str) -> ApiResult<Provider> {
    provider.parse().map_err(ApiError::NotFound)
}

/// PUT /credentials/{provider}
/// Replace a provider's credentials
pub async fn set_credentials(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(credentials): Json<ProviderCredentials>,
) -> ApiResult<StatusCode> {
    let provider = parse_provider(&provider)?;
    tracing::info!("Updating credentials for provider: {}", provider);

    state.credentials.set(provider, credentials).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /credentials/{provider}
/// Report whether a provider has credentials, never the values
pub async fn get_credentials(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Json<CredentialStatus>> {
    let provider = parse_provider(&provider)?;
    let configured = state.credentials.get(provider).await.is_ok();

    Ok(Json(CredentialStatus {
        provider,
        configured,
    }))
}
