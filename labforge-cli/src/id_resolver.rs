//! ID resolver module
//!
//! Resolves job ID prefixes to full UUIDs by listing jobs from the API, so
//! operators can type the first few characters of an id.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

use crate::api::ApiClient;

/// Resolve a job ID or prefix to a full UUID
///
/// A full UUID is returned without calling the API.
///
/// # Errors
/// Returns an error if no job or more than one job matches the prefix, or
/// if the job list cannot be fetched.
pub async fn resolve_job_id(client: &ApiClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let jobs = client
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs.iter().map(|j| j.id), input)
}

/// Picks the single id starting with `prefix`
fn match_prefix(ids: impl Iterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    let matches: Vec<Uuid> = ids
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        vec![
            Uuid::parse_str("3f2a9c10-0000-4000-8000-000000000001").unwrap(),
            Uuid::parse_str("3f2b0000-0000-4000-8000-000000000002").unwrap(),
            Uuid::parse_str("a1000000-0000-4000-8000-000000000003").unwrap(),
        ]
    }

    #[test]
    fn test_unique_prefix() {
        let id = match_prefix(ids().into_iter(), "A1").unwrap();
        assert_eq!(id, ids()[2]);
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = match_prefix(ids().into_iter(), "3f2").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));

        let id = match_prefix(ids().into_iter(), "3f2a").unwrap();
        assert_eq!(id, ids()[0]);
    }

    #[test]
    fn test_unknown_and_empty_prefix() {
        assert!(match_prefix(ids().into_iter(), "ff").is_err());
        assert!(match_prefix(ids().into_iter(), "  ").is_err());
    }
}
