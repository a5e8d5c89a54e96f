//! Driver errors

use thiserror::Error;

use crate::engine::EngineError;

/// Failure of a driver operation
///
/// Every variant is also written to the job: the transcript receives a line
/// naming the failed phase and the job's `error` field the message.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Working directory, descriptor, sources or dependencies could not be prepared
    #[error("{phase} failed: {message}")]
    PreparationFailure { phase: &'static str, message: String },

    /// An engine operation returned an error
    #[error("{operation} failed: {source}")]
    EngineFailure {
        operation: &'static str,
        #[source]
        source: EngineError,
    },

    /// No usable provider credentials
    #[error("Provider credentials are not configured: {0}")]
    ConfigurationMissing(String),

    /// The job record could not be read or updated
    #[error(transparent)]
    Tracker(#[from] anyhow::Error),
}

impl DriverError {
    pub(crate) fn preparation(phase: &'static str, err: impl std::fmt::Display) -> Self {
        DriverError::PreparationFailure {
            phase,
            message: err.to_string(),
        }
    }

    pub(crate) fn engine(operation: &'static str, source: EngineError) -> Self {
        DriverError::EngineFailure { operation, source }
    }

    /// Short name of the phase that failed, used in transcript lines
    pub fn phase(&self) -> &'static str {
        match self {
            DriverError::PreparationFailure { phase, .. } => phase,
            DriverError::EngineFailure { operation, .. } => operation,
            DriverError::ConfigurationMissing(_) => "credential resolution",
            DriverError::Tracker(_) => "job tracking",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_phase() {
        let err = DriverError::preparation("dependency resolution", "go: module not found");
        assert_eq!(err.phase(), "dependency resolution");
        assert_eq!(
            err.to_string(),
            "dependency resolution failed: go: module not found"
        );

        let err = DriverError::engine(
            "up",
            EngineError::Failed {
                operation: "up".to_string(),
                code: 255,
                detail: "quota exceeded".to_string(),
            },
        );
        assert_eq!(err.phase(), "up");
        assert!(err.to_string().contains("quota exceeded"));
    }
}
