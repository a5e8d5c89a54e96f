//! CLI configuration

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the orchestrator's JSON API
    pub orchestrator_url: String,
}
