//! Lab configuration types
//!
//! A [`LabConfig`] is the validated configuration object a job is created
//! from. It is snapshotted into the job record so a failed job can be retried
//! and a destroyed lab can be recreated from the same parameters.

use serde::{Deserialize, Serialize};

const REDACTED: &str = "********";

/// Cloud provider a credential set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ovh,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Ovh => write!(f, "ovh"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ovh" | "ovhcloud" => Ok(Provider::Ovh),
            other => Err(format!("Unknown provider '{}'", other)),
        }
    }
}

/// OVHcloud API credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    /// API endpoint name (e.g. "ovh-eu")
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
    /// Public cloud project the lab is created in
    pub project_id: String,
}

impl ProviderCredentials {
    /// Returns the names of fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("endpoint", &self.endpoint),
            ("application_key", &self.application_key),
            ("application_secret", &self.application_secret),
            ("consumer_key", &self.consumer_key),
            ("project_id", &self.project_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    fn redacted(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            application_key: REDACTED.to_string(),
            application_secret: REDACTED.to_string(),
            consumer_key: REDACTED.to_string(),
            project_id: self.project_id.clone(),
        }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("endpoint", &self.endpoint)
            .field("application_key", &REDACTED)
            .field("application_secret", &REDACTED)
            .field("consumer_key", &REDACTED)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Full lab configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    /// Engine stack name, also used to prefix every cloud resource name
    pub stack_name: String,
    pub region: String,
    /// Credentials captured at creation; the credential store takes precedence
    #[serde(default)]
    pub credentials: Option<ProviderCredentials>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub node_pool: NodePoolConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub template: TemplateSource,
}

/// Private network attached to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub vlan_id: u16,
    pub subnet_cidr: String,
    pub dhcp_start: String,
    pub dhcp_end: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "lab-net".to_string(),
            vlan_id: 100,
            subnet_cidr: "10.0.0.0/24".to_string(),
            dhcp_start: "10.0.0.100".to_string(),
            dhcp_end: "10.0.0.200".to_string(),
        }
    }
}

/// Worker node pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolConfig {
    pub name: String,
    pub flavor: String,
    pub min_nodes: u32,
    pub max_nodes: u32,
    pub desired_nodes: u32,
}

impl Default for NodePoolConfig {
    fn default() -> Self {
        Self {
            name: "workers".to_string(),
            flavor: "b3-8".to_string(),
            min_nodes: 1,
            max_nodes: 3,
            desired_nodes: 2,
        }
    }
}

/// Managed Kubernetes cluster parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub kubernetes_version: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "lab-cluster".to_string(),
            kubernetes_version: "1.31".to_string(),
        }
    }
}

/// Developer workspace platform deployed on the cluster
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub admin_email: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    pub admin_password: String,
    /// Helm chart version, latest when unset
    #[serde(default)]
    pub chart_version: Option<String>,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("admin_email", &self.admin_email)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &REDACTED)
            .field("chart_version", &self.chart_version)
            .finish()
    }
}

/// Workspace template pushed to the platform after provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSource {
    pub name: String,
    /// Git repository holding the template, built-in template when unset
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default)]
    pub git_ref: Option<String>,
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self {
            name: "kubernetes".to_string(),
            git_url: None,
            git_ref: None,
        }
    }
}

impl LabConfig {
    /// Minimal valid configuration for the given stack
    ///
    /// Printed by `labforge job template` as a starting point.
    pub fn example(stack_name: &str) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            region: "GRA9".to_string(),
            credentials: None,
            network: NetworkConfig::default(),
            node_pool: NodePoolConfig::default(),
            cluster: ClusterConfig::default(),
            platform: PlatformConfig {
                admin_email: "admin@example.com".to_string(),
                admin_username: default_admin_username(),
                admin_password: "change-me-please".to_string(),
                chart_version: None,
            },
            template: TemplateSource::default(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stack_name.is_empty() {
            return Err("stack_name cannot be empty".to_string());
        }

        if self.stack_name.len() > 32
            || !self
                .stack_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            || self.stack_name.starts_with('-')
        {
            return Err(format!(
                "stack_name '{}' must be at most 32 lowercase letters, digits or dashes",
                self.stack_name
            ));
        }

        if self.region.trim().is_empty() {
            return Err("region cannot be empty".to_string());
        }

        if self.network.vlan_id == 0 || self.network.vlan_id > 4000 {
            return Err(format!(
                "network.vlan_id must be between 1 and 4000 (got {})",
                self.network.vlan_id
            ));
        }

        let pool = &self.node_pool;
        if pool.min_nodes > pool.max_nodes {
            return Err(format!(
                "node_pool.min_nodes ({}) exceeds max_nodes ({})",
                pool.min_nodes, pool.max_nodes
            ));
        }
        if pool.desired_nodes < pool.min_nodes || pool.desired_nodes > pool.max_nodes {
            return Err(format!(
                "node_pool.desired_nodes ({}) must be within [{}, {}]",
                pool.desired_nodes, pool.min_nodes, pool.max_nodes
            ));
        }

        if self.platform.admin_email.trim().is_empty() || !self.platform.admin_email.contains('@')
        {
            return Err("platform.admin_email must be a valid email address".to_string());
        }

        if self.platform.admin_password.len() < 8 {
            return Err("platform.admin_password must be at least 8 characters".to_string());
        }

        if let Some(credentials) = &self.credentials {
            let missing = credentials.missing_fields();
            if !missing.is_empty() {
                return Err(format!(
                    "credentials are incomplete, missing: {}",
                    missing.join(", ")
                ));
            }
        }

        Ok(())
    }

    /// Prefixes a resource name with the stack name
    ///
    /// Stacks share one cloud project, so every named resource carries the
    /// stack name to stay unique.
    pub fn scoped_name(&self, name: &str) -> String {
        format!("{}-{}", self.stack_name, name)
    }

    /// Returns a copy with secrets masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.credentials = config.credentials.as_ref().map(|c| c.redacted());
        config.platform.admin_password = REDACTED.to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ProviderCredentials {
        ProviderCredentials {
            endpoint: "ovh-eu".to_string(),
            application_key: "ak".to_string(),
            application_secret: "as".to_string(),
            consumer_key: "ck".to_string(),
            project_id: "project".to_string(),
        }
    }

    #[test]
    fn test_example_is_valid() {
        assert!(LabConfig::example("dev").validate().is_ok());
    }

    #[test]
    fn test_stack_name_validation() {
        let mut config = LabConfig::example("dev");

        config.stack_name = String::new();
        assert!(config.validate().is_err());

        config.stack_name = "Dev_Lab".to_string();
        assert!(config.validate().is_err());

        config.stack_name = "-dev".to_string();
        assert!(config.validate().is_err());

        config.stack_name = "team-a-01".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_node_pool_validation() {
        let mut config = LabConfig::example("dev");

        config.node_pool.min_nodes = 4;
        assert!(config.validate().is_err());

        config.node_pool.min_nodes = 1;
        config.node_pool.desired_nodes = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_incomplete_credentials_rejected() {
        let mut config = LabConfig::example("dev");
        let mut creds = credentials();
        creds.consumer_key = " ".to_string();
        config.credentials = Some(creds);

        let err = config.validate().unwrap_err();
        assert!(err.contains("consumer_key"));
    }

    #[test]
    fn test_scoped_name() {
        let config = LabConfig::example("dev");
        assert_eq!(config.scoped_name("lab-net"), "dev-lab-net");
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = LabConfig::example("dev");
        config.credentials = Some(credentials());

        let redacted = config.redacted();
        let creds = redacted.credentials.unwrap();
        assert_eq!(creds.application_secret, REDACTED);
        assert_eq!(creds.project_id, "project");
        assert_eq!(redacted.platform.admin_password, REDACTED);

        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("\"as\""));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OVH".parse::<Provider>(), Ok(Provider::Ovh));
        assert!("aws".parse::<Provider>().is_err());
    }
}
