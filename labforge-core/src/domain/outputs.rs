//! Lab result fields
//!
//! Captured from the engine's output map once an apply has produced a
//! reachable cluster.

use serde::{Deserialize, Serialize};

/// Cluster access and platform details surfaced to the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabOutputs {
    /// Managed cluster identifier
    #[serde(default)]
    pub cluster_id: Option<String>,
    /// Cluster credentials (kubeconfig document)
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub platform_url: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl LabOutputs {
    /// True when no result field has been captured
    pub fn is_empty(&self) -> bool {
        self.cluster_id.is_none()
            && self.kubeconfig.is_none()
            && self.platform_url.is_none()
            && self.session_token.is_none()
            && self.organization_id.is_none()
            && self.admin_email.is_none()
            && self.admin_password.is_none()
    }

    /// True when cluster credentials were captured
    pub fn has_cluster_access(&self) -> bool {
        self.kubeconfig.as_deref().is_some_and(|k| !k.is_empty())
    }
}
