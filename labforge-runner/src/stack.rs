//! Stack lifecycle and configuration projection

use labforge_core::domain::lab::{LabConfig, ProviderCredentials};
use tracing::{info, warn};

use crate::engine::{Engine, EngineContext, EngineError, ProgressSink};

/// How the stack for an operation was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSelection {
    Selected,
    Created,
}

/// Whether a stack exists for a destroy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPresence {
    Found,
    Missing,
}

/// Selects the job's stack, creating it only when confirmed absent
///
/// A failed selection is not taken as proof that the stack is missing: the
/// stack list is consulted first, and a stack that exists but cannot be
/// selected is reported as the original selection error. Every branch is
/// recorded in the transcript.
pub async fn select_or_create(
    engine: &dyn Engine,
    ctx: &EngineContext,
    sink: &dyn ProgressSink,
) -> Result<StackSelection, EngineError> {
    let select_err = match engine.select_stack(ctx).await {
        Ok(()) => {
            sink.line(format!("Selected existing stack '{}'", ctx.stack))
                .await;
            return Ok(StackSelection::Selected);
        }
        Err(e) => e,
    };

    sink.line(format!(
        "Could not select stack '{}' ({}), checking whether it exists",
        ctx.stack, select_err
    ))
    .await;

    let stacks = match engine.list_stacks(ctx).await {
        Ok(stacks) => stacks,
        Err(e) => {
            sink.line(format!("Listing stacks failed: {}", e)).await;
            return Err(e);
        }
    };

    if stacks.iter().any(|name| name == &ctx.stack) {
        warn!(
            "Stack {} exists but could not be selected: {}",
            ctx.stack, select_err
        );
        sink.line(format!(
            "Stack '{}' exists but could not be selected",
            ctx.stack
        ))
        .await;
        return Err(select_err);
    }

    engine.create_stack(ctx).await?;
    sink.line(format!("Created stack '{}'", ctx.stack)).await;
    Ok(StackSelection::Created)
}

/// Looks up the stack a destroy should act on
///
/// Unlike [`select_or_create`] this never creates anything.
pub async fn locate(
    engine: &dyn Engine,
    ctx: &EngineContext,
    sink: &dyn ProgressSink,
) -> Result<StackPresence, EngineError> {
    let select_err = match engine.select_stack(ctx).await {
        Ok(()) => {
            sink.line(format!("Selected stack '{}' for destroy", ctx.stack))
                .await;
            return Ok(StackPresence::Found);
        }
        Err(e) => e,
    };

    let stacks = engine.list_stacks(ctx).await?;
    if stacks.iter().any(|name| name == &ctx.stack) {
        return Err(select_err);
    }

    info!("Stack {} not found, nothing to destroy", ctx.stack);
    sink.line(format!(
        "Stack '{}' does not exist, treating lab as already destroyed",
        ctx.stack
    ))
    .await;
    Ok(StackPresence::Missing)
}

/// One engine configuration value
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub secret: bool,
}

impl ConfigEntry {
    fn plain(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            secret: false,
        }
    }

    fn secret(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            secret: true,
        }
    }
}

impl std::fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value: &str = if self.secret { "********" } else { &self.value };
        f.debug_struct("ConfigEntry")
            .field("key", &self.key)
            .field("value", &value)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Projects a lab configuration into engine configuration values
///
/// Named cloud resources are prefixed with the stack name so stacks sharing
/// one cloud project never collide.
///
/// # Arguments
/// * `config` - The job's configuration snapshot
/// * `credentials` - Resolved provider credentials for this operation
pub fn project(config: &LabConfig, credentials: &ProviderCredentials) -> Vec<ConfigEntry> {
    let network = &config.network;
    let pool = &config.node_pool;
    let platform = &config.platform;

    let mut entries = vec![
        ConfigEntry::plain("ovh:endpoint", &credentials.endpoint),
        ConfigEntry::secret("ovh:applicationKey", &credentials.application_key),
        ConfigEntry::secret("ovh:applicationSecret", &credentials.application_secret),
        ConfigEntry::secret("ovh:consumerKey", &credentials.consumer_key),
        ConfigEntry::plain("serviceName", &credentials.project_id),
        ConfigEntry::plain("region", &config.region),
        ConfigEntry::plain("networkName", config.scoped_name(&network.name)),
        ConfigEntry::plain("vlanId", network.vlan_id.to_string()),
        ConfigEntry::plain("subnetCidr", &network.subnet_cidr),
        ConfigEntry::plain("dhcpStart", &network.dhcp_start),
        ConfigEntry::plain("dhcpEnd", &network.dhcp_end),
        ConfigEntry::plain("clusterName", config.scoped_name(&config.cluster.name)),
        ConfigEntry::plain("kubernetesVersion", &config.cluster.kubernetes_version),
        ConfigEntry::plain("nodePoolName", config.scoped_name(&pool.name)),
        ConfigEntry::plain("nodeFlavor", &pool.flavor),
        ConfigEntry::plain("minNodes", pool.min_nodes.to_string()),
        ConfigEntry::plain("maxNodes", pool.max_nodes.to_string()),
        ConfigEntry::plain("desiredNodes", pool.desired_nodes.to_string()),
        ConfigEntry::plain("adminEmail", &platform.admin_email),
        ConfigEntry::plain("adminUsername", &platform.admin_username),
        ConfigEntry::secret("adminPassword", &platform.admin_password),
        ConfigEntry::plain("templateName", &config.template.name),
    ];

    if let Some(version) = &platform.chart_version {
        entries.push(ConfigEntry::plain("chartVersion", version));
    }
    if let Some(url) = &config.template.git_url {
        entries.push(ConfigEntry::plain("templateGitUrl", url));
    }
    if let Some(git_ref) = &config.template.git_ref {
        entries.push(ConfigEntry::plain("templateGitRef", git_ref));
    }

    entries
}

/// Writes every entry into the stack configuration
pub async fn apply_config(
    engine: &dyn Engine,
    ctx: &EngineContext,
    entries: &[ConfigEntry],
    sink: &dyn ProgressSink,
) -> Result<(), EngineError> {
    for entry in entries {
        engine
            .set_config(ctx, &entry.key, &entry.value, entry.secret)
            .await?;
    }

    let secrets = entries.iter().filter(|e| e.secret).count();
    sink.line(format!(
        "Applied {} configuration value(s), {} secret",
        entries.len(),
        secrets
    ))
    .await;
    Ok(())
}
