//! Output normalization and extraction
//!
//! The engine's output map is untyped. A value arrives in one of three
//! shapes, captured by [`OutputValue`]:
//! - a plain string
//! - a `{"value": ..., "secret": ...}` envelope
//! - an opaque JSON document, possibly itself encoded as a string
//!
//! [`OutputValue::normalize`] turns every shape into a plain string with the
//! precedence envelope value, then JSON-string unwrapping, then raw text.

use labforge_core::domain::outputs::LabOutputs;
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use tracing::debug;

pub const CLUSTER_ID: &str = "clusterId";
pub const KUBECONFIG: &str = "kubeconfig";
pub const PLATFORM_URL: &str = "platformUrl";
pub const SESSION_TOKEN: &str = "sessionToken";
pub const ORGANIZATION_ID: &str = "organizationId";
pub const ADMIN_EMAIL: &str = "adminEmail";
pub const ADMIN_PASSWORD: &str = "adminPassword";

/// One raw output value, tagged by shape
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Plain(String),
    Enveloped { value: String, secret: bool },
    Opaque(Vec<u8>),
}

impl OutputValue {
    /// Classifies a raw value from the output map
    pub fn classify(raw: &JsonValue) -> Self {
        match raw {
            JsonValue::Null => OutputValue::Plain(String::new()),
            JsonValue::String(s) => {
                let trimmed = s.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('"') {
                    OutputValue::Opaque(s.as_bytes().to_vec())
                } else {
                    OutputValue::Plain(s.clone())
                }
            }
            JsonValue::Object(map) if map.contains_key("value") => OutputValue::Enveloped {
                value: text_of(&map["value"]),
                secret: map.get("secret").and_then(JsonValue::as_bool).unwrap_or(false),
            },
            other => OutputValue::Opaque(other.to_string().into_bytes()),
        }
    }

    /// Whether the engine marked this value as secret
    pub fn is_secret(&self) -> bool {
        matches!(self, OutputValue::Enveloped { secret: true, .. })
    }

    /// Reduces the value to a plain string
    pub fn normalize(self) -> String {
        match self {
            OutputValue::Plain(s) => s,
            OutputValue::Enveloped { value, .. } => value,
            OutputValue::Opaque(bytes) => match serde_json::from_slice::<JsonValue>(&bytes) {
                Ok(JsonValue::Object(map)) if map.contains_key("value") => text_of(&map["value"]),
                Ok(JsonValue::String(s)) => s,
                _ => String::from_utf8_lossy(&bytes).into_owned(),
            },
        }
    }
}

fn text_of(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Looks up one key and normalizes it, treating empty values as absent
pub fn read_string(map: &Map<String, JsonValue>, key: &str) -> Option<String> {
    map.get(key)
        .map(|raw| OutputValue::classify(raw).normalize())
        .filter(|value| !value.trim().is_empty())
}

/// Result fields plus the non-fatal problems found while reading them
#[derive(Debug, Default)]
pub struct Extraction {
    pub outputs: LabOutputs,
    pub warnings: Vec<String>,
}

/// Extracts lab result fields from the engine's output map
///
/// Cluster credentials are only read when a cluster id is present. When the
/// kubeconfig output is missing or empty, the file the lab program writes
/// into its working directory is used instead.
///
/// # Arguments
/// * `map` - Output map returned by the engine
/// * `kubeconfig_fallback` - File consulted when the kubeconfig output is empty
pub async fn extract(map: &Map<String, JsonValue>, kubeconfig_fallback: &Path) -> Extraction {
    let mut extraction = Extraction::default();
    let outputs = &mut extraction.outputs;

    outputs.platform_url = read_string(map, PLATFORM_URL);
    outputs.session_token = read_string(map, SESSION_TOKEN);
    outputs.organization_id = read_string(map, ORGANIZATION_ID);
    outputs.admin_email = read_string(map, ADMIN_EMAIL);
    outputs.admin_password = read_string(map, ADMIN_PASSWORD);

    let Some(cluster_id) = read_string(map, CLUSTER_ID) else {
        extraction
            .warnings
            .push("No cluster id in stack outputs, skipping cluster credentials".to_string());
        return extraction;
    };
    outputs.cluster_id = Some(cluster_id.clone());

    if let Some(kubeconfig) = read_string(map, KUBECONFIG) {
        outputs.kubeconfig = Some(kubeconfig);
        return extraction;
    }

    debug!(
        "kubeconfig output empty, reading {}",
        kubeconfig_fallback.display()
    );
    match tokio::fs::read_to_string(kubeconfig_fallback).await {
        Ok(content) if !content.trim().is_empty() => {
            outputs.kubeconfig = Some(content);
        }
        _ => {
            extraction.warnings.push(format!(
                "Cluster {} exists but no kubeconfig was found in outputs or {}",
                cluster_id,
                kubeconfig_fallback.display()
            ));
        }
    }

    extraction
}
