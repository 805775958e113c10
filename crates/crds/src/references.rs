//! Shared object references and embedded metadata for Cluster API kinds
//!
//! These mirror the small Kubernetes core types the Cluster API schemas embed
//! (object references, label selectors, node addresses) so the generated CRD
//! schemas stay self-contained.

use std::collections::BTreeMap;

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};

/// Schema for opaque provider payloads (`providerSpec.value`, `providerStatus`)
///
/// The API server must keep every field of these blobs, so the schema is an
/// object that preserves unknown fields.
pub fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Schema for `maxSurge` / `maxUnavailable` style int-or-string fields
pub fn int_or_string(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "x-kubernetes-int-or-string": true,
        "anyOf": [{ "type": "integer" }, { "type": "string" }]
    })
}

/// Reference to another Kubernetes object (used for `status.nodeRef`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectReference {
    /// Reference to a cluster-scoped Node by name
    pub fn node(name: impl Into<String>) -> Self {
        Self {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Render as the `key=value,...` form accepted by list calls
    pub fn to_query(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Metadata carried by machine templates inside MachineSet / MachineDeployment specs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Address reported for a provisioned machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    /// Address type (e.g. "InternalIP", "Hostname")
    #[serde(rename = "type")]
    pub address_type: String,

    pub address: String,
}

/// Either an absolute count or a percentage string such as `"25%"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum IntOrPercent {
    Int(i32),
    Percent(String),
}

/// Provider-specific configuration, either inline or loaded from a MachineClass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Inline provider configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub value: Option<serde_json::Value>,

    /// Source to load the configuration from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ProviderSpecSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpecSource {
    /// MachineClass the machine configuration is taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_class: Option<MachineClassRef>,
}

/// Reference from a machine template to a MachineClass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineClassRef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Provider-specific overrides applied on top of the class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub provider: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_selector_renders_sorted_pairs() {
        let selector = LabelSelector {
            match_labels: BTreeMap::from([
                ("set".to_string(), "workers".to_string()),
                ("cluster.k8s.io/cluster-name".to_string(), "alpha".to_string()),
            ]),
        };
        assert_eq!(selector.to_query(), "cluster.k8s.io/cluster-name=alpha,set=workers");
    }

    #[test]
    fn int_or_percent_accepts_both_forms() {
        let int: IntOrPercent = serde_json::from_str("1").unwrap();
        let pct: IntOrPercent = serde_json::from_str("\"25%\"").unwrap();
        assert_eq!(int, IntOrPercent::Int(1));
        assert_eq!(pct, IntOrPercent::Percent("25%".to_string()));
    }
}
