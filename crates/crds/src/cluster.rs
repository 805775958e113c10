//! Cluster CRD
//!
//! A provisioned Kubernetes cluster. The status is filled in asynchronously
//! by the infrastructure provider's controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::{ProviderSpec, preserve_unknown_fields};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus",
    shortname = "cl",
    category = "cluster-api",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster network configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetworkingConfig>,

    /// Provider-specific cluster configuration
    #[serde(default)]
    pub provider_spec: ProviderSpec,

    /// Endpoint used to reach the control plane
    #[serde(default, skip_serializing_if = "ApiEndpoint::is_zero")]
    pub control_plane_endpoint: ApiEndpoint,

    /// Pauses reconciliation of the cluster and its machines
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkingConfig {
    #[serde(default)]
    pub services: NetworkRanges,

    #[serde(default)]
    pub pods: NetworkRanges,

    #[serde(default)]
    pub service_domain: String,
}

/// CIDR blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

/// Host and port of an API server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: i32,
}

impl ApiEndpoint {
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// True when neither host nor port is set
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Endpoints the cluster's API server can be reached on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_endpoints: Vec<ApiEndpoint>,

    /// Provider-specific status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub provider_status: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ClusterStatus {
    /// True when the controller has not written anything yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Cluster {
    /// Status populated and carrying provider status
    pub fn has_provider_status(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| !s.is_empty() && s.provider_status.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_endpoint_is_omitted() {
        let cluster = Cluster::new("alpha", ClusterSpec::default());
        let value = serde_json::to_value(&cluster).unwrap();
        assert_eq!(value["apiVersion"], "cluster.k8s.io/v1alpha1");
        assert!(value["spec"].get("controlPlaneEndpoint").is_none());
        assert!(value["spec"].get("paused").is_none());
    }

    #[test]
    fn provider_status_required_for_readiness() {
        let mut cluster = Cluster::new("alpha", ClusterSpec::default());
        assert!(!cluster.has_provider_status());

        cluster.status = Some(ClusterStatus {
            api_endpoints: vec![ApiEndpoint::new("10.0.0.1", 443)],
            ..Default::default()
        });
        assert!(!cluster.has_provider_status());

        cluster.status = Some(ClusterStatus {
            provider_status: Some(json!({"phase": "ready"})),
            ..Default::default()
        });
        assert!(cluster.has_provider_status());
    }
}
