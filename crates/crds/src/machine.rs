//! Machine CRD
//!
//! A single compute node request. Machines whose `spec.versions.controlPlane`
//! is set run the cluster's control plane.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::{NodeAddress, ObjectReference, ProviderSpec, preserve_unknown_fields};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus",
    shortname = "ma",
    category = "cluster-api",
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Provider-specific machine configuration
    #[serde(default)]
    pub provider_spec: ProviderSpec,

    /// Kubernetes versions to install on the machine
    #[serde(default)]
    pub versions: MachineVersionInfo,

    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Taints applied to the node once it registers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineVersionInfo {
    /// Kubelet version
    #[serde(default)]
    pub kubelet: String,

    /// Control plane version; only set on control-plane machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    pub effect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Node backing this machine, once registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Versions currently running on the machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<MachineVersionInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Provider-specific status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub provider_status: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<NodeAddress>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl MachineStatus {
    /// True when the controller has not written anything yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Machine {
    /// Machines with a control plane version run the control plane
    pub fn is_control_plane(&self) -> bool {
        self.spec
            .versions
            .control_plane
            .as_deref()
            .is_some_and(|v| !v.is_empty())
    }

    /// Status populated and carrying provider status
    pub fn has_provider_status(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| !s.is_empty() && s.provider_status.is_some())
    }

    pub fn node_ref(&self) -> Option<&ObjectReference> {
        self.status.as_ref().and_then(|s| s.node_ref.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with_control_plane(version: Option<&str>) -> Machine {
        Machine::new(
            "m",
            MachineSpec {
                versions: MachineVersionInfo {
                    kubelet: "1.30.0".to_string(),
                    control_plane: version.map(str::to_string),
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn control_plane_requires_non_empty_version() {
        assert!(machine_with_control_plane(Some("1.30.0")).is_control_plane());
        assert!(!machine_with_control_plane(Some("")).is_control_plane());
        assert!(!machine_with_control_plane(None).is_control_plane());
    }

    #[test]
    fn provider_id_uses_wire_casing() {
        let mut machine = machine_with_control_plane(None);
        machine.spec.provider_id = Some("aws:///i-123".to_string());
        let value = serde_json::to_value(&machine).unwrap();
        assert_eq!(value["spec"]["providerID"], "aws:///i-123");
    }
}
