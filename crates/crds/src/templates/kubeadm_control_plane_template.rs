//! KubeadmControlPlaneTemplate CRD
//!
//! The control plane spec is owned by the kubeadm provider, so it is kept
//! as an opaque object here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::preserve_unknown_fields;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "KubeadmControlPlaneTemplate",
    namespaced,
    status = "KubeadmControlPlaneTemplateStatus",
    shortname = "kcpt",
    category = "cluster-api",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplateSpec {
    pub template: KubeadmControlPlaneTemplateResource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplateResource {
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KubeadmControlPlaneTemplateStatus {}
