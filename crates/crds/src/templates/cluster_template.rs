//! ClusterTemplate CRD

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSpec;
use crate::validation::{FieldError, FieldPath, ValidationError, Validator};

/// Message for fields a template must leave unset
pub const TEMPLATE_FIELD_MESSAGE: &str = "may not be populated for cluster templates";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "exp.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "ClusterTemplate",
    namespaced,
    status = "ClusterTemplateStatus",
    shortname = "ct",
    category = "cluster-api",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateSpec {
    /// Cluster spec to clone; infrastructure references are templates themselves
    pub template: ClusterTemplateResource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateResource {
    pub spec: ClusterSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterTemplateStatus {}

impl ClusterTemplate {
    fn validate(&self) -> Result<(), ValidationError> {
        let template_spec = FieldPath::new(["spec", "template", "spec"]);
        let spec = &self.spec.template.spec;
        let mut errors = Vec::new();

        if !spec.control_plane_endpoint.is_zero() {
            errors.push(FieldError::invalid(
                template_spec.child("controlPlaneEndpoint"),
                serde_json::to_value(&spec.control_plane_endpoint).unwrap_or_default(),
                TEMPLATE_FIELD_MESSAGE,
            ));
        }

        if spec.paused {
            errors.push(FieldError::invalid(
                template_spec.child("paused"),
                serde_json::Value::Bool(spec.paused),
                TEMPLATE_FIELD_MESSAGE,
            ));
        }

        ValidationError::check("ClusterTemplate", "exp.cluster.x-k8s.io", &self.name_any(), errors)
    }
}

impl Validator for ClusterTemplate {
    fn validate_create(&self) -> Result<(), ValidationError> {
        self.validate()
    }

    fn validate_update(&self, _old: &Self) -> Result<(), ValidationError> {
        self.validate()
    }

    fn validate_delete(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
