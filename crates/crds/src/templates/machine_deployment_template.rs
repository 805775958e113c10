//! MachineDeploymentTemplate CRD

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::machine_deployment::MachineDeploymentSpec;
use crate::validation::{ValidationError, Validator};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "exp.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "MachineDeploymentTemplate",
    namespaced,
    status = "MachineDeploymentTemplateStatus",
    shortname = "mdt",
    category = "cluster-api",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentTemplateSpec {
    /// MachineDeployment spec to clone
    pub template: MachineDeploymentTemplateResource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentTemplateResource {
    pub spec: MachineDeploymentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MachineDeploymentTemplateStatus {}

impl MachineDeploymentTemplate {
    // No cross-field rules for deployment templates yet.
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check(
            "MachineDeploymentTemplate",
            "exp.cluster.x-k8s.io",
            &self.name_any(),
            Vec::new(),
        )
    }
}

impl Validator for MachineDeploymentTemplate {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_template_is_accepted() {
        let mut tpl = MachineDeploymentTemplate::new("workers", Default::default());
        tpl.spec.template.spec.replicas = Some(3);
        tpl.spec.template.spec.paused = true;

        assert!(tpl.validate_create().is_ok());
        assert!(tpl.validate_update(&tpl.clone()).is_ok());
        assert!(tpl.validate_delete().is_ok());
    }
}
