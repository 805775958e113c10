//! MachineClass CRD
//!
//! Reusable machine configuration. Unlike the other kinds the provider
//! payload sits at the top level (`providerSpec`) rather than under `spec`,
//! so the type implements `kube::Resource` by hand instead of deriving
//! `CustomResource`.

use std::borrow::Cow;

use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::Resource;
use kube::api::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{GROUP, VERSION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineClass {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Provider-specific machine configuration
    #[serde(default)]
    pub provider_spec: serde_json::Value,
}

impl MachineClass {
    pub fn new(name: &str, provider_spec: serde_json::Value) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            provider_spec,
            ..Default::default()
        }
    }

    /// CRD manifest for the kind
    pub fn crd() -> Result<CustomResourceDefinition, serde_json::Error> {
        serde_json::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": format!("machineclasses.{GROUP}") },
            "spec": {
                "group": GROUP,
                "names": {
                    "kind": "MachineClass",
                    "listKind": "MachineClassList",
                    "plural": "machineclasses",
                    "singular": "machineclass",
                    "shortNames": ["mc"],
                    "categories": ["cluster-api"]
                },
                "scope": "Namespaced",
                "versions": [{
                    "name": VERSION,
                    "served": true,
                    "storage": true,
                    "schema": {
                        "openAPIV3Schema": {
                            "type": "object",
                            "required": ["providerSpec"],
                            "properties": {
                                "apiVersion": { "type": "string" },
                                "kind": { "type": "string" },
                                "metadata": { "type": "object" },
                                "providerSpec": {
                                    "type": "object",
                                    "x-kubernetes-preserve-unknown-fields": true
                                }
                            }
                        }
                    }
                }]
            }
        }))
    }
}

impl Default for MachineClass {
    fn default() -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: Self::api_version(&()).into_owned(),
                kind: Self::kind(&()).into_owned(),
            }),
            metadata: ObjectMeta::default(),
            provider_spec: serde_json::Value::Null,
        }
    }
}

impl Resource for MachineClass {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("MachineClass")
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("machineclasses")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
