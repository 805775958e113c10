//! Test utilities for unit testing the cluster client
//!
//! This module provides helpers for creating test objects, a scripted
//! kubectl runner and a client wired to the mock store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use crate::client::ClusterClient;
use crate::config::ClientConfig;
use crate::kubeconfig::ContextOverrides;
use crate::kubectl::{CommandOutput, CommandRunner, ManifestApplier};
use crate::mock::MockObjectStore;
use crate::poll::PollBudget;

/// kubectl runner returning scripted (success, output) pairs in order
///
/// Once the script runs out every call succeeds with empty output.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<VecDeque<(bool, String)>>>,
    invocations: Arc<Mutex<Vec<(Vec<String>, String)>>>,
}

impl ScriptedRunner {
    pub fn new(script: Vec<(bool, &str)>) -> Self {
        Self {
            script: Arc::new(Mutex::new(
                script.into_iter().map(|(ok, out)| (ok, out.to_string())).collect(),
            )),
            invocations: Arc::default(),
        }
    }

    /// (args, stdin) of every call so far
    pub fn invocations(&self) -> Vec<(Vec<String>, String)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[String], stdin: &str) -> std::io::Result<CommandOutput> {
        self.invocations
            .lock()
            .unwrap()
            .push((args.to_vec(), stdin.to_string()));
        let (success, output) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((true, String::new()));
        Ok(CommandOutput { success, output })
    }
}

/// Budgets short enough for unit tests
pub fn fast_config() -> ClientConfig {
    let budget = PollBudget::new(Duration::from_millis(5), Duration::from_millis(500));
    ClientConfig {
        kubectl_apply: budget,
        resource_ready: budget,
        machine_ready: budget,
        resource_delete: budget,
        ..Default::default()
    }
}

/// Client over `store` with fast budgets and a scripted kubectl
pub fn create_test_client(store: MockObjectStore) -> ClusterClient<MockObjectStore, ScriptedRunner> {
    create_test_client_with_config(store, fast_config())
}

pub fn create_test_client_with_config(
    store: MockObjectStore,
    config: ClientConfig,
) -> ClusterClient<MockObjectStore, ScriptedRunner> {
    let applier = ManifestApplier::new(
        ScriptedRunner::default(),
        None,
        ContextOverrides::default(),
        config.kubectl_apply,
    );
    ClusterClient::new(store, applier, ContextOverrides::default(), config)
}

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Owner reference entry pointing at `kind`/`name`
pub fn owner_ref(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: format!("{GROUP}/{VERSION}"),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{name}"),
        ..Default::default()
    }
}

/// Helper to create test Cluster
pub fn create_test_cluster(namespace: &str, name: &str) -> Cluster {
    Cluster {
        metadata: meta(namespace, name),
        spec: ClusterSpec::default(),
        status: None,
    }
}

/// Helper to create test MachineDeployment labelled with and owned by `cluster`
pub fn create_test_machine_deployment(namespace: &str, name: &str, cluster: &str) -> MachineDeployment {
    let mut metadata = meta(namespace, name);
    metadata.labels = Some([(CLUSTER_NAME_LABEL.to_string(), cluster.to_string())].into());
    metadata.owner_references = Some(vec![owner_ref("Cluster", cluster)]);
    MachineDeployment {
        metadata,
        spec: MachineDeploymentSpec::default(),
        status: None,
    }
}

/// Helper to create test MachineSet owned by `owner` (kind, name)
pub fn create_test_machine_set(namespace: &str, name: &str, owner: (&str, &str)) -> MachineSet {
    let mut metadata = meta(namespace, name);
    metadata.owner_references = Some(vec![owner_ref(owner.0, owner.1)]);
    MachineSet {
        metadata,
        spec: MachineSetSpec::default(),
        status: None,
    }
}

/// Helper to create test Machine; control plane when `control_plane` is set
pub fn create_test_machine(namespace: &str, name: &str, control_plane: Option<&str>) -> Machine {
    Machine {
        metadata: meta(namespace, name),
        spec: MachineSpec {
            versions: MachineVersionInfo {
                kubelet: "1.30.0".to_string(),
                control_plane: control_plane.map(str::to_string),
            },
            ..Default::default()
        },
        status: None,
    }
}
