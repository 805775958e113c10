//! Concurrent machine creation and control-plane helpers
//!
//! Each machine gets its own unit of work: create it, then wait for it to
//! become ready. All units run concurrently and are joined before returning.
//! The first error to occur is kept; later ones are logged and dropped.

use std::sync::OnceLock;

use crds::{Cluster, Machine};
use futures::future::join_all;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::error::ClusterClientError;
use crate::kubectl::CommandRunner;
use crate::poll::{PollBudget, poll_immediate};
use crate::store_trait::ObjectStore;

/// Decides whether a created machine is ready
pub type MachineReadiness = fn(&Machine) -> bool;

/// Default readiness: the machine has a node reference or any annotation
///
/// Annotations are a weak signal; providers set them once the instance
/// exists, before the node has registered.
pub fn node_ref_or_annotated(machine: &Machine) -> bool {
    machine.node_ref().is_some() || !machine.annotations().is_empty()
}

/// Strict readiness: the machine's node has registered
pub fn has_node_ref(machine: &Machine) -> bool {
    machine.node_ref().is_some()
}

/// Split machines into (control plane, workers)
///
/// Errors when there is no control-plane machine.
pub fn extract_control_plane_machines(
    machines: Vec<Machine>,
) -> Result<(Vec<Machine>, Vec<Machine>), ClusterClientError> {
    let (control_plane, workers): (Vec<Machine>, Vec<Machine>) =
        machines.into_iter().partition(Machine::is_control_plane);
    if control_plane.is_empty() {
        return Err(ClusterClientError::NoControlPlane(control_plane.len()));
    }
    Ok((control_plane, workers))
}

impl<S: ObjectStore, R: CommandRunner> ClusterClient<S, R> {
    /// Create `machines` in `namespace` concurrently and wait for each to be ready
    ///
    /// Every machine is attempted even if another fails. The first error
    /// observed is returned once all units have finished.
    pub async fn create_machines(
        &self,
        machines: Vec<Machine>,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        let budget = self.config.machine_ready_budget();
        let first_error: OnceLock<ClusterClientError> = OnceLock::new();
        info!("Creating {} Machine(s) in namespace {}", machines.len(), namespace);

        let units = machines.into_iter().map(|machine| {
            let first_error = &first_error;
            async move {
                if let Err(e) = self.create_and_wait(machine, namespace, budget).await {
                    warn!("{}", e);
                    if let Err(later) = first_error.set(e) {
                        debug!("Dropping later machine error: {}", later);
                    }
                }
            }
        });
        join_all(units).await;

        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn create_and_wait(
        &self,
        mut machine: Machine,
        namespace: &str,
        budget: PollBudget,
    ) -> Result<(), ClusterClientError> {
        machine.metadata.namespace = Some(namespace.to_string());
        let name = machine.name_any();
        debug!("Creating Machine {}/{}", namespace, name);
        self.store.create(namespace, &machine).await.map_err(|e| {
            ClusterClientError::remote(format!("error creating Machine {namespace}/{name}"), e)
        })?;
        self.wait_for_machine_ready(namespace, &name, budget).await
    }

    /// Poll until the machine satisfies the readiness predicate
    ///
    /// A failed get counts as "not yet".
    pub async fn wait_for_machine_ready(
        &self,
        namespace: &str,
        name: &str,
        budget: PollBudget,
    ) -> Result<(), ClusterClientError> {
        let condition = format!("Machine {namespace}/{name} to become ready");
        let ready = self.machine_readiness;
        poll_immediate(budget, &condition, || async move {
            match self.store.get::<Machine>(namespace, name).await {
                Ok(machine) => Ok(ready(&machine)),
                Err(e) => {
                    debug!("Machine {}/{} not readable yet: {}", namespace, name, e);
                    Ok(false)
                }
            }
        })
        .await?;
        info!("Machine {}/{} is ready", namespace, name);
        Ok(())
    }

    /// The cluster, its first control-plane machine and its worker machines
    pub async fn get_cluster_api_object(
        &self,
        namespace: &str,
        cluster_name: &str,
    ) -> Result<(Cluster, Machine, Vec<Machine>), ClusterClientError> {
        let machines = self.get_machines(namespace).await?;
        let cluster = self.get_cluster(namespace, cluster_name).await?.ok_or_else(|| {
            ClusterClientError::NotFound {
                kind: "Cluster".to_string(),
                namespace: namespace.to_string(),
                name: cluster_name.to_string(),
            }
        })?;

        let (control_plane, workers) = extract_control_plane_machines(machines)?;
        let first = control_plane
            .into_iter()
            .next()
            .ok_or(ClusterClientError::NoControlPlane(0))?;
        Ok((cluster, first, workers))
    }
}
