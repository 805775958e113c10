//! Deletion coordinator
//!
//! Collection deletes are issued one namespace at a time, each followed by a
//! wait until that namespace has no objects of the kind left. Force delete
//! strips finalizers from one object and deletes it with foreground
//! propagation.

use std::collections::BTreeSet;

use crds::{Cluster, Machine, MachineClass, MachineDeployment, MachineSet};
use kube::api::PropagationPolicy;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::error::ClusterClientError;
use crate::kinds::ClusterApiKind;
use crate::kubectl::CommandRunner;
use crate::poll::poll_immediate;
use crate::store_trait::ObjectStore;

impl<S: ObjectStore, R: CommandRunner> ClusterClient<S, R> {
    /// Delete every object of kind `K` and wait until they are gone
    ///
    /// An empty `namespace` means every namespace that currently holds an
    /// object of the kind, processed in sorted order. The first failing
    /// namespace ends the operation.
    pub async fn delete_all<K: ClusterApiKind>(
        &self,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        let namespaces: BTreeSet<String> = if namespace.is_empty() {
            self.list::<K>("", None)
                .await?
                .iter()
                .filter_map(ResourceExt::namespace)
                .collect()
        } else {
            BTreeSet::from([namespace.to_string()])
        };

        if namespaces.is_empty() {
            debug!("No {} to delete", K::PLURAL);
        }

        for ns in namespaces {
            info!("Deleting {} in namespace {:?}", K::PLURAL, ns);
            self.store.delete_collection::<K>(&ns).await.map_err(|e| {
                ClusterClientError::remote(
                    format!("error deleting {} in namespace {:?}", K::PLURAL, ns),
                    e,
                )
            })?;
            self.wait_for_kind_deleted::<K>(&ns).await?;
        }
        Ok(())
    }

    /// List errors count as "not yet"
    async fn wait_for_kind_deleted<K: ClusterApiKind>(
        &self,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        let budget = self.config.delete_budget_for(&K::kind(&()));
        let condition = format!("{} in namespace {:?} to be deleted", K::PLURAL, namespace);
        poll_immediate(budget, &condition, || async move {
            match self.store.list::<K>(Some(namespace), None).await {
                Ok(remaining) if remaining.is_empty() => Ok(true),
                Ok(remaining) => {
                    debug!("{} {} left in {:?}", remaining.len(), K::PLURAL, namespace);
                    Ok(false)
                }
                Err(e) => {
                    debug!("Unable to list {} in {:?}: {}", K::PLURAL, namespace, e);
                    Ok(false)
                }
            }
        })
        .await
    }

    pub async fn delete_clusters(&self, namespace: &str) -> Result<(), ClusterClientError> {
        self.delete_all::<Cluster>(namespace).await
    }

    pub async fn delete_machine_classes(&self, namespace: &str) -> Result<(), ClusterClientError> {
        self.delete_all::<MachineClass>(namespace).await
    }

    pub async fn delete_machine_deployments(
        &self,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        self.delete_all::<MachineDeployment>(namespace).await
    }

    pub async fn delete_machine_sets(&self, namespace: &str) -> Result<(), ClusterClientError> {
        self.delete_all::<MachineSet>(namespace).await
    }

    pub async fn delete_machines(&self, namespace: &str) -> Result<(), ClusterClientError> {
        self.delete_all::<Machine>(namespace).await
    }

    /// Clear the object's finalizers, then delete it with foreground propagation
    ///
    /// An absent object is [`ClusterClientError::NotFound`] and nothing is
    /// updated or deleted.
    pub async fn force_delete<K: ClusterApiKind>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        let kind = K::kind(&());
        let mut object = self.get::<K>(namespace, name).await?;

        object.meta_mut().finalizers = Some(Vec::new());
        self.store.update(namespace, &object).await.map_err(|e| {
            ClusterClientError::for_object(
                &kind,
                namespace,
                name,
                format!("error removing finalizers on {kind} {namespace}/{name}"),
                e,
            )
        })?;

        info!("Force deleting {} {}/{}", kind, namespace, name);
        match self
            .store
            .delete::<K>(namespace, name, Some(PropagationPolicy::Foreground))
            .await
        {
            Ok(()) => Ok(()),
            // Already removed once its finalizers were cleared.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ClusterClientError::remote(
                format!("error deleting {kind} {namespace}/{name}"),
                e,
            )),
        }
    }

    pub async fn force_delete_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        self.force_delete::<Cluster>(namespace, name).await
    }

    pub async fn force_delete_machine_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        self.force_delete::<MachineDeployment>(namespace, name).await
    }

    pub async fn force_delete_machine_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        self.force_delete::<MachineSet>(namespace, name).await
    }

    pub async fn force_delete_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        self.force_delete::<Machine>(namespace, name).await
    }
}
