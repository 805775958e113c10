//! Cluster client
//!
//! Typed access to the Cluster API kinds plus the waits a deployer needs
//! between steps: API listability, status population, namespace and
//! StatefulSet housekeeping. Deletion lives in `deletion.rs` and machine
//! creation in `machines.rs`.

use std::path::PathBuf;

use crds::{
    ApiEndpoint, CLUSTER_NAME_LABEL, Cluster, Machine, MachineClass, MachineDeployment, MachineSet,
};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClusterClientError, StoreError};
use crate::kinds::ClusterApiKind;
use crate::kubeconfig::{ContextOverrides, KubeconfigFile, kube_client_from_file};
use crate::kubectl::{CommandRunner, KubectlRunner, ManifestApplier};
use crate::machines::{MachineReadiness, node_ref_or_annotated};
use crate::owner::{ParentRef, filter_by_owner};
use crate::poll::poll_immediate;
use crate::provider_components::ProviderComponentsStore;
use crate::store::KubeObjectStore;
use crate::store_trait::ObjectStore;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Port assumed for endpoints given without one
pub const DEFAULT_API_SERVER_PORT: &str = "443";

/// Lifecycle client for Cluster API objects on one API server
pub struct ClusterClient<S: ObjectStore = KubeObjectStore, R: CommandRunner = KubectlRunner> {
    pub(crate) store: S,
    applier: ManifestApplier<R>,
    overrides: ContextOverrides,
    pub(crate) config: ClientConfig,
    pub(crate) machine_readiness: MachineReadiness,
    kubeconfig: Option<KubeconfigFile>,
}

impl<S: ObjectStore, R: CommandRunner> std::fmt::Debug for ClusterClient<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("overrides", &self.overrides)
            .field("config", &self.config)
            .field("kubeconfig", &self.kubeconfig)
            .finish_non_exhaustive()
    }
}

impl ClusterClient<KubeObjectStore, KubectlRunner> {
    /// Build a client from kubeconfig contents
    ///
    /// The contents are written to a temporary file that kubectl also uses;
    /// [`Self::close`] removes it.
    pub async fn from_kubeconfig(
        contents: &str,
        config: ClientConfig,
    ) -> Result<Self, ClusterClientError> {
        let file = KubeconfigFile::write_temporary(contents)?;
        match Self::connect(file.clone(), ContextOverrides::default(), config).await {
            Ok(client) => Ok(client),
            Err(e) => {
                if let Err(remove_err) = file.remove() {
                    debug!("Failed to remove temporary kubeconfig: {}", remove_err);
                }
                Err(e)
            }
        }
    }

    /// Build a client from an existing kubeconfig file, which is kept on close
    pub async fn from_kubeconfig_path(
        path: impl Into<PathBuf>,
        overrides: ContextOverrides,
        config: ClientConfig,
    ) -> Result<Self, ClusterClientError> {
        Self::connect(KubeconfigFile::existing(path), overrides, config).await
    }

    async fn connect(
        file: KubeconfigFile,
        overrides: ContextOverrides,
        config: ClientConfig,
    ) -> Result<Self, ClusterClientError> {
        let client = kube_client_from_file(file.path(), &overrides).await?;
        let applier = ManifestApplier::new(
            KubectlRunner::default(),
            Some(file.path().to_path_buf()),
            overrides.clone(),
            config.kubectl_apply,
        );
        let mut cluster_client =
            Self::new(KubeObjectStore::new(client), applier, overrides, config);
        cluster_client.kubeconfig = Some(file);
        Ok(cluster_client)
    }
}

impl<S: ObjectStore, R: CommandRunner> ClusterClient<S, R> {
    pub fn new(
        store: S,
        applier: ManifestApplier<R>,
        overrides: ContextOverrides,
        config: ClientConfig,
    ) -> Self {
        Self {
            store,
            applier,
            overrides,
            config,
            machine_readiness: node_ref_or_annotated,
            kubeconfig: None,
        }
    }

    /// Replace the predicate deciding when a created machine is ready
    pub fn with_machine_readiness(mut self, readiness: MachineReadiness) -> Self {
        self.machine_readiness = readiness;
        self
    }

    /// Provider components persisted in this cluster's ConfigMap
    pub fn provider_components(&self) -> ProviderComponentsStore<S>
    where
        S: Clone,
    {
        ProviderComponentsStore::from_config_map(self.store.clone())
    }

    /// Release the client, removing a kubeconfig file it created
    pub fn close(self) -> Result<(), ClusterClientError> {
        match &self.kubeconfig {
            Some(file) => file.remove(),
            None => Ok(()),
        }
    }

    /// Namespace override, or `default`
    pub fn get_context_namespace(&self) -> String {
        self.overrides
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    pub async fn apply(&self, manifest: &str) -> Result<(), ClusterClientError> {
        self.applier.apply(manifest).await
    }

    pub async fn delete(&self, manifest: &str) -> Result<(), ClusterClientError> {
        self.applier.delete(manifest).await
    }

    // Generic accessors

    /// Fetch one object; absent objects are [`ClusterClientError::NotFound`]
    pub async fn get<K: ClusterApiKind>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<K, ClusterClientError> {
        self.store.get::<K>(namespace, name).await.map_err(|e| {
            ClusterClientError::for_object(
                &K::kind(&()),
                namespace,
                name,
                format!("error getting {} {}/{}", K::kind(&()), namespace, name),
                e,
            )
        })
    }

    /// List objects; an empty namespace lists across all namespaces
    pub async fn list<K: ClusterApiKind>(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<K>, ClusterClientError> {
        let scope = (!namespace.is_empty()).then_some(namespace);
        self.store.list::<K>(scope, selector).await.map_err(|e| {
            ClusterClientError::remote(
                format!("error listing {} in namespace {:?}", K::PLURAL, namespace),
                e,
            )
        })
    }

    async fn create_in<K: ClusterApiKind>(
        &self,
        namespace: &str,
        mut object: K,
    ) -> Result<K, ClusterClientError> {
        object.meta_mut().namespace = Some(namespace.to_string());
        let name = object.name_any();
        debug!("Creating {} {}/{}", K::kind(&()), namespace, name);
        self.store.create(namespace, &object).await.map_err(|e| {
            ClusterClientError::remote(
                format!("error creating {} {}/{}", K::kind(&()), namespace, name),
                e,
            )
        })
    }

    /// Objects of kind `K` labelled with and owned by `cluster`
    async fn children_of_cluster<K: ClusterApiKind>(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<K>, ClusterClientError> {
        let selector = format!("{}={}", CLUSTER_NAME_LABEL, cluster.name_any());
        let namespace = cluster.namespace().unwrap_or_default();
        let labelled = self.list::<K>(&namespace, Some(&selector)).await?;
        Ok(filter_by_owner(&ParentRef::of(cluster), labelled))
    }

    /// Objects of kind `K` in the parent's namespace owned by the parent
    async fn children_of<K, P>(&self, parent: &P) -> Result<Vec<K>, ClusterClientError>
    where
        K: ClusterApiKind,
        P: ClusterApiKind,
    {
        let namespace = parent.namespace().unwrap_or_default();
        let candidates = self.list::<K>(&namespace, None).await?;
        Ok(filter_by_owner(&ParentRef::of(parent), candidates))
    }

    // Cluster

    /// The named cluster, or `None` if it does not exist
    pub async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Cluster>, ClusterClientError> {
        match self.get::<Cluster>(namespace, name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_clusters(&self, namespace: &str) -> Result<Vec<Cluster>, ClusterClientError> {
        self.list::<Cluster>(namespace, None).await
    }

    /// Create a cluster, in the context namespace if it names none
    pub async fn create_cluster_object(
        &self,
        cluster: Cluster,
    ) -> Result<Cluster, ClusterClientError> {
        let namespace = cluster
            .namespace()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.get_context_namespace());
        info!("Creating Cluster {}/{}", namespace, cluster.name_any());
        self.create_in(&namespace, cluster).await
    }

    /// Append `endpoint` (`host[:port]`, port 443 if omitted) to the cluster's API endpoints
    pub async fn update_cluster_object_endpoint(
        &self,
        endpoint: &str,
        name: &str,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        let api_endpoint = parse_api_endpoint(endpoint)?;
        let cluster = self.get_cluster(namespace, name).await?.ok_or_else(|| {
            ClusterClientError::NotFound {
                kind: "Cluster".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })?;

        let mut endpoints = cluster.status.map(|s| s.api_endpoints).unwrap_or_default();
        endpoints.push(api_endpoint);
        let context = format!("error updating endpoints of Cluster {namespace}/{name}");
        let endpoints = serde_json::to_value(&endpoints)
            .map_err(|e| ClusterClientError::remote(context.clone(), StoreError::Serialization(e)))?;

        info!("Setting API endpoint of Cluster {}/{} to {}", namespace, name, endpoint);
        self.store
            .patch_status::<Cluster>(namespace, name, json!({ "apiEndpoints": endpoints }))
            .await
            .map_err(|e| ClusterClientError::remote(context, e))?;
        Ok(())
    }

    // MachineClass

    pub async fn get_machine_classes(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineClass>, ClusterClientError> {
        self.list::<MachineClass>(namespace, None).await
    }

    /// Create a machine class, in the context namespace if it names none
    pub async fn create_machine_class(
        &self,
        class: MachineClass,
    ) -> Result<MachineClass, ClusterClientError> {
        let namespace = class
            .namespace()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.get_context_namespace());
        self.create_in(&namespace, class).await
    }

    /// Delete a machine class; absent classes are not an error
    pub async fn delete_machine_class(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterClientError> {
        match self.store.delete::<MachineClass>(namespace, name, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("MachineClass {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(ClusterClientError::remote(
                format!("error deleting MachineClass {namespace}/{name}"),
                e,
            )),
        }
    }

    // MachineDeployment

    pub async fn get_machine_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MachineDeployment, ClusterClientError> {
        self.get::<MachineDeployment>(namespace, name).await
    }

    pub async fn get_machine_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineDeployment>, ClusterClientError> {
        self.list::<MachineDeployment>(namespace, None).await
    }

    pub async fn get_machine_deployments_for_cluster(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<MachineDeployment>, ClusterClientError> {
        self.children_of_cluster(cluster).await
    }

    /// Create every deployment in order, stopping at the first failure
    pub async fn create_machine_deployments(
        &self,
        deployments: Vec<MachineDeployment>,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        for deployment in deployments {
            self.create_in(namespace, deployment).await?;
        }
        Ok(())
    }

    // MachineSet

    pub async fn get_machine_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MachineSet, ClusterClientError> {
        self.get::<MachineSet>(namespace, name).await
    }

    pub async fn get_machine_sets(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineSet>, ClusterClientError> {
        self.list::<MachineSet>(namespace, None).await
    }

    pub async fn get_machine_sets_for_cluster(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<MachineSet>, ClusterClientError> {
        self.children_of_cluster(cluster).await
    }

    pub async fn get_machine_sets_for_machine_deployment(
        &self,
        deployment: &MachineDeployment,
    ) -> Result<Vec<MachineSet>, ClusterClientError> {
        self.children_of(deployment).await
    }

    /// Create every set in order, stopping at the first failure
    pub async fn create_machine_sets(
        &self,
        sets: Vec<MachineSet>,
        namespace: &str,
    ) -> Result<(), ClusterClientError> {
        for set in sets {
            self.create_in(namespace, set).await?;
        }
        Ok(())
    }

    // Machine

    pub async fn get_machines(&self, namespace: &str) -> Result<Vec<Machine>, ClusterClientError> {
        self.list::<Machine>(namespace, None).await
    }

    pub async fn get_machines_for_cluster(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<Machine>, ClusterClientError> {
        self.children_of_cluster(cluster).await
    }

    pub async fn get_machines_for_machine_set(
        &self,
        set: &MachineSet,
    ) -> Result<Vec<Machine>, ClusterClientError> {
        self.children_of(set).await
    }

    // Waits

    /// Wait until Clusters can be listed
    pub async fn wait_for_cluster_api_ready(&self) -> Result<(), ClusterClientError> {
        info!("Waiting for the Cluster API to become ready");
        poll_immediate(self.config.resource_ready, "Cluster API to be listable", || async move {
            match self.store.list::<Cluster>(None, None).await {
                Ok(_) => Ok(true),
                Err(e) => {
                    debug!("Cluster API not ready yet: {}", e);
                    Ok(false)
                }
            }
        })
        .await
    }

    /// Wait until every Cluster, MachineDeployment, MachineSet and Machine
    /// has had its status populated
    pub async fn wait_for_resource_statuses(&self) -> Result<(), ClusterClientError> {
        info!("Waiting for Cluster API objects to report status");
        poll_immediate(
            self.config.resource_ready,
            "Cluster API objects to report status",
            || async move {
                let (clusters, deployments, sets, machines) = futures::join!(
                    self.all_settled::<Cluster>(),
                    self.all_settled::<MachineDeployment>(),
                    self.all_settled::<MachineSet>(),
                    self.all_settled::<Machine>(),
                );
                Ok(clusters && deployments && sets && machines)
            },
        )
        .await
    }

    /// List errors count as "not yet"
    async fn all_settled<K: ClusterApiKind>(&self) -> bool {
        let objects = match self.store.list::<K>(None, None).await {
            Ok(objects) => objects,
            Err(e) => {
                debug!("Unable to list {}: {}", K::PLURAL, e);
                return false;
            }
        };
        match objects.iter().find(|o| !o.status_settled()) {
            Some(unsettled) => {
                debug!(
                    "{} {}/{} has no status yet",
                    K::kind(&()),
                    unsettled.namespace().unwrap_or_default(),
                    unsettled.name_any()
                );
                false
            }
            None => true,
        }
    }

    // Namespaces and StatefulSets

    /// Create `namespace` unless it already exists
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<(), ClusterClientError> {
        match self.store.create_namespace(namespace).await {
            Ok(()) => {
                info!("Created namespace {}", namespace);
                Ok(())
            }
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => Err(ClusterClientError::remote(
                format!("error creating namespace {namespace:?}"),
                e,
            )),
        }
    }

    /// Delete `namespace`; `default` and absent namespaces are left alone
    pub async fn delete_namespace(&self, namespace: &str) -> Result<(), ClusterClientError> {
        if namespace == DEFAULT_NAMESPACE {
            return Ok(());
        }
        match self.store.delete_namespace(namespace).await {
            Ok(()) => {
                info!("Deleted namespace {}", namespace);
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ClusterClientError::remote(
                format!("error deleting namespace {namespace:?}"),
                e,
            )),
        }
    }

    /// Set a StatefulSet's replica count
    pub async fn scale_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterClientError> {
        let context = format!("error scaling StatefulSet {namespace}/{name}");
        let mut stateful_set = self
            .store
            .get::<StatefulSet>(namespace, name)
            .await
            .map_err(|e| {
                ClusterClientError::for_object("StatefulSet", namespace, name, context.clone(), e)
            })?;

        stateful_set.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        info!("Scaling StatefulSet {}/{} to {}", namespace, name, replicas);
        self.store
            .update(namespace, &stateful_set)
            .await
            .map_err(|e| ClusterClientError::remote(context, e))?;
        Ok(())
    }
}

/// Parse `host[:port]` into an endpoint; the port defaults to 443
pub fn parse_api_endpoint(endpoint: &str) -> Result<ApiEndpoint, ClusterClientError> {
    let (host, port) = split_host_port(endpoint)
        .unwrap_or_else(|| (endpoint.to_string(), DEFAULT_API_SERVER_PORT.to_string()));
    let port_number = port
        .parse::<i32>()
        .map_err(|source| ClusterClientError::InvalidEndpoint { port, source })?;
    Ok(ApiEndpoint::new(host, port_number))
}

/// `host:port` or `[v6-host]:port`; `None` when there is no port part
fn split_host_port(endpoint: &str) -> Option<(String, String)> {
    if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        return Some((host.to_string(), port.to_string()));
    }
    let (host, port) = endpoint.split_once(':')?;
    if port.contains(':') {
        return None;
    }
    Some((host.to_string(), port.to_string()))
}
