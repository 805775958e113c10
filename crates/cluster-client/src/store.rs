//! Kubernetes-backed object store

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{
    Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams, PropagationPolicy,
};
use kube::Client;
use serde_json::json;
use tracing::debug;

use crate::error::StoreError;
use crate::store_trait::{ObjectStore, StoreObject};

/// [`ObjectStore`] backed by a `kube::Client`
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl std::fmt::Debug for KubeObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore").finish_non_exhaustive()
    }
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn namespaced<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn describe<K: StoreObject>(namespace: &str, name: &str) -> String {
    format!("{} {}/{}", K::kind(&()), namespace, name)
}

/// 404 and 409 become typed store errors; everything else stays a kube error
fn classify(err: kube::Error, what: String) -> StoreError {
    match err {
        kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound(what),
        kube::Error::Api(ref status) if status.code == 409 => StoreError::AlreadyExists(what),
        other => StoreError::Kube(other),
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.namespaced::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| classify(e, describe::<K>(namespace, name)))
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = match namespace {
            Some(ns) => self.namespaced(ns),
            None => Api::all(self.client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(selector) = selector {
            params = params.labels(selector);
        }
        debug!(
            "Listing {} in {} (selector: {:?})",
            K::kind(&()),
            namespace.unwrap_or("all namespaces"),
            selector
        );
        let list = api.list(&params).await.map_err(StoreError::Kube)?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.meta().name.clone().unwrap_or_default();
        self.namespaced::<K>(namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify(e, describe::<K>(namespace, &name)))
    }

    async fn update<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| StoreError::Api(format!("{} without a name", K::kind(&()))))?;
        self.namespaced::<K>(namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| classify(e, describe::<K>(namespace, &name)))
    }

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<K, StoreError> {
        let status_patch = json!({ "status": status });
        let pp = PatchParams::default();
        self.namespaced::<K>(namespace)
            .patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await
            .map_err(|e| classify(e, describe::<K>(namespace, name)))
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        propagation: Option<PropagationPolicy>,
    ) -> Result<(), StoreError> {
        let dp = DeleteParams {
            propagation_policy: propagation,
            ..Default::default()
        };
        self.namespaced::<K>(namespace)
            .delete(name, &dp)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, describe::<K>(namespace, name)))
    }

    async fn delete_collection<K: StoreObject>(&self, namespace: &str) -> Result<(), StoreError> {
        self.namespaced::<K>(namespace)
            .delete_collection(&DeleteParams::default(), &ListParams::default())
            .await
            .map(|_| ())
            .map_err(StoreError::Kube)
    }

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        Api::<Namespace>::all(self.client.clone())
            .create(&PostParams::default(), &namespace)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, format!("Namespace {name}")))
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        Api::<Namespace>::all(self.client.clone())
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, format!("Namespace {name}")))
    }
}
