//! ObjectStore trait for mocking
//!
//! This trait abstracts the Kubernetes API so the coordination logic can be
//! unit tested against an in-memory store. [`crate::KubeObjectStore`] is the
//! real implementation; tests use [`crate::mock::MockObjectStore`].

use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use kube::api::PropagationPolicy;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Namespaced object types the store can handle
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoreObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Trait for object store operations
///
/// Every method is exactly one round trip. All async methods must be `Send`
/// to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// `namespace: None` lists across all namespaces
    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError>;

    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace the whole object (including metadata such as finalizers)
    async fn update<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Merge-patch the status subresource with `status`
    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        propagation: Option<PropagationPolicy>,
    ) -> Result<(), StoreError>;

    /// Delete every object of the kind in `namespace`
    async fn delete_collection<K: StoreObject>(&self, namespace: &str) -> Result<(), StoreError>;

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError>;
}
