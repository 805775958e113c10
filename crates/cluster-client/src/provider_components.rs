//! Provider components store
//!
//! Persists the provider components manifest used to bootstrap a cluster,
//! either to an explicit file or to the `clusterctl` ConfigMap in the
//! `default` namespace.

use std::collections::BTreeMap;
use std::path::PathBuf;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use tracing::{debug, info};

use crate::error::ClusterClientError;
use crate::store::KubeObjectStore;
use crate::store_trait::ObjectStore;

/// ConfigMap holding the provider components
pub const CONFIG_MAP_NAME: &str = "clusterctl";

/// Namespace of [`CONFIG_MAP_NAME`]
pub const CONFIG_MAP_NAMESPACE: &str = "default";

/// Data key of the provider components in the ConfigMap
pub const PROVIDER_COMPONENTS_KEY: &str = "provider-components";

#[derive(Debug, Clone)]
enum Backend<S> {
    File(PathBuf),
    ConfigMap(S),
}

/// Loads and saves the provider components string
#[derive(Debug, Clone)]
pub struct ProviderComponentsStore<S: ObjectStore = KubeObjectStore> {
    backend: Backend<S>,
}

impl<S: ObjectStore> ProviderComponentsStore<S> {
    /// Store the components in a file at `path`
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
        }
    }

    /// Store the components in the `clusterctl` ConfigMap
    pub fn from_config_map(store: S) -> Self {
        Self {
            backend: Backend::ConfigMap(store),
        }
    }

    pub async fn save(&self, components: &str) -> Result<(), ClusterClientError> {
        match &self.backend {
            Backend::File(path) => {
                tokio::fs::write(path, components)
                    .await
                    .map_err(|source| ClusterClientError::Io {
                        path: path.clone(),
                        source,
                    })?;
                debug!("Saved provider components to {}", path.display());
                Ok(())
            }
            Backend::ConfigMap(store) => save_to_config_map(store, components).await,
        }
    }

    pub async fn load(&self) -> Result<String, ClusterClientError> {
        match &self.backend {
            Backend::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ClusterClientError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            Backend::ConfigMap(store) => load_from_config_map(store).await,
        }
    }
}

async fn save_to_config_map<S: ObjectStore>(
    store: &S,
    components: &str,
) -> Result<(), ClusterClientError> {
    let existing = match store.get::<ConfigMap>(CONFIG_MAP_NAMESPACE, CONFIG_MAP_NAME).await {
        Ok(config_map) => Some(config_map),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            return Err(ClusterClientError::remote(
                format!("unable to get configmap {CONFIG_MAP_NAME:?}"),
                e,
            ));
        }
    };

    match existing {
        Some(mut config_map) => {
            config_map
                .data
                .get_or_insert_with(BTreeMap::new)
                .insert(PROVIDER_COMPONENTS_KEY.to_string(), components.to_string());
            store
                .update(CONFIG_MAP_NAMESPACE, &config_map)
                .await
                .map_err(|e| {
                    ClusterClientError::remote(
                        format!("error updating config map {CONFIG_MAP_NAME:?}"),
                        e,
                    )
                })?;
            info!("Updated provider components in configmap {}", CONFIG_MAP_NAME);
        }
        None => {
            let config_map = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(CONFIG_MAP_NAME.to_string()),
                    namespace: Some(CONFIG_MAP_NAMESPACE.to_string()),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    PROVIDER_COMPONENTS_KEY.to_string(),
                    components.to_string(),
                )])),
                ..Default::default()
            };
            store
                .create(CONFIG_MAP_NAMESPACE, &config_map)
                .await
                .map_err(|e| {
                    ClusterClientError::remote(
                        format!("error creating config map {CONFIG_MAP_NAME:?}"),
                        e,
                    )
                })?;
            info!("Created configmap {} with provider components", CONFIG_MAP_NAME);
        }
    }
    Ok(())
}

async fn load_from_config_map<S: ObjectStore>(store: &S) -> Result<String, ClusterClientError> {
    let config_map = store
        .get::<ConfigMap>(CONFIG_MAP_NAMESPACE, CONFIG_MAP_NAME)
        .await
        .map_err(|e| {
            ClusterClientError::remote(format!("error getting configmap named {CONFIG_MAP_NAME:?}"), e)
        })?;

    config_map
        .data
        .and_then(|mut data| data.remove(PROVIDER_COMPONENTS_KEY))
        .ok_or_else(|| {
            ClusterClientError::ProviderComponents(format!(
                "configmap {CONFIG_MAP_NAME:?} does not contain the provider components key {PROVIDER_COMPONENTS_KEY:?}"
            ))
        })
}
