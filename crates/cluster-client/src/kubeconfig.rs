//! Kubeconfig handling
//!
//! A client built from a kubeconfig string writes it to a temporary file
//! (kubectl needs a path) and removes the file on close.

use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ClusterClientError;

/// Kubeconfig parts selected explicitly instead of from the current context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOverrides {
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    pub user: Option<String>,
}

/// A kubeconfig file on disk, optionally owned by the client
#[derive(Debug, Clone)]
pub struct KubeconfigFile {
    path: PathBuf,
    temporary: bool,
}

impl KubeconfigFile {
    /// Use an existing file; it is left in place on [`Self::remove`]
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Write `contents` to a new file in the system temp directory
    pub fn write_temporary(contents: &str) -> Result<Self, ClusterClientError> {
        let path = std::env::temp_dir().join(format!("kubeconfig-{}", Uuid::new_v4()));
        std::fs::write(&path, contents).map_err(|source| ClusterClientError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote kubeconfig to {}", path.display());
        Ok(Self {
            path,
            temporary: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Delete the file if this client created it
    pub fn remove(&self) -> Result<(), ClusterClientError> {
        if !self.temporary {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ClusterClientError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Build a kube client from a kubeconfig file and context overrides
pub async fn kube_client_from_file(
    path: &Path,
    overrides: &ContextOverrides,
) -> Result<Client, ClusterClientError> {
    // Configure rustls crypto provider (use ring for compatibility)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    let kubeconfig = Kubeconfig::read_from(path)
        .map_err(|e| ClusterClientError::Kubeconfig(format!("reading {}: {}", path.display(), e)))?;
    let options = KubeConfigOptions {
        context: None,
        cluster: overrides.cluster.clone(),
        user: overrides.user.clone(),
    };
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| ClusterClientError::Kubeconfig(e.to_string()))?;
    if let Some(namespace) = overrides.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        config.default_namespace = namespace.to_string();
    }

    Client::try_from(config).map_err(|e| {
        warn!("Failed to create Kubernetes client: {}", e);
        ClusterClientError::Kubeconfig(e.to_string())
    })
}
