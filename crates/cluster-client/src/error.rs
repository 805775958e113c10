//! Cluster client errors

use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from a single round trip to the object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API / transport error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other rejection by the store
    #[error("Store error: {0}")]
    Api(String),
}

impl StoreError {
    /// The object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// The object already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Errors surfaced by [`crate::ClusterClient`]
#[derive(Debug, Error)]
pub enum ClusterClientError {
    /// Named object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace it was looked up in
        namespace: String,
        /// Name it was looked up by
        name: String,
    },

    /// Store call failed
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: StoreError,
    },

    /// Poll budget exhausted
    #[error("timed out after {timeout:?} waiting for {condition}")]
    Timeout { condition: String, timeout: Duration },

    /// kubectl failed with a non-retryable error
    #[error("couldn't kubectl {verb}, output: {output}")]
    Manifest { verb: String, output: String },

    /// kubectl could not be started
    #[error("failed to run kubectl: {0}")]
    Command(#[source] std::io::Error),

    #[error("invalid port {port:?} in cluster endpoint")]
    InvalidEndpoint {
        port: String,
        #[source]
        source: ParseIntError,
    },

    #[error("expected one or more control plane machines, got: {0}")]
    NoControlPlane(usize),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provider components: {0}")]
    ProviderComponents(String),
}

impl ClusterClientError {
    /// Wrap a store error with operation context
    pub fn remote(context: impl Into<String>, source: StoreError) -> Self {
        ClusterClientError::Remote {
            context: context.into(),
            source,
        }
    }

    /// Like [`Self::remote`], but a store `NotFound` becomes [`Self::NotFound`]
    pub fn for_object(
        kind: &str,
        namespace: &str,
        name: &str,
        context: impl Into<String>,
        source: StoreError,
    ) -> Self {
        if source.is_not_found() {
            return ClusterClientError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            };
        }
        Self::remote(context, source)
    }

    /// A missing object, directly or as the cause of a store failure
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterClientError::NotFound { .. } => true,
            ClusterClientError::Remote { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// A poll budget ran out
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClusterClientError::Timeout { .. })
    }
}
