//! Cluster API lifecycle client
//!
//! Creates, deletes and waits on Cluster API objects against a remote API
//! server. Every wait is a bounded poll; the budgets live in
//! [`ClientConfig`].
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClientConfig, ClusterClient, ContextOverrides};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClusterClient::from_kubeconfig_path(
//!     "/etc/bootstrap/kubeconfig",
//!     ContextOverrides::default(),
//!     ClientConfig::default(),
//! )
//! .await?;
//!
//! client.apply(&std::fs::read_to_string("provider-components.yaml")?).await?;
//! client.wait_for_cluster_api_ready().await?;
//! client.wait_for_resource_statuses().await?;
//!
//! client.delete_machines("").await?;
//! client.delete_clusters("").await?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Object access**: typed get/list/create/delete for the five core kinds
//! - **Readiness**: API listability, status population, per-machine readiness
//! - **Deletion**: per-namespace collection delete with an emptiness wait, force delete
//! - **Machines**: concurrent creation with first-error reporting
//! - **kubectl**: manifest apply with transient-failure retries

pub mod client;
pub mod config;
pub mod deletion;
pub mod error;
pub mod kinds;
pub mod kubeconfig;
pub mod kubectl;
pub mod machines;
pub mod owner;
pub mod poll;
pub mod provider_components;
pub mod store;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(test)]
mod test_utils;

mod client_test;
mod machines_test;

pub use client::ClusterClient;
pub use config::ClientConfig;
pub use error::{ClusterClientError, StoreError};
pub use kinds::ClusterApiKind;
pub use kubeconfig::ContextOverrides;
pub use kubectl::{CommandRunner, KubectlRunner, ManifestApplier};
pub use machines::{MachineReadiness, extract_control_plane_machines};
pub use owner::{ParentRef, filter_by_owner};
pub use poll::{PollBudget, poll_immediate};
pub use provider_components::ProviderComponentsStore;
pub use store::KubeObjectStore;
pub use store_trait::{ObjectStore, StoreObject};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockObjectStore;
