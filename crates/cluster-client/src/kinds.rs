//! Kind descriptors for the Cluster API kinds the client manages
//!
//! One trait instead of five copies of every accessor: the generic
//! operations on [`crate::ClusterClient`] are parameterized by it.

use crds::{Cluster, Machine, MachineClass, MachineDeployment, MachineSet};

use crate::store_trait::StoreObject;

/// A Cluster API kind the client can list, delete and wait on
pub trait ClusterApiKind: StoreObject {
    /// Plural name used in log lines and error context
    const PLURAL: &'static str;

    /// True once the controller has populated the status far enough for
    /// [`crate::ClusterClient::wait_for_resource_statuses`]
    fn status_settled(&self) -> bool;
}

impl ClusterApiKind for Cluster {
    const PLURAL: &'static str = "Clusters";

    fn status_settled(&self) -> bool {
        self.has_provider_status()
    }
}

impl ClusterApiKind for MachineDeployment {
    const PLURAL: &'static str = "MachineDeployments";

    fn status_settled(&self) -> bool {
        self.status.as_ref().is_some_and(|s| !s.is_empty())
    }
}

impl ClusterApiKind for MachineSet {
    const PLURAL: &'static str = "MachineSets";

    fn status_settled(&self) -> bool {
        self.status.as_ref().is_some_and(|s| !s.is_empty())
    }
}

impl ClusterApiKind for Machine {
    const PLURAL: &'static str = "Machines";

    fn status_settled(&self) -> bool {
        self.has_provider_status()
    }
}

impl ClusterApiKind for MachineClass {
    const PLURAL: &'static str = "MachineClasses";

    // No status subresource.
    fn status_settled(&self) -> bool {
        true
    }
}
