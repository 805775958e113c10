//! Cluster API CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Cluster API kinds the
//! cluster client coordinates, plus the experimental template kinds and
//! their admission validators.

pub mod cluster;
pub mod machine;
pub mod machine_class;
pub mod machine_deployment;
pub mod machine_set;
pub mod references;
pub mod templates;
pub mod validation;

pub use cluster::*;
pub use machine::*;
pub use machine_class::*;
pub use machine_deployment::*;
pub use machine_set::*;
pub use references::*;
pub use templates::*;
pub use validation::*;

/// API group of the core Cluster API kinds
pub const GROUP: &str = "cluster.k8s.io";

/// API version of the core Cluster API kinds
pub const VERSION: &str = "v1alpha1";

/// Label linking MachineDeployments, MachineSets and Machines to their Cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.k8s.io/cluster-name";
