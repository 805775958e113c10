//! Experimental template kinds
//!
//! Templates hold a cloneable spec for creating identically configured
//! clusters, machine deployments and control planes.

pub mod cluster_template;
pub mod kubeadm_control_plane_template;
pub mod machine_deployment_template;

pub use cluster_template::*;
pub use kubeadm_control_plane_template::*;
pub use machine_deployment_template::*;
