//! Prints the CRD manifests for every kind as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crds.yaml`

use crds::{
    Cluster, ClusterTemplate, KubeadmControlPlaneTemplate, Machine, MachineClass,
    MachineDeployment, MachineDeploymentTemplate, MachineSet,
};
use kube::CustomResourceExt;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let crds = vec![
        Cluster::crd(),
        MachineClass::crd()?,
        MachineDeployment::crd(),
        MachineSet::crd(),
        Machine::crd(),
        ClusterTemplate::crd(),
        MachineDeploymentTemplate::crd(),
        KubeadmControlPlaneTemplate::crd(),
    ];

    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
