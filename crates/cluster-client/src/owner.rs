//! Ownership filter
//!
//! Children are matched to a parent by an owner reference naming the
//! parent's exact kind and name. Pure; never calls the store.

use kube::{Resource, ResourceExt};

/// The parent side of an owner relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub kind: String,
    pub name: String,
}

impl ParentRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parent reference for a typed object
    pub fn of<K: Resource<DynamicType = ()>>(parent: &K) -> Self {
        Self::new(K::kind(&()), parent.name_any())
    }
}

/// True when one of `child`'s owner references names `parent`
pub fn is_owned_by<K: Resource>(child: &K, parent: &ParentRef) -> bool {
    child
        .owner_references()
        .iter()
        .any(|owner| owner.kind == parent.kind && owner.name == parent.name)
}

/// Keep the candidates owned by `parent`, in input order
pub fn filter_by_owner<K, I>(parent: &ParentRef, candidates: I) -> Vec<K>
where
    K: Resource,
    I: IntoIterator<Item = K>,
{
    candidates
        .into_iter()
        .filter(|candidate| is_owned_by(candidate, parent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{Cluster, ClusterSpec, MachineDeployment};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn owned(name: &str, owners: &[(&str, &str)]) -> MachineDeployment {
        let mut md = MachineDeployment::default();
        md.metadata.name = Some(name.to_string());
        md.metadata.owner_references = Some(
            owners
                .iter()
                .map(|(kind, owner)| OwnerReference {
                    api_version: "cluster.k8s.io/v1alpha1".to_string(),
                    kind: (*kind).to_string(),
                    name: (*owner).to_string(),
                    uid: format!("uid-{owner}"),
                    ..Default::default()
                })
                .collect(),
        );
        md
    }

    #[test]
    fn returns_exactly_the_owned_subset() {
        let parent = ParentRef::of(&Cluster::new("alpha", ClusterSpec::default()));
        let candidates = vec![
            owned("a", &[("Cluster", "alpha")]),
            owned("b", &[("Cluster", "alphabet")]),
            owned("c", &[("MachineSet", "alpha")]),
            owned("d", &[("Cluster", "beta"), ("Cluster", "alpha")]),
            owned("e", &[]),
        ];

        let names: Vec<String> = filter_by_owner(&parent, candidates)
            .iter()
            .map(ResourceExt::name_any)
            .collect();
        assert_eq!(names, vec!["a", "d"]);
    }

    #[test]
    fn no_candidates_is_empty_not_error() {
        let parent = ParentRef::new("Cluster", "alpha");
        assert!(filter_by_owner::<MachineDeployment, _>(&parent, Vec::new()).is_empty());
    }

    #[test]
    fn kind_comes_from_the_type() {
        let parent = ParentRef::of(&Cluster::new("alpha", ClusterSpec::default()));
        assert_eq!(parent, ParentRef::new("Cluster", "alpha"));
    }
}
