//! Unit tests for concurrent machine creation and control-plane lookups

#[cfg(test)]
mod tests {
    use crate::ClusterClientError;
    use crate::machines::{extract_control_plane_machines, has_node_ref};
    use crate::mock::{MockObjectStore, Op, StoreCall};
    use crate::test_utils::*;
    use crds::*;
    use kube::ResourceExt;
    use serde_json::{Value, json};

    fn annotate_on_create(store: &MockObjectStore) {
        store.on_create("Machine", |value: &mut Value| {
            value["metadata"]["annotations"] = json!({"cluster.k8s.io/instance": "i-0123"});
        });
    }

    fn machine_creates(store: &MockObjectStore) -> Vec<String> {
        store
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Create { kind, name, .. } if kind == "Machine" => Some(name),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_machines_all_ready() {
        // Setup
        let store = MockObjectStore::new();
        annotate_on_create(&store);
        let client = create_test_client(store.clone());
        let machines = vec![
            create_test_machine("", "m1", Some("1.30.0")),
            create_test_machine("", "m2", None),
            create_test_machine("", "m3", None),
        ];

        // Execute
        client.create_machines(machines, "default").await.unwrap();

        // Assert
        assert_eq!(store.count::<Machine>(), 3);
        let stored = store.object::<Machine>("default", "m2").unwrap();
        assert_eq!(stored.namespace().as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_create_machines_attempts_all_and_returns_failure() {
        // Setup: m2 is rejected, the rest become ready
        let store = MockObjectStore::new();
        annotate_on_create(&store);
        store.fail_on(Op::Create, "Machine", Some("m2"), "quota exceeded");
        let client = create_test_client(store.clone());
        let machines = (1..=4)
            .map(|i| create_test_machine("", &format!("m{i}"), None))
            .collect();

        // Execute
        let err = client.create_machines(machines, "default").await.unwrap_err();

        // Assert: every create was attempted despite the failure
        let mut attempted = machine_creates(&store);
        attempted.sort();
        assert_eq!(attempted, vec!["m1", "m2", "m3", "m4"]);
        assert_eq!(store.count::<Machine>(), 3);
        assert!(err.to_string().contains("Machine default/m2"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_create_machines_times_out_without_readiness() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());

        let err = client
            .create_machines(vec![create_test_machine("", "m1", None)], "default")
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("Machine default/m1"));
        // The machine was created; only readiness failed.
        assert_eq!(store.count::<Machine>(), 1);
    }

    #[tokio::test]
    async fn test_create_machines_with_strict_readiness() {
        // Annotations alone do not satisfy the node-ref predicate
        let store = MockObjectStore::new();
        annotate_on_create(&store);
        let client = create_test_client(store.clone()).with_machine_readiness(has_node_ref);

        let err = client
            .create_machines(vec![create_test_machine("", "m1", None)], "default")
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // With a node reference the same predicate passes
        let store = MockObjectStore::new();
        store.on_create("Machine", |value: &mut Value| {
            value["status"] = json!({"nodeRef": {"kind": "Node", "name": "node-1"}});
        });
        let client = create_test_client(store).with_machine_readiness(has_node_ref);
        client
            .create_machines(vec![create_test_machine("", "m1", None)], "default")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_no_machines() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());

        client.create_machines(Vec::new(), "default").await.unwrap();

        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_extract_control_plane_machines() {
        let machines = vec![
            create_test_machine("default", "worker-1", None),
            create_test_machine("default", "cp-1", Some("1.30.0")),
            create_test_machine("default", "worker-2", None),
            create_test_machine("default", "cp-2", Some("1.30.0")),
        ];

        let (control_plane, workers) = extract_control_plane_machines(machines).unwrap();

        let names = |ms: &[Machine]| ms.iter().map(ResourceExt::name_any).collect::<Vec<_>>();
        assert_eq!(names(&control_plane), vec!["cp-1", "cp-2"]);
        assert_eq!(names(&workers), vec!["worker-1", "worker-2"]);
    }

    #[test]
    fn test_extract_control_plane_machines_requires_one() {
        let machines = vec![create_test_machine("default", "worker-1", None)];

        let err = extract_control_plane_machines(machines).unwrap_err();

        assert!(matches!(err, ClusterClientError::NoControlPlane(0)));
        assert_eq!(
            err.to_string(),
            "expected one or more control plane machines, got: 0"
        );
    }

    #[test]
    fn test_empty_control_plane_version_is_a_worker() {
        let machines = vec![create_test_machine("default", "m", Some(""))];
        assert!(extract_control_plane_machines(machines).is_err());
    }

    #[tokio::test]
    async fn test_get_cluster_api_object() {
        let store = MockObjectStore::new();
        store.insert(&create_test_cluster("default", "alpha"));
        store.insert(&create_test_machine("default", "cp-1", Some("1.30.0")));
        store.insert(&create_test_machine("default", "worker-1", None));
        store.insert(&create_test_machine("default", "worker-2", None));
        let client = create_test_client(store);

        let (cluster, control_plane, workers) =
            client.get_cluster_api_object("default", "alpha").await.unwrap();

        assert_eq!(cluster.name_any(), "alpha");
        assert_eq!(control_plane.name_any(), "cp-1");
        assert_eq!(workers.len(), 2);
    }

    #[tokio::test]
    async fn test_get_cluster_api_object_missing_cluster() {
        let store = MockObjectStore::new();
        store.insert(&create_test_machine("default", "cp-1", Some("1.30.0")));
        let client = create_test_client(store);

        let err = client.get_cluster_api_object("default", "ghost").await.unwrap_err();

        assert!(matches!(err, ClusterClientError::NotFound { ref name, .. } if name == "ghost"));
    }

    #[tokio::test]
    async fn test_get_cluster_api_object_without_control_plane() {
        let store = MockObjectStore::new();
        store.insert(&create_test_cluster("default", "alpha"));
        store.insert(&create_test_machine("default", "worker-1", None));
        let client = create_test_client(store);

        let err = client.get_cluster_api_object("default", "alpha").await.unwrap_err();

        assert!(matches!(err, ClusterClientError::NoControlPlane(0)));
    }
}
