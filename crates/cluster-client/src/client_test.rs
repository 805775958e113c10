//! Unit tests for the ClusterClient accessors, waits and housekeeping

#[cfg(test)]
mod tests {
    use crate::ClusterClientError;
    use crate::client::DEFAULT_NAMESPACE;
    use crate::mock::{MockObjectStore, Op, StoreCall};
    use crate::test_utils::*;
    use crds::*;
    use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
    use kube::ResourceExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_cluster_absent_is_none() {
        let client = create_test_client(MockObjectStore::new());

        let cluster = client.get_cluster("default", "missing").await.unwrap();

        assert!(cluster.is_none());
    }

    #[tokio::test]
    async fn test_get_cluster_remote_error_is_surfaced() {
        let store = MockObjectStore::new();
        store.fail_on(Op::Get, "Cluster", None, "etcdserver: request timed out");
        let client = create_test_client(store);

        let err = client.get_cluster("default", "alpha").await.unwrap_err();

        assert!(matches!(err, ClusterClientError::Remote { .. }));
        assert!(err.to_string().contains("request timed out"));
    }

    #[tokio::test]
    async fn test_create_cluster_defaults_to_context_namespace() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());
        let mut cluster = create_test_cluster("", "alpha");
        cluster.metadata.namespace = None;

        let created = client.create_cluster_object(cluster).await.unwrap();

        assert_eq!(created.namespace().as_deref(), Some(DEFAULT_NAMESPACE));
        assert!(store.object::<Cluster>("default", "alpha").is_some());
        assert!(created.uid().is_some());
    }

    #[tokio::test]
    async fn test_create_cluster_in_missing_namespace_fails() {
        let client = create_test_client(MockObjectStore::new());

        let err = client
            .create_cluster_object(create_test_cluster("nowhere", "alpha"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterClientError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_children_require_label_and_owner() {
        let store = MockObjectStore::new();
        let cluster = create_test_cluster("default", "alpha");
        store.insert(&cluster);

        // Labelled and owned
        store.insert(&create_test_machine_deployment("default", "owned", "alpha"));
        // Labelled for a cluster whose name shares a prefix
        store.insert(&create_test_machine_deployment("default", "prefix", "alphabet"));
        // Labelled but owned by something else
        let mut stray = create_test_machine_deployment("default", "stray", "alpha");
        stray.metadata.owner_references = Some(vec![owner_ref("Cluster", "beta")]);
        store.insert(&stray);
        // Owned but not labelled
        let mut unlabelled = create_test_machine_deployment("default", "unlabelled", "alpha");
        unlabelled.metadata.labels = None;
        store.insert(&unlabelled);

        let client = create_test_client(store.clone());
        let deployments = client.get_machine_deployments_for_cluster(&cluster).await.unwrap();

        let names: Vec<String> = deployments.iter().map(ResourceExt::name_any).collect();
        assert_eq!(names, vec!["owned"]);
        assert!(store.calls().contains(&StoreCall::List {
            kind: "MachineDeployment".to_string(),
            namespace: Some("default".to_string()),
            selector: Some("cluster.k8s.io/cluster-name=alpha".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_machine_sets_for_machine_deployment() {
        let store = MockObjectStore::new();
        let deployment = create_test_machine_deployment("default", "workers", "alpha");
        store.insert(&deployment);
        store.insert(&create_test_machine_set("default", "workers-abc", ("MachineDeployment", "workers")));
        store.insert(&create_test_machine_set("default", "workers-def", ("MachineDeployment", "workers")));
        store.insert(&create_test_machine_set("default", "other-abc", ("MachineDeployment", "other")));
        let client = create_test_client(store);

        let sets = client.get_machine_sets_for_machine_deployment(&deployment).await.unwrap();

        let names: Vec<String> = sets.iter().map(ResourceExt::name_any).collect();
        assert_eq!(names, vec!["workers-abc", "workers-def"]);
    }

    #[tokio::test]
    async fn test_machines_for_machine_set() {
        let store = MockObjectStore::new();
        let set = create_test_machine_set("default", "workers-abc", ("MachineDeployment", "workers"));
        let mut owned = create_test_machine("default", "workers-abc-1", None);
        owned.metadata.owner_references = Some(vec![owner_ref("MachineSet", "workers-abc")]);
        store.insert(&owned);
        store.insert(&create_test_machine("default", "standalone", Some("1.30.0")));
        let client = create_test_client(store);

        let machines = client.get_machines_for_machine_set(&set).await.unwrap();

        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].name_any(), "workers-abc-1");
    }

    #[tokio::test]
    async fn test_create_machine_deployments_creates_every_item() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());
        let deployments = vec![
            create_test_machine_deployment("", "a", "alpha"),
            create_test_machine_deployment("", "b", "alpha"),
            create_test_machine_deployment("", "c", "alpha"),
        ];

        client.create_machine_deployments(deployments, "default").await.unwrap();

        assert_eq!(store.count::<MachineDeployment>(), 3);
    }

    #[tokio::test]
    async fn test_create_machine_sets_stops_at_first_failure() {
        let store = MockObjectStore::new();
        store.fail_on(Op::Create, "MachineSet", Some("b"), "admission webhook denied the request");
        let client = create_test_client(store.clone());
        let sets = vec![
            create_test_machine_set("", "a", ("MachineDeployment", "md")),
            create_test_machine_set("", "b", ("MachineDeployment", "md")),
            create_test_machine_set("", "c", ("MachineDeployment", "md")),
        ];

        let err = client.create_machine_sets(sets, "default").await.unwrap_err();

        assert!(err.to_string().contains("MachineSet default/b"));
        assert!(store.object::<MachineSet>("default", "a").is_some());
        assert!(store.object::<MachineSet>("default", "c").is_none());
    }

    #[tokio::test]
    async fn test_delete_machine_class_is_idempotent() {
        let store = MockObjectStore::new();
        let mut class = MachineClass::new("small", json!({"size": "s"}));
        class.metadata.namespace = Some("default".to_string());
        store.insert(&class);
        let client = create_test_client(store.clone());

        client.delete_machine_class("default", "small").await.unwrap();
        client.delete_machine_class("default", "small").await.unwrap();

        assert_eq!(store.count::<MachineClass>(), 0);
    }

    #[tokio::test]
    async fn test_machine_class_round_trips_through_store() {
        let store = MockObjectStore::new();
        let client = create_test_client(store);

        client
            .create_machine_class(MachineClass::new("small", json!({"instanceType": "t3.small"})))
            .await
            .unwrap();
        let classes = client.get_machine_classes("default").await.unwrap();

        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].provider_spec["instanceType"], "t3.small");
    }

    #[tokio::test]
    async fn test_update_cluster_object_endpoint_appends() {
        let store = MockObjectStore::new();
        let mut cluster = create_test_cluster("default", "alpha");
        cluster.status = Some(ClusterStatus {
            api_endpoints: vec![ApiEndpoint::new("10.0.0.1", 6443)],
            provider_status: Some(json!({"ready": true})),
            ..Default::default()
        });
        store.insert(&cluster);
        let client = create_test_client(store.clone());

        client
            .update_cluster_object_endpoint("api.example.com", "alpha", "default")
            .await
            .unwrap();

        let status = store.object::<Cluster>("default", "alpha").unwrap().status.unwrap();
        assert_eq!(
            status.api_endpoints,
            vec![ApiEndpoint::new("10.0.0.1", 6443), ApiEndpoint::new("api.example.com", 443)]
        );
        assert_eq!(status.provider_status, Some(json!({"ready": true})));
    }

    #[tokio::test]
    async fn test_update_endpoint_of_missing_cluster() {
        let client = create_test_client(MockObjectStore::new());

        let err = client
            .update_cluster_object_endpoint("10.0.0.1:6443", "ghost", "default")
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterClientError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_endpoint_with_bad_port_issues_no_calls() {
        let store = MockObjectStore::new();
        store.insert(&create_test_cluster("default", "alpha"));
        let client = create_test_client(store.clone());

        let err = client
            .update_cluster_object_endpoint("10.0.0.1:api", "alpha", "default")
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterClientError::InvalidEndpoint { .. }));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_cluster_api_ready_retries_list_errors() {
        let store = MockObjectStore::new();
        store.fail_on(Op::List, "Cluster", None, "the server could not find the requested resource");
        let client = create_test_client(store.clone());

        let err = client.wait_for_cluster_api_ready().await.unwrap_err();

        assert!(err.is_timeout());
        let lists = store.calls().iter().filter(|c| matches!(c, StoreCall::List { .. })).count();
        assert!(lists > 1);
    }

    #[tokio::test]
    async fn test_wait_for_cluster_api_ready_succeeds_on_empty_list() {
        let client = create_test_client(MockObjectStore::new());
        client.wait_for_cluster_api_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_resource_statuses_blocks_on_one_unsettled_object() {
        let store = MockObjectStore::new();
        let mut cluster = create_test_cluster("default", "alpha");
        cluster.status = Some(ClusterStatus {
            provider_status: Some(json!({})),
            ..Default::default()
        });
        store.insert(&cluster);

        let mut settled = create_test_machine("default", "settled", Some("1.30.0"));
        settled.status = Some(MachineStatus {
            provider_status: Some(json!({"id": 1})),
            ..Default::default()
        });
        store.insert(&settled);
        store.insert(&create_test_machine("default", "pending", None));
        let client = create_test_client(store.clone());

        let err = client.wait_for_resource_statuses().await.unwrap_err();
        assert!(err.is_timeout());

        // Give the pending machine a status and the wait succeeds.
        let mut pending = store.object::<Machine>("default", "pending").unwrap();
        pending.status = Some(MachineStatus {
            provider_status: Some(json!({"id": 2})),
            ..Default::default()
        });
        store.insert(&pending);
        client.wait_for_resource_statuses().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_resource_statuses_treats_list_errors_as_not_ready() {
        let store = MockObjectStore::new();
        store.fail_on(Op::List, "MachineSet", None, "connection reset by peer");
        let client = create_test_client(store);

        assert!(client.wait_for_resource_statuses().await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_ensure_namespace_ignores_already_exists() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());

        client.ensure_namespace("capi-system").await.unwrap();
        client.ensure_namespace("capi-system").await.unwrap();

        assert!(store.namespaces().contains("capi-system"));
    }

    #[tokio::test]
    async fn test_delete_namespace_skips_default_and_ignores_missing() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());

        client.delete_namespace("default").await.unwrap();
        client.delete_namespace("never-created").await.unwrap();

        assert!(store.namespaces().contains("default"));
        assert!(!store.calls().contains(&StoreCall::DeleteNamespace("default".to_string())));
    }

    #[tokio::test]
    async fn test_scale_stateful_set() {
        let store = MockObjectStore::new();
        store.insert(&StatefulSet {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("controller-manager".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        });
        let client = create_test_client(store.clone());

        client.scale_stateful_set("default", "controller-manager", 0).await.unwrap();

        let scaled = store.object::<StatefulSet>("default", "controller-manager").unwrap();
        assert_eq!(scaled.spec.unwrap().replicas, Some(0));
    }

    #[tokio::test]
    async fn test_scale_missing_stateful_set_is_not_found() {
        let client = create_test_client(MockObjectStore::new());

        let err = client.scale_stateful_set("default", "ghost", 0).await.unwrap_err();

        assert!(matches!(err, ClusterClientError::NotFound { ref kind, .. } if kind == "StatefulSet"));
    }

    #[tokio::test]
    async fn test_apply_goes_through_kubectl() {
        let client = create_test_client(MockObjectStore::new());

        client.apply("kind: Namespace").await.unwrap();
        client.delete("kind: Namespace").await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_components_use_client_store() {
        let store = MockObjectStore::new();
        let client = create_test_client(store.clone());

        client.provider_components().save("components").await.unwrap();

        let config_map = store
            .object::<k8s_openapi::api::core::v1::ConfigMap>("default", "clusterctl")
            .unwrap();
        assert_eq!(config_map.data.unwrap()["provider-components"], "components");
    }

    #[test]
    fn test_context_namespace_default() {
        let client = create_test_client(MockObjectStore::new());
        assert_eq!(client.get_context_namespace(), "default");
        client.close().unwrap();
    }
}
