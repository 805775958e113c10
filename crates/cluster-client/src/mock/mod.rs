//! Mock ObjectStore for unit testing
//!
//! This module provides an in-memory implementation of [`ObjectStore`] that
//! can be used in unit tests without a running API server. Objects are kept
//! as JSON keyed by (kind, namespace, name), so any [`StoreObject`] works.
//!
//! Besides plain storage the mock can:
//! - record every call for assertions (`calls`)
//! - fail scripted operations (`fail_on`)
//! - keep collection-deleted objects visible for a number of lists (`set_deletion_lag`)
//! - honour finalizers: deleting an object with finalizers only marks it
//! - run a hook on create, e.g. to mark machines ready (`on_create`)

mod selector;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kube::api::PropagationPolicy;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store_trait::{ObjectStore, StoreObject};

pub use selector::matches_selector;

/// (kind, namespace, name)
type ObjectKey = (String, String, String);

type CreateHook = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// Store operation, for scripting failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    List,
    Create,
    Update,
    PatchStatus,
    Delete,
    DeleteCollection,
}

/// A recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { kind: String, namespace: String, name: String },
    List { kind: String, namespace: Option<String>, selector: Option<String> },
    Create { kind: String, namespace: String, name: String },
    Update { kind: String, namespace: String, name: String, finalizers: Vec<String> },
    PatchStatus { kind: String, namespace: String, name: String },
    Delete { kind: String, namespace: String, name: String, propagation: Option<String> },
    DeleteCollection { kind: String, namespace: String },
    CreateNamespace(String),
    DeleteNamespace(String),
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    op: Op,
    kind: String,
    name: Option<String>,
    message: String,
}

/// In-memory object store
#[derive(Clone)]
pub struct MockObjectStore {
    pub(crate) objects: Arc<Mutex<BTreeMap<ObjectKey, Value>>>,
    pub(crate) namespaces: Arc<Mutex<BTreeSet<String>>>,
    pub(crate) calls: Arc<Mutex<Vec<StoreCall>>>,
    failures: Arc<Mutex<Vec<ScriptedFailure>>>,
    create_hooks: Arc<Mutex<HashMap<String, CreateHook>>>,
    // Lists an object stays visible for after a collection delete
    deletion_lag: Arc<Mutex<usize>>,
    terminating: Arc<Mutex<HashMap<ObjectKey, usize>>>,
    next_version: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockObjectStore")
            .field("objects", &lock(&self.objects).len())
            .finish_non_exhaustive()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).into_owned()
}

fn describe(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind} {namespace}/{name}")
}

fn finalizers_of(value: &Value) -> Vec<String> {
    value["metadata"]["finalizers"]
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

impl MockObjectStore {
    /// Create an empty mock store; the `default` namespace exists
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            namespaces: Arc::new(Mutex::new(BTreeSet::from(["default".to_string()]))),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
            create_hooks: Arc::new(Mutex::new(HashMap::new())),
            deletion_lag: Arc::new(Mutex::new(0)),
            terminating: Arc::new(Mutex::new(HashMap::new())),
            next_version: Arc::new(Mutex::new(1)),
        }
    }

    /// Add an object to the mock store (for test setup)
    ///
    /// The namespace is taken from the object's metadata, `default` if unset.
    pub fn insert<K: StoreObject>(&self, object: &K) {
        let namespace = object.meta().namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = object.meta().name.clone().unwrap_or_default();
        let mut value = serde_json::to_value(object).unwrap_or(Value::Null);
        value["metadata"]["namespace"] = json!(namespace);
        lock(&self.objects).insert((kind_of::<K>(), namespace, name), value);
    }

    /// Fetch an object directly, bypassing call recording
    pub fn object<K: StoreObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        let value = lock(&self.objects).get(&key).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Number of stored objects of a kind
    pub fn count<K: StoreObject>(&self) -> usize {
        let kind = kind_of::<K>();
        lock(&self.objects).keys().filter(|(k, _, _)| *k == kind).count()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn namespaces(&self) -> BTreeSet<String> {
        lock(&self.namespaces).clone()
    }

    /// Fail `op` on `kind` (and `name`, if given) with a store API error
    pub fn fail_on(&self, op: Op, kind: &str, name: Option<&str>, message: &str) {
        lock(&self.failures).push(ScriptedFailure {
            op,
            kind: kind.to_string(),
            name: name.map(str::to_string),
            message: message.to_string(),
        });
    }

    /// Keep collection-deleted objects listed for `lists` more list calls
    pub fn set_deletion_lag(&self, lists: usize) {
        *lock(&self.deletion_lag) = lists;
    }

    /// Run `hook` on every created object of `kind` before it is stored
    pub fn on_create<F>(&self, kind: &str, hook: F)
    where
        F: Fn(&mut Value) + Send + Sync + 'static,
    {
        lock(&self.create_hooks).insert(kind.to_string(), Arc::new(hook));
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }

    fn scripted_failure(&self, op: Op, kind: &str, name: Option<&str>) -> Result<(), StoreError> {
        let failures = lock(&self.failures);
        let hit = failures.iter().find(|f| {
            f.op == op && f.kind == kind && (f.name.is_none() || f.name.as_deref() == name)
        });
        match hit {
            Some(f) => Err(StoreError::Api(f.message.clone())),
            None => Ok(()),
        }
    }

    fn next_resource_version(&self) -> String {
        let mut version = lock(&self.next_version);
        let current = *version;
        *version += 1;
        current.to_string()
    }

    /// Remove an object now, or mark it terminating if finalizers remain
    fn remove_or_mark(&self, objects: &mut BTreeMap<ObjectKey, Value>, key: &ObjectKey) {
        let Some(value) = objects.get_mut(key) else {
            return;
        };
        if finalizers_of(value).is_empty() {
            objects.remove(key);
        } else {
            value["metadata"]["deletionTimestamp"] = json!(chrono::Utc::now().to_rfc3339());
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        self.record(StoreCall::Get {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.scripted_failure(Op::Get, &kind, Some(name))?;

        let key = (kind.clone(), namespace.to_string(), name.to_string());
        let value = lock(&self.objects)
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(describe(&kind, namespace, name)))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError> {
        let kind = kind_of::<K>();
        self.record(StoreCall::List {
            kind: kind.clone(),
            namespace: namespace.map(str::to_string),
            selector: selector.map(str::to_string),
        });
        self.scripted_failure(Op::List, &kind, None)?;

        let mut objects = lock(&self.objects);
        let mut terminating = lock(&self.terminating);
        let mut items = Vec::new();
        let mut expired = Vec::new();

        for (key, value) in objects.iter() {
            let (k, ns, _) = key;
            if *k != kind || namespace.is_some_and(|n| n != ns) {
                continue;
            }
            if !matches_selector(&value["metadata"]["labels"], selector) {
                continue;
            }
            items.push(serde_json::from_value::<K>(value.clone())?);

            if let Some(remaining) = terminating.get_mut(key) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push(key.clone());
                }
            }
        }

        for key in expired {
            terminating.remove(&key);
            objects.remove(&key);
        }
        Ok(items)
    }

    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        let name = object.meta().name.clone().unwrap_or_default();
        self.record(StoreCall::Create {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.clone(),
        });
        self.scripted_failure(Op::Create, &kind, Some(&name))?;

        if !lock(&self.namespaces).contains(namespace) {
            return Err(StoreError::NotFound(format!("Namespace {namespace}")));
        }

        let key = (kind.clone(), namespace.to_string(), name.clone());
        if lock(&self.objects).contains_key(&key) {
            return Err(StoreError::AlreadyExists(describe(&kind, namespace, &name)));
        }

        let mut value = serde_json::to_value(object)?;
        value["metadata"]["namespace"] = json!(namespace);
        value["metadata"]["uid"] = json!(Uuid::new_v4().to_string());
        value["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        value["metadata"]["creationTimestamp"] = json!(chrono::Utc::now().to_rfc3339());

        let hook = lock(&self.create_hooks).get(&kind).cloned();
        if let Some(hook) = hook {
            hook(&mut value);
        }

        let created = serde_json::from_value(value.clone())?;
        lock(&self.objects).insert(key, value);
        Ok(created)
    }

    async fn update<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        let name = object.meta().name.clone().unwrap_or_default();
        let mut value = serde_json::to_value(object)?;
        self.record(StoreCall::Update {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.clone(),
            finalizers: finalizers_of(&value),
        });
        self.scripted_failure(Op::Update, &kind, Some(&name))?;

        let key = (kind.clone(), namespace.to_string(), name.clone());
        let mut objects = lock(&self.objects);
        let Some(existing) = objects.get(&key) else {
            return Err(StoreError::NotFound(describe(&kind, namespace, &name)));
        };

        let deleting = existing["metadata"].get("deletionTimestamp").cloned();
        value["metadata"]["namespace"] = json!(namespace);
        value["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        if let Some(ts) = deleting.clone() {
            value["metadata"]["deletionTimestamp"] = ts;
        }

        let updated = serde_json::from_value(value.clone())?;
        if deleting.is_some() && finalizers_of(&value).is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, value);
        }
        Ok(updated)
    }

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        status: Value,
    ) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        self.record(StoreCall::PatchStatus {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.scripted_failure(Op::PatchStatus, &kind, Some(name))?;

        let key = (kind.clone(), namespace.to_string(), name.to_string());
        let mut objects = lock(&self.objects);
        let value = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(describe(&kind, namespace, name)))?;

        if !value["status"].is_object() {
            value["status"] = json!({});
        }
        if let (Some(current), Value::Object(patch)) = (value["status"].as_object_mut(), status) {
            for (field, patch_value) in patch {
                if patch_value.is_null() {
                    current.remove(&field);
                } else {
                    current.insert(field, patch_value);
                }
            }
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        propagation: Option<PropagationPolicy>,
    ) -> Result<(), StoreError> {
        let kind = kind_of::<K>();
        self.record(StoreCall::Delete {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            propagation: propagation.map(|p| format!("{p:?}")),
        });
        self.scripted_failure(Op::Delete, &kind, Some(name))?;

        let key = (kind.clone(), namespace.to_string(), name.to_string());
        let mut objects = lock(&self.objects);
        if !objects.contains_key(&key) {
            return Err(StoreError::NotFound(describe(&kind, namespace, name)));
        }
        self.remove_or_mark(&mut objects, &key);
        Ok(())
    }

    async fn delete_collection<K: StoreObject>(&self, namespace: &str) -> Result<(), StoreError> {
        let kind = kind_of::<K>();
        self.record(StoreCall::DeleteCollection {
            kind: kind.clone(),
            namespace: namespace.to_string(),
        });
        self.scripted_failure(Op::DeleteCollection, &kind, None)?;

        let lag = *lock(&self.deletion_lag);
        let mut objects = lock(&self.objects);
        let keys: Vec<ObjectKey> = objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .cloned()
            .collect();

        for key in keys {
            if lag > 0 {
                lock(&self.terminating).insert(key, lag);
            } else {
                self.remove_or_mark(&mut objects, &key);
            }
        }
        Ok(())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        self.record(StoreCall::CreateNamespace(name.to_string()));
        if !lock(&self.namespaces).insert(name.to_string()) {
            return Err(StoreError::AlreadyExists(format!("Namespace {name}")));
        }
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        self.record(StoreCall::DeleteNamespace(name.to_string()));
        if !lock(&self.namespaces).remove(name) {
            return Err(StoreError::NotFound(format!("Namespace {name}")));
        }
        lock(&self.objects).retain(|(_, ns, _), _| ns != name);
        Ok(())
    }
}
