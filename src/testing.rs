// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test doubles shared by the unit tests.
//!
//! [`FakeStore`] keeps objects as JSON and mimics the API server behaviour the
//! reconciler depends on: `resourceVersion` compare-and-swap, `generation` bumps
//! on spec changes, status written only through the status call, and deletion
//! blocked by finalizers. Every write is recorded and calls can be made to fail.

use crate::crd::{
    CSIDriverDeployment, CSIDriverDeploymentSpec, ManagementState, NodeUpdateStrategy,
    StorageClassTemplate,
};
use crate::errors::{object_key, StoreError};
use crate::events::EventPublisher;
use crate::store::{ObjectStore, StoreObject};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ObjectReference, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

pub const TEST_NAMESPACE: &str = "csi-ns";
pub const TEST_NAME: &str = "ovirt";
pub const TEST_UID: &str = "0b9e4c5d-6f1a-4d2e-9c3b-8a7f6e5d4c3b";
pub const TEST_DRIVER: &str = "csi.ovirt.org";
pub const TEST_SOCKET: &str = "/var/lib/csi/sockets/pluginproxy/csi.sock";

type ObjectId = (String, String, String);

/// One write issued against the fake store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub operation: &'static str,
    pub kind: String,
    pub key: String,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<ObjectId, Value>,
    writes: Vec<WriteRecord>,
    next_version: u64,
    fail_each_call_once: bool,
    failed_calls: HashSet<(String, String, String)>,
    injected: Vec<(String, String, StoreError)>,
}

impl FakeState {
    fn next_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check_injected(&mut self, operation: &str, kind: &str, key: &str) -> Result<(), StoreError> {
        if let Some((_, _, err)) = self
            .injected
            .iter()
            .find(|(op, k, _)| op == operation && k == kind)
        {
            return Err(err.clone());
        }
        if self.fail_each_call_once
            && self
                .failed_calls
                .insert((operation.to_string(), kind.to_string(), key.to_string()))
        {
            return Err(StoreError::Api {
                operation: operation.to_string(),
                kind: kind.to_string(),
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory [`ObjectStore`].
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

fn id_of<K: StoreObject>(namespace: Option<&str>, name: &str) -> ObjectId {
    let namespace = if K::NAMESPACED {
        namespace.unwrap_or_default().to_string()
    } else {
        String::new()
    };
    (K::kind(&()).to_string(), namespace, name.to_string())
}

fn encode<K: StoreObject>(obj: &K) -> Value {
    serde_json::to_value(obj).unwrap()
}

fn decode<K: StoreObject>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialization {
        kind: K::kind(&()).to_string(),
        key: String::new(),
        message: e.to_string(),
    })
}

fn name_of(value: &Value) -> String {
    value["metadata"]["name"].as_str().unwrap_or_default().to_string()
}

fn namespace_of(value: &Value) -> Option<String> {
    value["metadata"]["namespace"].as_str().map(str::to_string)
}

/// Everything except metadata and status, the part that bumps `generation`.
fn spec_part(value: &Value) -> Value {
    let mut value = value.clone();
    if let Some(map) = value.as_object_mut() {
        map.remove("metadata");
        map.remove("status");
    }
    value
}

fn labels_match(value: &Value, selector: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| value["metadata"]["labels"][k].as_str() == Some(v.as_str()))
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Seed an object without recording a write.
    pub fn insert<K: StoreObject>(&self, obj: K) -> K {
        let mut value = encode(&obj);
        let name = name_of(&value);
        let id = id_of::<K>(namespace_of(&value).as_deref(), &name);
        let mut state = self.lock();
        let version = state.next_version();
        let metadata = &mut value["metadata"];
        metadata["resourceVersion"] = Value::String(version);
        if metadata["generation"].is_null() {
            metadata["generation"] = Value::from(1);
        }
        if metadata["uid"].is_null() {
            metadata["uid"] = Value::String(format!("uid-{name}"));
        }
        state.objects.insert(id, value.clone());
        decode(value).unwrap()
    }

    /// Read an object without going through the trait.
    pub fn object<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let state = self.lock();
        state
            .objects
            .get(&id_of::<K>(namespace, name))
            .cloned()
            .map(|v| decode(v).unwrap())
    }

    /// All objects of one kind.
    pub fn objects<K: StoreObject>(&self) -> Vec<K> {
        let kind = K::kind(&()).to_string();
        let state = self.lock();
        state
            .objects
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, v)| decode(v.clone()).unwrap())
            .collect()
    }

    /// Change an object in place as another actor would, bumping its `resourceVersion`.
    pub fn modify<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
        f: impl FnOnce(&mut K),
    ) {
        let id = id_of::<K>(namespace, name);
        let mut state = self.lock();
        let version = state.next_version();
        let value = state.objects.get_mut(&id).unwrap();
        let mut obj: K = decode(value.clone()).unwrap();
        f(&mut obj);
        let mut updated = encode(&obj);
        updated["metadata"]["resourceVersion"] = Value::String(version);
        *value = updated;
    }

    /// Mark an object as being deleted, as the API server does for objects with finalizers.
    pub fn mark_deleted<K: StoreObject>(&self, namespace: Option<&str>, name: &str) {
        let id = id_of::<K>(namespace, name);
        let mut state = self.lock();
        let value = state.objects.get_mut(&id).unwrap();
        value["metadata"]["deletionTimestamp"] = Value::String("2025-01-01T00:00:00Z".to_string());
    }

    pub fn contains<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> bool {
        self.lock().objects.contains_key(&id_of::<K>(namespace, name))
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Number of writes of `operation` against `kind`.
    pub fn write_count(&self, operation: &str, kind: &str) -> usize {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.operation == operation && w.kind == kind)
            .count()
    }

    /// Fail every call of `operation` on `kind` with `err`.
    pub fn fail_on(&self, operation: &str, kind: &str, err: StoreError) {
        self.lock()
            .injected
            .push((operation.to_string(), kind.to_string(), err));
    }

    /// Fail every distinct (operation, kind, key) exactly once.
    pub fn fail_each_call_once(&self) {
        self.lock().fail_each_call_once = true;
    }

    /// Stored objects with server-assigned fields removed, for comparing runs.
    pub fn snapshot(&self) -> BTreeMap<ObjectId, Value> {
        let state = self.lock();
        state
            .objects
            .iter()
            .map(|(id, value)| {
                let mut value = value.clone();
                if let Some(meta) = value["metadata"].as_object_mut() {
                    meta.remove("resourceVersion");
                    meta.remove("uid");
                }
                if let Some(conditions) = value["status"]["conditions"].as_array_mut() {
                    for condition in conditions {
                        if let Some(c) = condition.as_object_mut() {
                            c.remove("lastTransitionTime");
                        }
                    }
                }
                (id.clone(), value)
            })
            .collect()
    }

    fn record(state: &mut FakeState, operation: &'static str, kind: &str, key: String) {
        state.writes.push(WriteRecord {
            operation,
            kind: kind.to_string(),
            key,
        });
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let key = object_key(namespace, name);
        let mut state = self.lock();
        state.check_injected("get", &kind, &key)?;
        let value = state
            .objects
            .get(&id_of::<K>(namespace, name))
            .cloned()
            .ok_or(StoreError::NotFound { kind, key })?;
        decode(value)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        let kind = K::kind(&()).to_string();
        let key = object_key(namespace, &format!("{labels:?}"));
        let mut state = self.lock();
        state.check_injected("list", &kind, &key)?;
        state
            .objects
            .iter()
            .filter(|((k, ns, _), value)| {
                *k == kind
                    && namespace.is_none_or(|n| !K::NAMESPACED || n == ns)
                    && labels_match(value, labels)
            })
            .map(|(_, value)| decode(value.clone()))
            .collect()
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let mut value = encode(obj);
        let kind = K::kind(&()).to_string();
        let name = name_of(&value);
        let namespace = namespace_of(&value);
        let key = object_key(namespace.as_deref(), &name);
        let id = id_of::<K>(namespace.as_deref(), &name);

        let mut state = self.lock();
        state.check_injected("create", &kind, &key)?;
        if state.objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists { kind, key });
        }
        let version = state.next_version();
        let metadata = &mut value["metadata"];
        metadata["resourceVersion"] = Value::String(version.clone());
        metadata["generation"] = Value::from(1);
        metadata["uid"] = Value::String(format!("uid-{version}"));
        state.objects.insert(id, value.clone());
        Self::record(&mut state, "create", &kind, key);
        decode(value)
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let mut value = encode(obj);
        let kind = K::kind(&()).to_string();
        let name = name_of(&value);
        let namespace = namespace_of(&value);
        let key = object_key(namespace.as_deref(), &name);
        let id = id_of::<K>(namespace.as_deref(), &name);

        let mut state = self.lock();
        state.check_injected("update", &kind, &key)?;
        let Some(stored) = state.objects.get(&id).cloned() else {
            return Err(StoreError::NotFound { kind, key });
        };
        let stored_version = stored["metadata"]["resourceVersion"].clone();
        if let Some(version) = value["metadata"]["resourceVersion"].as_str() {
            if Some(version) != stored_version.as_str() {
                return Err(StoreError::Conflict {
                    kind,
                    key,
                    message: "the object has been modified".to_string(),
                });
            }
        }

        let mut generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
        if spec_part(&stored) != spec_part(&value) {
            generation += 1;
        }
        let version = state.next_version();
        let metadata = &mut value["metadata"];
        metadata["resourceVersion"] = Value::String(version);
        metadata["generation"] = Value::from(generation);
        metadata["uid"] = stored["metadata"]["uid"].clone();
        metadata["deletionTimestamp"] = stored["metadata"]["deletionTimestamp"].clone();
        if metadata["deletionTimestamp"].is_null() {
            if let Some(meta) = metadata.as_object_mut() {
                meta.remove("deletionTimestamp");
            }
        }
        value["status"] = stored["status"].clone();
        if value["status"].is_null() {
            if let Some(map) = value.as_object_mut() {
                map.remove("status");
            }
        }

        Self::record(&mut state, "update", &kind, key);
        if !value["metadata"]["deletionTimestamp"].is_null() && !has_finalizers(&value) {
            state.objects.remove(&id);
        } else {
            state.objects.insert(id, value.clone());
        }
        decode(value)
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let value = encode(obj);
        let kind = K::kind(&()).to_string();
        let name = name_of(&value);
        let namespace = namespace_of(&value);
        let key = object_key(namespace.as_deref(), &name);
        let id = id_of::<K>(namespace.as_deref(), &name);

        let mut state = self.lock();
        state.check_injected("update_status", &kind, &key)?;
        let Some(mut stored) = state.objects.get(&id).cloned() else {
            return Err(StoreError::NotFound { kind, key });
        };
        if let Some(version) = value["metadata"]["resourceVersion"].as_str() {
            if Some(version) != stored["metadata"]["resourceVersion"].as_str() {
                return Err(StoreError::Conflict {
                    kind,
                    key,
                    message: "the object has been modified".to_string(),
                });
            }
        }
        let version = state.next_version();
        stored["metadata"]["resourceVersion"] = Value::String(version);
        stored["status"] = value["status"].clone();
        state.objects.insert(id, stored.clone());
        Self::record(&mut state, "update_status", &kind, key);
        decode(stored)
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let kind = K::kind(&()).to_string();
        let key = object_key(namespace, name);
        let id = id_of::<K>(namespace, name);

        let mut state = self.lock();
        state.check_injected("delete", &kind, &key)?;
        let Some(stored) = state.objects.get(&id).cloned() else {
            return Err(StoreError::NotFound { kind, key });
        };
        if has_finalizers(&stored) {
            let mut stored = stored;
            stored["metadata"]["deletionTimestamp"] =
                Value::String("2025-01-01T00:00:00Z".to_string());
            state.objects.insert(id, stored);
        } else {
            state.objects.remove(&id);
        }
        Self::record(&mut state, "delete", &kind, key);
        Ok(())
    }
}

/// [`EventPublisher`] that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published (reason, message) pairs.
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_warning(&self, _object: &ObjectReference, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((reason.to_string(), message.to_string()));
    }
}

/// Pod template with a single driver container.
pub fn driver_template(container: &str) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(BTreeMap::from([("app".to_string(), container.to_string())])),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: container.to_string(),
                image: Some(format!("quay.io/ovirt/{container}:latest")),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

/// Storage class template named `name`.
pub fn storage_class_template(name: &str, default: Option<bool>) -> StorageClassTemplate {
    StorageClassTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        default,
        parameters: Some(BTreeMap::from([(
            "storageDomainName".to_string(),
            "data".to_string(),
        )])),
        ..Default::default()
    }
}

/// A valid resource with node and controller templates and two storage classes.
pub fn test_cr() -> CSIDriverDeployment {
    let mut cr = CSIDriverDeployment::new(
        TEST_NAME,
        CSIDriverDeploymentSpec {
            management_state: ManagementState::Managed,
            driver_name: TEST_DRIVER.to_string(),
            driver_per_node_template: driver_template("node-driver"),
            driver_controller_template: Some(driver_template("controller-driver")),
            driver_socket: TEST_SOCKET.to_string(),
            node_update_strategy: NodeUpdateStrategy::Rolling,
            probe_period_seconds: None,
            probe_timeout_seconds: None,
            storage_class_templates: vec![
                storage_class_template("sc-a", Some(true)),
                storage_class_template("sc-b", None),
            ],
            container_images: None,
        },
    );
    cr.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    cr.metadata.uid = Some(TEST_UID.to_string());
    cr.metadata.generation = Some(1);
    cr
}
