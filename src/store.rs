// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction used by the applier and the reconciler.
//!
//! The reconciliation engine never talks to a [`kube::Client`] directly. It goes
//! through [`ObjectStore`], which offers typed get/list/create/update/delete
//! calls keyed by (kind, namespace, name) with optimistic concurrency. The
//! production implementation is [`KubeStore`]; tests use an in-memory store.
//!
//! # Kind registry
//!
//! [`StoreObject`] is implemented once per kind the operator manages. The set of
//! implementations is the registry of supported kinds: a kind without an
//! implementation cannot be read or written, and the scope of every kind is
//! declared in one place.

use crate::constants::API_TIMEOUT;
use crate::crd::CSIDriverDeployment;
use crate::errors::{object_key, StoreError};
use crate::labels::owner_labels;
use crate::openshift::{ClusterOperator, CredentialsRequest};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use tracing::debug;

/// A kind the object store can read and write.
pub trait StoreObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Whether objects of this kind live in a namespace.
    const NAMESPACED: bool;

    /// Build the API handle for this kind. Cluster-scoped kinds ignore `namespace`;
    /// namespaced kinds list across all namespaces when it is `None`.
    fn api(client: &Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_store_objects {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreObject for $kind {
                const NAMESPACED: bool = true;

                fn api(client: &Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client.clone(), ns),
                        None => Api::all(client.clone()),
                    }
                }
            }
        )*
    };
}

macro_rules! cluster_store_objects {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreObject for $kind {
                const NAMESPACED: bool = false;

                fn api(client: &Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client.clone())
                }
            }
        )*
    };
}

namespaced_store_objects!(
    CSIDriverDeployment,
    ServiceAccount,
    RoleBinding,
    DaemonSet,
    Deployment,
    CredentialsRequest,
);

cluster_store_objects!(
    ClusterRole,
    ClusterRoleBinding,
    StorageClass,
    CSIDriver,
    ClusterOperator,
);

/// Key of an object for log lines and errors.
#[must_use]
pub fn key_of<K: StoreObject>(obj: &K) -> String {
    object_key(obj.namespace().as_deref(), &obj.name_any())
}

/// Typed access to persisted objects with compare-and-swap updates.
///
/// `update` and `update_status` fail with [`StoreError::Conflict`] when the
/// object's `resourceVersion` is stale. `get` and `delete` fail with
/// [`StoreError::NotFound`] for missing objects and `create` fails with
/// [`StoreError::AlreadyExists`] for present ones.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<K, StoreError>;

    /// List objects whose labels contain every pair of `labels`.
    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Write only the status of `obj`.
    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<(), StoreError>;
}

/// Find the cluster-scoped objects labelled as owned by `namespace`/`name`.
///
/// This is the reverse index for children that cannot carry an owner reference.
///
/// # Errors
///
/// Returns the store error if the list call fails.
pub async fn find_owned_by<K, S>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<Vec<K>, StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
{
    store.list::<K>(None, &owner_labels(namespace, name)).await
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Run one API call under [`API_TIMEOUT`] and classify its error.
async fn call<T, F>(operation: &str, kind: &str, key: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, kube::Error>> + Send,
{
    debug!(operation, kind, key, "Object store call");
    match tokio::time::timeout(API_TIMEOUT, fut).await {
        Ok(result) => result.map_err(|e| StoreError::from_kube(e, operation, kind, key)),
        Err(_) => Err(StoreError::Timeout {
            operation: operation.to_string(),
            kind: kind.to_string(),
            key: key.to_string(),
            seconds: API_TIMEOUT.as_secs(),
        }),
    }
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let api = K::api(&self.client, namespace);
        let key = object_key(namespace, name);
        call("get", &K::kind(&()), &key, api.get(name)).await
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        let api = K::api(&self.client, namespace);
        let selector = label_selector(labels);
        let params = ListParams::default().labels(&selector);
        let key = object_key(namespace, &selector);
        let list = call("list", &K::kind(&()), &key, api.list(&params)).await?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let api = K::api(&self.client, obj.namespace().as_deref());
        let key = key_of(obj);
        call(
            "create",
            &K::kind(&()),
            &key,
            api.create(&PostParams::default(), obj),
        )
        .await
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let api = K::api(&self.client, obj.namespace().as_deref());
        let name = obj.name_any();
        let key = key_of(obj);
        call(
            "update",
            &K::kind(&()),
            &key,
            api.replace(&name, &PostParams::default(), obj),
        )
        .await
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let api = K::api(&self.client, obj.namespace().as_deref());
        let name = obj.name_any();
        let key = key_of(obj);
        let kind = K::kind(&());

        let value = serde_json::to_value(obj).map_err(|e| StoreError::Serialization {
            kind: kind.to_string(),
            key: key.clone(),
            message: e.to_string(),
        })?;

        // resourceVersion in a merge patch is a precondition: stale writes conflict
        let patch = json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": value.get("status").cloned().unwrap_or_default(),
        });

        call(
            "update status of",
            &kind,
            &key,
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let api = K::api(&self.client, namespace);
        let key = object_key(namespace, name);
        call(
            "delete",
            &K::kind(&()),
            &key,
            api.delete(name, &DeleteParams::default()),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
