// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource applier: converge a live object onto a generated (required) one.
//!
//! Every `apply_*` function follows the same shape:
//!
//! 1. Get the live object; create the required object if it is missing.
//! 2. Merge the required metadata into a copy of the live object.
//! 3. Merge the kind-specific fields the operator owns.
//! 4. Write only when something changed.
//!
//! and returns the resulting object plus whether a write happened.
//!
//! Metadata merging is additive: required labels and annotations overwrite the
//! live values for the same key, but keys present only on the live object are
//! kept. Owner references are appended when no reference with the same `uid`
//! exists. Nothing the operator does not own is ever removed.
//!
//! # Example
//!
//! ```rust,no_run
//! use csi_operator::reconcilers::resources::apply_service_account;
//! use csi_operator::store::KubeStore;
//! use k8s_openapi::api::core::v1::ServiceAccount;
//!
//! async fn example(store: &KubeStore, sa: ServiceAccount) -> anyhow::Result<()> {
//!     let (_live, modified) = apply_service_account(store, &sa).await?;
//!     println!("modified: {modified}");
//!     Ok(())
//! }
//! ```

use crate::errors::StoreError;
use crate::metrics;
use crate::openshift::{ClusterOperator, ClusterOperatorStatus, CredentialsRequest};
use crate::reconcilers::status::cluster_operator_status_equal;
use crate::store::{key_of, ObjectStore, StoreObject};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Result of [`fetch_or_create`].
#[derive(Debug)]
pub enum Fetched<K> {
    /// The object did not exist and was created from the required object.
    Created(K),
    /// The live object as read from the store.
    Existing(K),
}

/// Get the live copy of `required`, creating it when it does not exist.
///
/// # Errors
///
/// Returns the store error of the get or create call. A not-found get is not an
/// error.
pub async fn fetch_or_create<K, S>(store: &S, required: &K) -> Result<Fetched<K>, StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
{
    let name = required.name_any();
    let namespace = required.namespace();
    match store.get::<K>(namespace.as_deref(), &name).await {
        Ok(existing) => Ok(Fetched::Existing(existing)),
        Err(e) if e.is_not_found() => {
            debug!("{} {} does not exist, creating", K::kind(&()), key_of(required));
            let created = store.create(required).await?;
            info!("Created {} {}", K::kind(&()), key_of(&created));
            metrics::record_resource_created(&K::kind(&()));
            Ok(Fetched::Created(created))
        }
        Err(e) => Err(e),
    }
}

fn merge_map(
    existing: &mut Option<BTreeMap<String, String>>,
    required: Option<&BTreeMap<String, String>>,
    modified: &mut bool,
) {
    let Some(required) = required else {
        return;
    };
    let existing = existing.get_or_insert_with(BTreeMap::new);
    for (key, value) in required {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            *modified = true;
        }
    }
}

/// Merge the required labels, annotations and owner references into `existing`.
///
/// Sets `modified` when anything was added or changed.
pub fn ensure_object_meta(modified: &mut bool, existing: &mut ObjectMeta, required: &ObjectMeta) {
    merge_map(&mut existing.labels, required.labels.as_ref(), modified);
    merge_map(
        &mut existing.annotations,
        required.annotations.as_ref(),
        modified,
    );

    if let Some(required_refs) = &required.owner_references {
        let refs = existing.owner_references.get_or_insert_with(Vec::new);
        for owner in required_refs {
            if !refs.iter().any(|r| r.uid == owner.uid) {
                refs.push(owner.clone());
                *modified = true;
            }
        }
    }
}

/// Converge the live object onto `required` using `merge` for the kind-specific fields.
///
/// `merge` receives the live object (already carrying the merged metadata) and
/// the required object and returns whether it changed anything.
///
/// # Errors
///
/// Returns the store error of the get, create or update call.
pub async fn apply_with<K, S, F>(store: &S, required: &K, merge: F) -> Result<(K, bool), StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
    F: FnOnce(&mut K, &K) -> bool + Send,
{
    let existing = match fetch_or_create(store, required).await? {
        Fetched::Created(created) => return Ok((created, true)),
        Fetched::Existing(existing) => existing,
    };

    let mut modified = false;
    let mut updated = existing.clone();
    ensure_object_meta(&mut modified, updated.meta_mut(), required.meta());
    if merge(&mut updated, required) {
        modified = true;
    }

    if !modified {
        debug!("{} {} is up to date", K::kind(&()), key_of(&existing));
        return Ok((existing, false));
    }

    let updated = store.update(&updated).await?;
    info!("Updated {} {}", K::kind(&()), key_of(&updated));
    metrics::record_resource_updated(&K::kind(&()));
    Ok((updated, true))
}

fn set_if_different<T: PartialEq + Clone>(target: &mut T, required: &T) -> bool {
    if target == required {
        false
    } else {
        *target = required.clone();
        true
    }
}

/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_service_account<S: ObjectStore + ?Sized>(
    store: &S,
    required: &ServiceAccount,
) -> Result<(ServiceAccount, bool), StoreError> {
    apply_with(store, required, |_, _| false).await
}

/// Converge subjects and role reference of a `ClusterRoleBinding`.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_cluster_role_binding<S: ObjectStore + ?Sized>(
    store: &S,
    required: &ClusterRoleBinding,
) -> Result<(ClusterRoleBinding, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        let subjects = set_if_different(&mut existing.subjects, &required.subjects);
        let role_ref = set_if_different(&mut existing.role_ref, &required.role_ref);
        subjects || role_ref
    })
    .await
}

/// Converge subjects and role reference of a `RoleBinding`.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_role_binding<S: ObjectStore + ?Sized>(
    store: &S,
    required: &RoleBinding,
) -> Result<(RoleBinding, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        let subjects = set_if_different(&mut existing.subjects, &required.subjects);
        let role_ref = set_if_different(&mut existing.role_ref, &required.role_ref);
        subjects || role_ref
    })
    .await
}

/// Converge the mutable fields of a `StorageClass`.
///
/// Provisioner, parameters, reclaim policy and binding mode are immutable in
/// the API and are left as they are on the live object.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_storage_class<S: ObjectStore + ?Sized>(
    store: &S,
    required: &StorageClass,
) -> Result<(StorageClass, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        let mount_options = set_if_different(&mut existing.mount_options, &required.mount_options);
        let expansion = set_if_different(
            &mut existing.allow_volume_expansion,
            &required.allow_volume_expansion,
        );
        let topologies = set_if_different(
            &mut existing.allowed_topologies,
            &required.allowed_topologies,
        );
        mount_options || expansion || topologies
    })
    .await
}

/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_csi_driver<S: ObjectStore + ?Sized>(
    store: &S,
    required: &CSIDriver,
) -> Result<(CSIDriver, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        set_if_different(&mut existing.spec, &required.spec)
    })
    .await
}

/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_credentials_request<S: ObjectStore + ?Sized>(
    store: &S,
    required: &CredentialsRequest,
) -> Result<(CredentialsRequest, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        set_if_different(&mut existing.spec, &required.spec)
    })
    .await
}

/// Create a `ClusterRole` if it is missing; an existing one is left alone.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_cluster_role<S: ObjectStore + ?Sized>(
    store: &S,
    required: &ClusterRole,
) -> Result<(ClusterRole, bool), StoreError> {
    Ok(match fetch_or_create(store, required).await? {
        Fetched::Created(created) => (created, true),
        Fetched::Existing(existing) => (existing, false),
    })
}

/// Create a `ClusterOperator` if it is missing; an existing one is left alone.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_cluster_operator<S: ObjectStore + ?Sized>(
    store: &S,
    required: &ClusterOperator,
) -> Result<(ClusterOperator, bool), StoreError> {
    Ok(match fetch_or_create(store, required).await? {
        Fetched::Created(created) => (created, true),
        Fetched::Existing(existing) => (existing, false),
    })
}

/// Write `status` to the live `ClusterOperator` unless it reports the same as
/// the current status, transition times aside.
///
/// # Errors
///
/// Returns the store error of the status write, including a conflict when
/// `live` is stale.
pub async fn apply_cluster_operator_status<S: ObjectStore + ?Sized>(
    store: &S,
    live: &ClusterOperator,
    status: ClusterOperatorStatus,
) -> Result<(ClusterOperator, bool), StoreError> {
    if live
        .status
        .as_ref()
        .is_some_and(|current| cluster_operator_status_equal(current, &status))
    {
        debug!("ClusterOperator {} status unchanged", key_of(live));
        return Ok((live.clone(), false));
    }

    let mut updated = live.clone();
    updated.status = Some(status);
    let updated = store.update_status(&updated).await?;
    info!("Updated status of ClusterOperator {}", key_of(&updated));
    Ok((updated, true))
}

/// Converge a `DaemonSet`.
///
/// The spec is replaced wholesale when the live generation differs from
/// `expected_generation` (someone else edited it), when `force` is set (the
/// owner changed since it was last observed), or when the metadata changed.
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_daemon_set<S: ObjectStore + ?Sized>(
    store: &S,
    required: &DaemonSet,
    expected_generation: i64,
    force: bool,
) -> Result<(DaemonSet, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        let drifted = existing.metadata.generation.unwrap_or_default() != expected_generation;
        if drifted || force {
            existing.spec = required.spec.clone();
        }
        drifted || force
    })
    .await
}

/// Converge a `Deployment`, with the same rules as [`apply_daemon_set`].
///
/// # Errors
///
/// Returns the store error of the failed call.
pub async fn apply_deployment<S: ObjectStore + ?Sized>(
    store: &S,
    required: &Deployment,
    expected_generation: i64,
    force: bool,
) -> Result<(Deployment, bool), StoreError> {
    apply_with(store, required, |existing, required| {
        let drifted = existing.metadata.generation.unwrap_or_default() != expected_generation;
        if drifted || force {
            existing.spec = required.spec.clone();
        }
        drifted || force
    })
    .await
}

/// Delete an object, treating a missing object as already deleted.
///
/// Returns whether a delete call was issued against an existing object.
///
/// # Errors
///
/// Returns the store error of the delete call unless it is not-found.
pub async fn delete_if_exists<K, S>(
    store: &S,
    namespace: Option<&str>,
    name: &str,
) -> Result<bool, StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
{
    match store.delete::<K>(namespace, name).await {
        Ok(()) => {
            info!("Deleted {} {}", K::kind(&()), name);
            metrics::record_resource_deleted(&K::kind(&()));
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {} already deleted", K::kind(&()), name);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
