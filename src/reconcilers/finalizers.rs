// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management through the object store.
//!
//! Cluster-scoped children cannot be garbage collected through owner references,
//! so the reconciler holds a finalizer on its resource until it has deleted them.
//!
//! # Example
//!
//! ```rust,ignore
//! use csi_operator::constants::FINALIZER_NAME;
//! use csi_operator::reconcilers::finalizers::{ensure_finalizer, has_finalizer};
//!
//! let cr = ensure_finalizer(&store, &cr, FINALIZER_NAME).await?;
//! assert!(has_finalizer(&cr, FINALIZER_NAME));
//! ```

use crate::errors::StoreError;
use crate::store::{key_of, ObjectStore, StoreObject};
use kube::{Resource, ResourceExt};
use tracing::info;

/// Whether `finalizer` is present on `resource`.
#[must_use]
pub fn has_finalizer<K: Resource>(resource: &K, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Add a finalizer to a resource if not already present.
///
/// Returns the resource as stored afterwards: the input when nothing had to be
/// written, the updated object otherwise. Callers continue with the returned
/// object so later writes carry its `resourceVersion`.
///
/// # Errors
///
/// Returns the store error of the update, a conflict when `resource` is stale.
pub async fn ensure_finalizer<K, S>(store: &S, resource: &K, finalizer: &str) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
{
    if has_finalizer(resource, finalizer) {
        return Ok(resource.clone());
    }

    info!(
        "Adding finalizer {} to {} {}",
        finalizer,
        K::kind(&()),
        key_of(resource)
    );
    let mut updated = resource.clone();
    updated.finalizers_mut().push(finalizer.to_string());
    store.update(&updated).await
}

/// Remove a finalizer from a resource.
///
/// Idempotent; a resource without the finalizer is returned unchanged. Once the
/// last finalizer of a deleted resource is gone the API server removes it.
///
/// # Errors
///
/// Returns the store error of the update. Not-found is mapped to success since
/// the resource is gone either way.
pub async fn remove_finalizer<K, S>(store: &S, resource: &K, finalizer: &str) -> Result<K, StoreError>
where
    K: StoreObject,
    S: ObjectStore + ?Sized,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(resource.clone());
    }

    info!(
        "Removing finalizer {} from {} {}",
        finalizer,
        K::kind(&()),
        key_of(resource)
    );
    let mut updated = resource.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    match store.update(&updated).await {
        Ok(stored) => Ok(stored),
        Err(e) if e.is_not_found() => Ok(updated),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
