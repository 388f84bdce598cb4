// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! Cluster-scoped children cannot be garbage collected through owner references,
//! so every generated object carries the two owner labels below. They are also the
//! reverse index used by the watch mappers and by cleanup.

use std::collections::BTreeMap;

// ============================================================================
// Owner Labels
// ============================================================================

/// Namespace of the owning `CSIDriverDeployment`
pub const OWNER_LABEL_NAMESPACE: &str = "csidriver.storage.openshift.io/owner-namespace";

/// Name of the owning `CSIDriverDeployment`
pub const OWNER_LABEL_NAME: &str = "csidriver.storage.openshift.io/owner-name";

// ============================================================================
// Workload Selector Labels
// ============================================================================

/// Selector label of node pods, valued with the `DaemonSet` name
pub const DAEMONSET_LABEL: &str = "csidriver.storage.openshift.io/daemonset";

/// Selector label of controller pods, valued with the `Deployment` name
pub const DEPLOYMENT_LABEL: &str = "csidriver.storage.openshift.io/deployment";

/// Build the owner label set for an owner identified by namespace and name.
#[must_use]
pub fn owner_labels(namespace: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (OWNER_LABEL_NAMESPACE.to_string(), namespace.to_string()),
        (OWNER_LABEL_NAME.to_string(), name.to_string()),
    ])
}

/// Read the owner (namespace, name) pair back from a label set.
///
/// Returns `None` unless both labels are present.
#[must_use]
pub fn owner_from_labels(labels: &BTreeMap<String, String>) -> Option<(String, String)> {
    let namespace = labels.get(OWNER_LABEL_NAMESPACE)?;
    let name = labels.get(OWNER_LABEL_NAME)?;
    Some((namespace.clone(), name.clone()))
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
