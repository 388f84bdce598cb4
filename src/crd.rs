// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for CSI driver deployment.
//!
//! # Resource Types
//!
//! - [`CSIDriverDeployment`] - Declares one CSI driver: the node `DaemonSet`, the
//!   optional controller `Deployment`, RBAC, and the `StorageClass`es it provides.
//!
//! # Example: Deploying a CSI driver
//!
//! ```yaml
//! apiVersion: csidriver.storage.openshift.io/v1alpha1
//! kind: CSIDriverDeployment
//! metadata:
//!   name: ovirt
//!   namespace: ovirt-csi
//! spec:
//!   managementState: Managed
//!   driverName: csi.ovirt.org
//!   driverSocket: /var/lib/csi/sockets/pluginproxy/csi.sock
//!   nodeUpdateStrategy: Rolling
//!   probePeriodSeconds: 10
//!   driverPerNodeTemplate:
//!     spec:
//!       containers:
//!         - name: ovirt-driver
//!           image: quay.io/ovirt/csi-driver:latest
//!   storageClassTemplates:
//!     - metadata:
//!         name: ovirt-thin
//!       default: true
//!       parameters:
//!         storageDomainName: data
//!         thinProvisioning: "true"
//! ```

use k8s_openapi::api::core::v1::{PodTemplateSpec, TopologySelectorTerm};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Condition represents an observation of a resource's current state.
///
/// `last_transition_time` only moves when `status` flips.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `Available` or `SyncSuccessful`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Whether the operator acts on a `CSIDriverDeployment`.
///
/// `Removed` is only ever reported in status, while the resource is being deleted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
}

impl fmt::Display for ManagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Managed => "Managed",
            Self::Unmanaged => "Unmanaged",
            Self::Removed => "Removed",
        };
        f.write_str(value)
    }
}

/// How node pods are replaced after the node template changes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum NodeUpdateStrategy {
    /// Pods are replaced automatically, one node at a time.
    Rolling,
    /// Pods are replaced only when the user deletes them.
    OnDelete,
}

impl fmt::Display for NodeUpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rolling => f.write_str("Rolling"),
            Self::OnDelete => f.write_str("OnDelete"),
        }
    }
}

/// Template of a `StorageClass` provisioned by the deployed driver.
///
/// The provisioner is always the driver name, so it is not part of the template.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassTemplate {
    /// Metadata of the generated `StorageClass`. Only name, labels and
    /// annotations are used.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Marks the class as the cluster default. At most one template may set this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_volume_expansion: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_binding_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_topologies: Option<Vec<TopologySelectorTerm>>,
}

/// Per-resource overrides of the sidecar images.
///
/// Unset fields fall back to the operator configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CSIDeploymentContainerImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacher_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_registrar_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe_image: Option<String>,
}

/// Generation of a child object at the time the operator last wrote it.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationHistory {
    pub group: String,
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub last_generation: i64,
}

/// `CSIDriverDeployment` status, written only by the operator.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CSIDriverDeploymentStatus {
    /// Generation of the spec that was last synced without any error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last written generation of the node `DaemonSet` and controller `Deployment`.
    #[serde(default)]
    pub children: Vec<GenerationHistory>,

    /// Branch taken by the last reconcile: Managed, Unmanaged or Removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ManagementState>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `CSIDriverDeployment` deploys one CSI driver into the cluster.
///
/// The operator runs the driver as a `DaemonSet` on every node and, when a
/// controller template is given, as a `Deployment` with provisioner and attacher
/// sidecars. It also creates the RBAC bindings, `StorageClass`es and the
/// `CSIDriver` registration object for the driver.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "csidriver.storage.openshift.io",
    version = "v1alpha1",
    kind = "CSIDriverDeployment",
    namespaced,
    shortname = "csidd",
    doc = "CSIDriverDeployment deploys a CSI driver: node pods, optional controller pods, RBAC and storage classes."
)]
#[kube(status = "CSIDriverDeploymentStatus")]
#[kube(printcolumn = r#"{"name":"Driver","type":"string","jsonPath":".spec.driverName"}"#)]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[serde(rename_all = "camelCase")]
pub struct CSIDriverDeploymentSpec {
    /// Managed resources are reconciled; Unmanaged ones are left alone.
    pub management_state: ManagementState,

    /// Name of the CSI driver, e.g. `csi.ovirt.org`.
    pub driver_name: String,

    /// Pod template of the node pods. The first container is the driver.
    pub driver_per_node_template: PodTemplateSpec,

    /// Pod template of the controller pods. The first container is the driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_controller_template: Option<PodTemplateSpec>,

    /// Absolute path of the driver socket inside the driver container.
    pub driver_socket: String,

    /// Update strategy of the node `DaemonSet`.
    pub node_update_strategy: NodeUpdateStrategy,

    /// Enables the liveness probe sidecar with this period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_period_seconds: Option<i32>,

    /// Timeout of the liveness probe. Defaults to 30 seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_seconds: Option<i32>,

    #[serde(default)]
    pub storage_class_templates: Vec<StorageClassTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_images: Option<CSIDeploymentContainerImages>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
