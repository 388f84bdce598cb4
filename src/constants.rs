// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the CSI driver operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for `CSIDriverDeployment` resource
pub const KIND_CSI_DRIVER_DEPLOYMENT: &str = "CSIDriverDeployment";

/// RBAC API group used in role references
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

// ============================================================================
// Reconciler Constants
// ============================================================================

/// Finalizer placed on every managed `CSIDriverDeployment`
pub const FINALIZER_NAME: &str = "csidriver.storage.openshift.io";

/// Upper bound for a single object store call
pub const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Requeue interval once all children are available
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Requeue interval while children are still converging
pub const REQUEUE_WHEN_NOT_READY_SECS: u64 = 30;

/// Requeue interval after a failed reconcile
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Name of the field manager reported in events
pub const CONTROLLER_NAME: &str = "csi-driver-operator";

// ============================================================================
// Condition Constants
// ============================================================================

/// Condition reporting that node and controller pods are running
pub const CONDITION_AVAILABLE: &str = "Available";

/// Condition reporting the result of the last sync pass
pub const CONDITION_SYNC_SUCCESSFUL: &str = "SyncSuccessful";

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";
pub const STATUS_UNKNOWN: &str = "Unknown";

pub const REASON_AS_EXPECTED: &str = "AsExpected";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_UNKNOWN: &str = "Unknown";
pub const REASON_SYNC_ERROR: &str = "SyncError";
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";
pub const REASON_DEPLOYING: &str = "Deploying";
pub const REASON_NOT_READY: &str = "NotReady";

/// `ClusterOperator` condition reporting a rollout in progress
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// `ClusterOperator` condition reporting a rollout that stopped making pods ready
pub const CONDITION_DEGRADED: &str = "Degraded";

/// Operand name under which the operator version is reported
pub const OPERATOR_OPERAND_NAME: &str = "operator";

// ============================================================================
// Workload Constants
// ============================================================================

/// Suffix of the node `DaemonSet` name
pub const DAEMONSET_SUFFIX: &str = "-node";

/// Suffix of the controller `Deployment` name
pub const DEPLOYMENT_SUFFIX: &str = "-controller";

/// Prefix of the `ClusterRoleBinding` name, followed by the owner UID
pub const CLUSTER_ROLE_BINDING_PREFIX: &str = "csidriverdeployment-";

/// Prefix of the leader election `RoleBinding` name
pub const LEADER_ELECTION_ROLE_BINDING_PREFIX: &str = "leader-election-";

/// Suffix of the `CredentialsRequest` name
pub const CREDENTIALS_REQUEST_SUFFIX: &str = "-credentials";

/// Suffix of the secret the cloud credential operator fills in
pub const CLOUD_CREDENTIALS_SECRET_SUFFIX: &str = "-cloud-credentials";

/// Volume shared between the driver and its sidecars
pub const DRIVER_SOCKET_VOLUME: &str = "csi-driver";

/// Where sidecars see the driver socket directory
pub const DRIVER_SOCKET_MOUNT_PATH: &str = "/csi";

/// Volume with the kubelet plugin registration directory
pub const REGISTRATION_VOLUME: &str = "registration-dir";

/// Where the registrar sees the kubelet plugin registration directory
pub const REGISTRATION_MOUNT_PATH: &str = "/registration";

/// Volume with the kubelet root directory
pub const KUBELET_ROOT_VOLUME: &str = "kubelet-root";

pub const REGISTRAR_CONTAINER_NAME: &str = "csi-driver-registrar";
pub const PROVISIONER_CONTAINER_NAME: &str = "csi-provisioner";
pub const ATTACHER_CONTAINER_NAME: &str = "csi-attacher";
pub const LIVENESS_PROBE_CONTAINER_NAME: &str = "csi-probe";

/// Named container port of the liveness probe sidecar
pub const LIVENESS_PROBE_PORT_NAME: &str = "csi-probe";

/// Port the liveness probe sidecar listens on
pub const LIVENESS_PROBE_PORT: i32 = 9808;

/// Path served by the liveness probe sidecar
pub const LIVENESS_PROBE_PATH: &str = "/healthz";

/// Consecutive probe failures before the driver container is restarted
pub const LIVENESS_PROBE_FAILURE_THRESHOLD: i32 = 3;

/// Probe timeout used when the resource does not set one
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: i32 = 30;

/// Log verbosity passed to every sidecar
pub const SIDECAR_LOG_LEVEL_ARG: &str = "--v=5";

/// Socket address argument shared by all sidecars
pub const SIDECAR_CSI_ADDRESS_ARG: &str = "--csi-address=$(ADDRESS)";

pub const ENV_ADDRESS: &str = "ADDRESS";
pub const ENV_DRIVER_REG_SOCK_PATH: &str = "DRIVER_REG_SOCK_PATH";
pub const ENV_KUBE_NODE_NAME: &str = "KUBE_NODE_NAME";

// ============================================================================
// Storage Constants
// ============================================================================

/// Annotation marking the default `StorageClass`
pub const DEFAULT_STORAGE_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Maximum length of a CSI driver name
pub const MAX_DRIVER_NAME_LENGTH: usize = 63;

// ============================================================================
// Server Constants
// ============================================================================

/// Default address of the metrics and health endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;
