// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the status updater of `CSIDriverDeployment`.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (`Available`, `SyncSuccessful`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last flipped
//!
//! # Example
//!
//! ```rust,no_run
//! use csi_operator::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Available",
//!     "True",
//!     "AsExpected",
//!     ""
//! );
//! ```

use crate::constants::{
    CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_PROGRESSING, CONDITION_SYNC_SUCCESSFUL,
    OPERATOR_OPERAND_NAME, REASON_AS_EXPECTED, REASON_DEPLOYING, REASON_NOT_READY,
    REASON_SYNC_ERROR, REASON_UNAVAILABLE, REASON_UNKNOWN, REASON_VALIDATION_FAILED, STATUS_FALSE,
    STATUS_TRUE, STATUS_UNKNOWN,
};
use crate::crd::{
    CSIDriverDeployment, CSIDriverDeploymentStatus, Condition, GenerationHistory, ManagementState,
};
use crate::errors::{join_messages, StoreError, SyncError};
use crate::openshift::{ClusterOperatorStatus, OperandVersion};
use crate::store::{key_of, ObjectStore};
use chrono::Utc;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::ResourceExt;
use tracing::debug;

/// Create a new condition with the current timestamp.
///
/// # Example
///
/// ```rust,no_run
/// # use csi_operator::reconcilers::status::create_condition;
/// let condition = create_condition("Available", "False", "Unavailable", "1 pod not ready");
/// assert_eq!(condition.r#type, "Available");
/// assert_eq!(condition.status, "False");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// The `lastTransitionTime` of an existing condition is kept unless its status
/// flips. A message or reason change alone never moves it.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Compute the `Available` condition as (status, reason, message).
///
/// The Deployment only contributes when `deployment_expected` is set; a resource
/// without a controller template has nothing to wait for there.
#[must_use]
pub fn available_condition(
    deployment: Option<&Deployment>,
    daemon_set: Option<&DaemonSet>,
    deployment_expected: bool,
) -> (&'static str, &'static str, String) {
    let mut missing = Vec::new();
    if deployment_expected && deployment.is_none() {
        missing.push("Deployment with CSI driver was not synced.".to_string());
    }
    if daemon_set.is_none() {
        missing.push("DaemonSet with CSI driver was not synced.".to_string());
    }
    if !missing.is_empty() {
        return (STATUS_UNKNOWN, REASON_UNKNOWN, missing.join("\n"));
    }

    let mut unavailable = Vec::new();
    if let Some(deployment) = deployment.filter(|_| deployment_expected) {
        let count = deployment
            .status
            .as_ref()
            .and_then(|s| s.unavailable_replicas)
            .unwrap_or_default();
        if count > 0 {
            unavailable.push(format!(
                "Deployment {:?} with CSI driver has {count} not ready pod(s).",
                deployment.name_any()
            ));
        }
    }
    if let Some(daemon_set) = daemon_set {
        let count = daemon_set
            .status
            .as_ref()
            .and_then(|s| s.number_unavailable)
            .unwrap_or_default();
        if count > 0 {
            unavailable.push(format!(
                "DaemonSet {:?} with CSI driver has {count} not ready pod(s).",
                daemon_set.name_any()
            ));
        }
    }

    if unavailable.is_empty() {
        (STATUS_TRUE, REASON_AS_EXPECTED, String::new())
    } else {
        (STATUS_FALSE, REASON_UNAVAILABLE, unavailable.join("\n"))
    }
}

/// Compute the `SyncSuccessful` condition as (status, reason, message).
#[must_use]
pub fn sync_successful_condition(errors: &[SyncError]) -> (&'static str, &'static str, String) {
    if errors.is_empty() {
        return (STATUS_TRUE, REASON_AS_EXPECTED, String::new());
    }
    let reason = if errors.iter().all(|e| matches!(e, SyncError::Validation(_))) {
        REASON_VALIDATION_FAILED
    } else {
        REASON_SYNC_ERROR
    };
    (STATUS_FALSE, reason, join_messages(errors))
}

/// Rollout state of one workload.
struct Rollout {
    workload: String,
    progressing: Option<String>,
    ready: bool,
}

fn daemon_set_rollout(daemon_set: &DaemonSet) -> Rollout {
    let workload = format!("DaemonSet {:?}", daemon_set.name_any());
    let status = daemon_set.status.clone().unwrap_or_default();
    let generation = daemon_set.metadata.generation.unwrap_or_default();
    let observed = status.observed_generation.unwrap_or_default();
    let unavailable = status.number_unavailable.unwrap_or_default();

    let progressing = if observed < generation {
        Some(format!(
            "{workload} update is being processed (generation {generation}, observed generation {observed})."
        ))
    } else if status.current_number_scheduled < status.desired_number_scheduled {
        Some(format!(
            "{workload} has scheduled {} of {} pod(s).",
            status.current_number_scheduled, status.desired_number_scheduled
        ))
    } else if unavailable > 0 {
        Some(format!("{workload} is waiting for {unavailable} pod(s)."))
    } else {
        None
    };

    Rollout {
        ready: unavailable == 0 && status.number_ready == status.desired_number_scheduled,
        workload,
        progressing,
    }
}

fn deployment_rollout(deployment: &Deployment) -> Rollout {
    let workload = format!("Deployment {:?}", deployment.name_any());
    let status = deployment.status.clone().unwrap_or_default();
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let generation = deployment.metadata.generation.unwrap_or_default();
    let observed = status.observed_generation.unwrap_or_default();
    let updated = status.updated_replicas.unwrap_or_default();
    let unavailable = status.unavailable_replicas.unwrap_or_default();

    let progressing = if observed < generation {
        Some(format!(
            "{workload} update is being processed (generation {generation}, observed generation {observed})."
        ))
    } else if updated < desired {
        Some(format!("{workload} has updated {updated} of {desired} pod(s)."))
    } else if unavailable > 0 {
        Some(format!("{workload} is waiting for {unavailable} pod(s)."))
    } else {
        None
    };

    Rollout {
        ready: unavailable == 0 && status.ready_replicas.unwrap_or_default() >= desired,
        workload,
        progressing,
    }
}

/// Compute the `ClusterOperator` status from the workloads of one pass.
///
/// `Available` mirrors the `Available` condition of the resource. `Progressing`
/// is `True` while a workload rolls out, and `Degraded` is `True` when a
/// workload rolling out has no ready pods to show for it. The operator version
/// is reported once the operator is available; until then the previous report
/// is kept. Transition times move only when a condition status flips.
#[must_use]
pub fn cluster_operator_status(
    current: Option<&ClusterOperatorStatus>,
    deployment: Option<&Deployment>,
    daemon_set: Option<&DaemonSet>,
    deployment_expected: bool,
    version: &str,
) -> ClusterOperatorStatus {
    let mut status = current.cloned().unwrap_or_default();

    let (available, reason, message) =
        available_condition(deployment, daemon_set, deployment_expected);
    update_condition_in_memory(
        &mut status.conditions,
        CONDITION_AVAILABLE,
        available,
        reason,
        &message,
    );

    let rollouts: Vec<Rollout> = daemon_set
        .map(daemon_set_rollout)
        .into_iter()
        .chain(
            deployment
                .filter(|_| deployment_expected)
                .map(deployment_rollout),
        )
        .collect();

    let progressing: Vec<&str> = rollouts
        .iter()
        .filter_map(|r| r.progressing.as_deref())
        .collect();
    if progressing.is_empty() {
        update_condition_in_memory(
            &mut status.conditions,
            CONDITION_PROGRESSING,
            STATUS_FALSE,
            REASON_AS_EXPECTED,
            "",
        );
    } else {
        update_condition_in_memory(
            &mut status.conditions,
            CONDITION_PROGRESSING,
            STATUS_TRUE,
            REASON_DEPLOYING,
            &progressing.join("\n"),
        );
    }

    let degraded: Vec<String> = rollouts
        .iter()
        .filter(|r| r.progressing.is_some() && !r.ready)
        .map(|r| format!("{} is not ready.", r.workload))
        .collect();
    if degraded.is_empty() {
        update_condition_in_memory(
            &mut status.conditions,
            CONDITION_DEGRADED,
            STATUS_FALSE,
            REASON_AS_EXPECTED,
            "",
        );
    } else {
        update_condition_in_memory(
            &mut status.conditions,
            CONDITION_DEGRADED,
            STATUS_TRUE,
            REASON_NOT_READY,
            &degraded.join("\n"),
        );
    }

    if available == STATUS_TRUE {
        status.versions = vec![OperandVersion {
            name: OPERATOR_OPERAND_NAME.to_string(),
            version: version.to_string(),
        }];
    }

    status
}

/// Whether two `ClusterOperator` statuses report the same, ignoring transition times.
#[must_use]
pub fn cluster_operator_status_equal(
    current: &ClusterOperatorStatus,
    new: &ClusterOperatorStatus,
) -> bool {
    current.versions == new.versions && conditions_equal(&current.conditions, &new.conditions)
}

/// Collects the status of one reconcile pass and writes it at most once.
///
/// # Example
///
/// ```rust,ignore
/// let mut updater = CSIDriverDeploymentStatusUpdater::new(&cr);
/// updater.set_state(ManagementState::Managed);
/// updater.set_conditions(deployment.as_ref(), daemon_set.as_ref(), true, &errors);
/// updater.apply(&store, &cr).await?;
/// ```
pub struct CSIDriverDeploymentStatusUpdater {
    current_status: Option<CSIDriverDeploymentStatus>,
    new_status: CSIDriverDeploymentStatus,
}

impl CSIDriverDeploymentStatusUpdater {
    /// Start from the status the resource was read with.
    #[must_use]
    pub fn new(cr: &CSIDriverDeployment) -> Self {
        let current_status = cr.status.clone();
        let new_status = current_status.clone().unwrap_or_default();
        Self {
            current_status,
            new_status,
        }
    }

    pub fn set_state(&mut self, state: ManagementState) {
        self.new_status.state = Some(state);
    }

    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.observed_generation = generation;
    }

    pub fn set_children(&mut self, children: Vec<GenerationHistory>) {
        self.new_status.children = children;
    }

    /// Set both conditions from the workloads and the errors of the pass.
    pub fn set_conditions(
        &mut self,
        deployment: Option<&Deployment>,
        daemon_set: Option<&DaemonSet>,
        deployment_expected: bool,
        errors: &[SyncError],
    ) {
        let (status, reason, message) =
            available_condition(deployment, daemon_set, deployment_expected);
        update_condition_in_memory(
            &mut self.new_status.conditions,
            CONDITION_AVAILABLE,
            status,
            reason,
            &message,
        );

        let (status, reason, message) = sync_successful_condition(errors);
        update_condition_in_memory(
            &mut self.new_status.conditions,
            CONDITION_SYNC_SUCCESSFUL,
            status,
            reason,
            &message,
        );
    }

    #[must_use]
    pub fn status(&self) -> &CSIDriverDeploymentStatus {
        &self.new_status
    }

    /// Whether the collected status differs from the status read at the start.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => {
                current.observed_generation != self.new_status.observed_generation
                    || current.children != self.new_status.children
                    || current.state != self.new_status.state
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// Write the collected status if it changed.
    ///
    /// Returns the updated resource, or `None` when no write was needed.
    ///
    /// # Errors
    ///
    /// Returns the store error of the status write, including a conflict when
    /// `cr` is stale.
    pub async fn apply<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        cr: &CSIDriverDeployment,
    ) -> Result<Option<CSIDriverDeployment>, StoreError> {
        if !self.has_changes() {
            debug!(
                "CSIDriverDeployment {} status unchanged, skipping update",
                key_of(cr)
            );
            return Ok(None);
        }

        let mut updated = cr.clone();
        updated.status = Some(self.new_status.clone());
        let updated = store.update_status(&updated).await?;
        debug!("Updated status of CSIDriverDeployment {}", key_of(cr));
        Ok(Some(updated))
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
