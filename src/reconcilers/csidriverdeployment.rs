// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `CSIDriverDeployment` reconciliation logic.
//!
//! One call of [`Reconciler::reconcile`] is one pass over one resource:
//!
//! - **Deleting** - the deletion timestamp is set: cluster-scoped children are
//!   deleted and the finalizer is released
//! - **Unmanaged** - nothing is touched, only `status.state` is reported
//! - **Syncing** - the spec is validated and every child is converged in a fixed
//!   order; errors are collected and never stop the pass, except a failed
//!   finalizer write
//!
//! The status is written once at the end of the pass, and only if it changed.
//!
//! # Example
//!
//! ```rust,no_run
//! use csi_operator::config::OperatorConfig;
//! use csi_operator::events::KubeEventPublisher;
//! use csi_operator::reconcilers::Reconciler;
//! use csi_operator::store::KubeStore;
//! use kube::Client;
//!
//! async fn reconcile_once(client: Client) -> anyhow::Result<()> {
//!     let reconciler = Reconciler::new(
//!         KubeStore::new(client.clone()),
//!         KubeEventPublisher::new(client, "csi-driver-operator"),
//!         OperatorConfig::default(),
//!     );
//!     reconciler.reconcile("openshift-ovirt", "ovirt").await?;
//!     Ok(())
//! }
//! ```

use crate::config::OperatorConfig;
use crate::constants::{
    CONDITION_AVAILABLE, FINALIZER_NAME, KIND_CSI_DRIVER_DEPLOYMENT, REQUEUE_WHEN_NOT_READY_SECS,
    REQUEUE_WHEN_READY_SECS, STATUS_TRUE,
};
use crate::crd::{CSIDriverDeployment, ManagementState};
use crate::errors::{filter_already_exists, SyncError, SyncErrors};
use crate::events::{EventPublisher, REASON_SYNC_ERROR};
use crate::metrics;
use crate::openshift::CredentialsRequest;
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::generation::{expected_generation, generation_changed, set_generation};
use crate::reconcilers::objects::{
    cluster_role_binding_name, credentials_request_name, generate_cluster_operator,
    generate_cluster_role, generate_cluster_role_binding, generate_credentials_request,
    generate_csi_driver, generate_daemon_set, generate_deployment,
    generate_leader_election_cluster_role, generate_role_binding, generate_service_account,
    generate_storage_classes,
};
use crate::reconcilers::resources::{
    apply_cluster_operator, apply_cluster_operator_status, apply_cluster_role,
    apply_cluster_role_binding, apply_credentials_request, apply_csi_driver, apply_daemon_set,
    apply_deployment, apply_role_binding, apply_service_account, apply_storage_class,
    delete_if_exists,
};
use crate::reconcilers::status::{
    cluster_operator_status, find_condition, CSIDriverDeploymentStatusUpdater,
};
use crate::reconcilers::validation::validate_csi_driver_deployment;
use crate::store::{find_owned_by, key_of, ObjectStore, StoreObject};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use kube::{Resource, ResourceExt};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a pass that did not fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether the `Available` condition is `True` after the pass.
    pub available: bool,
}

impl ReconcileOutcome {
    /// How long to wait before looking at the resource again.
    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        if self.available {
            Duration::from_secs(REQUEUE_WHEN_READY_SECS)
        } else {
            Duration::from_secs(REQUEUE_WHEN_NOT_READY_SECS)
        }
    }
}

/// Drives `CSIDriverDeployment` resources towards their desired children.
pub struct Reconciler<S, P> {
    store: S,
    publisher: P,
    config: OperatorConfig,
}

impl<S: ObjectStore, P: EventPublisher> Reconciler<S, P> {
    #[must_use]
    pub fn new(store: S, publisher: P, config: OperatorConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    #[must_use]
    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Reconcile the resource `namespace`/`name`.
    ///
    /// A resource that no longer exists is not an error. Validation failures
    /// are reported in the `SyncSuccessful` condition only; retrying cannot fix
    /// them until the spec changes, which triggers a new pass anyway.
    ///
    /// # Errors
    ///
    /// Returns every store error of the pass, including a failed status write.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, SyncErrors> {
        debug!(namespace = %namespace, name = %name, "Reconciling CSIDriverDeployment");

        let cr: CSIDriverDeployment = match self.store.get(Some(namespace), name).await {
            Ok(cr) => cr,
            Err(e) if e.is_not_found() => {
                debug!("CSIDriverDeployment {namespace}/{name} not found, nothing to do");
                return Ok(ReconcileOutcome::default());
            }
            Err(e) => {
                warn!("Failed to get CSIDriverDeployment {namespace}/{name}: {e}");
                let err = SyncError::Store(e);
                metrics::record_error(KIND_CSI_DRIVER_DEPLOYMENT, err.category());
                return Err(SyncErrors(vec![err]));
            }
        };

        let mut updater = CSIDriverDeploymentStatusUpdater::new(&cr);
        let (current, errors) = if cr.metadata.deletion_timestamp.is_some() {
            updater.set_state(ManagementState::Removed);
            self.cleanup(cr.clone()).await
        } else if cr.spec.management_state == ManagementState::Unmanaged {
            info!("CSIDriverDeployment {} is Unmanaged, skipping", key_of(&cr));
            updater.set_state(ManagementState::Unmanaged);
            (cr.clone(), Vec::new())
        } else {
            updater.set_state(ManagementState::Managed);
            let validation_errors: Vec<SyncError> = validate_csi_driver_deployment(&cr)
                .into_iter()
                .map(SyncError::Validation)
                .collect();
            if validation_errors.is_empty() {
                self.sync(cr.clone(), &mut updater).await
            } else {
                info!(
                    "CSIDriverDeployment {} failed validation, skipping sync",
                    key_of(&cr)
                );
                updater.set_conditions(
                    None,
                    None,
                    cr.spec.driver_controller_template.is_some(),
                    &validation_errors,
                );
                (cr.clone(), validation_errors)
            }
        };

        let mut failures = Vec::new();
        for err in errors {
            metrics::record_error(KIND_CSI_DRIVER_DEPLOYMENT, err.category());
            match err {
                SyncError::Validation(e) => debug!("Validation failed: {e}"),
                other => {
                    self.report(&current, &other).await;
                    failures.push(other);
                }
            }
        }

        match updater.apply(&self.store, &current).await {
            Ok(_) => {}
            // The resource is gone once cleanup released the last finalizer.
            Err(e) if e.is_not_found() => {
                debug!("CSIDriverDeployment {} is gone, status not written", key_of(&current));
            }
            Err(e) => {
                let err = SyncError::Store(e);
                metrics::record_error(KIND_CSI_DRIVER_DEPLOYMENT, err.category());
                self.report(&current, &err).await;
                failures.push(err);
            }
        }

        if !failures.is_empty() {
            return Err(SyncErrors(failures));
        }

        let available = find_condition(&updater.status().conditions, CONDITION_AVAILABLE)
            .is_some_and(|c| c.status == STATUS_TRUE);
        Ok(ReconcileOutcome { available })
    }

    /// Log an error and publish it as a `Warning` event, unless it is a conflict.
    async fn report(&self, cr: &CSIDriverDeployment, err: &SyncError) {
        if err.is_conflict() {
            debug!("{err}");
            return;
        }
        warn!("{err}");
        self.publisher
            .publish_warning(&cr.object_ref(&()), REASON_SYNC_ERROR, &err.to_string())
            .await;
    }

    /// Converge every child of `cr`. Returns the latest stored version of the
    /// resource together with the errors of the pass.
    async fn sync(
        &self,
        cr: CSIDriverDeployment,
        updater: &mut CSIDriverDeploymentStatusUpdater,
    ) -> (CSIDriverDeployment, Vec<SyncError>) {
        let owner = key_of(&cr);
        info!("Syncing CSIDriverDeployment {owner}");

        // Cluster-scoped children must never exist without the finalizer that
        // lets cleanup find them again.
        let cr = match ensure_finalizer(&self.store, &cr, FINALIZER_NAME).await {
            Ok(cr) => cr,
            Err(e) => return (cr, vec![SyncError::Store(e)]),
        };

        let mut errors = Vec::new();

        let required_sa = generate_service_account(&cr);
        let service_account = match apply_service_account(&self.store, &required_sa).await {
            Ok((sa, _)) => sa,
            Err(e) => {
                errors.push(SyncError::syncing("ServiceAccount", &owner, e));
                required_sa
            }
        };

        // Roles are shared between resources; an existing role is never rewritten.
        for role in [
            generate_cluster_role(&self.config),
            generate_leader_election_cluster_role(&self.config),
        ] {
            if let Err(e) = apply_cluster_role(&self.store, &role).await {
                errors.push(SyncError::syncing(
                    &format!("ClusterRole {}", role.name_any()),
                    &owner,
                    e,
                ));
            }
        }

        let crb = generate_cluster_role_binding(&cr, &self.config, &service_account);
        if let Err(e) = apply_cluster_role_binding(&self.store, &crb).await {
            errors.push(SyncError::syncing("ClusterRoleBinding", &owner, e));
        }

        let rb = generate_role_binding(&cr, &self.config, &service_account);
        if let Err(e) = apply_role_binding(&self.store, &rb).await {
            errors.push(SyncError::syncing("RoleBinding", &owner, e));
        }

        let mut expected_classes = BTreeSet::new();
        for class in generate_storage_classes(&cr) {
            let class_name = class.name_any();
            if let Err(e) = apply_storage_class(&self.store, &class).await {
                errors.push(SyncError::syncing(
                    &format!("StorageClass {class_name}"),
                    &owner,
                    e,
                ));
            }
            expected_classes.insert(class_name);
        }
        errors.extend(
            self.remove_unexpected::<StorageClass>(&cr, &expected_classes, "StorageClasses")
                .await,
        );

        let csi_driver = generate_csi_driver(&cr);
        if let Err(e) = apply_csi_driver(&self.store, &csi_driver).await {
            errors.push(SyncError::syncing("CSIDriver", &owner, e));
        }
        let expected_drivers = BTreeSet::from([csi_driver.name_any()]);
        errors.extend(
            self.remove_unexpected::<CSIDriver>(&cr, &expected_drivers, "CSIDrivers")
                .await,
        );

        // Templates cannot be compared with what the workloads run, so any
        // change of the resource generation forces the workload specs.
        let template_changed = generation_changed(&cr);
        let mut children = Vec::new();

        let required_ds = generate_daemon_set(&cr, &self.config, &service_account);
        let generation = expected_generation(&cr, &required_ds);
        let daemon_set =
            match apply_daemon_set(&self.store, &required_ds, generation, template_changed).await {
                Ok((ds, _)) => {
                    set_generation(&mut children, &ds);
                    Some(ds)
                }
                Err(e) => {
                    errors.push(SyncError::syncing("DaemonSet", &owner, e));
                    None
                }
            };

        let deployment_expected = cr.spec.driver_controller_template.is_some();
        let mut deployment = None;
        if let Some(required) = generate_deployment(&cr, &self.config, &service_account) {
            let generation = expected_generation(&cr, &required);
            match apply_deployment(&self.store, &required, generation, template_changed).await {
                Ok((applied, _)) => {
                    set_generation(&mut children, &applied);
                    deployment = Some(applied);
                }
                Err(e) => errors.push(SyncError::syncing("Deployment", &owner, e)),
            }
        }

        if let Some(request) = generate_credentials_request(&cr, &self.config) {
            if let Err(e) = apply_credentials_request(&self.store, &request).await {
                errors.push(SyncError::syncing("CredentialsRequest", &owner, e));
            }
        }

        if let Some(operator) = generate_cluster_operator(&self.config) {
            match apply_cluster_operator(&self.store, &operator).await {
                Ok((live, _)) => {
                    let status = cluster_operator_status(
                        live.status.as_ref(),
                        deployment.as_ref(),
                        daemon_set.as_ref(),
                        deployment_expected,
                        &self.config.operator_version,
                    );
                    if let Err(e) = apply_cluster_operator_status(&self.store, &live, status).await
                    {
                        errors.push(SyncError::syncing("ClusterOperator status", &owner, e));
                    }
                }
                Err(e) => errors.push(SyncError::syncing("ClusterOperator", &owner, e)),
            }
        }

        let errors = filter_already_exists(errors);
        updater.set_children(children);
        if errors.is_empty() {
            updater.set_observed_generation(cr.metadata.generation);
        }
        updater.set_conditions(
            deployment.as_ref(),
            daemon_set.as_ref(),
            deployment_expected,
            &errors,
        );

        (cr, errors)
    }

    /// Delete the children that cannot be garbage collected, then release the
    /// finalizer. Nothing happens without our finalizer: such a resource never
    /// got any children.
    async fn cleanup(&self, cr: CSIDriverDeployment) -> (CSIDriverDeployment, Vec<SyncError>) {
        let owner = key_of(&cr);
        if !has_finalizer(&cr, FINALIZER_NAME) {
            debug!("CSIDriverDeployment {owner} has no finalizer, nothing to clean up");
            return (cr, Vec::new());
        }
        info!("Cleaning up CSIDriverDeployment {owner}");

        let nothing = BTreeSet::new();
        let mut errors = self
            .remove_unexpected::<StorageClass>(&cr, &nothing, "StorageClasses")
            .await;
        errors.extend(
            self.remove_unexpected::<CSIDriver>(&cr, &nothing, "CSIDrivers")
                .await,
        );

        let crb_name = cluster_role_binding_name(&cr);
        if let Err(e) = delete_if_exists::<ClusterRoleBinding, S>(&self.store, None, &crb_name).await
        {
            errors.push(SyncError::step(
                format!("cannot delete ClusterRoleBinding {crb_name} for CSIDriverDeployment {owner}"),
                e,
            ));
        }

        // CredentialsRequests live in another namespace, out of reach of owner references.
        if let Some(settings) = &self.config.credentials_request {
            let request_name = credentials_request_name(&cr);
            if let Err(e) = delete_if_exists::<CredentialsRequest, S>(
                &self.store,
                Some(&settings.namespace),
                &request_name,
            )
            .await
            {
                errors.push(SyncError::step(
                    format!(
                        "cannot delete CredentialsRequest {request_name} for CSIDriverDeployment {owner}"
                    ),
                    e,
                ));
            }
        }

        if !errors.is_empty() {
            return (cr, errors);
        }

        match remove_finalizer(&self.store, &cr, FINALIZER_NAME).await {
            Ok(updated) => (updated, Vec::new()),
            Err(e) => (cr, vec![SyncError::Store(e)]),
        }
    }

    /// Delete the owner-labelled objects of kind `K` whose names are not in `expected`.
    async fn remove_unexpected<K: StoreObject>(
        &self,
        cr: &CSIDriverDeployment,
        expected: &BTreeSet<String>,
        plural: &str,
    ) -> Vec<SyncError> {
        let owner = key_of(cr);
        let namespace = cr.namespace().unwrap_or_default();
        let existing = match find_owned_by::<K, S>(&self.store, &namespace, &cr.name_any()).await {
            Ok(existing) => existing,
            Err(e) => {
                return vec![SyncError::step(
                    format!("cannot list {plural} for CSIDriverDeployment {owner}"),
                    e,
                )]
            }
        };

        let mut errors = Vec::new();
        for obj in existing {
            let obj_name = obj.name_any();
            if expected.contains(&obj_name) {
                continue;
            }
            debug!("Deleting {} {}", K::kind(&()), obj_name);
            if let Err(e) = delete_if_exists::<K, S>(&self.store, None, &obj_name).await {
                errors.push(SyncError::step(
                    format!("cannot delete {plural} {obj_name} for CSIDriverDeployment {owner}"),
                    e,
                ));
            }
        }
        errors
    }
}

#[cfg(test)]
#[path = "csidriverdeployment_tests.rs"]
mod csidriverdeployment_tests;
