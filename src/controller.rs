// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch wiring of the `CSIDriverDeployment` controller.
//!
//! Namespaced children carry an owner reference and are watched with `owns`.
//! Cluster-scoped children cannot reference a namespaced owner, so they are
//! watched by their owner labels and mapped back to the owning resource.

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, KIND_CSI_DRIVER_DEPLOYMENT};
use crate::crd::CSIDriverDeployment;
use crate::errors::SyncErrors;
use crate::events::KubeEventPublisher;
use crate::labels::{owner_from_labels, OWNER_LABEL_NAME};
use crate::metrics;
use crate::reconcilers::Reconciler;
use crate::store::{KubeStore, StoreObject};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::runtime::Controller;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Reconciler as run against the cluster
pub type ClusterReconciler = Reconciler<KubeStore, KubeEventPublisher>;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] SyncErrors);

/// Map a cluster-scoped child to the `CSIDriverDeployment` named by its owner labels.
pub fn owner_ref<K: ResourceExt>(obj: &K) -> Option<ObjectRef<CSIDriverDeployment>> {
    let (namespace, name) = owner_from_labels(obj.labels())?;
    Some(ObjectRef::new(&name).within(&namespace))
}

/// Run the controller until its watch streams end.
///
/// With `watch_namespace` set, only resources in that namespace are reconciled.
///
/// # Errors
///
/// Never fails once started; the `Result` keeps the signature uniform with the
/// other tasks `main` selects over.
pub async fn run_controller(
    client: Client,
    reconciler: Arc<ClusterReconciler>,
    watch_namespace: Option<String>,
) -> anyhow::Result<()> {
    info!(
        namespace = ?watch_namespace,
        "Starting CSIDriverDeployment controller"
    );

    let ns = watch_namespace.as_deref();
    let owned = Config::default();
    let labelled = Config::default().labels(OWNER_LABEL_NAME);

    Controller::new(CSIDriverDeployment::api(&client, ns), Config::default())
        .owns(ServiceAccount::api(&client, ns), owned.clone())
        .owns(RoleBinding::api(&client, ns), owned.clone())
        .owns(DaemonSet::api(&client, ns), owned.clone())
        .owns(Deployment::api(&client, ns), owned)
        .watches(
            StorageClass::api(&client, None),
            labelled.clone(),
            |sc: StorageClass| owner_ref(&sc),
        )
        .watches(
            ClusterRoleBinding::api(&client, None),
            labelled.clone(),
            |crb: ClusterRoleBinding| owner_ref(&crb),
        )
        .watches(
            CSIDriver::api(&client, None),
            labelled,
            |driver: CSIDriver| owner_ref(&driver),
        )
        .run(reconcile_wrapper, error_policy, reconciler)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_wrapper(
    cr: Arc<CSIDriverDeployment>,
    ctx: Arc<ClusterReconciler>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = cr.namespace().unwrap_or_default();
    let name = cr.name_any();

    debug!(namespace = %namespace, name = %name, "Reconcile wrapper called");

    match ctx.reconcile(&namespace, &name).await {
        Ok(outcome) => {
            metrics::record_reconciliation_success(KIND_CSI_DRIVER_DEPLOYMENT, start.elapsed());
            info!("Successfully reconciled CSIDriverDeployment {namespace}/{name}");
            let requeue = outcome.requeue_after();
            debug!("Requeueing in {}s", requeue.as_secs());
            Ok(Action::requeue(requeue))
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_CSI_DRIVER_DEPLOYMENT, start.elapsed());
            error!("Failed to reconcile CSIDriverDeployment {namespace}/{name}: {e}");
            Err(e.into())
        }
    }
}

fn error_policy(
    _resource: Arc<CSIDriverDeployment>,
    _err: &ReconcileError,
    _ctx: Arc<ClusterReconciler>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
