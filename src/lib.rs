// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # csi-operator - CSI driver operator for Kubernetes
//!
//! Deploys a Container Storage Interface driver from a single
//! `CSIDriverDeployment` resource: the node `DaemonSet`, the controller
//! `Deployment`, RBAC bindings, `StorageClass`es and the `CSIDriver` object.
//! The operator keeps these children converged on the desired form, reports
//! progress through status conditions and removes cluster-scoped children
//! when the resource is deleted.
//!
//! ## Modules
//!
//! - [`crd`] - the `CSIDriverDeployment` custom resource
//! - [`reconcilers`] - the reconciliation engine
//! - [`controller`] - watch wiring on top of `kube::runtime`
//! - [`store`] - typed object store over the Kubernetes API
//! - [`events`] - `Warning` events for sync errors
//! - [`config`] - operator configuration
//! - [`metrics`] - Prometheus metrics and the `/metrics` endpoint
//! - [`openshift`] - OpenShift platform kinds (`CredentialsRequest`, `ClusterOperator`)
//! - [`csi`] - CSI Identity, Controller and Node services of the oVirt driver
//!
//! ## Example
//!
//! ```rust,no_run
//! use csi_operator::config::OperatorConfig;
//! use csi_operator::events::KubeEventPublisher;
//! use csi_operator::reconcilers::Reconciler;
//! use csi_operator::store::KubeStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let reconciler = Reconciler::new(
//!     KubeStore::new(client.clone()),
//!     KubeEventPublisher::new(client, "csi-driver-operator"),
//!     OperatorConfig::default(),
//! );
//! let outcome = reconciler.reconcile("openshift-ovirt-csi", "ovirt").await?;
//! println!("requeue in {:?}", outcome.requeue_after());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod csi;
pub mod errors;
pub mod events;
pub mod labels;
pub mod metrics;
pub mod openshift;
pub mod reconcilers;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
