// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation engine for `CSIDriverDeployment` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - the resource and every child it owns ([`crate::controller`])
//! 2. **Generate** - build the desired children from the spec ([`objects`])
//! 3. **Apply** - converge each live child onto its desired form ([`resources`])
//! 4. **Status** - report generations and conditions back ([`generation`], [`status`])
//!
//! # Modules
//!
//! - [`csidriverdeployment`] - the per-resource state machine, [`Reconciler`]
//! - [`objects`] - pure generators of the child objects
//! - [`resources`] - create-or-update of each child kind
//! - [`generation`] - generation history of workload children
//! - [`validation`] - spec validation
//! - [`status`] - conditions and the status updater
//! - [`finalizers`] - finalizer handling through the object store

pub mod csidriverdeployment;
pub mod finalizers;
pub mod generation;
pub mod objects;
pub mod resources;
pub mod status;
pub mod validation;

pub use csidriverdeployment::{ReconcileOutcome, Reconciler};
