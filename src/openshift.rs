// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Platform resource types the operator creates but does not own the schema of.
//!
//! Only the fields the operator writes are modelled. These types are never
//! passed to `crdgen`; their CRDs are installed by the platform.

use crate::crd::Condition;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request for cloud credentials, served by the cloud credential operator.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "cloudcredential.openshift.io",
    version = "v1",
    kind = "CredentialsRequest",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequestSpec {
    /// Secret the credentials are written to.
    pub secret_ref: ObjectReference,

    /// Provider specific permissions, passed through from configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_spec: Option<serde_json::Value>,
}

/// Cluster-wide status report of an operator.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(group = "config.openshift.io", version = "v1", kind = "ClusterOperator")]
#[kube(status = "ClusterOperatorStatus")]
pub struct ClusterOperatorSpec {}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub versions: Vec<OperandVersion>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}
