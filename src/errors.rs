// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types of the reconciliation engine.
//!
//! - [`StoreError`] - a failed object store call, classified so that callers can
//!   treat not-found as success and keep conflicts out of user facing events
//! - [`FieldError`] - one violation found while validating a resource spec
//! - [`SyncError`] - one entry of the per-pass error accumulator
//! - [`SyncErrors`] - the aggregate returned to the controller when a pass fails

use std::fmt;
use thiserror::Error;

/// Format an object key the way `kubectl` does: `namespace/name` or just `name`.
#[must_use]
pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}

/// Errors returned by the object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist (HTTP 404).
    ///
    /// Callers treat this as an expected state: a missing child is created and a
    /// delete of a missing object succeeds.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// `namespace/name` of the object
        key: String,
    },

    /// A create raced with another create of the same object (HTTP 409, `AlreadyExists`).
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: String },

    /// An update was based on a stale `resourceVersion` (HTTP 409, `Conflict`).
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: String,
        message: String,
    },

    /// The call did not complete within the per-call timeout.
    #[error("{operation} {kind} {key} timed out after {seconds}s")]
    Timeout {
        operation: String,
        kind: String,
        key: String,
        seconds: u64,
    },

    /// Any other API or transport failure.
    #[error("failed to {operation} {kind} {key}: {message}")]
    Api {
        operation: String,
        kind: String,
        key: String,
        message: String,
    },

    /// An object could not be converted to or from its wire representation.
    #[error("failed to serialize {kind} {key}: {message}")]
    Serialization {
        kind: String,
        key: String,
        message: String,
    },
}

impl StoreError {
    /// Classify a kube client error raised by `operation` on the given object.
    #[must_use]
    pub fn from_kube(err: kube::Error, operation: &str, kind: &str, key: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    key: key.to_string(),
                }
            }
            kube::Error::Api(response) if response.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                key: key.to_string(),
                message: response.message,
            },
            kube::Error::SerdeError(e) => Self::Serialization {
                kind: kind.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            },
            other => Self::Api {
                operation: operation.to_string(),
                kind: kind.to_string(),
                key: key.to_string(),
                message: other.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A single validation failure of a resource spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the offending field, e.g. `spec.driverName`
    pub field: String,
    /// Offending value, rendered as text
    pub value: String,
    /// What is wrong with the value
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Invalid value: {:?}: {}",
            self.field, self.value, self.message
        )
    }
}

impl std::error::Error for FieldError {}

/// One entry of the error accumulator of a sync or cleanup pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A store call failed while working on one child.
    #[error("{context}: {source}")]
    Step { context: String, source: StoreError },

    /// A store call failed outside of any child step.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] FieldError),
}

impl SyncError {
    /// Wrap an error raised while syncing `what` for the resource `owner`.
    #[must_use]
    pub fn syncing(what: &str, owner: &str, source: StoreError) -> Self {
        Self::Step {
            context: format!("error syncing {what} for CSIDriverDeployment {owner}"),
            source,
        }
    }

    /// Wrap an error with a free-form context.
    #[must_use]
    pub fn step(context: impl Into<String>, source: StoreError) -> Self {
        Self::Step {
            context: context.into(),
            source,
        }
    }

    /// The store error behind this entry, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Step { source, .. } | Self::Store(source) => Some(source),
            Self::Validation(_) => None,
        }
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_already_exists)
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_conflict)
    }

    /// Short category for the `errors_total` metric.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.store_error() {
            None => "validation_error",
            Some(StoreError::NotFound { .. }) => "not_found",
            Some(StoreError::AlreadyExists { .. }) => "already_exists",
            Some(StoreError::Conflict { .. }) => "conflict",
            Some(StoreError::Timeout { .. }) => "timeout",
            Some(StoreError::Serialization { .. }) => "serialization_error",
            Some(StoreError::Api { .. }) => "api_error",
        }
    }
}

/// Drop the errors caused by racing creates; they do not indicate a failure.
#[must_use]
pub fn filter_already_exists(errors: Vec<SyncError>) -> Vec<SyncError> {
    errors
        .into_iter()
        .filter(|e| !e.is_already_exists())
        .collect()
}

/// Join error messages with newlines, the format used in condition messages.
#[must_use]
pub fn join_messages<E: fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// All errors of one failed reconcile pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_messages(.0))]
pub struct SyncErrors(pub Vec<SyncError>);

impl SyncErrors {
    #[must_use]
    pub fn errors(&self) -> &[SyncError] {
        &self.0
    }
}

impl From<StoreError> for SyncErrors {
    fn from(err: StoreError) -> Self {
        Self(vec![SyncError::Store(err)])
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
