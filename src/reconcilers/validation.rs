// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structural validation of a `CSIDriverDeployment` spec.
//!
//! All violations are collected; validation never stops at the first one.

use crate::constants::MAX_DRIVER_NAME_LENGTH;
use crate::crd::{CSIDriverDeployment, ManagementState, StorageClassTemplate};
use crate::errors::FieldError;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use regex::Regex;
use std::sync::LazyLock;

const DRIVER_NAME_PATTERN: &str = r"^[a-zA-Z0-9][-a-zA-Z0-9_.]{0,61}[-a-zA-Z0-9]$";

static DRIVER_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DRIVER_NAME_PATTERN).expect("static regex is valid"));

/// Validate `cr.spec`, returning every violation found.
#[must_use]
pub fn validate_csi_driver_deployment(cr: &CSIDriverDeployment) -> Vec<FieldError> {
    let spec = &cr.spec;
    let mut errors = Vec::new();

    errors.extend(validate_driver_name(&spec.driver_name));
    errors.extend(validate_template(
        "spec.driverPerNodeTemplate",
        Some(&spec.driver_per_node_template),
    ));
    errors.extend(validate_template(
        "spec.driverControllerTemplate",
        spec.driver_controller_template.as_ref(),
    ));
    errors.extend(validate_driver_socket(&spec.driver_socket));
    errors.extend(validate_storage_class_templates(&spec.storage_class_templates));
    if spec.management_state == ManagementState::Removed {
        errors.push(FieldError::new(
            "spec.managementState",
            spec.management_state.to_string(),
            "supported values: \"Managed\", \"Unmanaged\"",
        ));
    }
    errors.extend(validate_positive("spec.probePeriodSeconds", spec.probe_period_seconds));
    errors.extend(validate_positive("spec.probeTimeoutSeconds", spec.probe_timeout_seconds));

    errors
}

fn validate_driver_name(name: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if name.len() > MAX_DRIVER_NAME_LENGTH {
        errors.push(FieldError::new(
            "spec.driverName",
            name,
            format!("must have at most {MAX_DRIVER_NAME_LENGTH} characters"),
        ));
    }
    if !DRIVER_NAME_REGEX.is_match(name) {
        errors.push(FieldError::new(
            "spec.driverName",
            name,
            format!(
                "must consist of alphanumeric characters, '-', '_' or '.', and must start and \
                 end with an alphanumeric character (e.g. 'org.acme.csi-hostpath', regex used \
                 for validation is '{DRIVER_NAME_PATTERN}')"
            ),
        ));
    }
    errors
}

/// The socket directory becomes a volume mount, which must be absolute.
fn validate_driver_socket(socket: &str) -> Option<FieldError> {
    if socket.is_empty() {
        return Some(FieldError::new("spec.driverSocket", "", "must be non-empty"));
    }
    (!socket.starts_with('/'))
        .then(|| FieldError::new("spec.driverSocket", socket, "must be an absolute path"))
}

/// A pod template must declare at least one container, the driver.
fn validate_template(field: &str, template: Option<&PodTemplateSpec>) -> Option<FieldError> {
    let template = template?;
    let has_containers = template
        .spec
        .as_ref()
        .is_some_and(|spec| !spec.containers.is_empty());
    (!has_containers).then(|| FieldError::new(field, "[]", "must be non-empty"))
}

fn validate_storage_class_templates(templates: &[StorageClassTemplate]) -> Option<FieldError> {
    let defaults: Vec<&str> = templates
        .iter()
        .filter(|t| t.default == Some(true))
        .map(|t| t.metadata.name.as_deref().unwrap_or_default())
        .collect();

    (defaults.len() > 1).then(|| {
        FieldError::new(
            "spec.storageClassTemplates",
            "true",
            format!(
                "multiple default storage classes are not supported: {}",
                defaults.join(", ")
            ),
        )
    })
}

fn validate_positive(field: &str, value: Option<i32>) -> Option<FieldError> {
    match value {
        Some(v) if v <= 0 => Some(FieldError::new(
            field,
            v.to_string(),
            "must be positive integer number",
        )),
        _ => None,
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
