// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Static operator configuration.
//!
//! Everything in here is the same for all `CSIDriverDeployment`s handled by one
//! operator process: default sidecar images, RBAC role names, the kubelet root
//! directory and placement of controller pods. The configuration is read once
//! at startup from an optional YAML file; every key is optional and falls back to
//! the built-in default.
//!
//! # Example
//!
//! ```yaml
//! defaultImages:
//!   provisionerImage: quay.io/k8scsi/csi-provisioner:v1.0.0
//! deploymentReplicas: 2
//! infrastructureNodeSelector:
//!   node-role.kubernetes.io/infra: ""
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors raised while loading the operator configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML or has wrongly typed keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Sidecar images used when a resource does not override them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultImages {
    pub attacher_image: String,
    pub provisioner_image: String,
    pub driver_registrar_image: String,
    pub liveness_probe_image: String,
}

impl Default for DefaultImages {
    fn default() -> Self {
        Self {
            attacher_image: "quay.io/k8scsi/csi-attacher:v0.3.0".to_string(),
            provisioner_image: "quay.io/k8scsi/csi-provisioner:v0.3.1".to_string(),
            driver_registrar_image: "quay.io/k8scsi/driver-registrar:v0.3.0".to_string(),
            liveness_probe_image: "quay.io/k8scsi/livenessprobe:v0.4.1".to_string(),
        }
    }
}

/// Cloud credentials requested on behalf of each deployed driver.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequestConfig {
    /// Namespace watched by the cloud credential operator.
    pub namespace: String,

    /// Provider specific permissions copied into every request.
    #[serde(default)]
    pub provider_spec: Option<serde_json::Value>,
}

/// Operator-wide configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    pub default_images: DefaultImages,

    /// Node selector of controller pods, applied when the template has none.
    pub infrastructure_node_selector: Option<BTreeMap<String, String>>,

    /// Replica count of the controller `Deployment`.
    pub deployment_replicas: i32,

    /// `ClusterRole` bound to the driver service account. Created with the
    /// operator's rules when missing, left alone when it already exists.
    pub cluster_role_name: String,

    /// `ClusterRole` bound for leader election, inside the resource namespace.
    /// Created like `cluster_role_name`.
    pub leader_election_cluster_role_name: String,

    /// Root directory of the kubelet on every node.
    pub kubelet_root_dir: String,

    /// Enables `CredentialsRequest` sync when set.
    pub credentials_request: Option<CredentialsRequestConfig>,

    /// Enables the `ClusterOperator` status report when set.
    pub cluster_operator_name: Option<String>,

    /// Version reported in `ClusterOperator` `status.versions` once available.
    pub operator_version: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            default_images: DefaultImages::default(),
            infrastructure_node_selector: None,
            deployment_replicas: 1,
            cluster_role_name: "system:openshift:csi-driver".to_string(),
            leader_election_cluster_role_name:
                "system:openshift:csi-driver-controller-leader-election".to_string(),
            kubelet_root_dir: "/var/lib/kubelet".to_string(),
            credentials_request: None,
            cluster_operator_name: None,
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from a YAML file, merged over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Loaded operator configuration");
        Ok(config)
    }

    /// Parse configuration from a YAML string. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns the parser error if the document is malformed.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Load configuration from `path` if given, otherwise use the defaults.
    ///
    /// # Errors
    ///
    /// See [`OperatorConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
