// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSI volume services of the oVirt driver.
//!
//! The three CSI services are plain async Rust APIs over two traits:
//!
//! - [`provider::DiskProvider`] - disks and disk attachments of the virtualization API
//! - [`node::Mounter`] - filesystem and mount operations on the node
//!
//! Errors carry the gRPC status code a CSI caller expects, so a transport
//! layer can map them one to one.
//!
//! # Services
//!
//! - [`identity::IdentityService`] - plugin name, capabilities and readiness
//! - [`controller::ControllerService`] - disk lifecycle and attachment to VMs
//! - [`node::NodeService`] - staging and publishing of attached disks

pub mod controller;
pub mod identity;
pub mod node;
pub mod provider;

#[cfg(test)]
pub(crate) mod fake;

use provider::ProviderError;
use thiserror::Error;

/// Name the plugin registers with
pub const PLUGIN_NAME: &str = "csi.ovirt.org";

/// Version reported by `GetPluginInfo`
pub const VENDOR_VERSION: &str = "0.1.1";

/// Errors returned by the CSI services, one variant per gRPC status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsiError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The RPC is not offered by this driver. Carries the RPC name.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CsiError {
    /// gRPC status code name of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotFound(_) => "NotFound",
            Self::FailedPrecondition(_) => "FailedPrecondition",
            Self::Unimplemented(_) => "Unimplemented",
            Self::Internal(_) => "Internal",
        }
    }
}

impl From<ProviderError> for CsiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { .. } => Self::NotFound(err.to_string()),
            ProviderError::Request { .. } => Self::Internal(err.to_string()),
        }
    }
}

/// Fail with `InvalidArgument` when a required request field is empty.
pub(crate) fn require(field: &str, value: &str) -> Result<(), CsiError> {
    if value.is_empty() {
        return Err(CsiError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}
