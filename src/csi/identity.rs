// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSI Identity service.

use super::provider::DiskProvider;
use super::{CsiError, PLUGIN_NAME, VENDOR_VERSION};
use std::sync::Arc;
use tracing::error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginCapability {
    /// The plugin offers the Controller service.
    ControllerService,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeResponse {
    pub ready: bool,
}

pub struct IdentityService<P: ?Sized> {
    provider: Arc<P>,
}

impl<P: DiskProvider + ?Sized> IdentityService<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn get_plugin_info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.to_string(),
            vendor_version: VENDOR_VERSION.to_string(),
        }
    }

    #[must_use]
    pub fn get_plugin_capabilities(&self) -> Vec<PluginCapability> {
        vec![PluginCapability::ControllerService]
    }

    /// Ready once the virtualization API answers.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when the connection test fails.
    pub async fn probe(&self) -> Result<ProbeResponse, CsiError> {
        if let Err(e) = self.provider.test_connection().await {
            error!("Connection test failed: {e}");
            return Err(CsiError::FailedPrecondition(
                "could not get connection to ovirt-engine".to_string(),
            ));
        }
        Ok(ProbeResponse { ready: true })
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
