// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSI Controller service: disk lifecycle and attachment of disks to VMs.
//!
//! Every operation is idempotent. Creating a volume that already exists returns
//! it, deleting or detaching something that is gone succeeds.

use super::provider::{find_attachment, DiskFormat, DiskInterface, DiskProvider};
use super::{require, CsiError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// StorageClass parameter naming the storage domain of new disks
pub const PARAMETER_STORAGE_DOMAIN_NAME: &str = "storageDomainName";

/// StorageClass parameter enabling thin provisioning, `"true"` or `"false"`
pub const PARAMETER_THIN_PROVISIONING: &str = "thinProvisioning";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    pub required_bytes: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    pub volume_id: String,
    pub capacity_bytes: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerCapability {
    CreateDeleteVolume,
    PublishUnpublishVolume,
}

pub struct ControllerService<P: ?Sized> {
    provider: Arc<P>,
}

impl<P: DiskProvider + ?Sized> ControllerService<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Create a disk named `request.name`, or return the one that already exists.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a missing name or storage domain, otherwise the
    /// mapped provider error.
    pub async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume, CsiError> {
        require("name", &request.name)?;

        let existing = self.provider.list_disks_by_name(&request.name).await?;
        if let Some(disk) = existing.into_iter().next() {
            info!("Disk {} already exists as {}", request.name, disk.id);
            return Ok(Volume {
                volume_id: disk.id,
                capacity_bytes: disk.provisioned_size,
            });
        }

        let storage_domain = request
            .parameters
            .get(PARAMETER_STORAGE_DOMAIN_NAME)
            .map(String::as_str)
            .unwrap_or_default();
        require(PARAMETER_STORAGE_DOMAIN_NAME, storage_domain)?;
        let thin = request
            .parameters
            .get(PARAMETER_THIN_PROVISIONING)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        let format = if thin { DiskFormat::Cow } else { DiskFormat::Raw };

        info!(
            "Creating disk {} in storage domain {} ({} bytes, {})",
            request.name, storage_domain, request.required_bytes, format
        );
        let disk = self
            .provider
            .create_disk(
                &request.name,
                storage_domain,
                request.required_bytes,
                thin,
                format,
            )
            .await?;

        Ok(Volume {
            volume_id: disk.id,
            capacity_bytes: disk.provisioned_size,
        })
    }

    /// Delete a disk. A disk that does not exist is already deleted.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error of the lookup or the delete.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<(), CsiError> {
        require("volume_id", volume_id)?;

        match self.provider.get_disk(volume_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("Disk {volume_id} does not exist, nothing to delete");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        info!("Removing disk {volume_id}");
        match self.provider.delete_disk(volume_id).await {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Attach a disk to the VM `node_id`.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error.
    pub async fn controller_publish_volume(
        &self,
        volume_id: &str,
        node_id: &str,
    ) -> Result<(), CsiError> {
        require("volume_id", volume_id)?;
        require("node_id", node_id)?;

        if find_attachment(self.provider.as_ref(), node_id, volume_id)
            .await?
            .is_some()
        {
            info!("Disk {volume_id} is already attached to VM {node_id}");
            return Ok(());
        }

        info!("Attaching disk {volume_id} to VM {node_id}");
        self.provider
            .add_attachment(node_id, volume_id, DiskInterface::VirtioScsi)
            .await?;
        Ok(())
    }

    /// Detach a disk from the VM `node_id`. A disk that is not attached is detached.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error.
    pub async fn controller_unpublish_volume(
        &self,
        volume_id: &str,
        node_id: &str,
    ) -> Result<(), CsiError> {
        require("volume_id", volume_id)?;
        require("node_id", node_id)?;

        let Some(attachment) = find_attachment(self.provider.as_ref(), node_id, volume_id).await?
        else {
            info!("Disk {volume_id} is not attached to VM {node_id}");
            return Ok(());
        };

        info!("Detaching disk {volume_id} from VM {node_id}");
        match self
            .provider
            .remove_attachment(node_id, &attachment.id)
            .await
        {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn controller_get_capabilities(&self) -> Vec<ControllerCapability> {
        vec![
            ControllerCapability::CreateDeleteVolume,
            ControllerCapability::PublishUnpublishVolume,
        ]
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn validate_volume_capabilities(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("ValidateVolumeCapabilities"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn list_volumes(&self) -> Result<Vec<Volume>, CsiError> {
        Err(CsiError::Unimplemented("ListVolumes"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn get_capacity(&self) -> Result<i64, CsiError> {
        Err(CsiError::Unimplemented("GetCapacity"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn create_snapshot(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("CreateSnapshot"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn delete_snapshot(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("DeleteSnapshot"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn list_snapshots(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("ListSnapshots"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn controller_expand_volume(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("ControllerExpandVolume"))
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
