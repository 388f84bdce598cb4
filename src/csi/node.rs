// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSI Node service: turns an attached disk into a mounted filesystem.
//!
//! Staging formats the disk when it carries no filesystem yet and mounts it at the
//! staging path. Publishing bind-mounts the staging path into the pod's target.

use super::provider::{find_attachment, DiskInterface, DiskProvider};
use super::{require, CsiError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Filesystem created on a blank disk when the request names none
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// udev truncates the serial of a disk to this many characters
pub const SHORT_SERIAL_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} {target} failed: {message}")]
pub struct MountError {
    pub operation: &'static str,
    pub target: String,
    pub message: String,
}

impl From<MountError> for CsiError {
    fn from(err: MountError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Filesystem and mount operations on the node.
#[async_trait]
pub trait Mounter: Send + Sync {
    async fn device_exists(&self, device: &str) -> Result<bool, MountError>;

    /// Filesystem on `device`, `None` for a blank device.
    async fn filesystem_type(&self, device: &str) -> Result<Option<String>, MountError>;

    async fn make_filesystem(&self, device: &str, fs_type: &str) -> Result<(), MountError>;

    async fn make_dir(&self, path: &str) -> Result<(), MountError>;

    async fn is_mounted(&self, target: &str) -> Result<bool, MountError>;

    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: Option<&str>,
        options: &[&str],
    ) -> Result<(), MountError>;

    async fn unmount(&self, target: &str) -> Result<(), MountError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeStageVolumeRequest {
    pub volume_id: String,
    pub staging_target_path: String,
    /// Empty selects [`DEFAULT_FS_TYPE`]
    pub fs_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodePublishVolumeRequest {
    pub volume_id: String,
    pub staging_target_path: String,
    pub target_path: String,
    pub readonly: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCapability {
    StageUnstageVolume,
}

/// Prefix of the udev by-id link of a disk on the given bus.
///
/// # Errors
///
/// `FailedPrecondition` for a bus the node cannot resolve.
pub fn device_path_prefix(interface: DiskInterface) -> Result<&'static str, CsiError> {
    match interface {
        DiskInterface::Virtio => Ok("/dev/disk/by-id/virtio-"),
        DiskInterface::VirtioScsi => Ok("/dev/disk/by-id/scsi-0QEMU_QEMU_HARDDISK_"),
        DiskInterface::Ide => Err(CsiError::FailedPrecondition(
            "device type is unsupported".to_string(),
        )),
    }
}

pub struct NodeService<P: ?Sized, M: ?Sized> {
    node_id: String,
    provider: Arc<P>,
    mounter: Arc<M>,
}

impl<P, M> NodeService<P, M>
where
    P: DiskProvider + ?Sized,
    M: Mounter + ?Sized,
{
    pub fn new(node_id: impl Into<String>, provider: Arc<P>, mounter: Arc<M>) -> Self {
        Self {
            node_id: node_id.into(),
            provider,
            mounter,
        }
    }

    /// Device path of a disk attached to this node.
    ///
    /// The full disk id is tried first, then the id truncated to the serial length.
    ///
    /// # Errors
    ///
    /// `NotFound` when the disk is not attached here or no device link exists.
    pub async fn device_path(&self, volume_id: &str) -> Result<String, CsiError> {
        let attachment = find_attachment(self.provider.as_ref(), &self.node_id, volume_id)
            .await?
            .ok_or_else(|| {
                CsiError::NotFound(format!(
                    "disk {volume_id} is not attached to node {}",
                    self.node_id
                ))
            })?;
        let prefix = device_path_prefix(attachment.interface)?;

        let full = format!("{prefix}{volume_id}");
        if self.mounter.device_exists(&full).await? {
            debug!("Device path {full} exists");
            return Ok(full);
        }

        let short_id: String = volume_id.chars().take(SHORT_SERIAL_LEN).collect();
        let short = format!("{prefix}{short_id}");
        if self.mounter.device_exists(&short).await? {
            debug!("Device path {short} exists");
            return Ok(short);
        }

        error!("Device path for disk {volume_id} does not exist");
        Err(CsiError::NotFound(format!(
            "device for disk {volume_id} was not found"
        )))
    }

    /// Format the disk if it is blank and mount it at the staging path.
    ///
    /// # Errors
    ///
    /// Returns device lookup errors and mount failures as `Internal`.
    pub async fn node_stage_volume(&self, request: &NodeStageVolumeRequest) -> Result<(), CsiError> {
        require("volume_id", &request.volume_id)?;
        require("staging_target_path", &request.staging_target_path)?;

        let device = self.device_path(&request.volume_id).await?;
        let fs_type = if request.fs_type.is_empty() {
            DEFAULT_FS_TYPE
        } else {
            request.fs_type.as_str()
        };

        match self.mounter.filesystem_type(&device).await? {
            Some(existing) => info!("Detected filesystem {existing} on {device}"),
            None => {
                info!("Creating filesystem {fs_type} on {device}");
                self.mounter.make_filesystem(&device, fs_type).await?;
            }
        }

        let staging = &request.staging_target_path;
        self.mounter.make_dir(staging).await?;
        if self.mounter.is_mounted(staging).await? {
            info!("{staging} is already mounted");
            return Ok(());
        }
        info!("Mounting {device} on {staging}");
        self.mounter
            .mount(&device, staging, Some(fs_type), &[])
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns unmount failures as `Internal`.
    pub async fn node_unstage_volume(
        &self,
        volume_id: &str,
        staging_target_path: &str,
    ) -> Result<(), CsiError> {
        require("volume_id", volume_id)?;
        require("staging_target_path", staging_target_path)?;
        self.unmount_if_mounted(staging_target_path).await
    }

    /// Bind-mount the staging path into the target path.
    ///
    /// # Errors
    ///
    /// Returns mount failures as `Internal`.
    pub async fn node_publish_volume(
        &self,
        request: &NodePublishVolumeRequest,
    ) -> Result<(), CsiError> {
        require("volume_id", &request.volume_id)?;
        require("staging_target_path", &request.staging_target_path)?;
        require("target_path", &request.target_path)?;

        let target = &request.target_path;
        self.mounter.make_dir(target).await?;
        if self.mounter.is_mounted(target).await? {
            info!("{target} is already mounted");
            return Ok(());
        }

        let mut options = vec!["bind"];
        if request.readonly {
            options.push("ro");
        }
        info!("Bind mounting {} on {target}", request.staging_target_path);
        self.mounter
            .mount(&request.staging_target_path, target, None, &options)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns unmount failures as `Internal`.
    pub async fn node_unpublish_volume(
        &self,
        volume_id: &str,
        target_path: &str,
    ) -> Result<(), CsiError> {
        require("volume_id", volume_id)?;
        require("target_path", target_path)?;
        self.unmount_if_mounted(target_path).await
    }

    #[must_use]
    pub fn node_get_info(&self) -> &str {
        &self.node_id
    }

    #[must_use]
    pub fn node_get_capabilities(&self) -> Vec<NodeCapability> {
        vec![NodeCapability::StageUnstageVolume]
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn node_get_volume_stats(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeGetVolumeStats"))
    }

    /// # Errors
    ///
    /// Always `Unimplemented`.
    pub fn node_expand_volume(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeExpandVolume"))
    }

    async fn unmount_if_mounted(&self, target: &str) -> Result<(), CsiError> {
        if !self.mounter.is_mounted(target).await? {
            debug!("{target} is not mounted");
            return Ok(());
        }
        info!("Unmounting {target}");
        self.mounter.unmount(target).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod node_tests;
