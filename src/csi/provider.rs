// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Contract of the virtualization platform's disk API.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// On-disk image format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskFormat {
    /// Copy-on-write, used for thin provisioned disks
    Cow,
    Raw,
}

impl fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cow => write!(f, "cow"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// Bus a disk is attached to a VM with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskInterface {
    Virtio,
    VirtioScsi,
    Ide,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disk {
    pub id: String,
    pub name: String,
    pub storage_domain: String,
    pub provisioned_size: i64,
    pub format: DiskFormat,
    pub sparse: bool,
}

/// A disk plugged into a VM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskAttachment {
    pub id: String,
    pub disk_id: String,
    pub interface: DiskInterface,
    pub active: bool,
    pub bootable: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("request to the virtualization API failed: {message}")]
    Request { message: String },
}

impl ProviderError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Disk and attachment operations of the virtualization API.
///
/// VMs are identified by the CSI node id, which is the VM id.
#[async_trait]
pub trait DiskProvider: Send + Sync {
    /// Disks whose name is exactly `name`.
    async fn list_disks_by_name(&self, name: &str) -> Result<Vec<Disk>, ProviderError>;

    async fn create_disk(
        &self,
        name: &str,
        storage_domain: &str,
        size: i64,
        thin: bool,
        format: DiskFormat,
    ) -> Result<Disk, ProviderError>;

    async fn get_disk(&self, id: &str) -> Result<Disk, ProviderError>;

    async fn delete_disk(&self, id: &str) -> Result<(), ProviderError>;

    async fn list_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>, ProviderError>;

    /// Plug a disk into a VM. The attachment is active and not bootable.
    async fn add_attachment(
        &self,
        vm_id: &str,
        disk_id: &str,
        interface: DiskInterface,
    ) -> Result<DiskAttachment, ProviderError>;

    async fn remove_attachment(&self, vm_id: &str, attachment_id: &str)
        -> Result<(), ProviderError>;

    /// Check that the API is reachable with the configured credentials.
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// The attachment of `disk_id` on `vm_id`, if the disk is plugged into that VM.
///
/// # Errors
///
/// Returns the provider error of the list call.
pub async fn find_attachment<P: DiskProvider + ?Sized>(
    provider: &P,
    vm_id: &str,
    disk_id: &str,
) -> Result<Option<DiskAttachment>, ProviderError> {
    Ok(provider
        .list_attachments(vm_id)
        .await?
        .into_iter()
        .find(|attachment| attachment.disk_id == disk_id))
}
