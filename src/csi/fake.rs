// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory disk provider and mounter for the CSI service tests.

use super::node::{MountError, Mounter};
use super::provider::{Disk, DiskAttachment, DiskFormat, DiskInterface, DiskProvider, ProviderError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Volume id long enough to exercise the truncated device serial.
pub const TEST_DISK_ID: &str = "0123456789abcdef0123456789abcdef";
pub const TEST_VM_ID: &str = "vm-1";

#[derive(Default)]
struct ProviderState {
    disks: BTreeMap<String, Disk>,
    /// Attachments per VM id
    attachments: BTreeMap<String, Vec<DiskAttachment>>,
    next_id: u32,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeDiskProvider {
    state: Mutex<ProviderState>,
    offline: Mutex<bool>,
}

impl FakeDiskProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a request error.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn insert_disk(&self, disk: Disk) {
        self.state
            .lock()
            .unwrap()
            .disks
            .insert(disk.id.clone(), disk);
    }

    pub fn attach(&self, vm_id: &str, disk_id: &str, interface: DiskInterface) {
        let mut state = self.state.lock().unwrap();
        let id = format!("attachment-{disk_id}");
        state
            .attachments
            .entry(vm_id.to_string())
            .or_default()
            .push(DiskAttachment {
                id,
                disk_id: disk_id.to_string(),
                interface,
                active: true,
                bootable: false,
            });
    }

    pub fn disks(&self) -> Vec<Disk> {
        self.state.lock().unwrap().disks.values().cloned().collect()
    }

    pub fn attachments(&self, vm_id: &str) -> Vec<DiskAttachment> {
        self.state
            .lock()
            .unwrap()
            .attachments
            .get(vm_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutating calls, in order, as `"<operation> <id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn check_online(&self) -> Result<(), ProviderError> {
        if *self.offline.lock().unwrap() {
            return Err(ProviderError::Request {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DiskProvider for FakeDiskProvider {
    async fn list_disks_by_name(&self, name: &str) -> Result<Vec<Disk>, ProviderError> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .disks
            .values()
            .filter(|d| d.name == name)
            .cloned()
            .collect())
    }

    async fn create_disk(
        &self,
        name: &str,
        storage_domain: &str,
        size: i64,
        thin: bool,
        format: DiskFormat,
    ) -> Result<Disk, ProviderError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let disk = Disk {
            id: format!("disk-{}", state.next_id),
            name: name.to_string(),
            storage_domain: storage_domain.to_string(),
            provisioned_size: size,
            format,
            sparse: thin,
        };
        state.calls.push(format!("create {}", disk.id));
        state.disks.insert(disk.id.clone(), disk.clone());
        Ok(disk)
    }

    async fn get_disk(&self, id: &str) -> Result<Disk, ProviderError> {
        self.check_online()?;
        self.state
            .lock()
            .unwrap()
            .disks
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                kind: "disk",
                id: id.to_string(),
            })
    }

    async fn delete_disk(&self, id: &str) -> Result<(), ProviderError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {id}"));
        state
            .disks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound {
                kind: "disk",
                id: id.to_string(),
            })
    }

    async fn list_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>, ProviderError> {
        self.check_online()?;
        Ok(self.attachments(vm_id))
    }

    async fn add_attachment(
        &self,
        vm_id: &str,
        disk_id: &str,
        interface: DiskInterface,
    ) -> Result<DiskAttachment, ProviderError> {
        self.check_online()?;
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("attach {disk_id}"));
        self.attach(vm_id, disk_id, interface);
        Ok(self
            .attachments(vm_id)
            .into_iter()
            .find(|a| a.disk_id == disk_id)
            .unwrap())
    }

    async fn remove_attachment(&self, vm_id: &str, attachment_id: &str) -> Result<(), ProviderError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("detach {attachment_id}"));
        if let Some(list) = state.attachments.get_mut(vm_id) {
            list.retain(|a| a.id != attachment_id);
        }
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.check_online()
    }
}

#[derive(Default)]
struct MounterState {
    devices: BTreeSet<String>,
    filesystems: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
    /// target -> (source, options)
    mounts: BTreeMap<String, (String, Vec<String>)>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeMounter {
    state: Mutex<MounterState>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, device: &str) {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(device.to_string());
    }

    pub fn set_filesystem(&self, device: &str, fs_type: &str) {
        self.state
            .lock()
            .unwrap()
            .filesystems
            .insert(device.to_string(), fs_type.to_string());
    }

    pub fn filesystem(&self, device: &str) -> Option<String> {
        self.state.lock().unwrap().filesystems.get(device).cloned()
    }

    /// Source and options of the mount at `target`.
    pub fn mount_at(&self, target: &str) -> Option<(String, Vec<String>)> {
        self.state.lock().unwrap().mounts.get(target).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    /// Mutating calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn device_exists(&self, device: &str) -> Result<bool, MountError> {
        Ok(self.state.lock().unwrap().devices.contains(device))
    }

    async fn filesystem_type(&self, device: &str) -> Result<Option<String>, MountError> {
        Ok(self.filesystem(device))
    }

    async fn make_filesystem(&self, device: &str, fs_type: &str) -> Result<(), MountError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("mkfs {fs_type} {device}"));
        state
            .filesystems
            .insert(device.to_string(), fs_type.to_string());
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), MountError> {
        self.state.lock().unwrap().dirs.insert(path.to_string());
        Ok(())
    }

    async fn is_mounted(&self, target: &str) -> Result<bool, MountError> {
        Ok(self.state.lock().unwrap().mounts.contains_key(target))
    }

    async fn mount(
        &self,
        source: &str,
        target: &str,
        _fs_type: Option<&str>,
        options: &[&str],
    ) -> Result<(), MountError> {
        let mut state = self.state.lock().unwrap();
        if !state.dirs.contains(target) {
            return Err(MountError {
                operation: "mount",
                target: target.to_string(),
                message: "mount point does not exist".to_string(),
            });
        }
        state.calls.push(format!("mount {source} {target}"));
        state.mounts.insert(
            target.to_string(),
            (
                source.to_string(),
                options.iter().map(ToString::to_string).collect(),
            ),
        );
        Ok(())
    }

    async fn unmount(&self, target: &str) -> Result<(), MountError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("umount {target}"));
        state.mounts.remove(target);
        Ok(())
    }
}
