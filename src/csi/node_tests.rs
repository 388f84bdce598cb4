// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::csi::fake::{FakeDiskProvider, FakeMounter, TEST_DISK_ID, TEST_VM_ID};
    use crate::csi::node::{
        device_path_prefix, NodeCapability, NodePublishVolumeRequest, NodeService,
        NodeStageVolumeRequest,
    };
    use crate::csi::provider::DiskInterface;
    use crate::csi::CsiError;
    use std::sync::Arc;

    const STAGING: &str = "/var/lib/kubelet/plugins/staging/pv-1";
    const TARGET: &str = "/var/lib/kubelet/pods/p1/volumes/pv-1";
    const SCSI_PREFIX: &str = "/dev/disk/by-id/scsi-0QEMU_QEMU_HARDDISK_";

    struct Fixture {
        provider: Arc<FakeDiskProvider>,
        mounter: Arc<FakeMounter>,
        svc: NodeService<FakeDiskProvider, FakeMounter>,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(FakeDiskProvider::new());
        let mounter = Arc::new(FakeMounter::new());
        let svc = NodeService::new(TEST_VM_ID, provider.clone(), mounter.clone());
        Fixture {
            provider,
            mounter,
            svc,
        }
    }

    fn short_scsi_device() -> String {
        format!("{SCSI_PREFIX}{}", &TEST_DISK_ID[..20])
    }

    fn stage_request(fs_type: &str) -> NodeStageVolumeRequest {
        NodeStageVolumeRequest {
            volume_id: TEST_DISK_ID.to_string(),
            staging_target_path: STAGING.to_string(),
            fs_type: fs_type.to_string(),
        }
    }

    fn publish_request(readonly: bool) -> NodePublishVolumeRequest {
        NodePublishVolumeRequest {
            volume_id: TEST_DISK_ID.to_string(),
            staging_target_path: STAGING.to_string(),
            target_path: TARGET.to_string(),
            readonly,
        }
    }

    #[test]
    fn test_device_path_prefix() {
        assert_eq!(
            device_path_prefix(DiskInterface::Virtio).unwrap(),
            "/dev/disk/by-id/virtio-"
        );
        assert_eq!(
            device_path_prefix(DiskInterface::VirtioScsi).unwrap(),
            SCSI_PREFIX
        );
        assert_eq!(
            device_path_prefix(DiskInterface::Ide),
            Err(CsiError::FailedPrecondition(
                "device type is unsupported".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_device_path_prefers_full_id() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::Virtio);
        let full = format!("/dev/disk/by-id/virtio-{TEST_DISK_ID}");
        f.mounter.add_device(&full);
        f.mounter
            .add_device(&format!("/dev/disk/by-id/virtio-{}", &TEST_DISK_ID[..20]));

        assert_eq!(f.svc.device_path(TEST_DISK_ID).await.unwrap(), full);
    }

    #[tokio::test]
    async fn test_device_path_falls_back_to_short_serial() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);
        f.mounter.add_device(&short_scsi_device());

        assert_eq!(
            f.svc.device_path(TEST_DISK_ID).await.unwrap(),
            short_scsi_device()
        );
    }

    #[tokio::test]
    async fn test_device_path_missing_device() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);

        let err = f.svc.device_path(TEST_DISK_ID).await.unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[tokio::test]
    async fn test_stage_unattached_disk_is_not_found() {
        let f = fixture();

        let err = f.svc.node_stage_volume(&stage_request("")).await.unwrap_err();

        assert_eq!(err.code(), "NotFound");
        assert!(f.mounter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stage_formats_blank_disk_with_default_fs() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);
        f.mounter.add_device(&short_scsi_device());

        f.svc.node_stage_volume(&stage_request("")).await.unwrap();

        let device = short_scsi_device();
        assert_eq!(f.mounter.filesystem(&device).as_deref(), Some("ext4"));
        assert_eq!(f.mounter.mount_at(STAGING).unwrap().0, device);
        assert_eq!(
            f.mounter.calls(),
            vec![
                format!("mkfs ext4 {device}"),
                format!("mount {device} {STAGING}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stage_keeps_existing_filesystem() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);
        let device = short_scsi_device();
        f.mounter.add_device(&device);
        f.mounter.set_filesystem(&device, "xfs");

        f.svc.node_stage_volume(&stage_request("ext4")).await.unwrap();

        assert_eq!(f.mounter.filesystem(&device).as_deref(), Some("xfs"));
        assert_eq!(f.mounter.calls(), vec![format!("mount {device} {STAGING}")]);
    }

    #[tokio::test]
    async fn test_stage_twice_mounts_once() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);
        f.mounter.add_device(&short_scsi_device());

        f.svc.node_stage_volume(&stage_request("xfs")).await.unwrap();
        f.svc.node_stage_volume(&stage_request("xfs")).await.unwrap();

        assert_eq!(f.mounter.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unstage_unmounts() {
        let f = fixture();
        f.provider
            .attach(TEST_VM_ID, TEST_DISK_ID, DiskInterface::VirtioScsi);
        f.mounter.add_device(&short_scsi_device());
        f.svc.node_stage_volume(&stage_request("")).await.unwrap();

        f.svc
            .node_unstage_volume(TEST_DISK_ID, STAGING)
            .await
            .unwrap();

        assert!(f.mounter.mount_at(STAGING).is_none());
    }

    #[tokio::test]
    async fn test_unstage_not_mounted_is_noop() {
        let f = fixture();

        f.svc
            .node_unstage_volume(TEST_DISK_ID, STAGING)
            .await
            .unwrap();

        assert!(f.mounter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_publish_bind_mounts_staging() {
        let f = fixture();

        f.svc.node_publish_volume(&publish_request(false)).await.unwrap();

        assert!(f.mounter.has_dir(TARGET));
        let (source, options) = f.mounter.mount_at(TARGET).unwrap();
        assert_eq!(source, STAGING);
        assert_eq!(options, vec!["bind".to_string()]);
    }

    #[tokio::test]
    async fn test_publish_readonly() {
        let f = fixture();

        f.svc.node_publish_volume(&publish_request(true)).await.unwrap();

        let (_, options) = f.mounter.mount_at(TARGET).unwrap();
        assert_eq!(options, vec!["bind".to_string(), "ro".to_string()]);
    }

    #[tokio::test]
    async fn test_publish_requires_target() {
        let f = fixture();
        let mut req = publish_request(false);
        req.target_path.clear();

        let err = f.svc.node_publish_volume(&req).await.unwrap_err();

        assert_eq!(
            err,
            CsiError::InvalidArgument("target_path is required".to_string())
        );
    }

    #[tokio::test]
    async fn test_unpublish_unmounts_target() {
        let f = fixture();
        f.svc.node_publish_volume(&publish_request(false)).await.unwrap();

        f.svc
            .node_unpublish_volume(TEST_DISK_ID, TARGET)
            .await
            .unwrap();

        assert!(f.mounter.mount_at(TARGET).is_none());
    }

    #[test]
    fn test_info_and_capabilities() {
        let f = fixture();
        assert_eq!(f.svc.node_get_info(), TEST_VM_ID);
        assert_eq!(
            f.svc.node_get_capabilities(),
            vec![NodeCapability::StageUnstageVolume]
        );
        assert_eq!(
            f.svc.node_get_volume_stats(),
            Err(CsiError::Unimplemented("NodeGetVolumeStats"))
        );
        assert_eq!(
            f.svc.node_expand_volume(),
            Err(CsiError::Unimplemented("NodeExpandVolume"))
        );
    }
}
