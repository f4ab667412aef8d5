// SPDX-License-Identifier: GPL-3.0-only

//! Removable-media device discovery
//!
//! Enumeration order of SD cards and USB disks is not stable across
//! inserts and reboots, so the table names them with a template and every
//! instance/partition combination within the policy bounds is probed until
//! one mounts.

use tracing::{debug, error, info, warn};
use volume_types::{BlkDeviceTemplate, ProbePolicy, Result, TemplateShape, Volume, VolumeError};

use crate::backend::Backend;
use crate::engine;

/// Resolve `volume.blk_device` and mount the first candidate that works.
///
/// Returns the device node that was mounted. The template is validated
/// before any existence check or mount attempt.
pub fn probe_and_mount<B: Backend>(
    backend: &B,
    volume: &Volume,
    bounds: ProbePolicy,
) -> Result<String> {
    let template = match BlkDeviceTemplate::classify(&volume.blk_device) {
        TemplateShape::Valid(template) => template,
        TemplateShape::NotApplicable => {
            return Err(VolumeError::MalformedConfig(format!(
                "{} is not a device template",
                volume.blk_device
            )));
        }
        TemplateShape::Malformed(reason) => {
            warn!("decompose blk_device error: {}", reason);
            return Err(VolumeError::MalformedConfig(reason));
        }
    };

    for candidate in template.candidates(bounds.devices, bounds.partitions) {
        if !backend.node_exists(&candidate.path) {
            continue;
        }

        info!(
            "try mount {} (instance {}, partition {:?}) ...",
            candidate.path, candidate.instance, candidate.partition
        );
        match engine::attempt_mount(backend, &candidate.path, volume, true) {
            Ok(fs_type) => {
                info!("successful to mount {} as {}", candidate.path, fs_type);
                return Ok(candidate.path);
            }
            Err(e) => debug!("{} did not mount: {}", candidate.path, e),
        }
    }

    error!(
        "no device matching {} mounted on {}",
        volume.blk_device, volume.mount_point
    );
    Err(VolumeError::NotFound(format!(
        "device for {}",
        volume.blk_device
    )))
}

#[cfg(test)]
mod tests {
    use volume_types::{FsType, VolumeErrorKind};

    use super::*;
    use crate::testing::{Call, FakeBackend};

    fn sdcard() -> Volume {
        Volume::new("/sdcard", FsType::Vfat, "/dev/block/mmcblk#p#")
    }

    fn probed_nodes(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::Exists(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn malformed_templates_fail_before_any_io() {
        for blk_device in [
            "/dev/block/mmcblk0p1",
            "/dev/block/mmcblk#p1",
            "/dev/block/mmcblk#p##",
        ] {
            let backend = FakeBackend::default();
            let volume = Volume::new("/sdcard", FsType::Vfat, blk_device);

            let error = probe_and_mount(&backend, &volume, ProbePolicy::default())
                .expect_err("template must be rejected");

            assert_eq!(error.kind(), VolumeErrorKind::MalformedConfig);
            assert!(backend.take_calls().is_empty(), "{blk_device} touched the backend");
        }
    }

    #[test]
    fn probes_partitions_ascending_then_bare_device_per_instance() {
        let backend = FakeBackend::default();

        let error = probe_and_mount(&backend, &sdcard(), ProbePolicy::default())
            .expect_err("nothing present");
        assert_eq!(error.kind(), VolumeErrorKind::NotFound);

        let probed = probed_nodes(&backend.take_calls());
        assert_eq!(probed.len(), 3 * 7);
        assert_eq!(
            &probed[..7],
            &[
                "/dev/block/mmcblk0p1",
                "/dev/block/mmcblk0p2",
                "/dev/block/mmcblk0p3",
                "/dev/block/mmcblk0p4",
                "/dev/block/mmcblk0p5",
                "/dev/block/mmcblk0p6",
                "/dev/block/mmcblk0",
            ]
        );
        assert_eq!(probed[7], "/dev/block/mmcblk1p1");
        assert_eq!(probed[20], "/dev/block/mmcblk2");
    }

    #[test]
    fn usb_instances_are_lettered() {
        let backend = FakeBackend::default();
        let volume = Volume::new("/udisk", FsType::Auto, "/dev/block/sd##");

        let _ = probe_and_mount(&backend, &volume, ProbePolicy::default());

        let probed = probed_nodes(&backend.take_calls());
        let bare: Vec<&String> = probed.iter().filter(|p| !p.ends_with(char::is_numeric)).collect();
        assert_eq!(bare, vec!["/dev/block/sda", "/dev/block/sdb", "/dev/block/sdc"]);
    }

    #[test]
    fn first_successful_partition_wins() {
        let backend = FakeBackend::default();
        backend.add_node("/dev/block/mmcblk1p2");
        backend.add_node("/dev/block/mmcblk1p3");
        backend.allow_mount(None, None, None);

        let device = probe_and_mount(&backend, &sdcard(), ProbePolicy::default());

        assert_eq!(device.as_deref(), Ok("/dev/block/mmcblk1p2"));
        let mounts: Vec<Call> = backend
            .take_calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Mount { .. }))
            .collect();
        assert_eq!(mounts.len(), 1);
    }

    #[test]
    fn bare_device_only_after_all_partitions_fail() {
        let backend = FakeBackend::default();
        backend.add_node("/dev/block/mmcblk0p1");
        backend.add_node("/dev/block/mmcblk0");
        backend.allow_mount(Some("/dev/block/mmcblk0"), None, None);

        let device = probe_and_mount(&backend, &sdcard(), ProbePolicy::default());

        assert_eq!(device.as_deref(), Ok("/dev/block/mmcblk0"));
        let sources: Vec<String> = backend
            .take_calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Mount { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        // rw then ro on the partition, then the bare device
        assert_eq!(
            sources,
            vec![
                "/dev/block/mmcblk0p1",
                "/dev/block/mmcblk0p1",
                "/dev/block/mmcblk0",
            ]
        );
    }
}
