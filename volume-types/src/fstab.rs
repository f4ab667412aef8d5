// SPDX-License-Identifier: GPL-3.0-only

//! Recovery fstab parser
//!
//! Each non-comment line has five whitespace-separated fields:
//!
//! ```text
//! <blk_device> <mount_point> <fs_type> <mount_flags> <fs_mgr_flags>
//! /dev/block/by-name/cache  /cache  ext4  noatime,nosuid  wait,length=-16384
//! ```
//!
//! The last two fields are optional.

use std::collections::HashSet;

use enumflags2::BitFlags;

use crate::error::{Result, VolumeError};
use crate::volume::{FsType, KeyLocation, MountFlag, Volume};

pub fn parse_fstab(input: &str) -> Result<Vec<Volume>> {
    let mut volumes = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let volume = parse_line(line).map_err(|reason| {
            VolumeError::MalformedConfig(format!("line {}: {reason}", index + 1))
        })?;

        if !seen.insert(volume.mount_point.clone()) {
            return Err(VolumeError::MalformedConfig(format!(
                "line {}: duplicate mount point {}",
                index + 1,
                volume.mount_point
            )));
        }
        volumes.push(volume);
    }

    Ok(volumes)
}

fn parse_line(line: &str) -> std::result::Result<Volume, String> {
    let mut fields = line.split_whitespace();
    let blk_device = fields.next().ok_or("missing device")?;
    let mount_point = fields.next().ok_or("missing mount point")?;
    let fs_type = fields.next().ok_or("missing fs type")?;
    let mount_flags = fields.next().unwrap_or("defaults");
    let fs_mgr_flags = fields.next().unwrap_or("defaults");

    if !mount_point.starts_with('/') {
        return Err(format!("mount point {mount_point} is not absolute"));
    }

    let fs_type: FsType = fs_type.parse().map_err(|e: VolumeError| e.to_string())?;
    let mut volume = Volume::new(mount_point, fs_type, blk_device);

    let (flags, fs_options) = parse_mount_flags(mount_flags);
    volume.flags = flags;
    volume.fs_options = fs_options;

    for option in fs_mgr_flags.split(',') {
        if let Some(value) = option.strip_prefix("length=") {
            volume.length = value
                .parse()
                .map_err(|_| format!("invalid length {value}"))?;
        } else if let Some(value) = option
            .strip_prefix("encryptable=")
            .or_else(|| option.strip_prefix("forceencrypt="))
        {
            volume.key_loc = Some(KeyLocation::parse(value));
        }
    }

    Ok(volume)
}

/// Split the mount-flags field into generic flags and filesystem data.
fn parse_mount_flags(field: &str) -> (BitFlags<MountFlag>, String) {
    let mut flags = BitFlags::empty();
    let mut data = Vec::new();

    for option in field.split(',').filter(|option| !option.is_empty()) {
        if option == "defaults" {
            continue;
        }
        match MountFlag::parse(option) {
            Some(flag) => flags |= flag,
            None => data.push(option),
        }
    }

    (flags, data.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# mount point  fstype  device
/dev/block/by-name/system   /system  ext4     ro,noatime         wait
/dev/block/by-name/cache    /cache   ext4     noatime,nosuid     wait
/dev/block/by-name/data     /data    ext4     noatime,errors=panic  wait,encryptable=footer
/dev/block/mmcblk#p#        /sdcard  auto     defaults           voldmanaged=sdcard:auto
/dev/block/sd##             /udisk   vfat     defaults           defaults
/dev/block/by-name/odm      /odm     squashfs ro                 length=-16384
";

    #[test]
    fn parses_sample_table() {
        let volumes = parse_fstab(SAMPLE).expect("parse should succeed");
        assert_eq!(volumes.len(), 6);

        let system = &volumes[0];
        assert_eq!(system.mount_point, "/system");
        assert_eq!(system.fs_type, FsType::Ext4);
        assert!(system.flags.contains(MountFlag::ReadOnly));

        let data = &volumes[2];
        assert_eq!(data.fs_options, "errors=panic");
        assert_eq!(data.key_loc, Some(KeyLocation::Footer));
        assert!(data.flags.contains(MountFlag::NoAtime));

        let sdcard = &volumes[3];
        assert_eq!(sdcard.blk_device, "/dev/block/mmcblk#p#");
        assert!(sdcard.flags.is_empty());
        assert!(sdcard.fs_options.is_empty());

        assert_eq!(volumes[5].length, -16384);
    }

    #[test]
    fn rejects_duplicate_mount_points() {
        let input = "/dev/a /cache ext4\n/dev/b /cache ext4\n";
        let error = parse_fstab(input).expect_err("duplicate should fail");
        assert!(matches!(error, VolumeError::MalformedConfig(_)));
    }

    #[test]
    fn rejects_unknown_fs_type_and_bad_length() {
        assert!(parse_fstab("/dev/a /cache btrfs\n").is_err());
        assert!(parse_fstab("/dev/a /cache ext4 defaults length=big\n").is_err());
        assert!(parse_fstab("/dev/a cache ext4\n").is_err());
    }
}
