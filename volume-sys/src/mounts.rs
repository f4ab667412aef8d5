// SPDX-License-Identifier: GPL-3.0-only

//! Live mount table
//!
//! Snapshots are rebuilt from `/proc/self/mountinfo` on every call so they
//! include mounts made by other processes.

use std::fs;

use volume_types::MountedVolume;

use crate::error::{Result, SysError};

const MOUNTINFO: &str = "/proc/self/mountinfo";

pub fn scan_mounted_volumes() -> Result<Vec<MountedVolume>> {
    let mount_info = fs::read_to_string(MOUNTINFO)?;
    parse_mountinfo(&mount_info)
}

pub fn find_mounted_volume<'a>(
    volumes: &'a [MountedVolume],
    mount_point: &str,
) -> Option<&'a MountedVolume> {
    // Later rows shadow earlier ones stacked on the same mount point.
    volumes
        .iter()
        .rev()
        .find(|volume| volume.mount_point == mount_point)
}

pub fn parse_mountinfo(input: &str) -> Result<Vec<MountedVolume>> {
    let mut volumes = Vec::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let (left, right) = line
            .split_once(" - ")
            .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;

        let mount_point = left
            .split_whitespace()
            .nth(4)
            .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;

        let mut right_fields = right.split_whitespace();
        let fs_type = right_fields
            .next()
            .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;
        let device = right_fields.next().unwrap_or("none");

        volumes.push(MountedVolume {
            device: unescape_mount_field(device),
            mount_point: unescape_mount_field(mount_point),
            fs_type: fs_type.to_string(),
        });
    }

    Ok(volumes)
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
