// SPDX-License-Identifier: GPL-3.0-only

//! Raw MTD flash partitions
//!
//! Partitions are discovered through `/proc/mtd` and erased block by block
//! through the MTD character device.

use std::fs::{self, File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SysError};

const PROC_MTD: &str = "/proc/mtd";

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct MtdInfoUser {
    kind: u8,
    flags: u32,
    size: u32,
    erase_size: u32,
    write_size: u32,
    oob_size: u32,
    padding: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct EraseInfoUser {
    start: u32,
    length: u32,
}

nix::ioctl_read!(mem_get_info, b'M', 1, MtdInfoUser);
nix::ioctl_write_ptr!(mem_erase, b'M', 2, EraseInfoUser);
nix::ioctl_write_ptr!(mem_get_bad_block, b'M', 11, i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdPartition {
    pub index: u32,
    pub name: String,
    pub size: u64,
    pub erase_size: u64,
}

impl MtdPartition {
    /// Block node used to mount a filesystem living on this partition.
    pub fn block_device(&self) -> String {
        format!("/dev/block/mtdblock{}", self.index)
    }

    fn char_device(&self) -> Option<String> {
        [
            format!("/dev/mtd/mtd{}", self.index),
            format!("/dev/mtd{}", self.index),
        ]
        .into_iter()
        .find(|path| Path::new(path).exists())
    }
}

pub fn scan_partitions() -> Result<Vec<MtdPartition>> {
    let raw = fs::read_to_string(PROC_MTD)?;
    Ok(parse_proc_mtd(&raw))
}

pub fn find_partition_by_name<'a>(
    partitions: &'a [MtdPartition],
    name: &str,
) -> Option<&'a MtdPartition> {
    partitions.iter().find(|partition| partition.name == name)
}

fn parse_proc_mtd(input: &str) -> Vec<MtdPartition> {
    input
        .lines()
        .filter_map(|line| {
            // mtd3: 00800000 00020000 "cache"
            let (device, rest) = line.split_once(':')?;
            let index = device.trim().strip_prefix("mtd")?.parse().ok()?;

            let mut fields = rest.split_whitespace();
            let size = u64::from_str_radix(fields.next()?, 16).ok()?;
            let erase_size = u64::from_str_radix(fields.next()?, 16).ok()?;

            let name = rest.split_once('"')?.1.strip_suffix('"')?.to_string();

            Some(MtdPartition {
                index,
                name,
                size,
                erase_size,
            })
        })
        .collect()
}

/// Open write handle on an MTD partition
///
/// The descriptor is closed on drop; [`MtdWriter::close`] additionally
/// reports the flush result.
#[derive(Debug)]
pub struct MtdWriter {
    file: File,
    partition: MtdPartition,
}

impl MtdWriter {
    pub fn open(partition: &MtdPartition) -> Result<Self> {
        let path = partition
            .char_device()
            .ok_or_else(|| SysError::DeviceNotFound(format!("mtd{}", partition.index)))?;

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            file,
            partition: partition.clone(),
        })
    }

    /// Erase every good erase block of the partition; returns bytes erased.
    pub fn erase_all(&mut self) -> Result<u64> {
        let fd = self.file.as_raw_fd();
        let mut info = MtdInfoUser::default();
        unsafe { mem_get_info(fd, &mut info) }
            .map_err(|errno| SysError::errno("MEMGETINFO", &self.partition.name, errno))?;

        let erase_size = u64::from(info.erase_size).max(1);
        let size = u64::from(info.size);
        if size != self.partition.size {
            warn!(
                "{}: MEMGETINFO reports 0x{:x} bytes, /proc/mtd 0x{:x}",
                self.partition.name, size, self.partition.size
            );
        }
        let mut erased = 0;
        let mut offset = 0;

        while offset < size {
            let position = offset as i64;
            match unsafe { mem_get_bad_block(fd, &position) } {
                Ok(bad) if bad > 0 => {
                    warn!(
                        "skipping bad block at 0x{:08x} on {}",
                        offset, self.partition.name
                    );
                    offset += erase_size;
                    continue;
                }
                _ => {}
            }

            let region = EraseInfoUser {
                start: offset as u32,
                length: erase_size as u32,
            };
            unsafe { mem_erase(fd, &region) }.map_err(|errno| {
                SysError::errno("MEMERASE", format!("{}@0x{offset:08x}", self.partition.name), errno)
            })?;

            erased += erase_size;
            offset += erase_size;
        }

        debug!("erased {} bytes of {}", erased, self.partition.name);
        Ok(erased)
    }

    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
