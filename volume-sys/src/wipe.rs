// SPDX-License-Identifier: GPL-3.0-only

//! Block device wiping using direct file I/O
//!
//! These functions clear crypto-footer devices and erase volumes ahead of
//! filesystem creation.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};

use tracing::warn;

use crate::error::{Result, SysError};

nix::ioctl_read!(blk_get_size64, 0x12, 114, u64);
nix::ioctl_write_ptr_bad!(blk_discard, nix::request_code_none!(0x12, 119), [u64; 2]);

const ZERO_CHUNK: usize = 1024 * 1024;

/// Open a device (or regular file) for wiping, creating it if missing.
pub fn open_for_wipe(path: &str) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o644)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysError::DeviceNotFound(path.to_string())
            } else {
                SysError::Io(e)
            }
        })
}

/// Zero the first `chunks * chunk_size` bytes of an existing device.
///
/// A failed chunk write is logged and the remaining chunks are still
/// written; returns how many chunks failed. The device is synced before
/// the descriptor is dropped.
pub fn zero_chunks(path: &str, chunk_size: usize, chunks: usize) -> Result<usize> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysError::DeviceNotFound(path.to_string())
            } else {
                SysError::Io(e)
            }
        })?;

    let buffer = vec![0u8; chunk_size];
    let mut failed = 0;
    for chunk in 0..chunks {
        if let Err(e) = file.write_all(&buffer) {
            warn!("write of chunk {} to {} failed: {}", chunk, path, e);
            failed += 1;
        }
    }

    file.sync_all()?;
    Ok(failed)
}

/// Size reported by the kernel for a block device, or the file length otherwise.
pub fn device_size(file: &File) -> Result<u64> {
    let metadata = file.metadata()?;
    if !metadata.file_type().is_block_device() {
        return Ok(metadata.len());
    }

    let mut size: u64 = 0;
    unsafe { blk_get_size64(file.as_raw_fd(), &mut size) }
        .map_err(|errno| SysError::errno("BLKGETSIZE64", "block device", errno))?;
    Ok(size)
}

/// Overwrite the first `length` bytes with zeros.
///
/// # Arguments
/// * `file` - Open write handle (typically a block device)
/// * `length` - Number of bytes to clear from offset 0
pub fn zero_fill(file: &mut File, length: u64) -> Result<u64> {
    file.seek(SeekFrom::Start(0))?;

    let buffer = vec![0u8; ZERO_CHUNK];
    let mut total_written: u64 = 0;

    while total_written < length {
        let chunk = (length - total_written).min(ZERO_CHUNK as u64) as usize;
        file.write_all(&buffer[..chunk])?;
        total_written += chunk as u64;
    }

    file.sync_all()?;
    Ok(total_written)
}

/// Ask the device to discard `length` bytes from offset 0.
pub fn discard_device(file: &File, length: u64) -> Result<()> {
    let range = [0u64, length];
    unsafe { blk_discard(file.as_raw_fd(), &range) }
        .map(|_| ())
        .map_err(|errno| SysError::errno("BLKDISCARD", "block device", errno))
}
