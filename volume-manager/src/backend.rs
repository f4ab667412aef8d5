// SPDX-License-Identifier: GPL-3.0-only

//! System seam of the volume manager
//!
//! Every side effect the manager performs goes through [`Backend`].
//! [`SystemBackend`] forwards to `volume-sys`; tests substitute a fake.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use enumflags2::BitFlags;
use tracing::{debug, info, warn};
use volume_sys::{MtdPartition, MtdWriter};
use volume_types::{MountFlag, MountedVolume, Result, ToolPaths, VolumeError};

/// Leading region cleared when a device cannot discard.
const ERASE_FALLBACK_BYTES: u64 = 1024 * 1024;

pub trait Backend {
    fn node_exists(&self, path: &str) -> bool;

    /// Create `path` (and parents) if it does not exist yet.
    fn create_dir(&self, path: &str, mode: u32) -> Result<()>;

    fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        flags: BitFlags<MountFlag>,
        data: &str,
    ) -> Result<()>;

    fn unmount(&self, target: &str) -> Result<()>;

    /// Fresh snapshot of the live mount table.
    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>>;

    /// Scan MTD partitions and return the one called `name`.
    fn find_mtd_partition(&self, name: &str) -> Result<Option<MtdPartition>>;

    /// Open, erase and close an MTD partition.
    fn erase_mtd_partition(&self, partition: &MtdPartition) -> Result<()>;

    /// Zero-fill a crypto-footer device up to its reported size.
    fn wipe_device(&self, path: &str) -> Result<()>;

    /// Erase a block device before a filesystem is created on it.
    fn erase_volume(&self, device: &str) -> Result<()>;

    fn device_size(&self, device: &str) -> Result<u64>;

    fn make_ext4(&self, device: &str, blocks: Option<u64>, label: &str) -> Result<()>;

    fn make_f2fs(&self, device: &str, sectors: u64) -> Result<()>;

    /// Zero `chunks` leading chunks of an existing device; returns failed writes.
    fn zero_chunks(&self, device: &str, chunk_size: usize, chunks: usize) -> Result<usize>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn sleep(&self, duration: Duration);
}

/// Backend acting on the running system
#[derive(Debug, Clone)]
pub struct SystemBackend {
    mkfs_ext4: PathBuf,
    mkfs_f2fs: PathBuf,
}

impl SystemBackend {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            mkfs_ext4: tools.mkfs_ext4.clone(),
            mkfs_f2fs: tools.mkfs_f2fs.clone(),
        }
    }
}

impl Backend for SystemBackend {
    fn node_exists(&self, path: &str) -> bool {
        volume_sys::node_exists(path)
    }

    fn create_dir(&self, path: &str, mode: u32) -> Result<()> {
        if Path::new(path).is_dir() {
            return Ok(());
        }
        DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| VolumeError::syscall("mkdir", path, e))
    }

    fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        flags: BitFlags<MountFlag>,
        data: &str,
    ) -> Result<()> {
        Ok(volume_sys::mount(source, target, fs_type, flags, data)?)
    }

    fn unmount(&self, target: &str) -> Result<()> {
        Ok(volume_sys::unmount(target)?)
    }

    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>> {
        Ok(volume_sys::scan_mounted_volumes()?)
    }

    fn find_mtd_partition(&self, name: &str) -> Result<Option<MtdPartition>> {
        let partitions = volume_sys::scan_partitions()?;
        Ok(volume_sys::find_partition_by_name(&partitions, name).cloned())
    }

    fn erase_mtd_partition(&self, partition: &MtdPartition) -> Result<()> {
        let mut writer = MtdWriter::open(partition).map_err(|e| {
            warn!("can't open MTD \"{}\": {}", partition.name, e);
            VolumeError::from(e)
        })?;

        // The writer is dropped (and its descriptor closed) on the error path too.
        if let Err(e) = writer.erase_all() {
            warn!("can't erase MTD \"{}\": {}", partition.name, e);
            return Err(e.into());
        }

        writer.close().map_err(|e| {
            warn!("can't close MTD \"{}\": {}", partition.name, e);
            VolumeError::from(e)
        })
    }

    fn wipe_device(&self, path: &str) -> Result<()> {
        let mut file = volume_sys::open_for_wipe(path)?;
        let size = volume_sys::device_size(&file)?;
        let written = volume_sys::zero_fill(&mut file, size)?;
        info!("wiped {} bytes of {}", written, path);
        Ok(())
    }

    fn erase_volume(&self, device: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|e| VolumeError::syscall("open", device, e))?;
        let size = volume_sys::device_size(&file)?;

        match volume_sys::discard_device(&file, size) {
            Ok(()) => {
                debug!("discarded {} bytes of {}", size, device);
                Ok(())
            }
            Err(e) => {
                warn!("discard failed on {} ({}), zeroing superblock region", device, e);
                volume_sys::zero_fill(&mut file, size.min(ERASE_FALLBACK_BYTES))?;
                Ok(())
            }
        }
    }

    fn device_size(&self, device: &str) -> Result<u64> {
        let file =
            std::fs::File::open(device).map_err(|e| VolumeError::syscall("open", device, e))?;
        Ok(volume_sys::device_size(&file)?)
    }

    fn make_ext4(&self, device: &str, blocks: Option<u64>, label: &str) -> Result<()> {
        Ok(volume_sys::make_ext4(&self.mkfs_ext4, device, blocks, label)?)
    }

    fn make_f2fs(&self, device: &str, sectors: u64) -> Result<()> {
        Ok(volume_sys::make_f2fs(&self.mkfs_f2fs, device, sectors)?)
    }

    fn zero_chunks(&self, device: &str, chunk_size: usize, chunks: usize) -> Result<usize> {
        Ok(volume_sys::zero_chunks(device, chunk_size, chunks)?)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)
            .map_err(|e| VolumeError::syscall("unlink", path.display().to_string(), e))
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
