// SPDX-License-Identifier: GPL-3.0-only

//! In-memory backend for unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use enumflags2::BitFlags;
use volume_sys::MtdPartition;
use volume_types::{MountFlag, MountedVolume, Result, VolumeError};

use crate::backend::Backend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exists(String),
    CreateDir(String),
    Mount {
        source: String,
        target: String,
        fs_type: String,
        flags: BitFlags<MountFlag>,
        data: String,
    },
    Unmount(String),
    ScanMounts,
    FindMtd(String),
    EraseMtd(String),
    Wipe(String),
    EraseVolume(String),
    DeviceSize(String),
    MakeExt4 {
        device: String,
        blocks: Option<u64>,
        label: String,
    },
    MakeF2fs {
        device: String,
        sectors: u64,
    },
    ZeroChunks {
        device: String,
        chunk_size: usize,
        chunks: usize,
    },
    RemoveFile(PathBuf),
    Sleep(Duration),
}

/// Accepts a mount when every field that is set matches.
#[derive(Debug, Clone)]
struct MountRule {
    source: Option<String>,
    fs_type: Option<String>,
    read_only: Option<bool>,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    nodes: HashSet<String>,
    mounted: Vec<MountedVolume>,
    mount_rules: Vec<MountRule>,
    /// Mounts failing regardless of rules before the rules apply
    forced_mount_failures: u32,
    mtd: Vec<MtdPartition>,
    sizes: HashMap<String, u64>,
    unmount_result: Option<VolumeError>,
    erase_result: Option<VolumeError>,
    tool_result: Option<VolumeError>,
    failed_chunk_writes: usize,
    remove_result: Option<VolumeError>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub(crate) fn add_node(&self, path: &str) {
        self.state.lock().unwrap().nodes.insert(path.to_string());
    }

    /// Make matching mounts succeed; `None` matches anything.
    pub(crate) fn allow_mount(
        &self,
        source: Option<&str>,
        fs_type: Option<&str>,
        read_only: Option<bool>,
    ) {
        self.state.lock().unwrap().mount_rules.push(MountRule {
            source: source.map(str::to_string),
            fs_type: fs_type.map(str::to_string),
            read_only,
        });
    }

    pub(crate) fn fail_next_mounts(&self, count: u32) {
        self.state.lock().unwrap().forced_mount_failures = count;
    }

    pub(crate) fn set_mounted(&self, device: &str, mount_point: &str, fs_type: &str) {
        self.state.lock().unwrap().mounted.push(MountedVolume {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: fs_type.to_string(),
        });
    }

    pub(crate) fn is_mounted(&self, mount_point: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .mounted
            .iter()
            .any(|volume| volume.mount_point == mount_point)
    }

    pub(crate) fn add_mtd(&self, index: u32, name: &str) {
        self.state.lock().unwrap().mtd.push(MtdPartition {
            index,
            name: name.to_string(),
            size: 0x80_0000,
            erase_size: 0x2_0000,
        });
    }

    pub(crate) fn set_size(&self, device: &str, size: u64) {
        self.state
            .lock()
            .unwrap()
            .sizes
            .insert(device.to_string(), size);
    }

    pub(crate) fn set_unmount_result(&self, res: Result<()>) {
        self.state.lock().unwrap().unmount_result = res.err();
    }

    pub(crate) fn set_erase_result(&self, res: Result<()>) {
        self.state.lock().unwrap().erase_result = res.err();
    }

    pub(crate) fn set_tool_result(&self, res: Result<()>) {
        self.state.lock().unwrap().tool_result = res.err();
    }

    pub(crate) fn set_failed_chunk_writes(&self, failed: usize) {
        self.state.lock().unwrap().failed_chunk_writes = failed;
    }

    pub(crate) fn set_remove_result(&self, res: Result<()>) {
        self.state.lock().unwrap().remove_result = res.err();
    }

    pub(crate) fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().unwrap().calls)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Backend for FakeBackend {
    fn node_exists(&self, path: &str) -> bool {
        self.record(Call::Exists(path.to_string()));
        self.state.lock().unwrap().nodes.contains(path)
    }

    fn create_dir(&self, path: &str, _mode: u32) -> Result<()> {
        self.record(Call::CreateDir(path.to_string()));
        Ok(())
    }

    fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        flags: BitFlags<MountFlag>,
        data: &str,
    ) -> Result<()> {
        self.record(Call::Mount {
            source: source.to_string(),
            target: target.to_string(),
            fs_type: fs_type.to_string(),
            flags,
            data: data.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        let forced_failure = state.forced_mount_failures > 0;
        state.forced_mount_failures = state.forced_mount_failures.saturating_sub(1);

        let read_only = flags.contains(MountFlag::ReadOnly);
        let accepted = !forced_failure
            && state.mount_rules.iter().any(|rule| {
                rule.source.as_deref().is_none_or(|s| s == source)
                    && rule.fs_type.as_deref().is_none_or(|t| t == fs_type)
                    && rule.read_only.is_none_or(|ro| ro == read_only)
            });

        if !accepted {
            return Err(VolumeError::syscall(
                "mount",
                format!("{source} on {target}"),
                "Invalid argument",
            ));
        }

        state.mounted.push(MountedVolume {
            device: source.to_string(),
            mount_point: target.to_string(),
            fs_type: fs_type.to_string(),
        });
        Ok(())
    }

    fn unmount(&self, target: &str) -> Result<()> {
        self.record(Call::Unmount(target.to_string()));
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.unmount_result.clone() {
            return Err(error);
        }
        state.mounted.retain(|volume| volume.mount_point != target);
        Ok(())
    }

    fn mounted_volumes(&self) -> Result<Vec<MountedVolume>> {
        self.record(Call::ScanMounts);
        Ok(self.state.lock().unwrap().mounted.clone())
    }

    fn find_mtd_partition(&self, name: &str) -> Result<Option<MtdPartition>> {
        self.record(Call::FindMtd(name.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .mtd
            .iter()
            .find(|partition| partition.name == name)
            .cloned())
    }

    fn erase_mtd_partition(&self, partition: &MtdPartition) -> Result<()> {
        self.record(Call::EraseMtd(partition.name.clone()));
        match self.state.lock().unwrap().erase_result.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn wipe_device(&self, path: &str) -> Result<()> {
        self.record(Call::Wipe(path.to_string()));
        Ok(())
    }

    fn erase_volume(&self, device: &str) -> Result<()> {
        self.record(Call::EraseVolume(device.to_string()));
        match self.state.lock().unwrap().erase_result.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn device_size(&self, device: &str) -> Result<u64> {
        self.record(Call::DeviceSize(device.to_string()));
        self.state
            .lock()
            .unwrap()
            .sizes
            .get(device)
            .copied()
            .ok_or_else(|| VolumeError::syscall("open", device, "No such file or directory"))
    }

    fn make_ext4(&self, device: &str, blocks: Option<u64>, label: &str) -> Result<()> {
        self.record(Call::MakeExt4 {
            device: device.to_string(),
            blocks,
            label: label.to_string(),
        });
        match self.state.lock().unwrap().tool_result.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn make_f2fs(&self, device: &str, sectors: u64) -> Result<()> {
        self.record(Call::MakeF2fs {
            device: device.to_string(),
            sectors,
        });
        match self.state.lock().unwrap().tool_result.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn zero_chunks(&self, device: &str, chunk_size: usize, chunks: usize) -> Result<usize> {
        self.record(Call::ZeroChunks {
            device: device.to_string(),
            chunk_size,
            chunks,
        });
        let state = self.state.lock().unwrap();
        if !state.nodes.contains(device) {
            return Err(VolumeError::NotFound(device.to_string()));
        }
        Ok(state.failed_chunk_writes)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.record(Call::RemoveFile(path.to_path_buf()));
        match self.state.lock().unwrap().remove_result.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn sleep(&self, duration: Duration) {
        self.record(Call::Sleep(duration));
    }
}
