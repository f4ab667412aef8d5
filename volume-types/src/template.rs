// SPDX-License-Identifier: GPL-3.0-only

//! Removable-media device templates
//!
//! Removable media do not get a stable device node at boot, so the table
//! names them with two `#` markers: the first stands for the device
//! instance, the second for the partition number.
//!
//! - `/dev/block/mmcblk#p#` (SD card) enumerates `mmcblk0p1`, `mmcblk0p2`, ...
//! - `/dev/block/sd##` (USB disk) enumerates `sda1`, `sda2`, ...

pub const PLACEHOLDER: char = '#';

const MMC_PREFIX: &str = "/dev/block/mmcblk";
const USB_PREFIX: &str = "/dev/block/sd";

/// Family of removable media, which decides the instance alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// SD/MMC cards, instances numbered from `0`
    Mmc,

    /// USB mass storage, instances lettered from `a`
    Usb,
}

impl DeviceClass {
    pub fn from_path(path: &str) -> Option<Self> {
        if path.starts_with(MMC_PREFIX) {
            Some(Self::Mmc)
        } else if path.starts_with(USB_PREFIX) {
            Some(Self::Usb)
        } else {
            None
        }
    }

    /// Symbol substituted for the instance marker, if `index` is representable.
    pub fn instance_symbol(self, index: usize) -> Option<String> {
        match self {
            Self::Mmc => Some(index.to_string()),
            Self::Usb => u8::try_from(index)
                .ok()
                .filter(|index| *index < 26)
                .map(|index| char::from(b'a' + index).to_string()),
        }
    }

    /// Largest instance count this class can enumerate.
    pub fn max_instances(self) -> usize {
        match self {
            Self::Mmc => usize::MAX,
            Self::Usb => 26,
        }
    }
}

/// Result of inspecting a `blk_device` for enumeration markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateShape {
    /// Exactly two markers on a known device class
    Valid(BlkDeviceTemplate),

    /// No markers: the string is a literal device node
    NotApplicable,

    /// Markers present but unusable; enumeration must not start
    Malformed(String),
}

/// A validated two-marker device name, split around its markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlkDeviceTemplate {
    class: DeviceClass,
    head: String,
    middle: String,
    tail: String,
}

/// One concrete device node produced by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub instance: usize,
    /// `None` for the bare whole-device node
    pub partition: Option<u32>,
}

impl BlkDeviceTemplate {
    /// Classify `blk_device` without touching the filesystem.
    pub fn classify(blk_device: &str) -> TemplateShape {
        let markers = blk_device.matches(PLACEHOLDER).count();
        match markers {
            0 => return TemplateShape::NotApplicable,
            2 => {}
            n => {
                return TemplateShape::Malformed(format!(
                    "{blk_device} has {n} '{PLACEHOLDER}' markers, expected 2"
                ));
            }
        }

        let Some(class) = DeviceClass::from_path(blk_device) else {
            return TemplateShape::Malformed(format!(
                "{blk_device} does not name a known removable device family"
            ));
        };

        let mut parts = blk_device.splitn(3, PLACEHOLDER);
        let head = parts.next().unwrap_or_default();
        let middle = parts.next().unwrap_or_default();
        let tail = parts.next().unwrap_or_default();

        TemplateShape::Valid(Self {
            class,
            head: head.to_string(),
            middle: middle.to_string(),
            tail: tail.to_string(),
        })
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Node for partition `partition` of instance `instance`.
    pub fn partition_node(&self, instance: usize, partition: u32) -> Option<String> {
        let symbol = self.class.instance_symbol(instance)?;
        let mut path = String::with_capacity(
            self.head.len() + symbol.len() + self.middle.len() + self.tail.len() + 2,
        );
        path.push_str(&self.head);
        path.push_str(&symbol);
        path.push_str(&self.middle);
        path.push_str(&partition.to_string());
        path.push_str(&self.tail);
        Some(path)
    }

    /// Whole-device node of instance `instance` (partition suffix stripped).
    pub fn bare_node(&self, instance: usize) -> Option<String> {
        let symbol = self.class.instance_symbol(instance)?;
        let separator = match self.class {
            // mmcblk0p1 -> mmcblk0
            DeviceClass::Mmc => self.middle.strip_suffix('p').unwrap_or(&self.middle),
            DeviceClass::Usb => self.middle.as_str(),
        };
        Some(format!("{}{}{}", self.head, symbol, separator))
    }

    /// Every node to probe, in probe order.
    ///
    /// For each instance the partitions `1..=partitions` come first in
    /// ascending order, then the bare device. The sequence is lazy so the
    /// caller can stop at the first node that mounts.
    pub fn candidates(
        &self,
        instances: usize,
        partitions: u32,
    ) -> impl Iterator<Item = Candidate> + '_ {
        (0..instances.min(self.class.max_instances())).flat_map(move |instance| {
            let partitioned = (1..=partitions).filter_map(move |partition| {
                self.partition_node(instance, partition)
                    .map(|path| Candidate {
                        path,
                        instance,
                        partition: Some(partition),
                    })
            });
            let bare = self.bare_node(instance).map(|path| Candidate {
                path,
                instance,
                partition: None,
            });
            partitioned.chain(bare)
        })
    }
}
