//! Formatting requests and shared batch planning.
//!
//! One request struct per device carries everything the writer needs,
//! including the sentinel policy (an explicit field, not process state:
//! devices in one batch may want different tags some day). The batch plan
//! pins block_size and the shared set identity before any device is
//! touched.

pub mod reset;
pub mod writer;

pub use reset::{reset_backing_identity, ResetRequest};
pub use writer::format_device;

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::consts::{bdev_min_data_offset, SB_NUM_MAX};
use crate::geom;
use crate::sb::{CacheMode, CacheReplacement, Superblock};
use crate::sentinel::SentinelKind;

/// Which side of the cache set a device joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Cache,
    Backing,
}

/// Everything needed to format one device.
#[derive(Debug, Clone)]
pub struct FormatRequest {
    pub dev: PathBuf,
    pub role: DeviceRole,
    /// Block size in 512-byte sectors (batch-wide).
    pub block_size: u16,
    /// Bucket size in 512-byte sectors; power of two, >= block_size.
    pub bucket_size: u16,
    pub uuid: [u8; 16],
    pub set_uuid: [u8; 16],
    /// Overwrite an existing escache superblock.
    pub wipe_existing: bool,
    pub sentinel: SentinelKind,
    // cache devices
    pub discard: bool,
    pub replacement_policy: CacheReplacement,
    // backing devices
    pub cache_mode: CacheMode,
    /// Pre-attach in dirty state, expecting writeback resume.
    pub dirty: bool,
    /// Explicit first data sector; None picks the slot-count minimum.
    pub data_offset: Option<u64>,
    /// Superblock slots to write (backing devices), 1..=SB_NUM_MAX.
    pub sb_num: usize,
}

impl FormatRequest {
    pub fn new(dev: impl Into<PathBuf>, role: DeviceRole) -> Self {
        Self {
            dev: dev.into(),
            role,
            block_size: 1,
            bucket_size: 1024,
            uuid: *Uuid::new_v4().as_bytes(),
            set_uuid: *Uuid::new_v4().as_bytes(),
            wipe_existing: false,
            sentinel: SentinelKind::None,
            discard: false,
            replacement_policy: CacheReplacement::Lru,
            cache_mode: CacheMode::Writethrough,
            dirty: false,
            data_offset: None,
            sb_num: 1,
        }
    }
}

/// Batch-wide parameters, resolved before any write.
#[derive(Debug, Clone)]
pub struct FormatPlan {
    pub block_size: u16,
    pub bucket_size: u16,
    pub set_uuid: [u8; 16],
    pub data_offset: u64,
    pub sb_num: usize,
}

impl FormatPlan {
    /// Probe every target up front and settle the shared geometry.
    ///
    /// block_size defaults to the maximum probed logical block size across
    /// all devices, so one record layout fits heterogeneous members.
    pub fn resolve(
        devices: &[PathBuf],
        block_size: Option<u16>,
        bucket_size: u16,
        data_offset: Option<u64>,
        sb_num: usize,
    ) -> Result<Self> {
        if devices.is_empty() {
            return Err(anyhow!("please supply a device"));
        }
        if sb_num == 0 || sb_num > SB_NUM_MAX {
            return Err(anyhow!("bad sb-num {}, maximum {}", sb_num, SB_NUM_MAX));
        }

        let block_size = match block_size {
            Some(bs) => bs,
            None => {
                let mut max = 1u16;
                for dev in devices {
                    let g = geom::probe(dev)?;
                    max = max.max(g.block_sectors.min(u16::MAX as u64) as u16);
                }
                max
            }
        };

        if bucket_size < block_size {
            return Err(anyhow!(
                "bucket size ({} sectors) cannot be smaller than block size ({} sectors)",
                bucket_size,
                block_size
            ));
        }

        let min_offset = bdev_min_data_offset(sb_num);
        let data_offset = match data_offset {
            None => min_offset,
            Some(off) if off < min_offset => {
                return Err(anyhow!(
                    "bad data offset {}; minimum {} sectors for {} superblocks",
                    off,
                    min_offset,
                    sb_num
                ))
            }
            Some(off) => off,
        };

        Ok(Self {
            block_size,
            bucket_size,
            set_uuid: *Uuid::new_v4().as_bytes(),
            data_offset,
            sb_num,
        })
    }
}

/// A superblock as written, for rendering by the CLI.
#[derive(Debug, Clone)]
pub struct SbSummary {
    pub dev: PathBuf,
    pub slot: usize,
    pub sb: Superblock,
}

impl fmt::Display for SbSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = Uuid::from_bytes(self.sb.uuid);
        let set_uuid = Uuid::from_bytes(self.sb.set_uuid);
        let label = if self.slot > 0 { "secondary UUID" } else { "UUID" };
        writeln!(f, "{}:\t\t{}", label, uuid)?;
        writeln!(f, "Set UUID:\t\t{}", set_uuid)?;
        writeln!(f, "version:\t\t{}", self.sb.version)?;
        if self.sb.is_backing_device() {
            writeln!(f, "block_size:\t\t{}", self.sb.block_size)?;
            write!(f, "data_offset:\t\t{}", self.sb.data_offset)
        } else {
            writeln!(f, "nbuckets:\t\t{}", self.sb.nbuckets)?;
            writeln!(f, "block_size:\t\t{}", self.sb.block_size)?;
            writeln!(f, "bucket_size:\t\t{}", self.sb.bucket_size)?;
            writeln!(f, "nr_in_set:\t\t{}", self.sb.nr_in_set)?;
            writeln!(f, "nr_this_dev:\t\t{}", self.sb.nr_this_dev)?;
            write!(f, "first_bucket:\t\t{}", self.sb.first_bucket)
        }
    }
}
