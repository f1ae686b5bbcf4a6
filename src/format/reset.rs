//! Identity reset for one backing-device superblock slot.
//!
//! Mints a fresh uuid/set_uuid pair into an existing slot while keeping the
//! geometry (block_size, bucket_size, data_offset) bit-identical. Only the
//! addressed slot is rewritten; its neighbors are never read or touched.

use anyhow::{anyhow, Result};
use log::info;

use crate::consts::*;
use crate::dev::DevHandle;
use crate::errors::FormatError;
use crate::sb::Superblock;

use super::SbSummary;

#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub dev: std::path::PathBuf,
    /// Slot index, 0..SB_NUM_MAX.
    pub slot: usize,
    pub uuid: [u8; 16],
    pub set_uuid: [u8; 16],
    /// Required: the slot must already hold a superblock.
    pub wipe_existing: bool,
}

pub fn reset_backing_identity(req: &ResetRequest) -> Result<SbSummary> {
    if req.slot >= SB_NUM_MAX {
        return Err(anyhow!(
            "bad superblock index {}, maximum {}",
            req.slot,
            SB_NUM_MAX - 1
        ));
    }

    let dev = DevHandle::open_excl(&req.dev)?;
    let slot_offset = sb_slot_offset(req.slot);

    let mut buf = [0u8; SB_SIZE];
    dev.read_exact_at(&mut buf, slot_offset)?;
    let old = Superblock::decode(&buf)?;

    if old.has_valid_magic() {
        if !req.wipe_existing {
            return Err(FormatError::AlreadyFormatted {
                dev: req.dev.clone(),
            }
            .into());
        }
    } else {
        return Err(FormatError::NotFormatted {
            dev: req.dev.clone(),
            slot: req.slot,
        }
        .into());
    }

    if !old.is_backing_device() {
        return Err(FormatError::NotBackingDevice {
            dev: req.dev.clone(),
        }
        .into());
    }

    // A no-op identity is rejected, not silently accepted.
    if old.uuid == req.uuid {
        return Err(FormatError::IdentityUnchanged {
            dev: req.dev.clone(),
            what: "bdev-uuid",
        }
        .into());
    }
    if old.set_uuid == req.set_uuid {
        return Err(FormatError::IdentityUnchanged {
            dev: req.dev.clone(),
            what: "cset-uuid",
        }
        .into());
    }

    // Fresh record, geometry carried over verbatim.
    let mut sb = Superblock {
        offset: sb_slot_sector(req.slot),
        uuid: req.uuid,
        set_uuid: req.set_uuid,
        block_size: old.block_size,
        bucket_size: old.bucket_size,
        data_offset: old.data_offset,
        ..Superblock::default()
    };
    sb.version = if old.data_offset != BDEV_DATA_START_DEFAULT {
        SB_VERSION_BDEV_WITH_OFFSET
    } else {
        SB_VERSION_BDEV
    };
    sb.set_csum();

    dev.write_all_at(&sb.encode(), slot_offset)?;
    dev.sync()?;
    info!(
        "reset identity of slot {} on {}",
        req.slot,
        req.dev.display()
    );

    Ok(SbSummary {
        dev: req.dev.clone(),
        slot: req.slot,
        sb,
    })
}
