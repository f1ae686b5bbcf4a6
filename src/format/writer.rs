//! Superblock writer: fresh formatting of cache and backing devices.
//!
//! Порядок на устройстве фиксированный: guards -> геометрия -> обнуление
//! головы диска -> sentinel -> первичный superblock (commit point) ->
//! вторичные слоты / журнал. Откатов нет: любой сбой оставляет устройство
//! в недоформатированном состоянии, и это документированное упрощение.

use anyhow::Result;
use log::{debug, info};
use std::cmp::min;
use uuid::Uuid;

use crate::consts::*;
use crate::dev::DevHandle;
use crate::errors::FormatError;
use crate::geom;
use crate::sb::Superblock;
use crate::sig::SignatureProbe;

use super::{DeviceRole, FormatRequest, SbSummary};

/// Format one device. Returns a summary per written slot (cache devices
/// produce exactly one).
pub fn format_device(
    req: &FormatRequest,
    sig: &dyn SignatureProbe,
) -> Result<Vec<SbSummary>> {
    let dev = DevHandle::open_excl(&req.dev)?;

    // Guard 1: existing escache superblock needs an explicit override.
    let mut slot0 = [0u8; SB_SIZE];
    dev.read_exact_at(&mut slot0, SB_START)?;
    let existing = Superblock::decode(&slot0)?;
    if existing.has_valid_magic() && !req.wipe_existing {
        return Err(FormatError::AlreadyFormatted {
            dev: req.dev.clone(),
        }
        .into());
    }

    // Guard 2: anything another system would recognize stays untouched.
    if sig.has_foreign_signature(&req.dev)? {
        return Err(FormatError::ForeignSignature {
            dev: req.dev.clone(),
        }
        .into());
    }

    // All geometry is validated before the first byte is written.
    let geometry = geom::probe(&req.dev)?;
    let mut sb = build_superblock(req, geometry.total_sectors)?;

    // Erase any stale signature and stale sentinel in the reserved head.
    let zeroes = vec![0u8; SB_START as usize];
    dev.write_all_at(&zeroes, 0)?;

    // The tag always lands before the superblock; the superblock write is
    // the commit point.
    if let Some(tag) = req.sentinel.tag() {
        dev.write_all_at(tag, 0)?;
    }

    sb.set_csum();
    dev.write_all_at(&sb.encode(), SB_START)?;
    dev.sync()?;
    info!(
        "wrote primary superblock on {} (version {})",
        req.dev.display(),
        sb.version
    );

    let mut summaries = vec![SbSummary {
        dev: req.dev.clone(),
        slot: 0,
        sb: sb.clone(),
    }];

    match req.role {
        DeviceRole::Backing => {
            // Each extra slot is an independent candidate with a fresh
            // identity, not a mirror of slot 0.
            for idx in 1..req.sb_num {
                sb.uuid = *Uuid::new_v4().as_bytes();
                sb.set_uuid = *Uuid::new_v4().as_bytes();
                sb.offset = sb_slot_sector(idx);
                sb.set_csum();
                dev.write_all_at(&sb.encode(), sb_slot_offset(idx))?;
                debug!("wrote secondary superblock {} on {}", idx, req.dev.display());
                summaries.push(SbSummary {
                    dev: req.dev.clone(),
                    slot: idx,
                    sb: sb.clone(),
                });
            }
        }
        DeviceRole::Cache => {
            zero_journal(&dev, &sb)?;
        }
    }

    dev.sync()?;
    Ok(summaries)
}

/// Populate the record for `req`; fails on geometry violations without
/// having touched the device.
fn build_superblock(req: &FormatRequest, total_sectors: u64) -> Result<Superblock> {
    let mut sb = Superblock {
        offset: SB_SECTOR,
        uuid: req.uuid,
        set_uuid: req.set_uuid,
        block_size: req.block_size,
        bucket_size: req.bucket_size,
        ..Superblock::default()
    };

    match req.role {
        DeviceRole::Cache => {
            sb.version = SB_VERSION_CDEV;
            sb.nbuckets = total_sectors / req.bucket_size as u64;
            sb.nr_in_set = 1;
            sb.nr_this_dev = 0;
            sb.first_bucket = (SB_RESERVED_SECTORS / req.bucket_size as u64) as u16 + 1;
            if sb.nbuckets < MIN_CACHE_BUCKETS {
                return Err(FormatError::InsufficientBuckets {
                    dev: req.dev.clone(),
                    nbuckets: sb.nbuckets,
                    needed: MIN_CACHE_BUCKETS,
                }
                .into());
            }
            sb.set_discard(req.discard);
            sb.set_replacement_policy(req.replacement_policy);
        }
        DeviceRole::Backing => {
            let min_offset = bdev_min_data_offset(req.sb_num);
            let data_offset = req.data_offset.unwrap_or(min_offset);
            if data_offset < min_offset {
                return Err(FormatError::DataOffsetTooSmall {
                    dev: req.dev.clone(),
                    got: data_offset,
                    min: min_offset,
                }
                .into());
            }
            sb.version = if data_offset != BDEV_DATA_START_DEFAULT {
                SB_VERSION_BDEV_WITH_OFFSET
            } else {
                SB_VERSION_BDEV
            };
            sb.data_offset = data_offset;
            sb.set_cache_mode(req.cache_mode);
            sb.set_dirty(req.dirty);
        }
    }
    Ok(sb)
}

/// Zero the journal region of a cache device, bucket by bucket.
///
/// Two distinct caps on the walk: min against nbuckets bounds it to the
/// device, SB_JOURNAL_BUCKETS bounds it to the format's journal limit.
/// Each bucket is zeroed in SB_START-sized chunks; a huge bucket never
/// becomes one unbounded write.
fn zero_journal(dev: &DevHandle, sb: &Superblock) -> Result<()> {
    let bucket_bytes = sb.bucket_size as u64 * SECTOR_SIZE;
    let end = min(sb.nbuckets, sb.first_bucket as u64 + SB_JOURNAL_BUCKETS);
    let zeroes = vec![0u8; SB_START as usize];

    for bucket in sb.first_bucket as u64..end {
        let bucket_end = (bucket + 1) * bucket_bytes;
        let mut offset = bucket * bucket_bytes;
        while offset < bucket_end {
            let len = min(bucket_end - offset, SB_START);
            dev.write_all_at(&zeroes[..len as usize], offset)?;
            offset += len;
        }
    }
    debug!(
        "zeroed journal buckets {}..{} on {}",
        sb.first_bucket,
        end,
        dev.path().display()
    );
    Ok(())
}
