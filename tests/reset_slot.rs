use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use escache_tools::consts::{sb_slot_offset, SB_SIZE};
use escache_tools::format::{
    format_device, reset_backing_identity, DeviceRole, FormatRequest, ResetRequest,
};
use escache_tools::sb::Superblock;
use escache_tools::sig::NoForeignSignatures;
use escache_tools::FormatError;

fn formatted_backing(prefix: &str, sb_num: usize) -> Result<(PathBuf, FormatRequest)> {
    let img = image(prefix, 1024 * 1024);
    let mut req = FormatRequest::new(&img, DeviceRole::Backing);
    req.block_size = 1;
    req.bucket_size = 1024;
    req.sb_num = sb_num;
    format_device(&req, &NoForeignSignatures)?;
    Ok((img, req))
}

#[test]
fn reset_mints_identity_and_preserves_geometry() -> Result<()> {
    let (img, _req) = formatted_backing("reset-ok", 2)?;
    let slot0_before = read_raw(&img, 0)?;
    let old = read_slot(&img, 1)?;

    let reset = ResetRequest {
        dev: img.clone(),
        slot: 1,
        uuid: [0x77; 16],
        set_uuid: [0x88; 16],
        wipe_existing: true,
    };
    let summary = reset_backing_identity(&reset)?;
    assert_eq!(summary.slot, 1);

    let new = read_slot(&img, 1)?;
    assert!(new.has_valid_magic());
    assert!(new.csum_matches());
    assert!(new.is_backing_device());
    assert_eq!(new.uuid, [0x77; 16]);
    assert_eq!(new.set_uuid, [0x88; 16]);
    // geometry is carried over bit-exactly
    assert_eq!(new.block_size, old.block_size);
    assert_eq!(new.bucket_size, old.bucket_size);
    assert_eq!(new.data_offset, old.data_offset);
    assert_ne!(new.uuid, old.uuid);
    assert_ne!(new.set_uuid, old.set_uuid);

    // the neighbor slot is untouched
    assert_eq!(read_raw(&img, 0)?, slot0_before);

    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn reset_rejects_unchanged_identity() -> Result<()> {
    let (img, req) = formatted_backing("reset-same", 1)?;

    // same device uuid
    let err = reset_backing_identity(&ResetRequest {
        dev: img.clone(),
        slot: 0,
        uuid: req.uuid,
        set_uuid: [0x99; 16],
        wipe_existing: true,
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::IdentityUnchanged { what: "bdev-uuid", .. })
    ));

    // same set uuid
    let err = reset_backing_identity(&ResetRequest {
        dev: img.clone(),
        slot: 0,
        uuid: [0x99; 16],
        set_uuid: req.set_uuid,
        wipe_existing: true,
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::IdentityUnchanged { what: "cset-uuid", .. })
    ));

    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn reset_requires_the_wipe_override() -> Result<()> {
    let (img, _req) = formatted_backing("reset-nowipe", 1)?;
    let err = reset_backing_identity(&ResetRequest {
        dev: img.clone(),
        slot: 0,
        uuid: [0x11; 16],
        set_uuid: [0x22; 16],
        wipe_existing: false,
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::AlreadyFormatted { .. })
    ));
    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn reset_refuses_blank_and_cache_devices() -> Result<()> {
    // blank image: no magic at the slot
    let blank = image("reset-blank", 1024 * 1024);
    let err = reset_backing_identity(&ResetRequest {
        dev: blank.clone(),
        slot: 0,
        uuid: [0x11; 16],
        set_uuid: [0x22; 16],
        wipe_existing: true,
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::NotFormatted { slot: 0, .. })
    ));

    // cache device: right magic, wrong version
    let cache = image("reset-cache", 16 * 1024 * 1024);
    let mut creq = FormatRequest::new(&cache, DeviceRole::Cache);
    creq.block_size = 1;
    creq.bucket_size = 8;
    format_device(&creq, &NoForeignSignatures)?;
    let err = reset_backing_identity(&ResetRequest {
        dev: cache.clone(),
        slot: 0,
        uuid: [0x11; 16],
        set_uuid: [0x22; 16],
        wipe_existing: true,
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::NotBackingDevice { .. })
    ));

    fs::remove_file(blank).ok();
    fs::remove_file(cache).ok();
    Ok(())
}

#[test]
fn reset_rejects_out_of_range_slot() -> Result<()> {
    let (img, _req) = formatted_backing("reset-range", 1)?;
    assert!(reset_backing_identity(&ResetRequest {
        dev: img.clone(),
        slot: 8,
        uuid: [0x11; 16],
        set_uuid: [0x22; 16],
        wipe_existing: true,
    })
    .is_err());
    fs::remove_file(img).ok();
    Ok(())
}

fn image(prefix: &str, len: u64) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "escache-{}-{}-{}",
        prefix,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let f = fs::File::create(&path).unwrap();
    f.set_len(len).unwrap();
    path
}

fn read_raw(path: &PathBuf, slot: usize) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    let start = sb_slot_offset(slot) as usize;
    Ok(bytes[start..start + SB_SIZE].to_vec())
}

fn read_slot(path: &PathBuf, slot: usize) -> Result<Superblock> {
    let bytes = fs::read(path)?;
    let start = sb_slot_offset(slot) as usize;
    Superblock::decode(&bytes[start..start + SB_SIZE])
}
