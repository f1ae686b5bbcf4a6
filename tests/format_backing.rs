use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use escache_tools::consts::{
    bdev_min_data_offset, sb_slot_offset, sb_slot_sector, SB_SIZE, SB_VERSION_BDEV_WITH_OFFSET,
};
use escache_tools::format::{format_device, DeviceRole, FormatRequest};
use escache_tools::sb::{CacheMode, Superblock};
use escache_tools::sig::NoForeignSignatures;
use escache_tools::FormatError;

#[test]
fn backing_format_with_three_slots() -> Result<()> {
    let img = image("bdev-slots", 1024 * 1024);

    let mut req = FormatRequest::new(&img, DeviceRole::Backing);
    req.block_size = 1;
    req.bucket_size = 1024;
    req.sb_num = 3;
    req.cache_mode = CacheMode::Writeback;
    req.dirty = true;
    let summaries = format_device(&req, &NoForeignSignatures)?;
    assert_eq!(summaries.len(), 3);

    let mut uuids = Vec::new();
    let mut set_uuids = Vec::new();
    for slot in 0..3 {
        let sb = read_slot(&img, slot)?;
        assert!(sb.has_valid_magic(), "slot {} magic", slot);
        assert!(sb.csum_matches(), "slot {} csum", slot);
        assert!(sb.is_backing_device(), "slot {} version", slot);
        assert_eq!(sb.offset, sb_slot_sector(slot));
        assert_eq!(sb.data_offset, bdev_min_data_offset(3));
        assert_eq!(sb.block_size, 1);
        assert_eq!(sb.bucket_size, 1024);
        assert_eq!(sb.cache_mode(), CacheMode::Writeback);
        assert!(sb.dirty());
        uuids.push(sb.uuid);
        set_uuids.push(sb.set_uuid);
    }

    // Slot 0 carries the requested identity; every further slot mints its
    // own uuid AND set uuid.
    assert_eq!(uuids[0], req.uuid);
    assert_eq!(set_uuids[0], req.set_uuid);
    uuids.sort();
    uuids.dedup();
    assert_eq!(uuids.len(), 3, "slot uuids must be pairwise distinct");
    set_uuids.sort();
    set_uuids.dedup();
    assert_eq!(set_uuids.len(), 3, "slot set uuids must be pairwise distinct");

    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn backing_explicit_data_offset() -> Result<()> {
    let img = image("bdev-offset", 1024 * 1024);

    let mut req = FormatRequest::new(&img, DeviceRole::Backing);
    req.block_size = 1;
    req.bucket_size = 1024;
    req.data_offset = Some(1024);
    let summaries = format_device(&req, &NoForeignSignatures)?;

    let sb = read_slot(&img, 0)?;
    assert_eq!(sb.version, SB_VERSION_BDEV_WITH_OFFSET);
    assert_eq!(sb.data_offset, 1024);
    assert_eq!(summaries[0].sb.data_offset, 1024);

    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn backing_data_offset_below_slot_minimum_fails() -> Result<()> {
    let img = image("bdev-badoffset", 1024 * 1024);
    let before = fs::read(&img)?;

    let mut req = FormatRequest::new(&img, DeviceRole::Backing);
    req.block_size = 1;
    req.bucket_size = 1024;
    req.sb_num = 4;
    // below 16 + 4*8 sectors
    req.data_offset = Some(40);
    let err = format_device(&req, &NoForeignSignatures).unwrap_err();
    match err.downcast_ref::<FormatError>() {
        Some(FormatError::DataOffsetTooSmall { got, min, .. }) => {
            assert_eq!(*got, 40);
            assert_eq!(*min, bdev_min_data_offset(4));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs::read(&img)?, before, "no byte may be written");

    fs::remove_file(img).ok();
    Ok(())
}

#[test]
fn cache_and_backing_share_set_identity() -> Result<()> {
    let cache_img = image("set-cache", 16 * 1024 * 1024);
    let bdev_img = image("set-bdev", 1024 * 1024);

    // One set uuid and block size settled before either device is written.
    let set_uuid = [0x5A; 16];
    let mut creq = FormatRequest::new(&cache_img, DeviceRole::Cache);
    creq.block_size = 4;
    creq.bucket_size = 8;
    creq.set_uuid = set_uuid;
    let mut breq = FormatRequest::new(&bdev_img, DeviceRole::Backing);
    breq.block_size = 4;
    breq.bucket_size = 8;
    breq.set_uuid = set_uuid;

    format_device(&creq, &NoForeignSignatures)?;
    format_device(&breq, &NoForeignSignatures)?;

    let csb = read_slot(&cache_img, 0)?;
    let bsb = read_slot(&bdev_img, 0)?;
    assert_eq!(csb.set_uuid, bsb.set_uuid);
    assert_eq!(csb.block_size, bsb.block_size);
    assert_ne!(csb.uuid, bsb.uuid);
    assert!(!csb.is_backing_device());
    assert!(bsb.is_backing_device());

    fs::remove_file(cache_img).ok();
    fs::remove_file(bdev_img).ok();
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

fn read_slot(path: &PathBuf, slot: usize) -> Result<Superblock> {
    let bytes = fs::read(path)?;
    let start = sb_slot_offset(slot) as usize;
    Superblock::decode(&bytes[start..start + SB_SIZE])
}
