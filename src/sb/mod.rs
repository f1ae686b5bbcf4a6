//! Superblock codec (LE, 192 bytes).
//!
//! One record format shared by cache and backing devices; `version` decides
//! which side of the geometry union is meaningful. The checksum is CRC32C
//! over bytes 8..192 (the csum field itself sits in bytes 0..8 and is
//! excluded by construction), zero-extended into a u64.
//!
//! Политика:
//! - set_csum() после любой мутации полей; encode() никогда не пересчитывает
//!   сумму сам, чтобы чтения с диска оставались бит-в-бит.
//! - Валидность записи выражается предикатами (has_valid_magic, csum_matches),
//!   а не ошибками decode — мусорные байты декодируются в мусорную запись.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::str::FromStr;

use crate::consts::*;

/// Cache replacement policy (cache devices only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheReplacement {
    #[default]
    Lru,
    Fifo,
    Random,
}

impl CacheReplacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheReplacement::Lru => "lru",
            CacheReplacement::Fifo => "fifo",
            CacheReplacement::Random => "random",
        }
    }

    fn from_bits(bits: u64) -> Self {
        match bits {
            1 => CacheReplacement::Fifo,
            2 => CacheReplacement::Random,
            _ => CacheReplacement::Lru,
        }
    }

    fn to_bits(self) -> u64 {
        match self {
            CacheReplacement::Lru => 0,
            CacheReplacement::Fifo => 1,
            CacheReplacement::Random => 2,
        }
    }
}

impl FromStr for CacheReplacement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "lru" => Ok(CacheReplacement::Lru),
            "fifo" => Ok(CacheReplacement::Fifo),
            "random" => Ok(CacheReplacement::Random),
            other => Err(anyhow!("unknown cache replacement policy '{}'", other)),
        }
    }
}

impl fmt::Display for CacheReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache mode (backing devices only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Writethrough,
    Writeback,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Writethrough => "writethrough",
            CacheMode::Writeback => "writeback",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory superblock record.
///
/// `nbuckets` is meaningful for cache versions, `data_offset` for backing
/// versions; the two share one u64 on disk. Use the accessors when the
/// version is not known statically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub csum: u64,
    pub offset: u64,
    pub version: u64,
    pub magic: [u8; 16],
    pub uuid: [u8; 16],
    pub set_uuid: [u8; 16],
    pub flags: u64,
    pub seq: u64,
    pub nbuckets: u64,
    pub data_offset: u64,
    pub block_size: u16,
    pub bucket_size: u16,
    pub nr_in_set: u16,
    pub nr_this_dev: u16,
    pub first_bucket: u16,
    pub njournal_buckets: u16,
}

impl Default for Superblock {
    fn default() -> Self {
        Self {
            csum: 0,
            offset: SB_SECTOR,
            version: SB_VERSION_CDEV,
            magic: ESCACHE_MAGIC,
            uuid: [0; 16],
            set_uuid: [0; 16],
            flags: 0,
            seq: 0,
            nbuckets: 0,
            data_offset: 0,
            block_size: 0,
            bucket_size: 0,
            nr_in_set: 0,
            nr_this_dev: 0,
            first_bucket: 0,
            njournal_buckets: 0,
        }
    }
}

impl Superblock {
    /// Serialize into the fixed on-disk layout. The csum field is emitted
    /// as currently stored; call set_csum() after mutating other fields.
    pub fn encode(&self) -> [u8; SB_SIZE] {
        let mut buf = [0u8; SB_SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.csum);
        LittleEndian::write_u64(&mut buf[8..16], self.offset);
        LittleEndian::write_u64(&mut buf[16..24], self.version);
        buf[24..40].copy_from_slice(&self.magic);
        buf[40..56].copy_from_slice(&self.uuid);
        buf[56..72].copy_from_slice(&self.set_uuid);
        LittleEndian::write_u64(&mut buf[72..80], self.flags);
        LittleEndian::write_u64(&mut buf[80..88], self.seq);
        let geom = if self.is_backing_device() {
            // Version 1 implies the default data start; only the explicit
            // revision stores the offset.
            if self.version == SB_VERSION_BDEV_WITH_OFFSET {
                self.data_offset
            } else {
                0
            }
        } else {
            self.nbuckets
        };
        LittleEndian::write_u64(&mut buf[88..96], geom);
        LittleEndian::write_u16(&mut buf[96..98], self.block_size);
        LittleEndian::write_u16(&mut buf[98..100], self.bucket_size);
        LittleEndian::write_u16(&mut buf[100..102], self.nr_in_set);
        LittleEndian::write_u16(&mut buf[102..104], self.nr_this_dev);
        LittleEndian::write_u16(&mut buf[104..106], self.first_bucket);
        LittleEndian::write_u16(&mut buf[106..108], self.njournal_buckets);
        // 108..192 reserved, zero
        buf
    }

    /// Parse a record from disk bytes. Only the length is validated here;
    /// magic and checksum are exposed as predicates.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < SB_SIZE {
            return Err(anyhow!(
                "superblock buffer too short: {} bytes, need {}",
                buf.len(),
                SB_SIZE
            ));
        }
        let mut sb = Superblock {
            csum: LittleEndian::read_u64(&buf[0..8]),
            offset: LittleEndian::read_u64(&buf[8..16]),
            version: LittleEndian::read_u64(&buf[16..24]),
            flags: LittleEndian::read_u64(&buf[72..80]),
            seq: LittleEndian::read_u64(&buf[80..88]),
            block_size: LittleEndian::read_u16(&buf[96..98]),
            bucket_size: LittleEndian::read_u16(&buf[98..100]),
            nr_in_set: LittleEndian::read_u16(&buf[100..102]),
            nr_this_dev: LittleEndian::read_u16(&buf[102..104]),
            first_bucket: LittleEndian::read_u16(&buf[104..106]),
            njournal_buckets: LittleEndian::read_u16(&buf[106..108]),
            ..Superblock::default()
        };
        sb.magic.copy_from_slice(&buf[24..40]);
        sb.uuid.copy_from_slice(&buf[40..56]);
        sb.set_uuid.copy_from_slice(&buf[56..72]);
        let geom = LittleEndian::read_u64(&buf[88..96]);
        if sb.is_backing_device() {
            sb.nbuckets = 0;
            sb.data_offset = if sb.version == SB_VERSION_BDEV_WITH_OFFSET {
                geom
            } else {
                BDEV_DATA_START_DEFAULT
            };
        } else {
            sb.nbuckets = geom;
            sb.data_offset = 0;
        }
        Ok(sb)
    }

    /// Checksum of a serialized record: CRC32C over everything past the
    /// csum field, zero-extended.
    pub fn csum_of(buf: &[u8; SB_SIZE]) -> u64 {
        crc32c::crc32c(&buf[SB_CSUM_START..]) as u64
    }

    /// Recompute and store the checksum. Must be the last mutation before
    /// a record goes to disk.
    pub fn set_csum(&mut self) {
        self.csum = Self::csum_of(&self.encode());
    }

    // -------- predicates --------

    pub fn has_valid_magic(&self) -> bool {
        self.magic == ESCACHE_MAGIC
    }

    pub fn is_backing_device(&self) -> bool {
        self.version == SB_VERSION_BDEV || self.version == SB_VERSION_BDEV_WITH_OFFSET
    }

    pub fn csum_matches(&self) -> bool {
        self.csum == Self::csum_of(&self.encode())
    }

    // -------- cache-device flags --------

    pub fn discard(&self) -> bool {
        self.flags & CACHE_FLAG_DISCARD != 0
    }

    pub fn set_discard(&mut self, on: bool) {
        if on {
            self.flags |= CACHE_FLAG_DISCARD;
        } else {
            self.flags &= !CACHE_FLAG_DISCARD;
        }
    }

    pub fn replacement_policy(&self) -> CacheReplacement {
        CacheReplacement::from_bits(
            (self.flags >> CACHE_REPLACEMENT_SHIFT) & CACHE_REPLACEMENT_MASK,
        )
    }

    pub fn set_replacement_policy(&mut self, policy: CacheReplacement) {
        self.flags &= !(CACHE_REPLACEMENT_MASK << CACHE_REPLACEMENT_SHIFT);
        self.flags |= policy.to_bits() << CACHE_REPLACEMENT_SHIFT;
    }

    // -------- backing-device flags --------

    pub fn cache_mode(&self) -> CacheMode {
        if self.flags & BDEV_FLAG_WRITEBACK != 0 {
            CacheMode::Writeback
        } else {
            CacheMode::Writethrough
        }
    }

    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        match mode {
            CacheMode::Writeback => self.flags |= BDEV_FLAG_WRITEBACK,
            CacheMode::Writethrough => self.flags &= !BDEV_FLAG_WRITEBACK,
        }
    }

    pub fn dirty(&self) -> bool {
        self.flags & BDEV_FLAG_DIRTY != 0
    }

    pub fn set_dirty(&mut self, on: bool) {
        if on {
            self.flags |= BDEV_FLAG_DIRTY;
        } else {
            self.flags &= !BDEV_FLAG_DIRTY;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cache_sb() -> Superblock {
        let mut sb = Superblock {
            uuid: [0x11; 16],
            set_uuid: [0x22; 16],
            seq: 7,
            nbuckets: 4096,
            block_size: 1,
            bucket_size: 8,
            nr_in_set: 1,
            first_bucket: 3,
            ..Superblock::default()
        };
        sb.set_discard(true);
        sb.set_replacement_policy(CacheReplacement::Fifo);
        sb.set_csum();
        sb
    }

    #[test]
    fn cache_roundtrip_bit_exact() {
        let sb = sample_cache_sb();
        let bytes = sb.encode();
        let back = Superblock::decode(&bytes).unwrap();
        assert_eq!(back, sb);
        assert!(back.has_valid_magic());
        assert!(!back.is_backing_device());
        assert!(back.csum_matches());
        assert!(back.discard());
        assert_eq!(back.replacement_policy(), CacheReplacement::Fifo);
    }

    #[test]
    fn backing_roundtrip_with_offset() {
        let mut sb = Superblock {
            version: SB_VERSION_BDEV_WITH_OFFSET,
            uuid: [0xAA; 16],
            set_uuid: [0xBB; 16],
            data_offset: 1024,
            block_size: 4,
            bucket_size: 1024,
            ..Superblock::default()
        };
        sb.set_cache_mode(CacheMode::Writeback);
        sb.set_dirty(true);
        sb.set_csum();

        let back = Superblock::decode(&sb.encode()).unwrap();
        assert!(back.is_backing_device());
        assert_eq!(back.data_offset, 1024);
        assert_eq!(back.cache_mode(), CacheMode::Writeback);
        assert!(back.dirty());
        assert!(back.csum_matches());
    }

    #[test]
    fn backing_default_version_implies_default_data_start() {
        let mut sb = Superblock {
            version: SB_VERSION_BDEV,
            data_offset: BDEV_DATA_START_DEFAULT,
            ..Superblock::default()
        };
        sb.set_csum();
        let back = Superblock::decode(&sb.encode()).unwrap();
        assert_eq!(back.data_offset, BDEV_DATA_START_DEFAULT);
        // the on-disk union carries zero for version 1
        assert_eq!(LittleEndian::read_u64(&sb.encode()[88..96]), 0);
    }

    #[test]
    fn csum_excludes_its_own_field() {
        let mut sb = sample_cache_sb();
        let want = sb.csum;
        // trashing the stored csum must not change the computed one
        sb.csum = 0xDEAD_BEEF;
        assert_eq!(Superblock::csum_of(&sb.encode()), want);
        assert!(!sb.csum_matches());
        sb.set_csum();
        assert!(sb.csum_matches());
    }

    #[test]
    fn csum_tracks_field_mutations() {
        let mut sb = sample_cache_sb();
        sb.nbuckets += 1;
        assert!(!sb.csum_matches());
        sb.set_csum();
        assert!(sb.csum_matches());
    }

    #[test]
    fn garbage_decodes_without_valid_magic() {
        let bytes = [0x5Au8; SB_SIZE];
        let sb = Superblock::decode(&bytes).unwrap();
        assert!(!sb.has_valid_magic());
        assert!(Superblock::decode(&bytes[..100]).is_err());
    }

    #[test]
    fn replacement_policy_names() {
        assert_eq!(
            "lru".parse::<CacheReplacement>().unwrap(),
            CacheReplacement::Lru
        );
        assert_eq!(
            "random".parse::<CacheReplacement>().unwrap(),
            CacheReplacement::Random
        );
        assert!("mru".parse::<CacheReplacement>().is_err());
    }
}
