//! Sentinel tags: the 10-byte plaintext markers at sector 0.
//!
//! Purely out-of-band classification for udev-side tooling; the superblock
//! proper starts at SB_START and never overlaps the tag. A read shorter
//! than the tag length is an error, not "no tag".

use anyhow::Result;
use std::path::Path;

use crate::consts::{SENTINEL_ALCUBIERRE, SENTINEL_LEN, SENTINEL_SKIPUDEV};
use crate::dev::DevHandle;

/// Sentinel classification; doubles as the write policy on format requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentinelKind {
    #[default]
    None,
    Alcubierre,
    SkipUdev,
}

impl SentinelKind {
    /// Tag bytes to write at sector 0, if any.
    pub fn tag(&self) -> Option<&'static [u8; SENTINEL_LEN]> {
        match self {
            SentinelKind::None => None,
            SentinelKind::Alcubierre => Some(SENTINEL_ALCUBIERRE),
            SentinelKind::SkipUdev => Some(SENTINEL_SKIPUDEV),
        }
    }

    /// Either reserved tag marks the device as skipping udev registration.
    pub fn skips_udev_register(&self) -> bool {
        !matches!(self, SentinelKind::None)
    }
}

/// Classify the leading bytes of an already-open device.
pub fn classify_dev(dev: &DevHandle) -> Result<SentinelKind> {
    let mut buf = [0u8; SENTINEL_LEN];
    dev.read_exact_at(&mut buf, 0)?;
    Ok(match &buf {
        b if b == SENTINEL_ALCUBIERRE => SentinelKind::Alcubierre,
        b if b == SENTINEL_SKIPUDEV => SentinelKind::SkipUdev,
        _ => SentinelKind::None,
    })
}

/// Read exactly the first 10 bytes of `path` and match the reserved tags.
pub fn classify(path: &Path) -> Result<SentinelKind> {
    let dev = DevHandle::open_ro(path)?;
    classify_dev(&dev)
}
