//! Foreign-signature probe consulted before formatting.
//!
//! The formatter refuses to clobber a device that some other system already
//! claims. What "claims" means is delegated: the probe answers a single
//! yes/no, and the shipped implementation shells out to blkid with
//! partition-table probing enabled.

use anyhow::Result;
use log::warn;
use std::path::Path;
use std::process::Command;

pub trait SignatureProbe {
    /// True when the device carries a non-escache superblock or a
    /// partition table.
    fn has_foreign_signature(&self, dev: &Path) -> Result<bool>;
}

/// blkid-backed probe. Low-level mode (-p) looks at the device bytes
/// directly instead of the blkid cache.
pub struct BlkidProbe;

impl SignatureProbe for BlkidProbe {
    fn has_foreign_signature(&self, dev: &Path) -> Result<bool> {
        let out = Command::new("blkid")
            .arg("-p")
            .arg("-o")
            .arg("export")
            .arg(dev)
            .output();
        match out {
            // blkid exits 0 when it recognized something, 2 when the
            // device is clean.
            Ok(out) => Ok(out.status.success()),
            Err(e) => {
                warn!(
                    "blkid probe unavailable for {} ({}); assuming no foreign signature",
                    dev.display(),
                    e
                );
                Ok(false)
            }
        }
    }
}

/// Probe that never reports a signature. Used by tests and image-file
/// workflows where blkid has no say.
pub struct NoForeignSignatures;

impl SignatureProbe for NoForeignSignatures {
    fn has_foreign_signature(&self, _dev: &Path) -> Result<bool> {
        Ok(false)
    }
}
