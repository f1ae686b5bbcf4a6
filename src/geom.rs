//! Geometry probe: logical block size and total size of a target device.
//!
//! Block-special files are asked through the kernel (BLKSSZGET /
//! BLKGETSIZE64); regular files fall back to stat: file length for the
//! total, the filesystem's preferred I/O size for the block alignment.
//! Everything is reported in 512-byte sectors.

use anyhow::Result;
use log::debug;
use std::fs::File;
use std::path::Path;

use crate::consts::SECTOR_SIZE;
use crate::errors::FormatError;

/// Probed device geometry, in 512-byte sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevGeometry {
    pub block_sectors: u64,
    pub total_sectors: u64,
}

/// Probe a device or regular file.
pub fn probe(path: &Path) -> Result<DevGeometry> {
    let md = std::fs::metadata(path).map_err(|e| FormatError::DeviceAccess {
        dev: path.to_path_buf(),
        source: e,
    })?;

    let geometry = if is_block_device(&md) {
        probe_block_device(path)?
    } else {
        // st_blksize is the filesystem's preferred I/O size; a 512-byte
        // floor keeps the sector count nonzero on exotic filesystems.
        use std::os::unix::fs::MetadataExt;
        DevGeometry {
            block_sectors: (md.blksize() / SECTOR_SIZE).max(1),
            total_sectors: md.len() / SECTOR_SIZE,
        }
    };
    debug!(
        "probed {}: block={} sectors, total={} sectors",
        path.display(),
        geometry.block_sectors,
        geometry.total_sectors
    );
    Ok(geometry)
}

#[cfg(unix)]
fn is_block_device(md: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    md.file_type().is_block_device()
}

#[cfg(not(unix))]
fn is_block_device(_md: &std::fs::Metadata) -> bool {
    false
}

#[cfg(target_os = "linux")]
fn probe_block_device(path: &Path) -> Result<DevGeometry> {
    use std::os::unix::io::AsRawFd;

    const BLKSSZGET: libc::c_ulong = 0x1268;
    const BLKGETSIZE64: libc::c_ulong = 0x8008_1272;

    let access = |e: std::io::Error| FormatError::DeviceAccess {
        dev: path.to_path_buf(),
        source: e,
    };

    let f = File::open(path).map_err(access)?;
    let fd = f.as_raw_fd();

    let mut logical_block_size: libc::c_int = 0;
    let mut size_bytes: u64 = 0;
    // Logical (not physical) block size keeps the format transparent to
    // whatever the kernel reports for 512e drives.
    if unsafe { libc::ioctl(fd, BLKSSZGET, &mut logical_block_size) } != 0 {
        return Err(access(std::io::Error::last_os_error()).into());
    }
    if unsafe { libc::ioctl(fd, BLKGETSIZE64, &mut size_bytes) } != 0 {
        return Err(access(std::io::Error::last_os_error()).into());
    }

    Ok(DevGeometry {
        block_sectors: ((logical_block_size as u64) / SECTOR_SIZE).max(1),
        total_sectors: size_bytes / SECTOR_SIZE,
    })
}

#[cfg(not(target_os = "linux"))]
fn probe_block_device(path: &Path) -> Result<DevGeometry> {
    Err(FormatError::DeviceAccess {
        dev: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "block device probing is only supported on Linux",
        ),
    }
    .into())
}
