//! Device access: exclusive open and offset-addressed I/O.
//!
//! Exclusivity is two layers: O_EXCL on block-special files (the kernel
//! refuses while the device is mounted or claimed) and an fs2 advisory
//! lock, which also covers regular-file targets in tests and image files.
//! Short reads and writes are hard errors, never silently padded.

use anyhow::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::FormatError;

#[derive(Debug)]
pub struct DevHandle {
    file: File,
    path: PathBuf,
}

impl DevHandle {
    /// Open read-write with exclusivity guards. EBUSY or a held advisory
    /// lock reports DeviceBusy; everything else DeviceAccess.
    pub fn open_excl(path: &Path) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
            let is_blk = std::fs::metadata(path)
                .map(|md| md.file_type().is_block_device())
                .unwrap_or(false);
            if is_blk {
                // O_EXCL without O_CREAT: exclusive block-device claim.
                opts.custom_flags(libc::O_EXCL);
            }
        }
        let file = opts.open(path).map_err(|e| {
            if e.raw_os_error() == Some(libc::EBUSY) {
                FormatError::DeviceBusy {
                    dev: path.to_path_buf(),
                }
            } else {
                FormatError::DeviceAccess {
                    dev: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        file.try_lock_exclusive()
            .map_err(|_| FormatError::DeviceBusy {
                dev: path.to_path_buf(),
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Read-only open for inspection paths; no exclusivity.
    pub fn open_ro(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FormatError::DeviceAccess {
            dev: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `buf` from `offset`. A short read (EOF included) is a
    /// DeviceRead error carrying the byte counts.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        use std::os::unix::fs::FileExt as UnixFileExt;
        let mut got = 0usize;
        while got < buf.len() {
            match self.file.read_at(&mut buf[got..], offset + got as u64) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(FormatError::DeviceAccess {
                        dev: self.path.clone(),
                        source: e,
                    }
                    .into())
                }
            }
        }
        if got < buf.len() {
            return Err(FormatError::DeviceRead {
                dev: self.path.clone(),
                offset,
                wanted: buf.len(),
                got,
            }
            .into());
        }
        Ok(())
    }

    /// Write all of `buf` at `offset`.
    pub fn write_all_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        use std::os::unix::fs::FileExt as UnixFileExt;
        UnixFileExt::write_all_at(&self.file, buf, offset).map_err(|_| {
            FormatError::DeviceWrite {
                dev: self.path.clone(),
                offset,
            }
        })?;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().map_err(|e| FormatError::DeviceAccess {
            dev: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}

impl Drop for DevHandle {
    fn drop(&mut self) {
        // Advisory unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}
