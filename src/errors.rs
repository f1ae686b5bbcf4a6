//! Typed error kinds for the formatting and inspection operations.
//!
//! Every fallible path still flows through anyhow::Result (with context),
//! but the operation-level failures are minted as FormatError so callers
//! can match on the kind with err.downcast_ref::<FormatError>().

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("cannot access device {dev}: {source}")]
    DeviceAccess {
        dev: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device {dev} is busy (exclusive open failed)")]
    DeviceBusy { dev: PathBuf },

    #[error("already an escache device on {dev}, overwrite with --wipe-escache")]
    AlreadyFormatted { dev: PathBuf },

    #[error("device {dev} already has a non-escache signature, remove it using wipefs")]
    ForeignSignature { dev: PathBuf },

    #[error("not enough buckets on {dev}: {nbuckets}, need {needed}")]
    InsufficientBuckets {
        dev: PathBuf,
        nbuckets: u64,
        needed: u64,
    },

    #[error("bad data offset on {dev}: {got} sectors, minimum {min}")]
    DataOffsetTooSmall { dev: PathBuf, got: u64, min: u64 },

    #[error("not an escache device on {dev} at slot {slot}")]
    NotFormatted { dev: PathBuf, slot: usize },

    #[error("device {dev} is not a backing device")]
    NotBackingDevice { dev: PathBuf },

    #[error("please specify a new {what} for {dev} (matches the stored one)")]
    IdentityUnchanged { dev: PathBuf, what: &'static str },

    #[error("short read on {dev} at offset {offset}: wanted {wanted} bytes, got {got}")]
    DeviceRead {
        dev: PathBuf,
        offset: u64,
        wanted: usize,
        got: usize,
    },

    #[error("short write on {dev} at offset {offset}")]
    DeviceWrite { dev: PathBuf, offset: u64 },
}
