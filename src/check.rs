//! Inspection report: the KEY=value lines emitted by the check utilities.
//!
//! Output is meant for shell evaluation by udev helpers, so keys are fixed
//! and values are always yes/no.

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::Path;

use crate::consts::REGISTRATION_DIR;
use crate::sentinel::{self, SentinelKind};
use crate::topology::{self, PathExists};

/// One KEY=value line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub key: &'static str,
    pub yes: bool,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, if self.yes { "yes" } else { "no" })
    }
}

/// Leaf name of a /dev node ("sda1" from "/dev/sda1").
pub fn device_name(path: &Path) -> Result<String> {
    topology::device_name(path)
        .ok_or_else(|| anyhow!("cannot parse a device name from {}", path.display()))
}

/// Registration key for a device, relative to /sys/block: partitions are
/// keyed under their whole-disk parent.
pub fn registration_key(name: &str, probe: &dyn PathExists) -> String {
    match topology::resolve_parent(name, probe) {
        Some(parent) => format!("{}/{}/{}", parent, name, REGISTRATION_DIR),
        None => format!("{}/{}", name, REGISTRATION_DIR),
    }
}

/// Report for `escache-check`: sentinel classification plus registration.
pub fn disk_report(dev: &Path, probe: &dyn PathExists) -> Result<Vec<ReportLine>> {
    let kind = sentinel::classify(dev)?;
    let name = device_name(dev)?;
    let registered = probe.exists(&registration_key(&name, probe));
    Ok(vec![
        ReportLine {
            key: "SKIPREGISTER_DEV",
            yes: kind.skips_udev_register(),
        },
        ReportLine {
            key: "DISK_REGISTERED",
            yes: registered,
        },
    ])
}

/// Report for `alcubierre-check`: the alcubierre tag specifically, plus the
/// fixed per-name set-registration path.
pub fn alcubierre_report(dev: &Path, probe: &dyn PathExists) -> Result<Vec<ReportLine>> {
    let kind = sentinel::classify(dev)?;
    let name = device_name(dev)?;
    let registered = probe.exists(&format!("{}/{}/set", name, REGISTRATION_DIR));
    Ok(vec![
        ReportLine {
            key: "ALCUBIERRE_DEV",
            yes: kind == SentinelKind::Alcubierre,
        },
        ReportLine {
            key: "ALCUBIERRE_REGISTERED",
            yes: registered,
        },
    ])
}
