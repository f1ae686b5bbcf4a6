//! Small shared helpers (size parsing for CLI options).

use anyhow::{anyhow, Result};

/// Parse a size with an optional magnitude suffix: k/m/g/t, case-insensitive,
/// each step multiplying by 1024. "2k" -> 2048, "1m" -> 1048576, "512" -> 512.
pub fn parse_human_size(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("empty size"));
    }
    let (digits, suffix) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    };
    let base: u64 = digits.parse().map_err(|_| anyhow!("bad size '{}'", s))?;
    let mult: u64 = match suffix.to_ascii_lowercase().as_str() {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        "t" => 1 << 40,
        other => return Err(anyhow!("bad size suffix '{}' in '{}'", other, s)),
    };
    base.checked_mul(mult)
        .ok_or_else(|| anyhow!("size '{}' overflows", s))
}

/// Parse a block/bucket size option into 512-byte sectors.
/// The byte value must be a power of two; the sector count must be nonzero
/// and fit the superblock's 16-bit fields.
pub fn parse_size_sectors(s: &str, what: &str) -> Result<u16> {
    let bytes = parse_human_size(s)?;
    if bytes == 0 || bytes & (bytes - 1) != 0 {
        return Err(anyhow!("{} must be a power of two", what));
    }
    let sectors = bytes / crate::consts::SECTOR_SIZE;
    if sectors == 0 {
        return Err(anyhow!("{} too small", what));
    }
    if sectors > u16::MAX as u64 {
        return Err(anyhow!("{} too large", what));
    }
    Ok(sectors as u16)
}
