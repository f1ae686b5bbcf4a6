use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

use escache_tools::sb::CacheReplacement;
use escache_tools::util::parse_size_sectors;

#[derive(Parser, Debug)]
#[command(
    name = "make-escache",
    version,
    about = "Format cache and backing devices for an escache set",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Format a cache device (repeatable)
    #[arg(short = 'C', long = "cache", value_name = "DEV")]
    pub cache: Vec<PathBuf>,

    /// Format a backing device (repeatable)
    #[arg(short = 'B', long = "bdev", value_name = "DEV")]
    pub bdev: Vec<PathBuf>,

    /// Bucket size (accepts k/m/g/t suffixes)
    #[arg(short = 'b', long = "bucket", value_parser = parse_bucket_size, default_value = "512k")]
    pub bucket: u16,

    /// Block size, usually the hard sector size of the SSD (accepts suffixes)
    #[arg(short = 'w', long = "block", value_parser = parse_block_size)]
    pub block: Option<u16>,

    /// First data sector on the backing device
    #[arg(short = 'o', long = "data-offset", alias = "data_offset", value_name = "SECTORS")]
    pub data_offset: Option<u64>,

    /// UUID for the cache set
    #[arg(short = 'u', long = "cset-uuid")]
    pub cset_uuid: Option<Uuid>,

    /// UUID for the backing device; implies a dirty pre-attach state
    #[arg(short = 'v', long = "bdev-uuid")]
    pub bdev_uuid: Option<Uuid>,

    /// Enable writeback on backing devices
    #[arg(long)]
    pub writeback: bool,

    /// Enable discards on cache devices
    #[arg(long)]
    pub discard: bool,

    /// Overwrite an existing escache superblock
    #[arg(long = "wipe-escache")]
    pub wipe_escache: bool,

    #[arg(
        long = "cache-replacement-policy",
        alias = "cache_replacement_policy",
        value_parser = parse_replacement_policy,
        default_value = "lru",
        value_name = "lru|fifo|random"
    )]
    pub cache_replacement_policy: CacheReplacement,

    /// Number of superblock slots on backing devices
    #[arg(short = 's', long = "sb-num", default_value_t = 1, value_name = "N")]
    pub sb_num: usize,

    /// Reset the identity of one backing superblock slot instead of formatting
    #[arg(short = 'r', long = "reset-cset-uuid", value_name = "IDX")]
    pub reset_cset_uuid: Option<usize>,

    /// Tag the device as an alcubierre device
    #[arg(short = 'A', long)]
    pub alcubierre: bool,

    /// Tag the device to skip udev registration
    #[arg(short = 'S', long = "skip-udev-register")]
    pub skip_udev_register: bool,
}

fn parse_bucket_size(s: &str) -> Result<u16, String> {
    parse_size_sectors(s, "bucket size").map_err(|e| e.to_string())
}

fn parse_block_size(s: &str) -> Result<u16, String> {
    parse_size_sectors(s, "block size").map_err(|e| e.to_string())
}

fn parse_replacement_policy(s: &str) -> Result<CacheReplacement, String> {
    s.parse::<CacheReplacement>().map_err(|e| e.to_string())
}
