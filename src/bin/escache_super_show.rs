use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;
use std::path::PathBuf;
use uuid::Uuid;

use escache_tools::consts::{sb_slot_offset, SB_NUM_MAX, SB_SIZE};
use escache_tools::dev::DevHandle;
use escache_tools::sb::Superblock;

/// Dump a superblock slot in human-readable or JSON form.
#[derive(Parser, Debug)]
#[command(name = "escache-super-show", version, arg_required_else_help = true)]
struct Cli {
    /// Device node or image file
    dev: PathBuf,

    /// Superblock slot index
    #[arg(long, default_value_t = 0)]
    slot: usize,

    /// Print one JSON object instead of text
    #[arg(long)]
    json: bool,
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.slot >= SB_NUM_MAX {
        return Err(anyhow::anyhow!(
            "bad superblock index {}, maximum {}",
            cli.slot,
            SB_NUM_MAX - 1
        ));
    }

    let dev = DevHandle::open_ro(&cli.dev)?;
    let mut buf = [0u8; SB_SIZE];
    dev.read_exact_at(&mut buf, sb_slot_offset(cli.slot))?;
    let sb = Superblock::decode(&buf)?;

    if cli.json {
        print_json(&cli, &sb);
    } else {
        print_text(&cli, &sb);
    }
    Ok(())
}

fn print_json(cli: &Cli, sb: &Superblock) {
    let mut obj = serde_json::json!({
        "dev": cli.dev.display().to_string(),
        "slot": cli.slot,
        "magic_valid": sb.has_valid_magic(),
        "csum_valid": sb.csum_matches(),
        "version": sb.version,
        "uuid": Uuid::from_bytes(sb.uuid).to_string(),
        "cset_uuid": Uuid::from_bytes(sb.set_uuid).to_string(),
        "seq": sb.seq,
        "block_size": sb.block_size,
        "bucket_size": sb.bucket_size,
    });
    let extra = if sb.is_backing_device() {
        serde_json::json!({
            "data_offset": sb.data_offset,
            "cache_mode": sb.cache_mode().to_string(),
            "dirty": sb.dirty(),
        })
    } else {
        serde_json::json!({
            "nbuckets": sb.nbuckets,
            "nr_in_set": sb.nr_in_set,
            "nr_this_dev": sb.nr_this_dev,
            "first_bucket": sb.first_bucket,
            "discard": sb.discard(),
            "replacement_policy": sb.replacement_policy().to_string(),
        })
    };
    obj.as_object_mut()
        .unwrap()
        .extend(extra.as_object().unwrap().clone());
    println!("{}", serde_json::to_string_pretty(&obj).unwrap());
}

fn print_text(cli: &Cli, sb: &Superblock) {
    println!("dev.name\t\t{}", cli.dev.display());
    println!("sb.slot\t\t\t{}", cli.slot);
    println!(
        "sb.magic\t\t{}",
        if sb.has_valid_magic() { "ok" } else { "bad magic" }
    );
    println!(
        "sb.csum\t\t\t{:#018x} [{}]",
        sb.csum,
        if sb.csum_matches() { "match" } else { "MISMATCH" }
    );
    println!("sb.version\t\t{}", sb.version);
    println!("dev.uuid\t\t{}", Uuid::from_bytes(sb.uuid));
    println!("cset.uuid\t\t{}", Uuid::from_bytes(sb.set_uuid));
    println!("dev.sectors_per_block\t{}", sb.block_size);
    println!("dev.sectors_per_bucket\t{}", sb.bucket_size);
    if sb.is_backing_device() {
        println!("dev.data.first_sector\t{}", sb.data_offset);
        println!("dev.data.cache_mode\t{}", sb.cache_mode());
        println!("dev.data.cache_state\t{}", if sb.dirty() { "dirty" } else { "clean" });
    } else {
        println!("dev.cache.nbuckets\t{}", sb.nbuckets);
        println!("dev.cache.first_bucket\t{}", sb.first_bucket);
        println!("dev.cache.nr_in_set\t{}", sb.nr_in_set);
        println!("dev.cache.nr_this_dev\t{}", sb.nr_this_dev);
        println!("dev.cache.discard\t{}", sb.discard());
        println!("dev.cache.replacement\t{}", sb.replacement_policy());
    }
}
