use anyhow::{anyhow, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, warn};
use uuid::Uuid;

use escache_tools::format::{
    format_device, reset_backing_identity, DeviceRole, FormatPlan, FormatRequest, ResetRequest,
};
use escache_tools::sentinel::SentinelKind;
use escache_tools::sig::BlkidProbe;

mod cli;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();

    if cli.cache.is_empty() && cli.bdev.is_empty() {
        return Err(anyhow!("please supply a device (-C or -B)"));
    }

    let sentinel = if cli.alcubierre {
        SentinelKind::Alcubierre
    } else if cli.skip_udev_register {
        SentinelKind::SkipUdev
    } else {
        SentinelKind::None
    };

    // An operator-supplied bdev uuid marks a pre-attached backing device
    // that expects writeback resume.
    let dirty = cli.bdev_uuid.is_some();

    // -------- reset path --------
    if let Some(slot) = cli.reset_cset_uuid {
        if cli.bdev.len() != 1 || !cli.cache.is_empty() {
            return Err(anyhow!("only one backing device can be reset at a time"));
        }
        let summary = reset_backing_identity(&ResetRequest {
            dev: cli.bdev[0].clone(),
            slot,
            uuid: *cli.bdev_uuid.unwrap_or_else(Uuid::new_v4).as_bytes(),
            set_uuid: *cli.cset_uuid.unwrap_or_else(Uuid::new_v4).as_bytes(),
            wipe_existing: cli.wipe_escache,
        })?;
        println!("{}", summary);
        return Ok(());
    }

    // -------- format path --------
    if cli.bdev_uuid.is_some() && cli.bdev.len() > 1 {
        return Err(anyhow!(
            "an explicit --bdev-uuid applies to a single backing device"
        ));
    }

    let mut all = cli.cache.clone();
    all.extend(cli.bdev.iter().cloned());
    let plan = FormatPlan::resolve(&all, cli.block, cli.bucket, cli.data_offset, cli.sb_num)?;
    let set_uuid = cli
        .cset_uuid
        .map(|u| *u.as_bytes())
        .unwrap_or(plan.set_uuid);

    let probe = BlkidProbe;
    let mut done = 0usize;
    let targets = cli
        .cache
        .iter()
        .map(|d| (d, DeviceRole::Cache))
        .chain(cli.bdev.iter().map(|d| (d, DeviceRole::Backing)));

    for (dev, role) in targets {
        let mut req = FormatRequest::new(dev, role);
        req.block_size = plan.block_size;
        req.bucket_size = plan.bucket_size;
        req.set_uuid = set_uuid;
        req.wipe_existing = cli.wipe_escache;
        req.sentinel = sentinel;
        req.discard = cli.discard;
        req.replacement_policy = cli.cache_replacement_policy;
        if role == DeviceRole::Backing {
            if let Some(u) = cli.bdev_uuid {
                req.uuid = *u.as_bytes();
            }
            if cli.writeback {
                req.cache_mode = escache_tools::sb::CacheMode::Writeback;
            }
            req.dirty = dirty;
            req.data_offset = Some(plan.data_offset);
            req.sb_num = plan.sb_num;
        }

        let summaries = format_device(&req, &probe).map_err(|e| {
            if done > 0 {
                // Batch semantics are first-failure: earlier devices stay
                // formatted and are not rolled back.
                warn!(
                    "{} device(s) earlier in this batch were already formatted and are left as is",
                    done
                );
            }
            e
        })?;
        for s in &summaries {
            println!("{}", s);
        }
        done += 1;
    }

    Ok(())
}
