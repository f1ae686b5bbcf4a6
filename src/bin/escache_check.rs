use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;
use std::path::PathBuf;

use escache_tools::check::disk_report;
use escache_tools::topology::SysBlock;

/// Classify a device node and report its escache registration state as
/// KEY=value lines for shell evaluation.
#[derive(Parser, Debug)]
#[command(name = "escache-check", version, arg_required_else_help = true)]
struct Cli {
    /// Device node, e.g. /dev/sda1
    node: PathBuf,
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
    let sysfs = SysBlock::new();
    for line in disk_report(&cli.node, &sysfs)? {
        println!("{}", line);
    }
    Ok(())
}
