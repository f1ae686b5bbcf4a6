use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;
use std::path::PathBuf;

use escache_tools::check::alcubierre_report;
use escache_tools::topology::SysBlock;

/// Report whether a device carries the alcubierre tag and whether its set
/// registration path exists, as KEY=value lines.
#[derive(Parser, Debug)]
#[command(name = "alcubierre-check", version, arg_required_else_help = true)]
struct Cli {
    /// Device node, e.g. /dev/sda
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
    for line in alcubierre_report(&cli.node, &sysfs)? {
        println!("{}", line);
    }
    Ok(())
}
