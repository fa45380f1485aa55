mod cli;
mod delegate;
mod record;

use anyhow::Result;
use clap::Parser;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(&args);

    log::debug!("Starting mic-capture {}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Devices => record::list_devices(),
        Command::Record(record_args) => record::record(record_args),
        Command::InitConfig { path } => record::init_config(path),
    }
}
