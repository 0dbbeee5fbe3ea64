//! sigfs: mount a passthrough view of a directory tree and signal every
//! mutation to a consumer.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sigfs_daemon::{process, Config};

/// Mount a passthrough view of a directory tree and signal every mutation
#[derive(Parser)]
#[command(name = "sigfs", version, about)]
struct Args {
    /// Source root directory backing the mount
    root: PathBuf,

    /// Directory where the passthrough view is mounted
    mount_point: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::new(&args.root, &args.mount_point)?;

    info!(root = %config.root.display(), "starting sigfs");
    process::run(config)?;

    info!("sigfs exiting");
    Ok(())
}
