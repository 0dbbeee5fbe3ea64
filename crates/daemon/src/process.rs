//! Process bootstrap
//!
//! Starts the signal consumer, mounts the passthrough filesystem in the
//! foreground, and blocks until the mount point is unmounted. Unmounting
//! drops the filesystem and with it the last signal dispatcher; the
//! consumer drains whatever is buffered and exits, and only then does the
//! process return.

use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to start signal consumer: {0}")]
    Consumer(#[source] std::io::Error),
    #[error("mount failed: {0}")]
    Mount(#[source] std::io::Error),
    #[error("FUSE support not compiled in; rebuild with --features fuse")]
    FuseDisabled,
}

/// Mount the filesystem and block until it is unmounted
#[cfg(feature = "fuse")]
pub fn run(config: Config) -> Result<(), MountError> {
    use common::SignalDispatcher;
    use fuser::MountOption;
    use tracing::info;

    use crate::consumer;
    use crate::fs::{PassthroughFs, SignalFs};

    let (dispatcher, receiver) = SignalDispatcher::new();
    let consumer = consumer::spawn(receiver).map_err(MountError::Consumer)?;

    let filesystem = SignalFs::new(PassthroughFs::new(config.root.clone(), dispatcher));
    let options = [MountOption::FSName("sigfs".to_string())];

    info!(
        root = %config.root.display(),
        mount_point = %config.mount_point.display(),
        "mounting passthrough filesystem"
    );
    fuser::mount2(filesystem, &config.mount_point, &options).map_err(MountError::Mount)?;

    info!("unmounted, waiting for signal consumer to drain");
    let _ = consumer.join();
    Ok(())
}

/// Stub for builds without FUSE support
#[cfg(not(feature = "fuse"))]
pub fn run(_config: Config) -> Result<(), MountError> {
    Err(MountError::FuseDisabled)
}
