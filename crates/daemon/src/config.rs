//! Daemon configuration
//!
//! Two values drive the whole process: the source root backing the mount
//! and the directory the view is mounted on. The root is canonicalized
//! once here so every signal carries a stable absolute path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Canonicalized source root; every virtual path resolves under it
    pub root: PathBuf,
    /// Directory where the passthrough view is mounted
    pub mount_point: PathBuf,
}

impl Config {
    pub fn new(root: impl AsRef<Path>, mount_point: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConfigError::RootNotADirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|source| ConfigError::Canonicalize {
                path: root.to_path_buf(),
                source,
            })?;

        let mount_point = mount_point.as_ref().to_path_buf();
        if !mount_point.is_dir() {
            return Err(ConfigError::MountPointNotADirectory(mount_point));
        }

        Ok(Self { root, mount_point })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("source root {} is not a directory", .0.display())]
    RootNotADirectory(PathBuf),
    #[error("mount point {} is not a directory", .0.display())]
    MountPointNotADirectory(PathBuf),
    #[error("failed to resolve source root {}: {source}", .path.display())]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}
