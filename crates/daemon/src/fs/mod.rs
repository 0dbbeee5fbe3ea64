//! FUSE passthrough layer
//!
//! This module mirrors an existing directory tree at the mount point and
//! signals every mutation to the consumer.
//!
//! # Architecture
//!
//! - `PassthroughFs`: path-based operation table; resolves virtual paths
//!   against the source root, dispatches change signals, delegates to
//!   host primitives
//! - `SignalFs`: FUSE filesystem implementation using fuser
//! - `InodeTable`: bidirectional inode ↔ path mapping
//! - `HandleTable`: open host files keyed by FUSE handle id
//!
//! # Signal ordering
//!
//! Mutating operations dispatch their signal before the host call is
//! attempted, so a consumer can see a notification for a mutation the
//! host rejects. Reads and writes serialize their seek+transfer sequence
//! under a single filesystem-wide lock.

mod adapter;
mod handles;
mod inode_table;
mod passthrough;

pub use adapter::SignalFs;
pub use handles::HandleTable;
pub use inode_table::InodeTable;
pub use passthrough::{FileStat, PassthroughFs, VolumeStat};
