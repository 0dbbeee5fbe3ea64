//! Open-file handle table
//!
//! Open and create register the host file under a monotonically assigned
//! handle id which the kernel passes back to read/write/flush/fsync and
//! release. Handles are shared `File`s rather than raw descriptors; the
//! access lock in the passthrough layer serializes every use of their
//! seek position.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Table of open host files keyed by FUSE handle id
#[derive(Debug)]
pub struct HandleTable {
    files: Mutex<HashMap<u64, Arc<File>>>,
    next_fh: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
        }
    }

    /// Register an open file and return its handle id
    pub fn insert(&self, file: File) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::SeqCst);
        self.files.lock().insert(fh, Arc::new(file));
        fh
    }

    /// Resolve a handle id, failing with EBADF for unknown ids
    pub fn get(&self, fh: u64) -> io::Result<Arc<File>> {
        self.files
            .lock()
            .get(&fh)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    /// Drop a handle, closing the host file once the last use finishes
    pub fn remove(&self, fh: u64) -> io::Result<()> {
        match self.files.lock().remove(&fh) {
            Some(_) => Ok(()),
            None => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }
}
