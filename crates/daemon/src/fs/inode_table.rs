//! Bidirectional inode ↔ virtual-path mapping
//!
//! The kernel addresses nodes by 64-bit inode number while the
//! passthrough layer works on virtual paths rooted at `/`. This table
//! bridges the two: inode 1 is the mount root, new inodes are assigned on
//! first lookup, renames remap and removals forget.

use std::collections::HashMap;
use std::ffi::OsStr;

/// Bidirectional mapping between inodes and virtual paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    /// Create a new table with the root path pre-registered
    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: 2,
        };
        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());
        table
    }

    /// Get the inode for a path, assigning a fresh one if unseen
    pub fn get_or_assign(&mut self, path: &str) -> u64 {
        if let Some(&inode) = self.path_to_inode.get(path) {
            return inode;
        }
        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.to_string(), inode);
        self.inode_to_path.insert(inode, path.to_string());
        inode
    }

    /// Get the path for an inode if it is known
    pub fn path_of(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Join a directory entry name onto the path of its parent inode
    ///
    /// Returns None for an unknown parent or a name that is not valid
    /// UTF-8.
    pub fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.inode_to_path.get(&parent)?;
        let name = name.to_str()?;
        Some(if parent_path == "/" {
            format!("/{name}")
        } else {
            format!("{parent_path}/{name}")
        })
    }

    /// Forget the mapping for a path (unlink, rmdir)
    pub fn remove_path(&mut self, path: &str) {
        if let Some(inode) = self.path_to_inode.remove(path) {
            self.inode_to_path.remove(&inode);
        }
    }

    /// Move an inode from one path to another (rename)
    pub fn rename(&mut self, old_path: &str, new_path: &str) {
        if let Some(inode) = self.path_to_inode.remove(old_path) {
            // A node previously visible at the destination is replaced
            if let Some(displaced) = self.path_to_inode.remove(new_path) {
                self.inode_to_path.remove(&displaced);
            }
            self.inode_to_path.insert(inode, new_path.to_string());
            self.path_to_inode.insert(new_path.to_string(), inode);
        }
    }

    /// Get the parent of a virtual path ("/" is its own parent)
    pub fn parent_path(path: &str) -> &str {
        match path.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &path[..pos],
        }
    }
}
