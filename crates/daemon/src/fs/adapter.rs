//! fuser adapter for the passthrough operation table
//!
//! Translates the kernel's inode-addressed calls into the path-based
//! passthrough layer: inodes resolve through the inode table, host errors
//! come back as their raw OS error code (`EIO` when one is missing), and
//! host metadata is projected into `fuser::FileAttr`. Extended-attribute
//! operations are not implemented and reply `ENOSYS`.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};
use libc::{EINVAL, ENOENT, ENOSYS};
use tracing::debug;

use super::inode_table::InodeTable;
use super::passthrough::{FileStat, PassthroughFs};

/// Time-to-live for attribute and entry replies
const TTL: Duration = Duration::from_secs(1);

/// The mounted filesystem: passthrough operations plus change signals
pub struct SignalFs {
    fs: PassthroughFs,
    inodes: InodeTable,
}

impl SignalFs {
    pub fn new(fs: PassthroughFs) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
        }
    }

    fn vpath(&self, ino: u64) -> Option<String> {
        self.inodes.path_of(ino).map(str::to_string)
    }

    fn attr_for(&mut self, vpath: &str) -> io::Result<FileAttr> {
        let stat = self.fs.getattr(vpath)?;
        let ino = self.inodes.get_or_assign(vpath);
        Ok(file_attr(ino, &stat))
    }
}

fn errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}

fn file_type_of(mode: u32) -> FileType {
    match mode & libc::S_IFMT as u32 {
        x if x == libc::S_IFDIR as u32 => FileType::Directory,
        x if x == libc::S_IFLNK as u32 => FileType::Symlink,
        x if x == libc::S_IFCHR as u32 => FileType::CharDevice,
        x if x == libc::S_IFBLK as u32 => FileType::BlockDevice,
        x if x == libc::S_IFIFO as u32 => FileType::NamedPipe,
        x if x == libc::S_IFSOCK as u32 => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

fn file_attr(ino: u64, stat: &FileStat) -> FileAttr {
    FileAttr {
        ino,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: stat.atime,
        mtime: stat.mtime,
        ctime: stat.ctime,
        crtime: stat.mtime,
        kind: file_type_of(stat.mode),
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

fn time_from(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    }
}

impl Filesystem for SignalFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("lookup: parent={}, name={:?}", parent, name);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.attr_for(&vpath) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr: ino={}", ino);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.attr_for(&vpath) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(err) => reply.error(errno(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr: ino={}, mode={:?}, size={:?}", ino, mode, size);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        let result = (|| -> io::Result<()> {
            if let Some(length) = size {
                self.fs.truncate(&vpath, length)?;
            }
            if let Some(mode) = mode {
                self.fs.chmod(&vpath, mode)?;
            }
            if uid.is_some() || gid.is_some() {
                self.fs.chown(&vpath, uid, gid)?;
            }
            if atime.is_some() || mtime.is_some() {
                self.fs
                    .utimens(&vpath, atime.map(time_from), mtime.map(time_from))?;
            }
            Ok(())
        })();

        match result.and_then(|_| self.attr_for(&vpath)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        debug!("readlink: ino={}", ino);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.readlink(&vpath) {
            Ok(target) => reply.data(target.as_os_str().as_encoded_bytes()),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        debug!("mknod: parent={}, name={:?}, mode={:o}", parent, name, mode);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self
            .fs
            .mknod(&vpath, mode, rdev)
            .and_then(|_| self.attr_for(&vpath))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("mkdir: parent={}, name={:?}, mode={:o}", parent, name, mode);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self
            .fs
            .mkdir(&vpath, mode)
            .and_then(|_| self.attr_for(&vpath))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("unlink: parent={}, name={:?}", parent, name);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.unlink(&vpath) {
            Ok(()) => {
                self.inodes.remove_path(&vpath);
                reply.ok();
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("rmdir: parent={}, name={:?}", parent, name);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.rmdir(&vpath) {
            Ok(()) => {
                self.inodes.remove_path(&vpath);
                reply.ok();
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        debug!("symlink: parent={}, name={:?} -> {:?}", parent, link_name, target);
        let vpath = match self.inodes.child_path(parent, link_name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self
            .fs
            .symlink(&vpath, target)
            .and_then(|_| self.attr_for(&vpath))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!("rename: {:?} -> {:?}", name, newname);
        let (old_vpath, new_vpath) = match (
            self.inodes.child_path(parent, name),
            self.inodes.child_path(newparent, newname),
        ) {
            (Some(old), Some(new)) => (old, new),
            _ => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.rename(&old_vpath, &new_vpath) {
            Ok(()) => {
                self.inodes.rename(&old_vpath, &new_vpath);
                reply.ok();
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        debug!("link: ino={}, newname={:?}", ino, newname);
        let (source, new_vpath) = match (self.vpath(ino), self.inodes.child_path(newparent, newname))
        {
            (Some(source), Some(new)) => (source, new),
            _ => {
                reply.error(ENOENT);
                return;
            }
        };
        match self
            .fs
            .link(&source, &new_vpath)
            .and_then(|_| self.attr_for(&new_vpath))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open: ino={}, flags={:#x}", ino, flags);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.open(&vpath, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read: ino={}, fh={}, offset={}, size={}", ino, fh, offset, size);
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }
        match self.fs.read(fh, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write: ino={}, fh={}, offset={}, len={}", ino, fh, offset, data.len());
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.write(&vpath, fh, offset as u64, data) {
            Ok(written) => reply.written(written),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        debug!("flush: ino={}, fh={}", ino, fh);
        match self.fs.flush(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release: ino={}, fh={}", ino, fh);
        match self.fs.release(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        debug!("fsync: ino={}, fh={}, datasync={}", ino, fh, datasync);
        match self.fs.fsync(fh, datasync) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        let names = match self.fs.readdir(&vpath) {
            Ok(names) => names,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        let parent_ino = self
            .inodes
            .get_or_assign(InodeTable::parent_path(&vpath));

        for (i, name) in names.into_iter().enumerate().skip(offset as usize) {
            let (entry_ino, kind) = match name.as_str() {
                "." => (ino, FileType::Directory),
                ".." => (parent_ino, FileType::Directory),
                _ => {
                    let child = if vpath == "/" {
                        format!("/{name}")
                    } else {
                        format!("{vpath}/{name}")
                    };
                    match self.fs.getattr(&child) {
                        Ok(stat) => (self.inodes.get_or_assign(&child), file_type_of(stat.mode)),
                        // Entry vanished between listing and stat
                        Err(_) => continue,
                    }
                }
            };
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        debug!("statfs: ino={}", ino);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.statfs(&vpath) {
            Ok(vs) => reply.statfs(
                vs.blocks,
                vs.bfree,
                vs.bavail,
                vs.files,
                vs.ffree,
                vs.bsize as u32,
                vs.namemax as u32,
                vs.frsize as u32,
            ),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _name: &OsStr,
        _value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        debug!("setxattr: ino={} (unsupported)", ino);
        reply.error(ENOSYS);
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _name: &OsStr,
        _size: u32,
        reply: ReplyXattr,
    ) {
        debug!("getxattr: ino={} (unsupported)", ino);
        reply.error(ENOSYS);
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, _size: u32, reply: ReplyXattr) {
        debug!("listxattr: ino={} (unsupported)", ino);
        reply.error(ENOSYS);
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, _name: &OsStr, reply: ReplyEmpty) {
        debug!("removexattr: ino={} (unsupported)", ino);
        reply.error(ENOSYS);
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        debug!("access: ino={}, mask={:#o}", ino, mask);
        let vpath = match self.vpath(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.fs.access(&vpath, mask) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        debug!("create: parent={}, name={:?}, mode={:o}", parent, name, mode);
        let vpath = match self.inodes.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        // The caller's open flags are ignored: creation is always
        // write-only/create/truncate, as the source behaves.
        match self.fs.create(&vpath, mode) {
            Ok(fh) => match self.attr_for(&vpath) {
                Ok(attr) => reply.created(&TTL, &attr, 0, fh, 0),
                Err(err) => reply.error(errno(&err)),
            },
            Err(err) => reply.error(errno(&err)),
        }
    }
}
