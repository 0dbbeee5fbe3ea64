//! Path-based passthrough operations with change signaling
//!
//! `PassthroughFs` is the operation table behind the mount: every call
//! resolves its virtual path against the source root, dispatches a change
//! signal if the operation mutates the tree, then performs the matching
//! host primitive. Host results and errors pass through unchanged; the
//! one translation is the explicit access check, which always fails with
//! `EACCES`.
//!
//! Signals are dispatched *before* the host call is attempted, so the
//! consumer can observe a notification for a mutation the host
//! subsequently rejects. This is deliberate and kept from the source
//! behavior.
//!
//! Read and write serialize their whole seek-then-transfer sequence under
//! one filesystem-wide lock, not a per-handle lock. Transfers against
//! different files contend on the same mutex, which caps throughput under
//! concurrency; the trade is kept as designed rather than narrowed.

use std::ffi::CString;
use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use common::{NodeType, Signal, SignalDispatcher};

use super::handles::HandleTable;

/// The fixed attribute subset surfaced by `getattr`
///
/// Exactly the lstat fields the mount reports: timestamps, ownership,
/// mode (including the file-type bits), link count and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub atime: SystemTime,
    pub ctime: SystemTime,
    pub mtime: SystemTime,
    pub gid: u32,
    pub uid: u32,
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
}

impl FileStat {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            atime: system_time(meta.atime(), meta.atime_nsec()),
            ctime: system_time(meta.ctime(), meta.ctime_nsec()),
            mtime: system_time(meta.mtime(), meta.mtime_nsec()),
            gid: meta.gid(),
            uid: meta.uid(),
            mode: meta.mode(),
            nlink: meta.nlink() as u32,
            size: meta.size(),
        }
    }
}

/// The fixed statvfs subset surfaced by `statfs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStat {
    pub bavail: u64,
    pub bfree: u64,
    pub blocks: u64,
    pub bsize: u64,
    pub favail: u64,
    pub ffree: u64,
    pub files: u64,
    pub flag: u64,
    pub frsize: u64,
    pub namemax: u64,
}

/// Passthrough operation table over a single source root
pub struct PassthroughFs {
    /// Source root; captured once, already canonicalized
    root: PathBuf,
    /// Change-signal producer
    signals: SignalDispatcher,
    /// Open host files keyed by handle id
    handles: HandleTable,
    /// Serializes every seek+transfer sequence, across all files
    rwlock: Mutex<()>,
}

impl PassthroughFs {
    pub fn new(root: PathBuf, signals: SignalDispatcher) -> Self {
        Self {
            root,
            signals,
            handles: HandleTable::new(),
            rwlock: Mutex::new(()),
        }
    }

    /// Resolve a virtual path (rooted at `/`) to the real host path
    pub fn real_path(&self, vpath: &str) -> PathBuf {
        self.root.join(vpath.trim_start_matches('/'))
    }

    fn signal(&self, real: &Path, kind: NodeType) {
        self.signals
            .dispatch(Signal::new(real.to_string_lossy(), kind));
    }

    /// Check permissions on the host path
    ///
    /// The one translated error: any failed host check reports `EACCES`.
    pub fn access(&self, vpath: &str, mask: i32) -> io::Result<()> {
        let real = c_path(&self.real_path(vpath))?;
        match unsafe { libc::access(real.as_ptr(), mask) } {
            0 => Ok(()),
            _ => Err(io::Error::from_raw_os_error(libc::EACCES)),
        }
    }

    /// Read host metadata (lstat) for the documented attribute subset
    pub fn getattr(&self, vpath: &str) -> io::Result<FileStat> {
        let meta = std::fs::symlink_metadata(self.real_path(vpath))?;
        Ok(FileStat::from_metadata(&meta))
    }

    /// Read host volume statistics for the documented statvfs subset
    pub fn statfs(&self, vpath: &str) -> io::Result<VolumeStat> {
        let real = c_path(&self.real_path(vpath))?;
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        if unsafe { libc::statvfs(real.as_ptr(), &mut st) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(VolumeStat {
            bavail: st.f_bavail as u64,
            bfree: st.f_bfree as u64,
            blocks: st.f_blocks as u64,
            bsize: st.f_bsize as u64,
            favail: st.f_favail as u64,
            ffree: st.f_ffree as u64,
            files: st.f_files as u64,
            flag: st.f_flag as u64,
            frsize: st.f_frsize as u64,
            namemax: st.f_namemax as u64,
        })
    }

    /// List a host directory; the self and parent entries come first
    pub fn readdir(&self, vpath: &str) -> io::Result<Vec<String>> {
        let mut names = vec![".".to_string(), "..".to_string()];
        for entry in std::fs::read_dir(self.real_path(vpath))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Create a host file (write-only, create, truncate) and register it
    pub fn create(&self, vpath: &str, mode: u32) -> io::Result<u64> {
        let real = self.real_path(vpath);
        self.signal(&real, NodeType::File);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&real)?;
        Ok(self.handles.insert(file))
    }

    /// Create a host directory
    pub fn mkdir(&self, vpath: &str, mode: u32) -> io::Result<()> {
        let real = self.real_path(vpath);
        self.signal(&real, NodeType::Directory);
        DirBuilder::new().mode(mode).create(&real)
    }

    /// Remove a host directory
    pub fn rmdir(&self, vpath: &str) -> io::Result<()> {
        let real = self.real_path(vpath);
        self.signal(&real, NodeType::Directory);
        std::fs::remove_dir(&real)
    }

    /// Rename within the host filesystem
    ///
    /// The signal carries the destination real path; the kind of the
    /// moved node is not determined by the call itself.
    pub fn rename(&self, old_vpath: &str, new_vpath: &str) -> io::Result<()> {
        let old_real = self.real_path(old_vpath);
        let new_real = self.real_path(new_vpath);
        self.signal(&new_real, NodeType::Unknown);
        std::fs::rename(&old_real, &new_real)
    }

    /// Resize a host file
    pub fn truncate(&self, vpath: &str, length: u64) -> io::Result<()> {
        let real = self.real_path(vpath);
        self.signal(&real, NodeType::File);
        let file = OpenOptions::new().write(true).open(&real)?;
        file.set_len(length)
    }

    /// Open a host file honoring the caller's access mode and flags
    pub fn open(&self, vpath: &str, flags: i32) -> io::Result<u64> {
        let mut opts = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => opts.read(true),
            libc::O_WRONLY => opts.write(true),
            libc::O_RDWR => opts.read(true).write(true),
            _ => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
        };
        opts.custom_flags(flags & !libc::O_ACCMODE);
        let file = opts.open(self.real_path(vpath))?;
        Ok(self.handles.insert(file))
    }

    /// Read bytes at an offset
    ///
    /// The seek and the transfer happen as one sequence under the access
    /// lock. A short read mirrors the host's.
    pub fn read(&self, fh: u64, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        let file = self.handles.get(fh)?;
        let _guard = self.rwlock.lock();
        let mut file = &*file;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size as usize];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write bytes at an offset
    ///
    /// The signal is dispatched inside the access lock, before the seek,
    /// so it precedes the transfer and any failure of it.
    pub fn write(&self, vpath: &str, fh: u64, offset: u64, data: &[u8]) -> io::Result<u32> {
        let real = self.real_path(vpath);
        let _guard = self.rwlock.lock();
        self.signal(&real, NodeType::File);
        let file = self.handles.get(fh)?;
        let mut file = &*file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(data.len() as u32)
    }

    /// Flush a handle's data to the host (fsync)
    pub fn flush(&self, fh: u64) -> io::Result<()> {
        self.handles.get(fh)?.sync_all()
    }

    /// Sync a handle, data-only when the caller asked for it
    pub fn fsync(&self, fh: u64, datasync: bool) -> io::Result<()> {
        let file = self.handles.get(fh)?;
        if datasync {
            file.sync_data()
        } else {
            file.sync_all()
        }
    }

    /// Close a handle
    pub fn release(&self, fh: u64) -> io::Result<()> {
        self.handles.remove(fh)
    }

    /// Create a hard link; not notified
    pub fn link(&self, source_vpath: &str, new_vpath: &str) -> io::Result<()> {
        std::fs::hard_link(self.real_path(source_vpath), self.real_path(new_vpath))
    }

    /// Create a symlink at the virtual path pointing at the raw target;
    /// not notified
    pub fn symlink(&self, new_vpath: &str, target: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, self.real_path(new_vpath))
    }

    /// Read a symlink's target
    pub fn readlink(&self, vpath: &str) -> io::Result<PathBuf> {
        std::fs::read_link(self.real_path(vpath))
    }

    /// Remove a host file; not notified (kept from the source behavior)
    pub fn unlink(&self, vpath: &str) -> io::Result<()> {
        std::fs::remove_file(self.real_path(vpath))
    }

    /// Change permission bits
    pub fn chmod(&self, vpath: &str, mode: u32) -> io::Result<()> {
        std::fs::set_permissions(self.real_path(vpath), PermissionsExt::from_mode(mode))
    }

    /// Change ownership
    pub fn chown(&self, vpath: &str, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::chown(self.real_path(vpath), uid, gid)
    }

    /// Create a filesystem node
    pub fn mknod(&self, vpath: &str, mode: u32, rdev: u32) -> io::Result<()> {
        let real = c_path(&self.real_path(vpath))?;
        match unsafe { libc::mknod(real.as_ptr(), mode as libc::mode_t, rdev as libc::dev_t) } {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }

    /// Set access/modification times; omitted times are left untouched
    pub fn utimens(
        &self,
        vpath: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()> {
        let real = c_path(&self.real_path(vpath))?;
        let times = [timespec_or_omit(atime), timespec_or_omit(mtime)];
        match unsafe { libc::utimensat(libc::AT_FDCWD, real.as_ptr(), times.as_ptr(), 0) } {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }
}

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

fn system_time(secs: i64, nanos: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn timespec_or_omit(time: Option<SystemTime>) -> libc::timespec {
    match time.map(|t| t.duration_since(UNIX_EPOCH)) {
        Some(Ok(d)) => libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        },
        // Pre-epoch or absent: leave the field untouched
        _ => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
    }
}
