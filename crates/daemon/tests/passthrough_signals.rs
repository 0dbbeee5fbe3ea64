//! Integration tests for the passthrough operation layer
//!
//! These exercise the operation table and the signal contract directly,
//! without performing an actual FUSE mount (which requires privileges).

#![cfg(feature = "fuse")]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use common::{NodeType, Signal, SignalDispatcher, SignalReceiver};
use sigfs_daemon::fs::PassthroughFs;

/// Create an operation table over a scratch root
fn setup() -> (Arc<PassthroughFs>, SignalReceiver, TempDir) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let (tx, rx) = SignalDispatcher::new();
    (Arc::new(PassthroughFs::new(root, tx)), rx, dir)
}

/// The real path a signal for `name` should carry
fn real(dir: &TempDir, name: &str) -> String {
    dir.path()
        .canonicalize()
        .unwrap()
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_create_signals_file_and_leaves_empty_file() {
    let (fs, rx, dir) = setup();

    let fh = fs.create("/a.txt", 0o644).unwrap();
    fs.release(fh).unwrap();

    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "a.txt"), NodeType::File))
    );
    assert_eq!(rx.try_recv(), None);

    let meta = std::fs::metadata(dir.path().join("a.txt")).unwrap();
    assert!(meta.is_file());
    assert_eq!(meta.len(), 0);
}

#[test]
fn test_write_signals_and_read_returns_the_bytes() {
    let (fs, rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"").unwrap();

    let fh = fs.open("/a.txt", libc::O_RDWR).unwrap();
    let written = fs.write("/a.txt", fh, 0, b"0123456789").unwrap();
    assert_eq!(written, 10);

    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "a.txt"), NodeType::File))
    );

    let data = fs.read(fh, 0, 10).unwrap();
    assert_eq!(&data, b"0123456789");
    fs.release(fh).unwrap();

    // Reads are never notified
    assert_eq!(rx.try_recv(), None);
}

#[test]
fn test_mkdir_and_rmdir_signal_directory() {
    let (fs, rx, dir) = setup();

    fs.mkdir("/sub", 0o755).unwrap();
    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "sub"), NodeType::Directory))
    );
    assert!(fs.readdir("/").unwrap().contains(&"sub".to_string()));

    fs.rmdir("/sub").unwrap();
    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "sub"), NodeType::Directory))
    );
    assert!(!fs.readdir("/").unwrap().contains(&"sub".to_string()));
}

#[test]
fn test_rename_signals_destination_with_unknown_kind() {
    let (fs, rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"payload").unwrap();

    fs.rename("/a.txt", "/b.txt").unwrap();

    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "b.txt"), NodeType::Unknown))
    );
    assert!(!dir.path().join("a.txt").exists());
    assert!(dir.path().join("b.txt").exists());
}

#[test]
fn test_truncate_signals_file_and_resizes() {
    let (fs, rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"hello world").unwrap();

    fs.truncate("/a.txt", 5).unwrap();

    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "a.txt"), NodeType::File))
    );
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
}

#[test]
fn test_signal_precedes_a_rejected_mutation() {
    let (fs, rx, dir) = setup();

    // The host rejects the truncate, but the signal was already sent
    let err = fs.truncate("/missing.txt", 0).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

    assert_eq!(
        rx.try_recv(),
        Some(Signal::new(real(&dir, "missing.txt"), NodeType::File))
    );
}

#[test]
fn test_link_family_is_never_notified() {
    let (fs, rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"payload").unwrap();

    fs.symlink("/s.txt", Path::new("a.txt")).unwrap();
    assert_eq!(fs.readlink("/s.txt").unwrap(), Path::new("a.txt"));
    fs.link("/a.txt", "/l.txt").unwrap();
    fs.unlink("/l.txt").unwrap();
    fs.unlink("/s.txt").unwrap();

    assert_eq!(rx.try_recv(), None);
}

#[test]
fn test_exactly_one_signal_per_mutation_in_order() {
    let (fs, rx, dir) = setup();

    let fh = fs.create("/a.txt", 0o644).unwrap();
    fs.release(fh).unwrap();
    fs.mkdir("/sub", 0o755).unwrap();
    let fh = fs.open("/a.txt", libc::O_WRONLY).unwrap();
    fs.write("/a.txt", fh, 0, b"x").unwrap();
    fs.release(fh).unwrap();
    fs.truncate("/a.txt", 0).unwrap();
    fs.rename("/a.txt", "/b.txt").unwrap();
    fs.rmdir("/sub").unwrap();

    let expected = [
        Signal::new(real(&dir, "a.txt"), NodeType::File),
        Signal::new(real(&dir, "sub"), NodeType::Directory),
        Signal::new(real(&dir, "a.txt"), NodeType::File),
        Signal::new(real(&dir, "a.txt"), NodeType::File),
        Signal::new(real(&dir, "b.txt"), NodeType::Unknown),
        Signal::new(real(&dir, "sub"), NodeType::Directory),
    ];
    for want in expected {
        assert_eq!(rx.try_recv(), Some(want));
    }
    assert_eq!(rx.try_recv(), None);
}

#[test]
fn test_readdir_lists_self_and_parent_first() {
    let (fs, _rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let names = fs.readdir("/").unwrap();
    assert_eq!(&names[..2], &[".".to_string(), "..".to_string()]);
    assert!(names.contains(&"a.txt".to_string()));
    assert!(names.contains(&"sub".to_string()));
}

#[test]
fn test_getattr_matches_host_metadata() {
    use std::os::unix::fs::MetadataExt;

    let (fs, _rx, dir) = setup();
    std::fs::write(dir.path().join("a.txt"), b"payload").unwrap();

    let stat = fs.getattr("/a.txt").unwrap();
    let meta = std::fs::metadata(dir.path().join("a.txt")).unwrap();

    assert_eq!(stat.size, meta.size());
    assert_eq!(stat.mode, meta.mode());
    assert_eq!(stat.uid, meta.uid());
    assert_eq!(stat.gid, meta.gid());
    assert_eq!(stat.nlink, meta.nlink() as u32);
}

#[test]
fn test_statfs_reports_volume_fields() {
    let (fs, _rx, _dir) = setup();

    let vs = fs.statfs("/").unwrap();
    assert!(vs.bsize > 0);
    assert!(vs.blocks > 0);
    assert!(vs.namemax > 0);
}

#[test]
fn test_access_failure_is_access_denied() {
    let (fs, _rx, _dir) = setup();

    let err = fs.access("/missing.txt", libc::F_OK).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EACCES));
}

#[test]
fn test_concurrent_transfers_do_not_interleave() {
    const WRITERS: usize = 8;
    const CHUNK: usize = 4096;

    let (fs, rx, dir) = setup();
    std::fs::write(dir.path().join("big"), vec![0u8; WRITERS * CHUNK]).unwrap();

    // Each writer owns a distinct offset range and a distinct byte value;
    // a seek from one call paired with a transfer from another would land
    // bytes in the wrong region.
    let mut workers = Vec::new();
    for i in 0..WRITERS {
        let fs = Arc::clone(&fs);
        workers.push(thread::spawn(move || {
            let fh = fs.open("/big", libc::O_RDWR).unwrap();
            let payload = vec![b'a' + i as u8; CHUNK];
            for _ in 0..16 {
                fs.write("/big", fh, (i * CHUNK) as u64, &payload).unwrap();
                let back = fs.read(fh, (i * CHUNK) as u64, CHUNK as u32).unwrap();
                assert_eq!(back, payload);
            }
            fs.release(fh).unwrap();
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let contents = std::fs::read(dir.path().join("big")).unwrap();
    for (i, region) in contents.chunks(CHUNK).enumerate() {
        assert!(region.iter().all(|&b| b == b'a' + i as u8));
    }

    // One signal per write call, nothing synthesized or dropped
    let mut count = 0;
    while rx.try_recv().is_some() {
        count += 1;
    }
    assert_eq!(count, WRITERS * 16);
}

#[test]
fn test_unknown_handle_fails_with_ebadf() {
    let (fs, rx, _dir) = setup();

    let err = fs.read(999, 0, 16).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));

    // The write signal still precedes the handle lookup failure
    let err = fs.write("/a.txt", 999, 0, b"x").unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    assert!(rx.try_recv().is_some());
}
