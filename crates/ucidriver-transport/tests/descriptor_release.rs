//! Descriptor accounting for handle construction and failed launches
//!
//! Descriptor counts are process-wide, so this file holds a single test.
//!
//! Run with: cargo test -p ucidriver-transport --test descriptor_release

use nix::libc::rlim_t;
use nix::sys::resource::{Resource, getrlimit, setrlimit};
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;
use ucidriver_transport::{ProcessError, ProcessHandle, ProcessState, StreamKind};

fn open_fd_numbers() -> BTreeSet<i32> {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .collect()
}

fn open_fds() -> usize {
    open_fd_numbers().len()
}

/// The `n`th lowest descriptor number not currently open (0-based)
fn nth_free_fd(n: usize) -> i32 {
    let open = open_fd_numbers();
    (0..).filter(|fd| !open.contains(fd)).nth(n).unwrap()
}

fn write_script(dir: &TempDir, name: &str, mode: u32) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(
        &path,
        "#!/bin/sh\nwhile read -r line; do\n  [ \"$line\" = \"quit\" ] && exit 0\ndone\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    path
}

#[tokio::test]
async fn test_descriptors_are_released_on_every_failure_path() {
    let dir = TempDir::new().unwrap();
    let engine = write_script(&dir, "engine", 0o755);
    let not_executable = write_script(&dir, "not-executable", 0o644);

    // the first spawn sets up the runtime's child reaping
    let warm_up = ProcessHandle::new(&engine).unwrap();
    warm_up.start().await.unwrap();
    warm_up.close().await.unwrap();
    drop(warm_up);

    let before = open_fds();

    let handle = ProcessHandle::new(&not_executable).unwrap();
    assert_eq!(open_fds(), before + 6, "three pipes, two ends each");

    let err = handle.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }), "{err}");
    assert_eq!(handle.state(), ProcessState::Closed);
    assert_eq!(open_fds(), before, "failed launch kept pipes open");
    drop(handle);

    let err = ProcessHandle::new(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, ProcessError::NotFound { .. }));
    assert_eq!(open_fds(), before);

    // The listing's own descriptor is free again afterwards, so three numbers
    // remain below the limit: room for the stdin pipe and nothing more.
    let limit = nth_free_fd(2);
    let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).unwrap();
    setrlimit(Resource::RLIMIT_NOFILE, limit as rlim_t, hard).unwrap();
    let result = ProcessHandle::new(&engine);
    setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

    let err = result.unwrap_err();
    assert!(
        matches!(
            err,
            ProcessError::PipeCreate {
                stream: StreamKind::Stdout,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(open_fds(), before, "stdin pipe leaked after stdout pipe failed");
}
