//! Stub UCI engines for end-to-end tests
//!
//! Each stub is a small `/bin/sh` script written into a temporary directory.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use ucidriver::Engine;

/// Upper bound for any single receive in these tests
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A stub engine script plus the directory that keeps it alive
pub struct StubEngine {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl StubEngine {
    /// Write `body` as an executable shell script
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("stub-engine");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub engine");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make stub engine executable");
        Self { dir, path }
    }

    /// Answers `uci` with `id name Stub` / `uciok`, exits 0 on `quit`
    pub fn cooperative() -> Self {
        Self::new(
            r#"while read -r line; do
  case "$line" in
    uci) echo "id name Stub"; echo "uciok" ;;
    quit) exit 0 ;;
  esac
done"#,
        )
    }

    /// Appends every received line to `received.log`, exits 0 on `quit`
    pub fn recording() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let log = dir.path().join("received.log");
        let body = format!(
            r#"while read -r line; do
  echo "$line" >> "{}"
  [ "$line" = "uci" ] && echo "uciok"
  [ "$line" = "quit" ] && exit 0
done"#,
            log.display()
        );
        let path = dir.path().join("stub-engine");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub engine");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make stub engine executable");
        Self { dir, path }
    }

    /// Replaces itself with a 10 s sleep when told to quit
    pub fn stubborn() -> Self {
        Self::new(
            r#"while read -r line; do
  [ "$line" = "quit" ] && exec sleep 10
done"#,
        )
    }

    /// Emits `count` lines as fast as it can after `uci`
    pub fn flood(count: usize) -> Self {
        Self::new(&format!(
            r#"read -r line
i=0
while [ $i -lt {count} ]; do
  echo "info string line $i"
  i=$((i + 1))
done
while read -r line; do
  [ "$line" = "quit" ] && exit 0
done"#
        ))
    }

    /// Lines received by a [`recording`](Self::recording) stub
    pub fn received(&self) -> Vec<String> {
        read_lines(&self.dir.path().join("received.log"))
    }

    pub fn engine(&self) -> Engine {
        Engine::new(&self.path).expect("construct engine")
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Receive one line or fail the test after [`RECV_TIMEOUT`]
pub async fn recv(engine: &mut Engine) -> Option<String> {
    tokio::time::timeout(RECV_TIMEOUT, engine.recv_line())
        .await
        .expect("timed out waiting for engine output")
}
