//! Process-level ingest lock.
//!
//! The ingestion pipeline assumes a single writing process per score store.
//! `scan` and `watch` take an advisory OS file lock (flock) scoped to the
//! store path and hold it for the process lifetime; read-only commands
//! (`report`, `score` without `--save`, `rules`) do not.

use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const INGEST_LOCK_FILE: &str = "rubric-ingest.lock";

/// Guard held by the ingesting process. Released on drop.
pub struct IngestGuard {
    file: File,
    path: PathBuf,
}

impl Drop for IngestGuard {
    fn drop(&mut self) {
        let _ = unlock_file(&self.file);
        // Best-effort cleanup of the lock file itself.
        let _ = fs::remove_file(&self.path);
    }
}

/// Acquire the ingest lock for the given store path.
///
/// Fails fast when another rubric process already owns ingestion for the
/// same store.
pub fn acquire_ingest_guard(store_path: &Path) -> Result<IngestGuard> {
    let dir = lock_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create runtime lock directory: {}", dir.display()))?;

    let path = dir.join(scoped_lock_filename(store_path));
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    match lock_file_nonblocking(&file) {
        Ok(()) => {
            // Write basic owner info for debugging.
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = file.flush();

            Ok(IngestGuard { file, path })
        }
        Err(e) if is_lock_busy(&e) => anyhow::bail!(
            "another rubric process is already ingesting into {}",
            store_path.display()
        ),
        Err(e) => {
            Err(e).with_context(|| format!("failed to lock file: {}", path.display()))
        }
    }
}

fn lock_dir() -> PathBuf {
    let mut dir = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => std::env::temp_dir(),
    };
    dir.push("rubric");
    dir
}

fn scoped_lock_filename(store_path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    store_path.to_string_lossy().hash(&mut hasher);
    let digest = hasher.finish();
    format!("{INGEST_LOCK_FILE}.{digest:016x}")
}

fn is_lock_busy(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock)
        || matches!(error.raw_os_error(), Some(11) | Some(35))
}

#[cfg(unix)]
fn lock_file_nonblocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    const LOCK_NB: i32 = 4;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("the rubric ingest lock currently requires Unix (macOS/Linux)");
