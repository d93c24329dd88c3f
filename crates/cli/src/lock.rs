// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process exclusive lock on a well-known file, via `flock(2)`.
//!
//! The kernel drops the lock when the descriptor closes, so it is released on
//! guard drop and on any process exit, clean or not.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::clock::deadline_after;
use crate::error::FlowError;

/// Poll interval while waiting on a contended lock.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held exclusive lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    _lock: Flock<File>,
}

impl LockGuard {
    /// Block until the lock is acquired, however long that takes.
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        let mut file = open_lock_file(path)?;
        loop {
            match Flock::lock(file, FlockArg::LockExclusive) {
                Ok(lock) => {
                    debug!(path = %path.display(), "lock acquired");
                    return Ok(Self { path: path.to_owned(), _lock: lock });
                }
                Err((f, Errno::EINTR)) => file = f,
                Err((_, errno)) => {
                    anyhow::bail!("flock {} failed: {errno}", path.display());
                }
            }
        }
    }

    /// Acquire the lock, giving up once `max_wait` has elapsed. A zero
    /// `max_wait`, or one too large to express as a deadline, waits without
    /// bound.
    pub fn acquire_within(path: &Path, max_wait: Duration) -> anyhow::Result<Self> {
        let deadline = match deadline_after(max_wait) {
            Some(deadline) if !max_wait.is_zero() => deadline,
            _ => return Self::acquire(path),
        };
        let mut file = open_lock_file(path)?;
        let mut contended = false;
        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => {
                    debug!(path = %path.display(), contended, "lock acquired");
                    return Ok(Self { path: path.to_owned(), _lock: lock });
                }
                Err((f, Errno::EAGAIN)) | Err((f, Errno::EINTR)) => {
                    if !contended {
                        debug!(path = %path.display(), "lock held elsewhere, waiting");
                        contended = true;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FlowError::lock_timeout(format!(
                            "could not lock {} within {}s",
                            path.display(),
                            max_wait.as_secs_f64()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL.min(deadline - now));
                    file = f;
                }
                Err((_, errno)) => {
                    anyhow::bail!("flock {} failed: {errno}", path.display());
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open (creating if needed) the lock target in append mode. Its contents
/// are never read or written.
fn open_lock_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("cannot open lock file {}: {e}", path.display()))
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
