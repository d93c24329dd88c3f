// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk token state: the token record and the derived bearer-config file.
//!
//! A commit writes both artifacts to private temp names, then renames each
//! onto its final name. The bearer-config file goes first. A crash between
//! the two renames leaves the bearer config one generation ahead of the
//! record; the next refresh sees the older expiry and at worst refreshes
//! once more than needed. Readers only ever see whole files. A failed commit
//! removes its temp files.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clock::deadline_after;
use crate::error::FlowError;
use crate::token::TokenRecord;

/// Interval between rename attempts.
pub const RENAME_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Locations of every shared artifact, derived from one state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub dir: PathBuf,
    /// Token record (JSON).
    pub record: PathBuf,
    /// Bearer config line for the HTTP client.
    pub bearer_config: PathBuf,
    /// Fallback copy of the interactive authorization URL.
    pub auth_url: PathBuf,
    /// Lock target.
    pub lock: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            record: dir.join("token.json"),
            bearer_config: dir.join("bearer.conf"),
            auth_url: dir.join("auth_url"),
            lock: dir.join("lock"),
            dir,
        }
    }

    /// Temp name for `path`: same directory, so the rename stays on one
    /// filesystem.
    pub fn temp_for(path: &Path) -> PathBuf {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        path.with_file_name(format!(".{name}.tmp"))
    }

    pub fn temp_paths(&self) -> [PathBuf; 2] {
        [Self::temp_for(&self.bearer_config), Self::temp_for(&self.record)]
    }
}

/// The persisted token state.
#[derive(Debug, Clone)]
pub struct Store {
    paths: StatePaths,
}

impl Store {
    pub fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Remove temp files left behind by an aborted run. Missing files are fine.
    pub fn discard_temps(&self) -> anyhow::Result<()> {
        for tmp in self.paths.temp_paths() {
            match std::fs::remove_file(&tmp) {
                Ok(()) => debug!(path = %tmp.display(), "removed stale temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => anyhow::bail!("cannot remove {}: {e}", tmp.display()),
            }
        }
        Ok(())
    }

    /// Read and validate the current token record.
    pub fn load_record(&self) -> anyhow::Result<TokenRecord> {
        let path = &self.paths.record;
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("cannot read token record {}: {e}", path.display()))
        })?;
        TokenRecord::parse(&contents, &path.display().to_string())
    }

    /// Commit `record` and its bearer-config line. Each rename is retried
    /// every [`RENAME_RETRY_INTERVAL`] until `timeout` elapses. A timeout too
    /// large to express as a deadline retries without bound.
    pub fn commit(&self, record: &TokenRecord, timeout: Duration) -> anyhow::Result<()> {
        self.commit_with(record, timeout, |from, to| std::fs::rename(from, to))
    }

    /// [`Store::commit`] with a caller-supplied rename primitive.
    pub fn commit_with<R>(
        &self,
        record: &TokenRecord,
        timeout: Duration,
        mut rename: R,
    ) -> anyhow::Result<()>
    where
        R: FnMut(&Path, &Path) -> std::io::Result<()>,
    {
        std::fs::create_dir_all(&self.paths.dir)?;
        let deadline = deadline_after(timeout);

        if let Err(e) = self.stage_and_rename(record, deadline, &mut rename) {
            // Best effort; the next run discards anything left.
            if let Err(cleanup) = self.discard_temps() {
                warn!(err = %cleanup, "could not remove temp files after failed commit");
            }
            return Err(e);
        }

        debug!(
            record = %self.paths.record.display(),
            bearer_config = %self.paths.bearer_config.display(),
            expires_at = ?record.expires_at,
            "token state committed"
        );
        Ok(())
    }

    fn stage_and_rename<R>(
        &self,
        record: &TokenRecord,
        deadline: Option<Instant>,
        rename: &mut R,
    ) -> anyhow::Result<()>
    where
        R: FnMut(&Path, &Path) -> std::io::Result<()>,
    {
        let [bearer_tmp, record_tmp] = self.paths.temp_paths();
        write_private(&bearer_tmp, record.bearer_config().as_bytes())?;
        write_private(&record_tmp, record.to_json()?.as_bytes())?;
        rename_until(&bearer_tmp, &self.paths.bearer_config, deadline, rename)?;
        rename_until(&record_tmp, &self.paths.record, deadline, rename)
    }

    /// Write the authorization URL fallback file.
    pub fn write_auth_url(&self, url: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.paths.dir)?;
        std::fs::write(&self.paths.auth_url, format!("{url}\n"))?;
        Ok(())
    }
}

/// Create (truncating) a file readable only by its owner and write `bytes`.
fn write_private(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", path.display()))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Rename `from` onto `to`, retrying until `deadline`. `None` retries forever.
pub fn rename_until<R>(
    from: &Path,
    to: &Path,
    deadline: Option<Instant>,
    rename: &mut R,
) -> anyhow::Result<()>
where
    R: FnMut(&Path, &Path) -> std::io::Result<()>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(FlowError::commit_timeout(format!(
                    "cannot replace {} after {attempt} attempts: {err}",
                    to.display()
                )));
            }
            Some(deadline) => RENAME_RETRY_INTERVAL.min(deadline - now),
            None => RENAME_RETRY_INTERVAL,
        };
        warn!(path = %to.display(), attempt, err = %err, "rename failed, retrying");
        std::thread::sleep(pause);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
