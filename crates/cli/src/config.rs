// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::error::FlowError;
use crate::store::StatePaths;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// OAuth 2.0 bearer token manager for command-line HTTP clients.
#[derive(Debug, Parser)]
#[command(name = "curlauth", version, about)]
pub struct Config {
    /// Directory holding the token record, bearer config, and lock file.
    #[arg(long, env = "CURLAUTH_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Client credential file (`key=value`). Defaults to `<state-dir>/credentials`.
    #[arg(long, env = "CURLAUTH_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// Log at debug level regardless of --log-level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log filter (trace, debug, info, warn, error).
    #[arg(long, env = "CURLAUTH_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, env = "CURLAUTH_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    #[arg(long, env = "CURLAUTH_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, hide = true, global = true)]
    pub token_url: String,

    #[arg(long, env = "CURLAUTH_AUTH_URL", default_value = DEFAULT_AUTH_URL, hide = true, global = true)]
    pub auth_url: String,

    /// Deadline for replacing the state files (`30`, `30s`, `1m`).
    #[arg(long, env = "CURLAUTH_COMMIT_TIMEOUT", default_value = "10s", value_parser = parse_duration, global = true)]
    pub commit_timeout: Duration,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive authorization-code flow and store the first token.
    Authorize(AuthorizeArgs),
    /// Refresh the access token if it is close to expiry.
    Refresh(RefreshArgs),
    /// Report the stored token's expiry.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AuthorizeArgs {
    /// Loopback port for the redirect listener.
    #[arg(long, env = "CURLAUTH_PORT", default_value_t = 8087)]
    pub port: u16,

    /// Give up waiting for the browser redirect after this long (`0` waits forever).
    #[arg(long, default_value = "0", value_parser = parse_duration)]
    pub callback_timeout: Duration,

    /// Only print the authorization URL; do not launch a browser.
    #[arg(long)]
    pub no_browser: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RefreshArgs {
    /// Refresh when the token expires within this window.
    #[arg(long, env = "CURLAUTH_EARLY", default_value = "5m", value_parser = parse_duration)]
    pub early: Duration,

    /// Refresh even if the token is still fresh.
    #[arg(long)]
    pub force: bool,

    /// Total time budget for lock wait plus token request (`0` waits forever).
    #[arg(long, env = "CURLAUTH_MAX_WAIT", default_value = "30s", value_parser = parse_duration)]
    pub max_wait: Duration,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Window used to report whether a refresh is due.
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    pub early: Duration,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(FlowError::config(format!("invalid log format: {other}")));
            }
        }
        for (name, url) in [("token", &self.token_url), ("auth", &self.auth_url)] {
            reqwest::Url::parse(url)
                .map_err(|e| FlowError::config(format!("invalid {name} URL {url:?}: {e}")))?;
        }
        Ok(())
    }

    /// Effective log filter, honouring `--verbose`.
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    pub fn settings(&self) -> Settings {
        let dir = self.state_dir.clone().unwrap_or_else(default_state_dir);
        let credentials = self.credentials.clone().unwrap_or_else(|| dir.join("credentials"));
        Settings {
            paths: StatePaths::new(dir),
            credentials,
            token_url: self.token_url.clone(),
            auth_url: self.auth_url.clone(),
            commit_timeout: self.commit_timeout,
        }
    }
}

/// Resolved locations and endpoints shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub paths: StatePaths,
    pub credentials: PathBuf,
    pub token_url: String,
    pub auth_url: String,
    pub commit_timeout: Duration,
}

impl Settings {
    /// Defaults rooted at `dir`.
    pub fn for_dir(dir: &Path) -> Self {
        Self {
            paths: StatePaths::new(dir),
            credentials: dir.join("credentials"),
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            auth_url: DEFAULT_AUTH_URL.to_owned(),
            commit_timeout: Duration::from_secs(10),
        }
    }
}

/// `$XDG_STATE_HOME/curlauth`, else `$HOME/.local/state/curlauth`, else a
/// relative `.curlauth`.
pub fn default_state_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("curlauth");
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local/state/curlauth");
    }
    PathBuf::from(".curlauth")
}

/// Parse `N`, `Ns`, or `Nm` into a duration. Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit) = match s.strip_suffix('m') {
        Some(d) => (d, 60),
        None => (s.strip_suffix('s').unwrap_or(s), 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid duration {s:?} (expected N, Ns, or Nm)"));
    }
    let n: u64 = digits.parse().map_err(|e| format!("invalid duration {s:?}: {e}"))?;
    n.checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration {s:?} out of range"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
