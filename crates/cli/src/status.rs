// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only summary of the stored token. Takes no lock: commits only ever
//! replace whole files.

use std::fmt;
use std::time::Duration;

use crate::config::Settings;
use crate::refresh::is_due;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub token_type: String,
    pub scope: Option<String>,
    /// Absolute expiry in epoch seconds, if recorded.
    pub expires_at: Option<u64>,
    /// Seconds until expiry; negative once expired.
    pub remaining: Option<i64>,
    pub refresh_due: bool,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "token_type: {}", self.token_type)?;
        if let Some(scope) = &self.scope {
            writeln!(f, "scope: {scope}")?;
        }
        match (self.expires_at, self.remaining) {
            (Some(at), Some(left)) => {
                writeln!(f, "expires_at: {at}")?;
                writeln!(f, "remaining: {left}s")?;
            }
            _ => writeln!(f, "expires_at: unknown")?,
        }
        writeln!(f, "refresh_due: {}", if self.refresh_due { "yes" } else { "no" })
    }
}

/// Summarise the stored record as of `now` (epoch seconds).
pub fn status(settings: &Settings, early: Duration, now: u64) -> anyhow::Result<StatusReport> {
    let record = Store::new(settings.paths.clone()).load_record()?;
    let remaining = record.expires_at.map(|at| {
        let diff = i128::from(at) - i128::from(now);
        i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
    });
    Ok(StatusReport {
        refresh_due: is_due(record.expires_at, now, early, false),
        token_type: record.token_type,
        scope: record.scope,
        expires_at: record.expires_at,
        remaining,
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
