// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Early-refresh scheduler: renew the access token once it is within the
//! early-refresh window of expiry.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::Settings;
use crate::credential::Credential;
use crate::error::FlowError;
use crate::exchange::{TokenEndpoint, TokenRequest};
use crate::lock::LockGuard;
use crate::store::Store;
use crate::token::{TokenRecord, TokenResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Refresh once the token expires within this window.
    pub early: Duration,
    /// Refresh regardless of expiry.
    pub force: bool,
    /// Shared budget for lock wait and token request. Zero is unbounded.
    pub max_wait: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Token still outside the early window; nothing was done.
    Fresh,
    Refreshed(TokenRecord),
}

/// Whether a token expiring at `expires_at` needs refreshing at `now`. A
/// record with no absolute expiry counts as expired.
pub fn is_due(expires_at: Option<u64>, now: u64, early: Duration, force: bool) -> bool {
    if force {
        return true;
    }
    match expires_at {
        Some(at) => now >= at.saturating_sub(early.as_secs()),
        None => true,
    }
}

/// Refresh the stored token if due. The lock wait and the token request
/// share `opts.max_wait`.
pub fn refresh(
    settings: &Settings,
    opts: &RefreshOptions,
    endpoint: &dyn TokenEndpoint,
    clock: &dyn Clock,
) -> anyhow::Result<Outcome> {
    let started = Instant::now();
    let store = Store::new(settings.paths.clone());

    let _lock = LockGuard::acquire_within(&settings.paths.lock, opts.max_wait)?;
    store.discard_temps()?;

    let current = store.load_record()?;
    if !is_due(current.expires_at, clock.now(), opts.early, opts.force) {
        debug!(expires_at = ?current.expires_at, "token still fresh, nothing to do");
        return Ok(Outcome::Fresh);
    }

    let budget = if opts.max_wait.is_zero() {
        Duration::ZERO
    } else {
        let left = opts.max_wait.saturating_sub(started.elapsed());
        if left.is_zero() {
            return Err(FlowError::transfer("time budget exhausted before token request"));
        }
        left
    };

    let credential = Credential::load(&settings.credentials)?;
    let request = TokenRequest::RefreshToken {
        client_id: credential.client_id,
        client_secret: credential.client_secret,
        refresh_token: current.refresh_token.clone(),
    };

    let issued_at = clock.now();
    let body = endpoint.exchange(&request.form_body(), budget)?;
    let record = current.merge(TokenResponse::parse(&body)?, issued_at)?;

    store.commit(&record, settings.commit_timeout)?;
    info!(expires_at = ?record.expires_at, forced = opts.force, "access token refreshed");
    Ok(Outcome::Refreshed(record))
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
