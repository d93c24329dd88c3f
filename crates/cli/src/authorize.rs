// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive authorization-code flow producing the first token record.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::callback::CallbackListener;
use crate::clock::Clock;
use crate::config::Settings;
use crate::credential::Credential;
use crate::exchange::{urlencoding, TokenEndpoint, TokenRequest};
use crate::lock::LockGuard;
use crate::store::Store;
use crate::token::{TokenRecord, TokenResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizeOptions {
    /// Loopback port for the redirect. Zero picks a free port.
    pub port: u16,
    /// Bound on the wait for the browser redirect. `None` waits forever.
    pub callback_timeout: Option<Duration>,
}

/// Provider authorization URL for the loopback redirect flow.
pub fn build_auth_url(auth_url: &str, client_id: &str, redirect_uri: &str, scope: &str) -> String {
    format!(
        "{auth_url}?client_id={client_id}\
         &redirect_uri={redirect_uri}\
         &response_type=code\
         &scope={scope}\
         &access_type=offline\
         &prompt=consent",
        client_id = urlencoding(client_id),
        redirect_uri = urlencoding(redirect_uri),
        scope = urlencoding(scope),
    )
}

/// Run the full flow and commit the resulting record.
///
/// Holds the state lock for the whole run, including the wait on the
/// browser, so a concurrent refresh cannot interleave with the first commit.
pub fn authorize(
    settings: &Settings,
    opts: &AuthorizeOptions,
    browser: &dyn Browser,
    endpoint: &dyn TokenEndpoint,
    clock: &dyn Clock,
) -> anyhow::Result<TokenRecord> {
    let credential = Credential::load(&settings.credentials)?;
    let store = Store::new(settings.paths.clone());

    let _lock = LockGuard::acquire(&settings.paths.lock)?;
    store.discard_temps()?;

    let listener = CallbackListener::bind(opts.port)?;
    let redirect_uri = listener.redirect_uri();
    let url =
        build_auth_url(&settings.auth_url, &credential.client_id, &redirect_uri, &credential.scope);

    store.write_auth_url(&url)?;
    eprintln!("Open this URL to authorize access:");
    eprintln!("  {url}");
    eprintln!("(also saved to {})", settings.paths.auth_url.display());

    if let Err(e) = browser.open(&url) {
        warn!(err = %e, "could not open a browser; open the URL manually");
    }

    info!(%redirect_uri, "waiting for authorization callback");
    let code = listener.wait_for_code(opts.callback_timeout)?;
    debug!("authorization code received");

    let request = TokenRequest::AuthorizationCode {
        code,
        client_id: credential.client_id,
        client_secret: credential.client_secret,
        redirect_uri,
    };
    let issued_at = clock.now();
    let body = endpoint.exchange(&request.form_body(), Duration::ZERO)?;
    let record = TokenRecord::from_grant(TokenResponse::parse(&body)?, issued_at)?;

    store.commit(&record, settings.commit_timeout)?;
    info!(expires_at = ?record.expires_at, "authorization complete");
    Ok(record)
}

#[cfg(test)]
#[path = "authorize_tests.rs"]
mod tests;
