// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint client: form-encoded POST with bounded retries.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clock::deadline_after;
use crate::error::FlowError;
use crate::token::ErrorResponse;
use crate::validate::{self, ERROR_RESPONSE};

/// Attempts per exchange, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff between attempts; doubles each retry.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on a single attempt, whatever the remaining budget.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// A token request body, one of the two supported grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRequest {
    AuthorizationCode {
        code: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    },
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl TokenRequest {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn form_body(&self) -> String {
        match self {
            Self::AuthorizationCode { code, client_id, client_secret, redirect_uri } => {
                urlencoded(&[
                    ("code", code.as_str()),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("grant_type", self.grant_type()),
                ])
            }
            Self::RefreshToken { client_id, client_secret, refresh_token } => urlencoded(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", self.grant_type()),
            ]),
        }
    }
}

/// Anything that can answer a token request with a raw success body.
pub trait TokenEndpoint {
    /// POST `body` and return the raw 2xx response body. `budget` bounds the
    /// whole exchange including retries; zero means no overall bound. Each
    /// attempt is still capped at [`ATTEMPT_TIMEOUT`].
    fn exchange(&self, body: &str, budget: Duration) -> anyhow::Result<String>;
}

/// Blocking HTTPS client for a fixed token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::blocking::Client,
    token_url: String,
}

impl TokenClient {
    pub fn new(token_url: impl Into<String>) -> anyhow::Result<Self> {
        install_crypto_provider();
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("curlauth/", env!("CARGO_PKG_VERSION")))
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(Self { http, token_url: token_url.into() })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// One POST. Transport failures come back as `Err` text for the retry loop.
    fn attempt(&self, body: &str, left: Option<Duration>) -> Result<(u16, String), String> {
        let resp = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(attempt_timeout(left))
            .body(body.to_owned())
            .send()
            .map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(|e| format!("read body: {e}"))?;
        Ok((status, text))
    }
}

impl TokenEndpoint for TokenClient {
    fn exchange(&self, body: &str, budget: Duration) -> anyhow::Result<String> {
        // Zero, or a budget past any representable instant, has no deadline.
        let deadline = if budget.is_zero() { None } else { deadline_after(budget) };
        let remaining = || deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let left = remaining();
            if left.is_some_and(|l| l.is_zero()) {
                return Err(FlowError::transfer(format!(
                    "token request to {} timed out after {} of {MAX_ATTEMPTS} attempts",
                    self.token_url,
                    attempt - 1
                )));
            }

            let failure = match self.attempt(body, left) {
                Ok((status, text)) => match classify(status)? {
                    StatusClass::Success => {
                        debug!(status, attempt, "token endpoint accepted request");
                        return Ok(text);
                    }
                    StatusClass::Retryable => format!("HTTP {status}"),
                    StatusClass::Fatal => return Err(provider_error(status, &text)),
                },
                Err(msg) => msg,
            };

            if attempt == MAX_ATTEMPTS {
                return Err(FlowError::transfer(format!(
                    "token request to {} failed after {attempt} attempts: {failure}",
                    self.token_url
                )));
            }
            warn!(attempt, max = MAX_ATTEMPTS, error = %failure, "token request failed, retrying");
            let pause = match remaining() {
                Some(left) => backoff.min(left),
                None => backoff,
            };
            std::thread::sleep(pause);
            backoff *= 2;
        }

        Err(FlowError::transfer("token request exhausted all attempts"))
    }
}

/// Timeout for one attempt given the remaining budget (`None` = no budget).
pub fn attempt_timeout(left: Option<Duration>) -> Duration {
    left.map_or(ATTEMPT_TIMEOUT, |l| l.min(ATTEMPT_TIMEOUT))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Worth another attempt: 408, 429, and 5xx gateway/availability codes.
    Retryable,
    Fatal,
}

/// Classify a numeric HTTP status. Anything outside three digits is a
/// protocol violation.
pub fn classify(status: u16) -> anyhow::Result<StatusClass> {
    if !(100..=999).contains(&status) {
        return Err(FlowError::protocol(format!("malformed HTTP status {status}")));
    }
    Ok(match status {
        200..=299 => StatusClass::Success,
        408 | 429 | 500 | 502 | 503 | 504 => StatusClass::Retryable,
        _ => StatusClass::Fatal,
    })
}

/// Build the operator-facing error for a fatal non-2xx reply. 400 and 401
/// carry an OAuth error object; other statuses are reported bare.
pub fn provider_error(status: u16, body: &str) -> anyhow::Error {
    if status != 400 && status != 401 {
        return FlowError::transfer(format!("token endpoint returned HTTP {status}"));
    }
    match parse_error_response(body) {
        Some(err) => FlowError::transfer(format!("token endpoint returned HTTP {status}: {err}")),
        None if body.trim().is_empty() => {
            FlowError::transfer(format!("token endpoint returned HTTP {status} with no body"))
        }
        None => FlowError::transfer(format!(
            "token endpoint returned HTTP {status} (body present, unparsed)"
        )),
    }
}

fn parse_error_response(body: &str) -> Option<ErrorResponse> {
    let doc: serde_json::Value = serde_json::from_str(body).ok()?;
    validate::check_json(&ERROR_RESPONSE, "error response", &doc).ok()?;
    serde_json::from_value(doc).ok()
}

/// Install the ring crypto provider for reqwest/rustls. Later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Build a URL-encoded form body string.
pub fn urlencoded(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding(k), urlencoding(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside the unreserved set.
pub fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
