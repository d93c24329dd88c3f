// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint replies and the persisted token record.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::validate::{self, TOKEN_RECORD, TOKEN_RESPONSE};

/// A validated provider reply to a token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub token_type: String,
}

impl TokenResponse {
    /// Parse and grammar-check a raw token endpoint body.
    pub fn parse(body: &str) -> anyhow::Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| FlowError::validation(format!("token response is not JSON: {e}")))?;
        validate::check_json(&TOKEN_RESPONSE, "token response", &doc)?;
        serde_json::from_value(doc)
            .map_err(|e| FlowError::validation(format!("token response: {e}")))
    }
}

/// OAuth error body returned with 400/401.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {desc}", self.error),
            None => f.write_str(&self.error),
        }
    }
}

/// The token record file. Fields are declared in sorted order so the
/// serialized object has sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub expires_in: u64,
    /// Epoch seconds at which the access token expires: request issue time
    /// plus `expires_in`. The only expiry oracle once written.
    #[serde(
        rename = "expires_in__absolute_utc",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<u64>,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub token_type: String,
}

impl TokenRecord {
    /// Build the first record from an authorization-code reply issued at
    /// `issued_at` (epoch seconds).
    pub fn from_grant(resp: TokenResponse, issued_at: u64) -> anyhow::Result<Self> {
        let refresh_token = resp.refresh_token.ok_or_else(|| {
            FlowError::validation("token response: required field `refresh_token` is empty")
        })?;
        let record = Self {
            expires_at: Some(issued_at.saturating_add(resp.expires_in)),
            access_token: resp.access_token,
            expires_in: resp.expires_in,
            refresh_token,
            scope: resp.scope,
            token_type: resp.token_type,
        };
        record.validate("token record")?;
        Ok(record)
    }

    /// Overlay a refresh reply onto this record. Fields the provider returned
    /// replace the old ones; omitted optional fields keep their old value.
    /// Expiry is recomputed from the new `expires_in` and `issued_at`.
    pub fn merge(self, resp: TokenResponse, issued_at: u64) -> anyhow::Result<Self> {
        let merged = Self {
            expires_at: Some(issued_at.saturating_add(resp.expires_in)),
            access_token: resp.access_token,
            expires_in: resp.expires_in,
            refresh_token: resp.refresh_token.unwrap_or(self.refresh_token),
            scope: resp.scope.or(self.scope),
            token_type: resp.token_type,
        };
        merged.validate("token record")?;
        Ok(merged)
    }

    /// Parse and grammar-check a token record document.
    pub fn parse(contents: &str, source: &str) -> anyhow::Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(contents)
            .map_err(|e| FlowError::config(format!("{source}: not a JSON document: {e}")))?;
        validate::check_json(&TOKEN_RECORD, source, &doc)?;
        serde_json::from_value(doc).map_err(|e| FlowError::config(format!("{source}: {e}")))
    }

    pub fn validate(&self, source: &str) -> anyhow::Result<()> {
        let doc = serde_json::to_value(self)?;
        validate::check_json(&TOKEN_RECORD, source, &doc)?;
        Ok(())
    }

    /// Serialized record file contents (pretty JSON, sorted keys).
    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// The bearer-config line handed to the HTTP client, without a newline.
    pub fn bearer_config(&self) -> String {
        format!("--oauth2-bearer {}", self.access_token)
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
