// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth client credential loaded from a `key=value` file.
//!
//! ```text
//! # Google Cloud console, "Desktop app" client
//! client_id = abc.apps.googleusercontent.com
//! client_secret = shh
//! scope = https://mail.google.com/
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::FlowError;
use crate::validate::{self, CREDENTIAL};

/// Client identity and requested scope. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl Credential {
    /// Read and validate the credential file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("cannot read credential file {}: {e}", path.display()))
        })?;
        let credential = Self::parse(&contents, &path.display().to_string())?;
        debug!(path = %path.display(), client_id = %credential.client_id, "loaded credential");
        Ok(credential)
    }

    /// Parse credential text. `source` names the origin in diagnostics.
    pub fn parse(contents: &str, source: &str) -> anyhow::Result<Self> {
        let pairs = parse_pairs(contents, source)?;

        for rule in CREDENTIAL.fields {
            if !pairs.contains_key(rule.name) {
                return Err(FlowError::config(format!("{source}: missing key `{}`", rule.name)));
            }
        }

        let mut fields = validate::check_pairs(&CREDENTIAL, source, &pairs)?;
        let mut take = |name: &str| fields.remove(name).unwrap_or_default();
        Ok(Self {
            client_id: take("client_id"),
            client_secret: take("client_secret"),
            scope: take("scope"),
        })
    }
}

/// Split `key=value` lines. Blank lines and `#` comments are skipped; keys
/// and values are trimmed. Later duplicates win.
pub fn parse_pairs(contents: &str, source: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(FlowError::config(format!(
                "{source}:{}: expected `key=value`",
                idx + 1
            )));
        };
        pairs.insert(key.trim().to_owned(), value.trim().to_owned());
    }
    Ok(pairs)
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
