// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grammar-checked field extraction.
//!
//! A [`Profile`] declares which fields a document carries, the character
//! grammar each must satisfy (RFC 6749 Appendix A and RFC 6750 §2.1), and
//! whether an empty value is acceptable. Absent fields and explicit JSON
//! `null` both read as empty.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FlowError;

/// Character grammars for OAuth fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// `1*VSCHAR`, printable ASCII including space.
    VisibleAscii,
    /// Space-delimited `scope-token` list, each token `1*NQCHAR`.
    ScopeList,
    /// Bearer `b64token` (token68).
    Token68,
    /// `1*DIGIT`.
    Digits,
    /// The literal `bearer`, any case.
    BearerLiteral,
    /// `1*NQSCHAR`, the quoted-string-safe set used by `error` fields.
    ErrorText,
}

/// Every grammar, in declaration order. Indexes [`COMPILED`].
pub const ALL: [Grammar; 6] = [
    Grammar::VisibleAscii,
    Grammar::ScopeList,
    Grammar::Token68,
    Grammar::Digits,
    Grammar::BearerLiteral,
    Grammar::ErrorText,
];

/// Each grammar's pattern, compiled on first use. A pattern that failed to
/// compile is `None` and matches nothing.
static COMPILED: LazyLock<[Option<Regex>; 6]> =
    LazyLock::new(|| ALL.map(|g| Regex::new(g.pattern()).ok()));

impl Grammar {
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::VisibleAscii => r"^[\x20-\x7E]+$",
            Self::ScopeList => {
                r"^[\x21\x23-\x5B\x5D-\x7E]+(?: [\x21\x23-\x5B\x5D-\x7E]+)*$"
            }
            Self::Token68 => r"^[A-Za-z0-9\-._~+/]+=*$",
            Self::Digits => r"^[0-9]+$",
            Self::BearerLiteral => r"(?i)^bearer$",
            Self::ErrorText => r"^[\x20\x21\x23-\x5B\x5D-\x7E]+$",
        }
    }

    pub fn regex(&self) -> Option<&'static Regex> {
        COMPILED.get(*self as usize)?.as_ref()
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex().is_some_and(|re| re.is_match(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub grammar: Grammar,
    pub presence: Presence,
}

const fn rule(name: &'static str, grammar: Grammar, presence: Presence) -> FieldRule {
    FieldRule { name, grammar, presence }
}

/// A named set of field rules.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub name: &'static str,
    pub fields: &'static [FieldRule],
}

use Grammar::*;
use Presence::*;

pub const CREDENTIAL: Profile = Profile {
    name: "credential",
    fields: &[
        rule("client_id", VisibleAscii, Required),
        rule("client_secret", VisibleAscii, Required),
        rule("scope", ScopeList, Required),
    ],
};

/// Provider reply to a token request. Refresh replies may omit
/// `refresh_token` and `scope`.
pub const TOKEN_RESPONSE: Profile = Profile {
    name: "token response",
    fields: &[
        rule("access_token", Token68, Required),
        rule("expires_in", Digits, Required),
        rule("refresh_token", VisibleAscii, Optional),
        rule("scope", ScopeList, Optional),
        rule("token_type", BearerLiteral, Required),
        rule("expires_in__absolute_utc", Digits, Optional),
    ],
};

/// Persisted token record. A record without a refresh token is useless.
pub const TOKEN_RECORD: Profile = Profile {
    name: "token record",
    fields: &[
        rule("access_token", Token68, Required),
        rule("expires_in", Digits, Required),
        rule("refresh_token", VisibleAscii, Required),
        rule("scope", ScopeList, Optional),
        rule("token_type", BearerLiteral, Required),
        rule("expires_in__absolute_utc", Digits, Optional),
    ],
};

pub const ERROR_RESPONSE: Profile = Profile {
    name: "error response",
    fields: &[rule("error", ErrorText, Required), rule("error_description", ErrorText, Optional)],
};

/// Extracted values keyed by field name. Empty optional fields are omitted.
pub type Fields = BTreeMap<&'static str, String>;

/// Field names are restricted to `[A-Za-z0-9_]` before use as lookup keys.
pub fn check_field_name(name: &str) -> anyhow::Result<()> {
    let safe = !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !safe {
        return Err(FlowError::validation(format!("unsafe field name {name:?}")));
    }
    Ok(())
}

/// Check one extracted value against its rule.
pub fn check_value(rule: &FieldRule, source: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        return match rule.presence {
            Presence::Optional => Ok(()),
            Presence::Required => Err(FlowError::validation(format!(
                "required field `{}` is empty in {source}",
                rule.name
            ))),
        };
    }
    if !rule.grammar.matches(value) {
        return Err(FlowError::validation(format!(
            "field `{}` in {source} does not match its grammar",
            rule.name
        )));
    }
    Ok(())
}

/// Validate a JSON object against `profile`, returning the extracted values.
///
/// Numbers are checked by their decimal rendering; strings as-is. Any other
/// JSON type for a declared field is rejected.
pub fn check_json(profile: &Profile, source: &str, doc: &serde_json::Value) -> anyhow::Result<Fields> {
    let obj = doc
        .as_object()
        .ok_or_else(|| FlowError::validation(format!("{source}: {} is not a JSON object", profile.name)))?;

    let mut out = Fields::new();
    for rule in profile.fields {
        check_field_name(rule.name)?;
        let text = match obj.get(rule.name) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(_) => {
                return Err(FlowError::validation(format!(
                    "field `{}` in {source} is not a scalar",
                    rule.name
                )));
            }
        };
        check_value(rule, source, &text)?;
        if !text.is_empty() {
            out.insert(rule.name, text);
        }
    }
    Ok(out)
}

/// Validate key=value pairs against `profile`.
pub fn check_pairs(
    profile: &Profile,
    source: &str,
    pairs: &HashMap<String, String>,
) -> anyhow::Result<Fields> {
    let mut out = Fields::new();
    for rule in profile.fields {
        check_field_name(rule.name)?;
        let text = pairs.get(rule.name).map(String::as_str).unwrap_or_default();
        check_value(rule, source, text)?;
        if !text.is_empty() {
            out.insert(rule.name, text.to_owned());
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
