// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Failure classes for a token flow. Every class is fatal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing credential / token record fields.
    Config,
    /// A structured field failed its grammar.
    Validation,
    /// Malformed callback request or HTTP status line.
    Protocol,
    /// Non-2xx provider response, or the transfer budget ran out.
    Transfer,
    /// Bounded wait for the exclusive lock exceeded.
    LockTimeout,
    /// Rename retry deadline exceeded during commit.
    CommitTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "CONFIG_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Transfer => "TRANSFER_ERROR",
            Self::LockTimeout => "LOCK_TIMEOUT",
            Self::CommitTimeout => "COMMIT_TIMEOUT",
        }
    }

    /// Process exit status for this class. Unclassified failures exit 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config => 2,
            Self::Validation => 3,
            Self::Protocol => 4,
            Self::Transfer => 5,
            Self::LockTimeout => 6,
            Self::CommitTimeout => 7,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure carried inside an [`anyhow::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FlowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Self { kind, message: message.into() })
    }

    pub fn config(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::Config, message)
    }

    pub fn validation(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn protocol(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn transfer(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::Transfer, message)
    }

    pub fn lock_timeout(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::LockTimeout, message)
    }

    pub fn commit_timeout(message: impl Into<String>) -> anyhow::Error {
        Self::new(ErrorKind::CommitTimeout, message)
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FlowError {}

/// Find the classification of an error chain, if any link carries one.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|e| e.downcast_ref::<FlowError>()).map(|e| e.kind)
}

/// Map an error chain to the process exit status.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    error_kind(err).map(|k| k.exit_code()).unwrap_or(1)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
