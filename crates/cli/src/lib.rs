// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod authorize;
pub mod browser;
pub mod callback;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod lock;
pub mod refresh;
pub mod status;
pub mod store;
pub mod token;
pub mod validate;

#[cfg(test)]
pub mod test_support;
