// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use proptest::prelude::*;

use super::{parse_duration, Command, Config, Settings, DEFAULT_TOKEN_URL};
use crate::error::{error_kind, ErrorKind};

fn parse(args: &[&str]) -> anyhow::Result<Config> {
    Ok(Config::try_parse_from(args)?)
}

#[yare::parameterized(
    bare_seconds  = { "45", 45 },
    seconds       = { "30s", 30 },
    minutes       = { "5m", 300 },
    zero          = { "0", 0 },
    padded        = { " 10s ", 10 },
)]
fn durations(input: &str, secs: u64) {
    assert_eq!(parse_duration(input), Ok(Duration::from_secs(secs)));
}

#[yare::parameterized(
    empty       = { "" },
    unit_only   = { "m" },
    hours       = { "1h" },
    negative    = { "-5" },
    fractional  = { "1.5s" },
    both_units  = { "5ms" },
    overflow_m  = { "999999999999999999m" },
)]
fn rejected_durations(input: &str) {
    assert!(parse_duration(input).is_err(), "{input:?} accepted");
}

#[test]
fn refresh_defaults() -> anyhow::Result<()> {
    let config = parse(&["curlauth", "--state-dir", "/tmp/s", "refresh"])?;
    config.validate()?;
    let Command::Refresh(args) = &config.command else {
        anyhow::bail!("expected refresh, got {:?}", config.command);
    };
    assert_eq!(args.early, Duration::from_secs(300));
    assert_eq!(args.max_wait, Duration::from_secs(30));
    assert!(!args.force);
    assert_eq!(config.commit_timeout, Duration::from_secs(10));
    assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
    Ok(())
}

#[test]
fn authorize_options() -> anyhow::Result<()> {
    let config = parse(&[
        "curlauth",
        "authorize",
        "--port",
        "9000",
        "--no-browser",
        "--callback-timeout",
        "2m",
        "--state-dir",
        "/tmp/s",
    ])?;
    let Command::Authorize(args) = &config.command else {
        anyhow::bail!("expected authorize, got {:?}", config.command);
    };
    assert_eq!(args.port, 9000);
    assert!(args.no_browser);
    assert_eq!(args.callback_timeout, Duration::from_secs(120));
    assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/s")));
    Ok(())
}

#[test]
fn settings_derive_from_state_dir() -> anyhow::Result<()> {
    let config = parse(&["curlauth", "--state-dir", "/tmp/s", "status"])?;
    let settings = config.settings();
    assert_eq!(settings.paths.record, PathBuf::from("/tmp/s/token.json"));
    assert_eq!(settings.paths.bearer_config, PathBuf::from("/tmp/s/bearer.conf"));
    assert_eq!(settings.credentials, PathBuf::from("/tmp/s/credentials"));
    assert_eq!(settings, Settings::for_dir(std::path::Path::new("/tmp/s")));
    Ok(())
}

#[test]
fn explicit_credentials_path_wins() -> anyhow::Result<()> {
    let config =
        parse(&["curlauth", "--state-dir", "/tmp/s", "--credentials", "/etc/c", "status"])?;
    assert_eq!(config.settings().credentials, PathBuf::from("/etc/c"));
    Ok(())
}

#[test]
fn verbose_overrides_log_level() -> anyhow::Result<()> {
    let config = parse(&["curlauth", "--log-level", "error", "-v", "status"])?;
    assert_eq!(config.log_filter(), "debug");
    let config = parse(&["curlauth", "--log-level", "error", "status"])?;
    assert_eq!(config.log_filter(), "error");
    Ok(())
}

#[yare::parameterized(
    bad_format    = { &["curlauth", "--log-format", "xml", "status"] },
    bad_token_url = { &["curlauth", "--token-url", "not a url", "status"] },
)]
fn invalid_config_is_config_error(args: &[&str]) {
    let err = parse(args).and_then(|c| c.validate()).err();
    assert_eq!(err.as_ref().and_then(error_kind), Some(ErrorKind::Config));
}

#[test]
fn missing_subcommand_is_rejected() {
    assert!(parse(&["curlauth"]).is_err());
}

proptest! {
    #[test]
    fn minutes_are_sixty_seconds(n in 0u64..1_000_000) {
        prop_assert_eq!(parse_duration(&format!("{n}m")), Ok(Duration::from_secs(n * 60)));
        prop_assert_eq!(parse_duration(&format!("{n}s")), parse_duration(&n.to_string()));
    }

    #[test]
    fn arbitrary_text_never_panics(s in "\\PC{0,12}") {
        let _ = parse_duration(&s);
    }
}
