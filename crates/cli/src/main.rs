// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use curlauth::authorize::{authorize, AuthorizeOptions};
use curlauth::browser::{Browser, NoBrowser, SystemBrowser};
use curlauth::clock::{Clock, SystemClock};
use curlauth::config::{Command, Config};
use curlauth::error::exit_code;
use curlauth::exchange::TokenClient;
use curlauth::refresh::{refresh, Outcome, RefreshOptions};
use curlauth::status::status;

fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }

    init_tracing(&config);

    if let Err(e) = run(&config) {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let settings = config.settings();
    let clock = SystemClock;

    match &config.command {
        Command::Authorize(args) => {
            let endpoint = TokenClient::new(&settings.token_url)?;
            let browser: Box<dyn Browser> = if args.no_browser {
                Box::new(NoBrowser)
            } else {
                Box::new(SystemBrowser::platform_default())
            };
            let opts = AuthorizeOptions {
                port: args.port,
                callback_timeout: (!args.callback_timeout.is_zero())
                    .then_some(args.callback_timeout),
            };
            let record = authorize(&settings, &opts, browser.as_ref(), &endpoint, &clock)?;
            eprintln!(
                "Authorized. Bearer config written to {}",
                settings.paths.bearer_config.display()
            );
            tracing::debug!(expires_at = ?record.expires_at, "authorize finished");
        }
        Command::Refresh(args) => {
            let endpoint = TokenClient::new(&settings.token_url)?;
            let opts =
                RefreshOptions { early: args.early, force: args.force, max_wait: args.max_wait };
            match refresh(&settings, &opts, &endpoint, &clock)? {
                Outcome::Fresh => {}
                Outcome::Refreshed(record) => {
                    tracing::debug!(expires_at = ?record.expires_at, "refresh finished");
                }
            }
        }
        Command::Status(args) => {
            let report = status(&settings, args.early, clock.now())?;
            print!("{report}");
        }
    }
    Ok(())
}
