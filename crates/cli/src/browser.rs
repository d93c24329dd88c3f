// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort launch of the user's browser at the authorization URL.

use std::process::{Command, Stdio};

use tracing::debug;

/// Something that can show the user a URL.
pub trait Browser {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Hands the URL to the platform opener. The child is reaped on a detached
/// thread; its exit status is ignored.
#[derive(Debug, Clone, Copy)]
pub struct SystemBrowser {
    program: &'static str,
    leading_args: &'static [&'static str],
}

impl SystemBrowser {
    pub const MACOS: Self = Self { program: "open", leading_args: &[] };
    pub const FREEDESKTOP: Self = Self { program: "xdg-open", leading_args: &[] };
    /// `start` is a `cmd.exe` builtin and would reparse `&` in the query;
    /// the URL protocol handler takes the URL verbatim.
    pub const WINDOWS: Self =
        Self { program: "rundll32", leading_args: &["url.dll,FileProtocolHandler"] };

    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::MACOS
        } else if cfg!(target_os = "windows") {
            Self::WINDOWS
        } else {
            Self::FREEDESKTOP
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// The detached launch command for `url`.
    pub fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(self.leading_args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        let mut child = self
            .command(url)
            .spawn()
            .map_err(|e| anyhow::anyhow!("cannot launch {}: {e}", self.program))?;
        debug!(program = self.program, pid = child.id(), "browser launched");
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Never launches anything; the URL is only printed and written to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl Browser for NoBrowser {
    fn open(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "browser_tests.rs"]
mod tests;
