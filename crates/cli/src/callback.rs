// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot loopback listener that captures the OAuth redirect.
//!
//! Accepts a single connection, reads the request head, answers with a fixed
//! 200, and extracts `code` from the request line. The request target is
//! percent-decoded before the code is matched, so `4%2F0A..` and `4/0A..`
//! are the same code.

use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use crate::clock::deadline_after;
use crate::error::FlowError;

/// Authorization code grammar: digit, `/`, then URL-safe characters.
pub const CODE_PATTERN: &str = r"^[0-9]/[0-9A-Za-z_-]+$";

/// [`CODE_PATTERN`], compiled once. `None` would reject every code.
static CODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(CODE_PATTERN).ok());

/// Largest request head accepted.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Per-read timeout once a browser has connected.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval for a bounded accept.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/plain; charset=utf-8\r\n\
    Content-Length: 51\r\n\
    Connection: close\r\n\
    \r\n\
    Authorization received. You may close this window.\n";

/// A bound, not yet accepted, callback listener.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    /// Bind `127.0.0.1:port`. Port 0 picks a free port.
    pub fn bind(port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).map_err(|e| {
            anyhow::anyhow!("cannot bind callback listener on 127.0.0.1:{port}: {e}")
        })?;
        let addr = listener.local_addr()?;
        debug!(%addr, "callback listener bound");
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI registered with the provider for this listener.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}", self.addr.ip(), self.addr.port())
    }

    /// Wait for the browser redirect and return the authorization code.
    ///
    /// `timeout` bounds the wait for a connection; `None`, or a timeout too
    /// large to express as a deadline, waits forever.
    /// Consumes the listener: exactly one exchange is served.
    pub fn wait_for_code(self, timeout: Option<Duration>) -> anyhow::Result<String> {
        let mut stream = self.accept(timeout)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let head = read_head(&mut stream)?;

        // The tab may be gone already; a failed reply changes nothing.
        if let Err(e) = stream.write_all(RESPONSE.as_bytes()).and_then(|()| stream.flush()) {
            debug!(err = %e, "callback response not delivered");
        }
        let _ = stream.shutdown(std::net::Shutdown::Both);

        extract_code(&head)
    }

    fn accept(&self, timeout: Option<Duration>) -> anyhow::Result<TcpStream> {
        let bounded = timeout.and_then(|t| deadline_after(t).map(|deadline| (t, deadline)));
        let Some((timeout, deadline)) = bounded else {
            let (stream, peer) = self.listener.accept()?;
            debug!(%peer, "callback connection accepted");
            return Ok(stream);
        };

        self.listener.set_nonblocking(true)?;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "callback connection accepted");
                    stream.set_nonblocking(false)?;
                    return Ok(stream);
                }
                Err(e) if e.kind() == IoErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FlowError::protocol(format!(
                            "no authorization callback within {}s",
                            timeout.as_secs_f64()
                        )));
                    }
                    std::thread::sleep(ACCEPT_POLL.min(deadline - now));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Read until the `\r\n\r\n` header terminator. Reads may return any number
/// of bytes, so accumulate until the terminator shows up.
pub fn read_head<R: Read>(reader: &mut R) -> anyhow::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(FlowError::protocol(format!("callback read failed: {e}"))),
        };
        if n == 0 {
            return Err(FlowError::protocol(
                "callback connection closed before the request head ended",
            ));
        }
        // Only the tail can complete a terminator split across reads.
        let scan_from = head.len().saturating_sub(3);
        head.extend_from_slice(&buf[..n]);
        if head[scan_from..].windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(head);
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(FlowError::protocol("callback request head too large"));
        }
    }
}

/// Pull the authorization code out of a raw request head.
pub fn extract_code(head: &[u8]) -> anyhow::Result<String> {
    let text = String::from_utf8_lossy(head);
    let request_line = text.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(_method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FlowError::protocol(format!("malformed request line {request_line:?}")));
    };
    if !version.starts_with("HTTP/") {
        return Err(FlowError::protocol(format!("malformed request line {request_line:?}")));
    }

    let url = reqwest::Url::parse(&format!("http://localhost{target}")).map_err(|e| {
        FlowError::protocol(format!("malformed request target {target:?}: {e}"))
    })?;

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(code) = code else {
        return Err(match error {
            Some(err) => FlowError::protocol(format!("authorization denied by provider: {err}")),
            None => FlowError::protocol("callback request carries no `code` parameter"),
        });
    };

    if !CODE.as_ref().is_some_and(|re| re.is_match(&code)) {
        return Err(FlowError::protocol("callback `code` parameter has an unexpected shape"));
    }
    Ok(code)
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
