// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: mock token endpoints and assertion helpers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::post;
use axum::Router;

use crate::exchange::TokenEndpoint;

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = format!("{err:#}");
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// An HTTP token endpoint returning scripted `(status, body)` replies.
///
/// Runs on its own Tokio runtime thread so the blocking client under test
/// never executes inside an async context. The last reply repeats once the
/// script runs out.
pub struct MockTokenServer {
    pub addr: SocketAddr,
    calls: Arc<AtomicU32>,
    bodies: Arc<Mutex<Vec<String>>>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockTokenServer {
    pub fn start(responses: Vec<(u16, String)>) -> anyhow::Result<Self> {
        let calls = Arc::new(AtomicU32::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let count = Arc::clone(&calls);
        let seen = Arc::clone(&bodies);
        let app = Router::new().route(
            "/token",
            post(move |body: String| {
                let count = Arc::clone(&count);
                let seen = Arc::clone(&seen);
                let resps = Arc::clone(&responses);
                async move {
                    let idx = count.fetch_add(1, Ordering::Relaxed) as usize;
                    if let Ok(mut b) = seen.lock() {
                        b.push(body);
                    }
                    let (status, body) = resps
                        .get(idx)
                        .or_else(|| resps.last())
                        .cloned()
                        .unwrap_or((500, "{}".to_owned()));
                    (
                        axum::http::StatusCode::from_u16(status)
                            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                        body,
                    )
                }
            }),
        );

        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        std::thread::spawn(move || -> anyhow::Result<()> {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await?;
                Ok::<(), anyhow::Error>(())
            })
        });

        Ok(Self { addr, calls, bodies, shutdown: Some(tx) })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Request bodies received so far, in arrival order.
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl Drop for MockTokenServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// In-process [`TokenEndpoint`] that replays scripted results and records
/// what it was asked.
#[derive(Default)]
pub struct ScriptedEndpoint {
    replies: RefCell<VecDeque<anyhow::Result<String>>>,
    requests: RefCell<Vec<(String, Duration)>>,
}

impl ScriptedEndpoint {
    pub fn new(replies: Vec<anyhow::Result<String>>) -> Self {
        Self { replies: RefCell::new(replies.into()), requests: RefCell::default() }
    }

    pub fn replying(body: &str) -> Self {
        Self::new(vec![Ok(body.to_owned())])
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<(String, Duration)> {
        self.requests.borrow().clone()
    }
}

impl TokenEndpoint for ScriptedEndpoint {
    fn exchange(&self, body: &str, budget: Duration) -> anyhow::Result<String> {
        self.requests.borrow_mut().push((body.to_owned(), budget));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
    }
}

/// Credential used throughout the tests, as `key=value` text.
pub const CREDENTIALS: &str = "\
# Desktop app client
client_id = abc.apps.googleusercontent.com
client_secret = shh
scope = https://mail.google.com/
";

/// Write [`CREDENTIALS`] to `path`, creating parent directories.
pub fn write_credentials(path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, CREDENTIALS)?;
    Ok(())
}
