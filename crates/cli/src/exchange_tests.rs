// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::error::{error_kind, ErrorKind};
use crate::test_support::MockTokenServer;

fn refresh_request() -> TokenRequest {
    TokenRequest::RefreshToken {
        client_id: "abc.apps.googleusercontent.com".to_owned(),
        client_secret: "shh".to_owned(),
        refresh_token: "1//09".to_owned(),
    }
}

#[test]
fn authorization_code_body() {
    let req = TokenRequest::AuthorizationCode {
        code: "4/0ATx3".to_owned(),
        client_id: "abc.apps.googleusercontent.com".to_owned(),
        client_secret: "s&h=h".to_owned(),
        redirect_uri: "http://127.0.0.1:8087".to_owned(),
    };
    assert_eq!(
        req.form_body(),
        "code=4%2F0ATx3&client_id=abc.apps.googleusercontent.com&client_secret=s%26h%3Dh\
         &redirect_uri=http%3A%2F%2F127.0.0.1%3A8087&grant_type=authorization_code"
    );
}

#[test]
fn refresh_token_body() {
    assert_eq!(
        refresh_request().form_body(),
        "client_id=abc.apps.googleusercontent.com&client_secret=shh\
         &refresh_token=1%2F%2F09&grant_type=refresh_token"
    );
}

#[yare::parameterized(
    ok          = { 200, StatusClass::Success },
    created     = { 201, StatusClass::Success },
    edge_2xx    = { 299, StatusClass::Success },
    redirect    = { 302, StatusClass::Fatal },
    bad_request = { 400, StatusClass::Fatal },
    unauthorized = { 401, StatusClass::Fatal },
    timeout     = { 408, StatusClass::Retryable },
    throttled   = { 429, StatusClass::Retryable },
    internal    = { 500, StatusClass::Retryable },
    unavailable = { 503, StatusClass::Retryable },
    not_impl    = { 501, StatusClass::Fatal },
)]
fn status_classes(status: u16, expected: StatusClass) {
    assert_eq!(classify(status).ok(), Some(expected));
}

#[yare::parameterized(
    zero      = { 0 },
    two_digit = { 99 },
    four_digit = { 1000 },
)]
fn malformed_status_is_protocol_error(status: u16) {
    let err = classify(status).err();
    assert_eq!(err.as_ref().and_then(error_kind), Some(ErrorKind::Protocol));
}

#[test]
fn provider_error_surfaces_error_and_description() {
    let body = json!({"error": "invalid_grant", "error_description": "Bad Request"}).to_string();
    let err = provider_error(400, &body);
    assert_eq!(error_kind(&err), Some(ErrorKind::Transfer));
    assert!(err.to_string().contains("HTTP 400: invalid_grant: Bad Request"), "{err}");
}

#[yare::parameterized(
    html          = { 401, "<html>nope</html>", "body present, unparsed" },
    bad_grammar   = { 400, r#"{"error":"a\"b"}"#, "body present, unparsed" },
    empty         = { 400, "", "no body" },
    other_status  = { 403, r#"{"error":"access_denied"}"#, "HTTP 403" },
)]
fn provider_error_degrades(status: u16, body: &str, expected: &str) {
    let err = provider_error(status, body);
    assert_eq!(error_kind(&err), Some(ErrorKind::Transfer));
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn success_returns_raw_body_unvalidated() -> anyhow::Result<()> {
    // Not a valid token response; the client must not care.
    let server = MockTokenServer::start(vec![(200, r#"{"token_type":"mac"}"#.to_owned())])?;
    let client = TokenClient::new(server.token_url())?;

    let body = client.exchange(&refresh_request().form_body(), Duration::from_secs(10))?;

    assert_eq!(body, r#"{"token_type":"mac"}"#);
    assert_eq!(server.calls(), 1);
    assert_eq!(server.bodies(), vec![refresh_request().form_body()]);
    Ok(())
}

#[test]
fn transient_failure_is_retried() -> anyhow::Result<()> {
    let server = MockTokenServer::start(vec![
        (503, String::new()),
        (200, r#"{"access_token":"ok"}"#.to_owned()),
    ])?;
    let client = TokenClient::new(server.token_url())?;

    let body = client.exchange("x=1", Duration::from_secs(10))?;

    assert_eq!(body, r#"{"access_token":"ok"}"#);
    assert_eq!(server.calls(), 2);
    Ok(())
}

#[test]
fn retries_are_capped() -> anyhow::Result<()> {
    let server = MockTokenServer::start(vec![(500, String::new())])?;
    let client = TokenClient::new(server.token_url())?;

    let err = client.exchange("x=1", Duration::ZERO).err();

    assert_eq!(err.as_ref().and_then(error_kind), Some(ErrorKind::Transfer));
    assert_eq!(server.calls(), MAX_ATTEMPTS);
    Ok(())
}

#[test]
fn invalid_grant_is_not_retried() -> anyhow::Result<()> {
    let body = json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."});
    let server = MockTokenServer::start(vec![(400, body.to_string())])?;
    let client = TokenClient::new(server.token_url())?;

    crate::assert_err_contains!(
        client.exchange("x=1", Duration::from_secs(10)),
        "invalid_grant: Token has been expired or revoked."
    );
    assert_eq!(server.calls(), 1);
    Ok(())
}

#[test]
fn budget_bounds_a_silent_endpoint() -> anyhow::Result<()> {
    // Accepts connections (kernel backlog) but never answers.
    let silent = std::net::TcpListener::bind("127.0.0.1:0")?;
    let client = TokenClient::new(format!("http://{}/token", silent.local_addr()?))?;

    let started = Instant::now();
    let err = client.exchange("x=1", Duration::from_millis(500)).err();

    assert_eq!(err.as_ref().and_then(error_kind), Some(ErrorKind::Transfer));
    assert!(started.elapsed() < Duration::from_secs(5), "budget not enforced");
    Ok(())
}

#[test]
fn urlencoding_reserved_characters() {
    assert_eq!(urlencoding("a b/c?d=e&f"), "a%20b%2Fc%3Fd%3De%26f");
    assert_eq!(urlencoding("AZaz09-_.~"), "AZaz09-_.~");
}

#[test]
fn unrepresentable_budget_is_unbounded() -> anyhow::Result<()> {
    let server = MockTokenServer::start(vec![(200, r#"{"access_token":"ok"}"#.to_owned())])?;
    let client = TokenClient::new(server.token_url())?;

    let body = client.exchange("x=1", Duration::from_secs(u64::MAX))?;

    assert_eq!(body, r#"{"access_token":"ok"}"#);
    Ok(())
}

#[test]
fn budget_spent_before_first_attempt_reports_none_made() -> anyhow::Result<()> {
    let server = MockTokenServer::start(vec![(200, "{}".to_owned())])?;
    let client = TokenClient::new(server.token_url())?;

    crate::assert_err_contains!(
        client.exchange("x=1", Duration::from_nanos(1)),
        "after 0 of 3 attempts"
    );
    assert_eq!(server.calls(), 0);
    Ok(())
}

#[test]
fn budget_spent_during_backoff_counts_attempts_made() -> anyhow::Result<()> {
    let server = MockTokenServer::start(vec![(503, String::new())])?;
    let client = TokenClient::new(server.token_url())?;

    // The 1s backoff outlasts the budget after the first failure.
    crate::assert_err_contains!(
        client.exchange("x=1", Duration::from_millis(300)),
        "after 1 of 3 attempts"
    );
    assert_eq!(server.calls(), 1);
    Ok(())
}

#[yare::parameterized(
    no_budget      = { None, ATTEMPT_TIMEOUT },
    short_budget   = { Some(Duration::from_secs(5)), Duration::from_secs(5) },
    long_budget    = { Some(Duration::from_secs(600)), ATTEMPT_TIMEOUT },
    huge_budget    = { Some(Duration::MAX), ATTEMPT_TIMEOUT },
)]
fn each_attempt_is_capped(left: Option<Duration>, expected: Duration) {
    assert_eq!(attempt_timeout(left), expected);
}
