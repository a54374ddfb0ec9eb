mod common;

use anyhow::{bail, Result};
use authguard::api::ApiClient;
use authguard::storage::MemoryStore;
use authguard::token::TokenStore;
use authguard::verify::{
    HumanVerificationGate, VerificationState, DEFAULT_FAILURE_MESSAGE, NO_TOKEN_MESSAGE,
};
use common::{token, ManualClock, UNREACHABLE};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_767_225_600;
const HOST: &str = "console.example.com";

fn gate(base_url: &str) -> Result<(HumanVerificationGate, TokenStore)> {
    let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
    let api = ApiClient::new(base_url.parse()?, tokens.clone())?;
    Ok((
        HumanVerificationGate::new(api, Arc::new(ManualClock::new(NOW))),
        tokens,
    ))
}

async fn verify_endpoint(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/verify-human"))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn development_hosts_bypass_the_gate() -> Result<()> {
    let server = MockServer::start().await;
    verify_endpoint(&server, ResponseTemplate::new(200), 0).await;

    for host in ["localhost", "127.0.0.1"] {
        let (gate, _) = gate(&server.uri())?;
        assert_eq!(gate.mount(host), VerificationState::Verified);
    }
    Ok(())
}

#[tokio::test]
async fn cached_credential_skips_the_challenge() -> Result<()> {
    let server = MockServer::start().await;
    verify_endpoint(&server, ResponseTemplate::new(200), 0).await;

    let (gate, tokens) = gate(&server.uri())?;
    tokens.set_verification_token(&token(&json!({ "exp": NOW + 3_600 })))?;

    assert_eq!(gate.mount(HOST), VerificationState::Verified);
    assert!(gate.is_verified());
    assert!(tokens.verification_token().is_some());
    Ok(())
}

#[tokio::test]
async fn expired_credential_is_deleted() -> Result<()> {
    let (gate, tokens) = gate(UNREACHABLE)?;
    tokens.set_verification_token(&token(&json!({ "exp": NOW - 1 })))?;

    assert_eq!(gate.mount(HOST), VerificationState::Unverified);
    assert!(tokens.verification_token().is_none());
    Ok(())
}

#[tokio::test]
async fn unreadable_or_expiry_less_credential_is_deleted() -> Result<()> {
    for stored in ["garbage".to_string(), token(&json!({ "sub": "x" }))] {
        let (gate, tokens) = gate(UNREACHABLE)?;
        tokens.set_verification_token(&stored)?;

        assert_eq!(gate.mount(HOST), VerificationState::Unverified);
        assert!(tokens.verification_token().is_none());
    }
    Ok(())
}

#[tokio::test]
async fn no_credential_means_unverified() -> Result<()> {
    let (gate, _) = gate(UNREACHABLE)?;
    assert_eq!(gate.mount(HOST), VerificationState::Unverified);
    Ok(())
}

#[tokio::test]
async fn duplicate_solutions_are_exchanged_once() -> Result<()> {
    let server = MockServer::start().await;
    let credential = token(&json!({ "exp": NOW + 600 }));
    Mock::given(method("POST"))
        .and(path("/api/verify-human"))
        .and(body_json(json!({ "token": "solution-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verifyToken": credential })))
        .expect(1)
        .mount(&server)
        .await;

    let (gate, tokens) = gate(&server.uri())?;
    gate.mount(HOST);

    let (first, second) = tokio::join!(gate.on_solution("solution-1"), gate.on_solution("solution-1"));
    assert_eq!(first, VerificationState::Verified);
    assert_ne!(second, VerificationState::Unverified);
    assert_eq!(gate.on_solution("solution-1").await, VerificationState::Verified);
    assert_eq!(gate.on_solution("").await, VerificationState::Verified);

    assert_eq!(
        tokens.verification_token().map(|t| t.expose_secret().to_string()),
        Some(credential)
    );
    Ok(())
}

#[tokio::test]
async fn missing_verify_token_fails_and_clears() -> Result<()> {
    let server = MockServer::start().await;
    verify_endpoint(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "verifyToken": null })),
        1,
    )
    .await;

    let (gate, tokens) = gate(&server.uri())?;
    tokens.set_verification_token("stale.token.value")?;

    let state = gate.on_solution("solution-1").await;
    assert_eq!(
        state,
        VerificationState::VerificationFailed(NO_TOKEN_MESSAGE.to_string())
    );
    assert!(tokens.verification_token().is_none());
    Ok(())
}

#[tokio::test]
async fn rejected_solution_shows_server_message() -> Result<()> {
    let server = MockServer::start().await;
    verify_endpoint(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({ "message": "Captcha không hợp lệ" })),
        1,
    )
    .await;

    let (gate, _) = gate(&server.uri())?;
    let state = gate.on_solution("solution-1").await;
    assert_eq!(
        state,
        VerificationState::VerificationFailed("Captcha không hợp lệ".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_uses_fallback_message_and_allows_retry() -> Result<()> {
    let (gate, _) = gate(UNREACHABLE)?;

    let state = gate.on_solution("solution-1").await;
    assert_eq!(
        state,
        VerificationState::VerificationFailed(DEFAULT_FAILURE_MESSAGE.to_string())
    );

    // a fresh solution is attempted again
    let mut changes = gate.subscribe();
    let retry = gate.on_solution("solution-2").await;
    assert!(changes.has_changed()?);
    assert_eq!(
        retry,
        VerificationState::VerificationFailed(DEFAULT_FAILURE_MESSAGE.to_string())
    );
    Ok(())
}

#[tokio::test]
async fn widget_callback_drives_the_gate() -> Result<()> {
    let server = MockServer::start().await;
    verify_endpoint(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({ "verifyToken": token(&json!({ "exp": NOW + 600 })) })),
        1,
    )
    .await;

    let (gate, _) = gate(&server.uri())?;
    let mut changes = gate.subscribe();
    let callback = gate.solution_callback();
    callback("solution-1".to_string());

    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if changes.borrow_and_update().is_verified() {
                return Ok(());
            }
            if changes.changed().await.is_err() {
                bail!("gate dropped");
            }
        }
    })
    .await;
    match waited {
        Ok(result) => result,
        Err(_) => bail!("gate never became verified"),
    }
}
