//! Exchange of a challenge solution for a verification credential.

use crate::api::{ApiClient, Auth};
use crate::errors::AppError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const VERIFY_HUMAN_PATH: &str = "/api/verify-human";

#[derive(Serialize)]
struct VerifyHumanRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyHumanResponse {
    #[serde(default)]
    verify_token: Option<String>,
}

/// Posts the widget's solution. `Ok(None)` means the server answered without a
/// credential.
///
/// # Errors
///
/// Returns `AppError` on network failure or non-success status.
#[instrument(skip(api, solution))]
pub async fn verify_human(
    api: &ApiClient,
    solution: &str,
) -> Result<Option<SecretString>, AppError> {
    let response: VerifyHumanResponse = api
        .post_json(
            VERIFY_HUMAN_PATH,
            &VerifyHumanRequest { token: solution },
            Auth::Anonymous,
        )
        .await?;

    Ok(response
        .verify_token
        .filter(|token| !token.is_empty())
        .map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::{verify_human, VERIFY_HUMAN_PATH};
    use crate::api::ApiClient;
    use crate::storage::MemoryStore;
    use crate::token::TokenStore;
    use anyhow::{bail, Result};
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> Result<ApiClient> {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        Ok(ApiClient::new(server.uri().parse()?, tokens)?)
    }

    #[tokio::test]
    async fn returns_verify_token() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(VERIFY_HUMAN_PATH))
            .and(body_json(json!({ "token": "solution-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verifyToken": "v.w.x" })))
            .mount(&server)
            .await;

        let api = client(&server).await?;
        let Some(token) = verify_human(&api, "solution-1").await? else {
            bail!("expected a verification credential");
        };
        assert_eq!(token.expose_secret(), "v.w.x");
        Ok(())
    }

    #[tokio::test]
    async fn null_verify_token_is_none() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(VERIFY_HUMAN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verifyToken": null })))
            .mount(&server)
            .await;

        let api = client(&server).await?;
        assert!(verify_human(&api, "solution-1").await?.is_none());
        Ok(())
    }
}
