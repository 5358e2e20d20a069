use crate::http::build_client;
use crate::market::config::{APP_ID, APP_SECRET, OAUTH_TOKEN_URL};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketAuthError {
    #[error("missing marketplace app credentials in env")]
    MissingCredentials,
    #[error("oauth request failed: {0}")]
    Request(String),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn basic_auth_header() -> Result<String, MarketAuthError> {
    if APP_ID.is_empty() || APP_SECRET.is_empty() {
        return Err(MarketAuthError::MissingCredentials);
    }
    let raw = format!("{}:{}", *APP_ID, *APP_SECRET);
    Ok(BASE64.encode(raw))
}

/// Exchange the long-lived refresh token for a session access token.
pub async fn get_session_token_from_refresh(
    refresh_token: &str,
    scopes: &[&str],
) -> Result<String, MarketAuthError> {
    basic_auth_header()?;
    let body = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("scope", &scopes.join(" ")),
    ];
    request_token(&body).await
}

async fn request_token(params: &[(&str, &str)]) -> Result<String, MarketAuthError> {
    let client = build_client();
    let response = client
        .post(OAUTH_TOKEN_URL.as_str())
        .basic_auth(APP_ID.as_str(), Some(APP_SECRET.as_str()))
        .form(&params)
        .send()
        .await
        .map_err(|err| MarketAuthError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(MarketAuthError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: TokenResponse = response
        .json()
        .await
        .map_err(|err| MarketAuthError::Request(err.to_string()))?;
    Ok(payload.access_token)
}
