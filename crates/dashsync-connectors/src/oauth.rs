use chrono::{Duration, Utc};
use dashsync::{ConnectorError, GoogleCredentials};
use serde::Deserialize;
use serde_json::json;

use crate::http::{api_error_message, transport};

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const REFRESH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Exchange the refresh token for a new access token.
///
/// Returns a new credential object; the input is left as it was. Fails with
/// an auth error when the credentials carry no refresh material.
pub async fn refresh_google_credentials(
    client: &reqwest::Client,
    credentials: &GoogleCredentials,
) -> Result<GoogleCredentials, ConnectorError> {
    let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
        credentials.refresh_token.as_deref(),
        credentials.client_id.as_deref(),
        credentials.client_secret.as_deref(),
    ) else {
        return Err(ConnectorError::Auth(
            "token cannot be refreshed; sign in again".into(),
        ));
    };

    let token_uri = credentials.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
    let response = client
        .post(token_uri)
        .timeout(REFRESH_TIMEOUT)
        .json(&json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "client_id": client_id,
            "client_secret": client_secret,
        }))
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = api_error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
        return Err(ConnectorError::Auth(format!("token refresh failed: {reason}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ConnectorError::Auth(format!("unreadable token response: {e}")))?;

    tracing::info!("refreshed Google access token");
    Ok(GoogleCredentials {
        token: token.access_token,
        refresh_token: token.refresh_token.or_else(|| credentials.refresh_token.clone()),
        expiry: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        ..credentials.clone()
    })
}
