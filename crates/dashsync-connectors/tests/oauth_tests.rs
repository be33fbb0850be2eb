use chrono::Utc;
use dashsync::{ConnectorError, GoogleCredentials};
use dashsync_connectors::refresh_google_credentials;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refreshable(server: &MockServer) -> GoogleCredentials {
    let mut creds = GoogleCredentials::new("old-token");
    creds.refresh_token = Some("refresh-1".into());
    creds.client_id = Some("client".into());
    creds.client_secret = Some("secret".into());
    creds.token_uri = Some(format!("{}/token", server.uri()));
    creds.expiry = Some(Utc::now() - chrono::Duration::minutes(1));
    creds
}

#[tokio::test]
async fn refresh_returns_new_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1",
            "client_id": "client",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-token",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let old = refreshable(&server);
    let fresh = refresh_google_credentials(&reqwest::Client::new(), &old)
        .await
        .unwrap();

    assert_eq!(fresh.token, "new-token");
    assert_eq!(fresh.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(fresh.client_id, old.client_id);
    assert!(!fresh.is_expired());
    assert_eq!(old.token, "old-token");
}

#[tokio::test]
async fn revoked_grant_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .mount(&server)
        .await;

    let err = refresh_google_credentials(&reqwest::Client::new(), &refreshable(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::Auth(_)));
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn credentials_without_refresh_material_are_rejected() {
    let err = refresh_google_credentials(&reqwest::Client::new(), &GoogleCredentials::new("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Auth(_)));
}
