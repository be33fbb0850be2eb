use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Google OAuth token as stored by the login flow.
///
/// Field names follow the authorized-user JSON the Google client libraries
/// write, so an existing token file loads as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleCredentials {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl GoogleCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_uri: None,
            expiry: None,
        }
    }

    /// True once `expiry` has passed. Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// True when an explicit refresh is possible.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Per-task inputs that are not part of a source's persisted configuration.
///
/// Each sync task gets its own clone; workers read it and never write back.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    pub google: Option<GoogleCredentials>,
}

impl SyncContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_google(mut self, credentials: GoogleCredentials) -> Self {
        self.google = Some(credentials);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn expiry_in_past_is_expired() {
        let now = Utc::now();
        let mut creds = GoogleCredentials::new("t");
        assert!(!creds.is_expired_at(now));

        creds.expiry = Some(now - Duration::seconds(1));
        assert!(creds.is_expired_at(now));

        creds.expiry = Some(now + Duration::minutes(5));
        assert!(!creds.is_expired_at(now));
    }

    #[test]
    fn parses_authorized_user_json() {
        let raw = r#"{
            "token": "ya29.abc",
            "refresh_token": "1//r",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "s",
            "token_uri": "https://oauth2.googleapis.com/token",
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "expiry": "2026-01-01T10:00:00Z"
        }"#;
        let creds: GoogleCredentials = serde_json::from_str(raw).unwrap();
        assert_eq!(creds.token, "ya29.abc");
        assert!(creds.can_refresh());
        assert!(creds.expiry.is_some());
    }

    #[test]
    fn context_clones_are_independent() {
        let shared = SyncContext::new().with_google(GoogleCredentials::new("a"));
        let mut task = shared.clone();
        task.google = None;
        assert!(shared.google.is_some());
    }
}
