use dashsync::ConnectorError;
use serde_json::Value;

pub(crate) fn transport(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Transport(format!("request timed out: {e}"))
    } else {
        ConnectorError::Transport(e.to_string())
    }
}

/// Pull a human-readable message out of a JSON error body. Understands
/// `{"error": {"message": ..}}`, `{"error": ".."}` and `{"message": ..}`.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = match value.get("error") {
        Some(Value::Object(error)) => error.get("message"),
        Some(error @ Value::String(_)) => Some(error),
        _ => value.get("message"),
    }?;
    message.as_str().map(str::to_owned)
}

/// Body text trimmed for inclusion in an error message.
pub(crate) async fn body_snippet(response: reqwest::Response) -> String {
    const LIMIT: usize = 300;
    let text = response.text().await.unwrap_or_default();
    let text = text.trim();
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_and_flat_error_messages() {
        assert_eq!(
            api_error_message(r#"{"error":{"code":400,"message":"Unable to parse range"}}"#),
            Some("Unable to parse range".into())
        );
        assert_eq!(
            api_error_message(r#"{"error":"bad token"}"#),
            Some("bad token".into())
        );
        assert_eq!(
            api_error_message(r#"{"message":"Not authorized"}"#),
            Some("Not authorized".into())
        );
        assert_eq!(api_error_message("<html>oops</html>"), None);
    }
}
