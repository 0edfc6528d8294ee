//! Slack Web API client used by the scheduled import.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::export::{Channel, Message, User};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
const PAGE_LIMIT: &str = "1000";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Slack authentication failed, check the bot token")]
    NotAuthed,

    #[error("Insufficient Slack permissions, the bot needs channels:read, channels:history and users:read")]
    MissingScope,

    #[error("Rate limited by the Slack API, try again later")]
    RateLimited,

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map an API `error` code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not_authed" | "invalid_auth" | "account_inactive" | "token_revoked" => {
                ApiError::NotAuthed
            }
            "missing_scope" => ApiError::MissingScope,
            "rate_limited" | "ratelimited" => ApiError::RateLimited,
            other => ApiError::Api(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::NotAuthed => "not_authed",
            ApiError::MissingScope => "missing_scope",
            ApiError::RateLimited => "rate_limited",
            ApiError::Api(code) => code,
            ApiError::Transport(_) => "transport",
            ApiError::Decode(_) => "decode",
        }
    }

    /// HTTP status a gateway would answer with.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::NotAuthed => 401,
            ApiError::MissingScope => 403,
            ApiError::RateLimited => 429,
            ApiError::Api(_) | ApiError::Decode(_) => 502,
            ApiError::Transport(_) => 503,
        }
    }
}

/// The calls the import needs from the chat platform
pub trait ChatApi {
    /// Workspace name for the token.
    fn auth_test(&self) -> Result<String, ApiError>;
    fn list_channels(&self) -> Result<Vec<Channel>, ApiError>;
    fn list_users(&self) -> Result<Vec<User>, ApiError>;
    /// Messages of a channel newer than `oldest` (unix seconds).
    fn history(&self, channel_id: &str, oldest: i64) -> Result<Vec<Message>, ApiError>;
}

/// Blocking HTTPS client authenticated with a bot token
pub struct SlackClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, method);
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token));
        for (key, value) in params {
            request = request.query(key, value);
        }
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(429, _)) => return Err(ApiError::RateLimited),
            Err(ureq::Error::Status(code, response)) => {
                // Error pages usually still carry `ok: false` and a code.
                match response.into_json::<Value>() {
                    Ok(body) => return check_response(body),
                    Err(_) => return Err(ApiError::Transport(format!("HTTP {code}"))),
                }
            }
            Err(err) => return Err(ApiError::Transport(err.to_string())),
        };
        let body: Value = response
            .into_json()
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        check_response(body)
    }

    /// Follow `response_metadata.next_cursor` and collect `key` from every page.
    fn paginate<T: DeserializeOwned>(
        &self,
        method: &str,
        key: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut page_params = params.to_vec();
            page_params.push(("limit", PAGE_LIMIT));
            if let Some(cursor) = cursor.as_deref() {
                page_params.push(("cursor", cursor));
            }
            let body = self.call(method, &page_params)?;
            items.extend(decode_items(&body, key)?);
            match next_cursor(&body) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }
}

impl ChatApi for SlackClient {
    fn auth_test(&self) -> Result<String, ApiError> {
        let body = self.call("auth.test", &[])?;
        Ok(body
            .get("team")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn list_channels(&self) -> Result<Vec<Channel>, ApiError> {
        self.paginate(
            "conversations.list",
            "channels",
            &[("types", "public_channel,private_channel")],
        )
    }

    fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.paginate("users.list", "members", &[])
    }

    fn history(&self, channel_id: &str, oldest: i64) -> Result<Vec<Message>, ApiError> {
        let oldest = oldest.to_string();
        self.paginate(
            "conversations.history",
            "messages",
            &[("channel", channel_id), ("oldest", oldest.as_str())],
        )
    }
}

/// Turn an `ok: false` body into an error.
fn check_response(body: Value) -> Result<Value, ApiError> {
    match body.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(body),
        Some(false) => {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            Err(ApiError::from_code(code))
        }
        None => Err(ApiError::Decode("missing `ok` field".to_string())),
    }
}

fn next_cursor(body: &Value) -> Option<String> {
    body.pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

/// Decode the array under `key`, skipping records that do not fit.
fn decode_items<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Vec<T>, ApiError> {
    let items = match body.get(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => return Err(ApiError::Decode(format!("`{key}` is not an array"))),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value(item.clone()) {
            Ok(record) => out.push(record),
            Err(err) => tracing::warn!(key, error = %err, "skipping undecodable record"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_codes_and_statuses() {
        let cases = [
            ("not_authed", "not_authed", 401),
            ("invalid_auth", "not_authed", 401),
            ("missing_scope", "missing_scope", 403),
            ("ratelimited", "rate_limited", 429),
            ("channel_not_found", "channel_not_found", 502),
        ];
        for (input, code, status) in cases {
            let err = ApiError::from_code(input);
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
        assert_eq!(ApiError::Transport("timeout".into()).status(), 503);
        assert_eq!(ApiError::Decode("bad".into()).status(), 502);
    }

    #[test]
    fn check_response_maps_errors() {
        assert!(check_response(json!({"ok": true, "team": "T"})).is_ok());
        let err = check_response(json!({"ok": false, "error": "missing_scope"})).unwrap_err();
        assert!(matches!(err, ApiError::MissingScope));
        let err = check_response(json!({"ok": false})).unwrap_err();
        assert_eq!(err.code(), "unknown_error");
        let err = check_response(json!({"team": "T"})).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn cursor_extraction() {
        let body = json!({"ok": true, "response_metadata": {"next_cursor": "dXNlcjpVMDYx"}});
        assert_eq!(next_cursor(&body).as_deref(), Some("dXNlcjpVMDYx"));
        let body = json!({"ok": true, "response_metadata": {"next_cursor": ""}});
        assert_eq!(next_cursor(&body), None);
        assert_eq!(next_cursor(&json!({"ok": true})), None);
    }

    #[test]
    fn decode_api_channels() {
        let body = json!({
            "ok": true,
            "channels": [
                {
                    "id": "C1", "name": "general", "is_channel": true, "created": 1600000000,
                    "creator": "U1", "is_archived": false, "is_general": true, "num_members": 5,
                    "topic": {"value": "Hi", "creator": "U1", "last_set": 0},
                    "purpose": {"value": "All hands", "creator": "U1", "last_set": 0}
                },
                {"name": "broken"}
            ]
        });
        let channels: Vec<Channel> = decode_items(&body, "channels").unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].members, 5);
        assert_eq!(channels[0].purpose, "All hands");
    }

    #[test]
    fn decode_missing_key_is_empty() {
        let users: Vec<User> = decode_items(&json!({"ok": true}), "members").unwrap();
        assert!(users.is_empty());
        let err = decode_items::<User>(&json!({"members": {}}), "members").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = SlackClient::new("https://slack.example/api/", "xoxb-test");
        assert_eq!(client.base_url, "https://slack.example/api");
    }
}
