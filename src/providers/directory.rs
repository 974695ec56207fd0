//! HTTP room directory client.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::{ConnectArgs, Directory};
use crate::error::ProviderError;
use crate::state::Profile;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory backed by a JSON-over-HTTP API.
///
/// The endpoint layout:
/// - `GET {base}/room/token/{room}` -> `{"result": <token>, "endpoint": <wss url>}`
/// - `GET {base}/room/version/{room}` -> `{"version": <client version>}`
/// - `GET {base}/user/profile?username={account}` -> profile fields plus
///   a `"result"` marker that is `"success"` for known accounts.
pub struct HttpDirectory {
    base: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("emcee/0.9")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn connect_args(&self, room: &str) -> Result<ConnectArgs, ProviderError> {
        let url = format!("{}/room/token/{}", self.base, room);
        let json: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_connect(&json)
    }

    async fn client_version(&self, room: &str) -> Option<String> {
        let url = format!("{}/room/version/{}", self.base, room);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "client version request failed");
                return None;
            }
        };
        let json: Value = match response.json().await {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to parse client version response");
                return None;
            }
        };
        json.get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    async fn account_profile(&self, account: &str) -> Result<Option<Profile>, ProviderError> {
        let url = format!("{}/user/profile", self.base);
        let json: Value = self
            .client
            .get(&url)
            .query(&[("username", account)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_profile(&json))
    }
}

fn parse_connect(json: &Value) -> Result<ConnectArgs, ProviderError> {
    let token = json
        .get("result")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::Malformed("connect response missing token".into()))?;
    let endpoint = json
        .get("endpoint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::Malformed("connect response missing endpoint".into()))?;
    Ok(ConnectArgs {
        endpoint: endpoint.to_string(),
        token: token.to_string(),
    })
}

fn parse_profile(json: &Value) -> Option<Profile> {
    if json.get("result").and_then(|v| v.as_str()) != Some("success") {
        return None;
    }
    let field = |name: &str| {
        json.get(name)
            .and_then(|v| v.as_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    Some(Profile {
        biography: field("biography"),
        gender: field("gender"),
        location: field("location"),
        role: field("role"),
        age: field("age"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let json: Value =
            serde_json::from_str(r#"{"result": "abc123", "endpoint": "wss://ws.example/room"}"#)
                .unwrap();
        let args = parse_connect(&json).unwrap();
        assert_eq!(args.token, "abc123");
        assert_eq!(args.endpoint, "wss://ws.example/room");
    }

    #[test]
    fn test_parse_connect_missing_endpoint() {
        let json: Value = serde_json::from_str(r#"{"result": "abc123"}"#).unwrap();
        assert!(matches!(
            parse_connect(&json),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_profile() {
        let json: Value = serde_json::from_str(
            r#"{"result": "success", "biography": "hi", "gender": "", "location": "dk",
                "role": "member", "age": "33"}"#,
        )
        .unwrap();
        let profile = parse_profile(&json).unwrap();
        assert_eq!(profile.biography.as_deref(), Some("hi"));
        assert_eq!(profile.gender, None);
        assert_eq!(profile.location.as_deref(), Some("dk"));
    }

    #[test]
    fn test_parse_profile_unknown_account() {
        let json: Value = serde_json::from_str(r#"{"result": "no such user"}"#).unwrap();
        assert!(parse_profile(&json).is_none());
    }
}
