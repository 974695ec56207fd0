//! HTTP media library client.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::MediaLibrary;
use crate::media::Track;
use crate::text;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How many raw results to request per search, before filtering.
const SEARCH_WINDOW: usize = 50;

/// Media library backed by a JSON-over-HTTP API.
///
/// The endpoint layout:
/// - `GET {base}/search?q={query}&max={n}` -> `{"items": [<track>, ..]}`
/// - `GET {base}/details?id={id}` -> `{"items": [<track>]}` or empty items
///
/// A track item carries `id`, `title`, `seconds` and optionally `image`
/// and `embeddable`. An optional API key is sent as a `key` parameter.
pub struct HttpMediaLibrary {
    base: String,
    key: Option<String>,
    client: reqwest::Client,
}

impl HttpMediaLibrary {
    pub fn new(base: &str, key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("emcee/0.9")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base: base.trim_end_matches('/').to_string(),
            key: key.map(str::to_string),
            client,
        }
    }

    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Option<Value> {
        let mut request = self.client.get(url).query(params);
        if let Some(key) = &self.key {
            request = request.query(&[("key", key.as_str())]);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "media library request failed");
                return None;
            }
        };
        match response.json().await {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "failed to parse media library response");
                None
            }
        }
    }

    async fn search_items(&self, query: &str) -> Vec<Track> {
        let url = format!("{}/search", self.base);
        let max = SEARCH_WINDOW.to_string();
        let Some(json) = self.fetch(&url, &[("q", query), ("max", &max)]).await else {
            return Vec::new();
        };
        items(&json).iter().filter_map(parse_track).collect()
    }
}

#[async_trait]
impl MediaLibrary for HttpMediaLibrary {
    async fn search(&self, query: &str) -> Option<Track> {
        if text::is_media_id(query) {
            return self.by_id(query).await;
        }
        self.search_items(query)
            .await
            .into_iter()
            .find(|track| track.embeddable)
    }

    async fn by_id(&self, id: &str) -> Option<Track> {
        let url = format!("{}/details", self.base);
        let json = self.fetch(&url, &[("id", id)]).await?;
        items(&json).first().and_then(parse_track)
    }

    async fn search_list(&self, query: &str, amount: usize) -> Vec<Track> {
        self.search_items(query)
            .await
            .into_iter()
            .filter(|track| track.embeddable)
            .take(amount)
            .collect()
    }
}

fn items(json: &Value) -> &[Value] {
    json.get("items")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Build a track from one response item. Items missing an id or title
/// are dropped rather than surfaced half-empty.
fn parse_track(item: &Value) -> Option<Track> {
    let id = item.get("id").and_then(|v| v.as_str())?;
    let title = item.get("title").and_then(|v| v.as_str())?;
    let duration = item
        .get("seconds")
        .and_then(|v| v.as_f64())
        .unwrap_or_default() as u64;
    let image = item
        .get("image")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut track = Track::new(id, title, duration, image);
    track.embeddable = item
        .get("embeddable")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    Some(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track() {
        let item: Value = serde_json::from_str(
            r#"{"id": "dQw4w9WgXcQ", "title": "a song", "seconds": 212,
                "image": "https://img.example/t.jpg"}"#,
        )
        .unwrap();
        let track = parse_track(&item).unwrap();
        assert_eq!(track.id, "dQw4w9WgXcQ");
        assert_eq!(track.duration, 212);
        assert!(track.embeddable);
        assert_eq!(track.image.as_deref(), Some("https://img.example/t.jpg"));
    }

    #[test]
    fn test_parse_track_not_embeddable() {
        let item: Value =
            serde_json::from_str(r#"{"id": "aaaaaaaaaaa", "title": "t", "embeddable": false}"#)
                .unwrap();
        let track = parse_track(&item).unwrap();
        assert!(!track.embeddable);
        assert_eq!(track.duration, 0);
    }

    #[test]
    fn test_parse_track_requires_id_and_title() {
        let item: Value = serde_json::from_str(r#"{"title": "no id"}"#).unwrap();
        assert!(parse_track(&item).is_none());

        let item: Value = serde_json::from_str(r#"{"id": "no title xx"}"#).unwrap();
        assert!(parse_track(&item).is_none());
    }

    #[test]
    fn test_items_tolerates_missing_list() {
        let json: Value = serde_json::from_str(r#"{"error": "quota"}"#).unwrap();
        assert!(items(&json).is_empty());
    }
}
