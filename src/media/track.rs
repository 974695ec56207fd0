//! A single playable media item.

use emcee_proto::payload::MediaItem;
use tokio::time::Instant;

/// One track, either found through the media provider or observed from
/// another moderator's play frame.
#[derive(Debug, Clone)]
pub struct Track {
    /// Provider-scoped media id.
    pub id: String,
    pub title: String,
    /// Duration in whole seconds.
    pub duration: u64,
    pub image: Option<String>,
    /// False when the provider reports the track cannot be embedded.
    /// Tracks observed from other moderators' frames are assumed playable.
    pub embeddable: bool,
    /// Nick of the requesting user; assigned when the track enters the
    /// playlist.
    pub owner: String,
    requested_at: Instant,
}

impl Track {
    pub fn new(id: &str, title: &str, duration: u64, image: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            duration,
            image,
            embeddable: true,
            owner: String::new(),
            requested_at: Instant::now(),
        }
    }

    /// Build a track from a media frame item. Seek frames omit the title.
    pub fn from_item(item: &MediaItem) -> Self {
        Self::new(
            &item.id,
            item.title.as_deref().unwrap_or_default(),
            item.duration as u64,
            item.image.clone(),
        )
    }

    /// Seconds since this track was requested.
    pub fn requested_ago(&self) -> u64 {
        self.requested_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_item() {
        let item: MediaItem = serde_json::from_str(
            r#"{"id": "dQw4w9WgXcQ", "duration": 212.9, "title": "a song"}"#,
        )
        .unwrap();
        let track = Track::from_item(&item);
        assert_eq!(track.id, "dQw4w9WgXcQ");
        assert_eq!(track.title, "a song");
        assert_eq!(track.duration, 212);
        assert!(track.owner.is_empty());
        assert_eq!(track.requested_ago(), 0);
    }

    #[test]
    fn test_from_seek_item_has_no_title() {
        let item: MediaItem =
            serde_json::from_str(r#"{"id": "x", "duration": 100.0, "seek": true}"#).unwrap();
        let track = Track::from_item(&item);
        assert_eq!(track.title, "");
    }
}
