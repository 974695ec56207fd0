//! Room profile state.

use emcee_proto::payload::RoomPayload;

/// The room's own profile, as pushed on join and on settings changes.
///
/// `green_room` is not part of the server payload; it is observed from
/// system messages and pending-moderation events and survives profile
/// updates.
#[derive(Debug, Clone, Default)]
pub struct RoomProfile {
    pub avatar: String,
    pub biography: String,
    pub giftpoints: i64,
    pub location: String,
    pub name: String,
    pub push_to_talk: bool,
    pub recent_gifts: Vec<serde_json::Value>,
    pub subscription: i64,
    pub topic: String,
    pub room_type: String,
    pub website: String,
    /// True while the room holds new broadcasters for moderator approval.
    pub green_room: bool,
}

impl RoomProfile {
    /// Replace the profile with a fresh payload, keeping the observed
    /// green-room flag.
    pub fn update(&mut self, payload: &RoomPayload) {
        self.avatar = payload.avatar.clone();
        self.biography = payload.biography.clone();
        self.giftpoints = payload.giftpoints;
        self.location = payload.location.clone();
        self.name = payload.name.clone();
        self.push_to_talk = payload.push_to_talk;
        self.recent_gifts = payload.recent_gifts.clone();
        self.subscription = payload.subscription;
        self.topic = payload.topic.clone();
        self.room_type = payload.room_type.clone();
        self.website = payload.website.clone();
    }

    /// Multi-line summary for the join log.
    pub fn formatted(&self) -> String {
        let mut lines = vec![format!("Room: {}", self.name)];
        if !self.topic.is_empty() {
            lines.push(format!("Topic: {}", self.topic));
        }
        if !self.biography.is_empty() {
            lines.push(format!("Biography: {}", self.biography));
        }
        if !self.location.is_empty() {
            lines.push(format!("Location: {}", self.location));
        }
        if !self.website.is_empty() {
            lines.push(format!("Website: {}", self.website));
        }
        lines.push(format!("Gift Points: {}", self.giftpoints));
        lines.push(format!("Subscribers: {}", self.subscription));
        if self.push_to_talk {
            lines.push("Push to talk is enabled.".to_string());
        }
        if self.green_room {
            lines.push("Green room is enabled.".to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_keeps_green_room_flag() {
        let mut room = RoomProfile {
            green_room: true,
            ..Default::default()
        };
        let payload: RoomPayload = serde_json::from_str(
            r#"{"name": "lounge", "topic": "late night", "giftpoints": 3}"#,
        )
        .unwrap();

        room.update(&payload);
        assert_eq!(room.name, "lounge");
        assert_eq!(room.topic, "late night");
        assert_eq!(room.giftpoints, 3);
        assert!(room.green_room);
    }

    #[test]
    fn test_formatted_skips_empty_fields() {
        let mut room = RoomProfile::default();
        let payload: RoomPayload =
            serde_json::from_str(r#"{"name": "lounge", "location": "nowhere"}"#).unwrap();
        room.update(&payload);

        let summary = room.formatted();
        assert!(summary.contains("Room: lounge"));
        assert!(summary.contains("Location: nowhere"));
        assert!(!summary.contains("Topic:"));
        assert!(!summary.contains("Website:"));
    }
}
