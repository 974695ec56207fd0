//! Typed event payloads.
//!
//! Shapes follow the server's JSON exactly; field defaults are liberal so a
//! frame missing an optional field still decodes. Normalization that is
//! client policy (empty account strings, privilege levels) happens in the
//! client's state layer, not here.

use serde::Deserialize;

/// A room occupant as the server describes one, carried by `join`,
/// `joined` (as `self`) and `userlist` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserPayload {
    /// Session-scoped user handle, the primary key for this connection.
    pub handle: u64,
    /// Current nick name.
    #[serde(default)]
    pub nick: String,
    /// Account name; the server sends an empty string for guests.
    #[serde(default)]
    pub username: Option<String>,
    /// Opaque per-session identifier.
    #[serde(default)]
    pub session_id: String,
    /// True when the user entered without requesting media permissions.
    #[serde(default)]
    pub lurker: bool,
    /// True when the user moderates the room.
    #[serde(rename = "mod", default)]
    pub moderator: bool,
    /// True when the user owns the room.
    #[serde(default)]
    pub owner: bool,
    /// Gift points attached to the account.
    #[serde(default)]
    pub giftpoints: i64,
    /// Featured flag, meaning unknown server-side.
    #[serde(default)]
    pub featured: bool,
    /// Subscription tier.
    #[serde(default)]
    pub subscription: i64,
    /// Achievement badge url.
    #[serde(default)]
    pub achievement_url: String,
    /// Avatar url.
    #[serde(default)]
    pub avatar: String,
}

/// Payload of a `nick` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NickPayload {
    /// Handle of the renaming user.
    pub handle: u64,
    /// The new nick.
    #[serde(default)]
    pub nick: String,
}

/// Payload of a `quit` frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct QuitPayload {
    /// Handle of the departing user.
    pub handle: u64,
}

/// Payload of `msg` and `pvtmsg` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatPayload {
    /// Handle of the sender.
    pub handle: u64,
    /// Message text.
    #[serde(default)]
    pub text: String,
}

/// Payload of `publish`, `unpublish` and `pending_moderation` frames.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BroadcastPayload {
    /// Handle of the broadcasting user.
    pub handle: u64,
}

/// Payload of a `stream_moder_allow` frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AllowPayload {
    /// Handle of the user allowed to broadcast.
    pub handle: u64,
    /// Handle of the moderator who allowed it.
    pub allowed_by: u64,
}

/// Payload of a `stream_moder_close` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamClosePayload {
    /// Whether the close request was honored.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Handle of the closed user, present on success.
    #[serde(default)]
    pub handle: Option<u64>,
    /// Failure reason, present when `success` is false.
    #[serde(default)]
    pub reason: Option<String>,
}

/// One media item as carried by `media_play`, `media_pause` and
/// `media_stop` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaItem {
    /// Provider-scoped media id.
    pub id: String,
    /// Duration in seconds; the server sends fractional values.
    #[serde(default)]
    pub duration: f64,
    /// Playback offset in seconds.
    #[serde(default)]
    pub offset: f64,
    /// Title, absent on seek frames.
    #[serde(default)]
    pub title: Option<String>,
    /// Thumbnail url.
    #[serde(default)]
    pub image: Option<String>,
    /// True when the item belongs to the server-side playlist.
    #[serde(default)]
    pub playlist: Option<bool>,
    /// True when the frame is a seek rather than a fresh start.
    #[serde(default)]
    pub seek: Option<bool>,
}

/// Payload of the media frames. `handle` is absent when the event predates
/// the client's join.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Handle of the user driving the media, when known.
    #[serde(default)]
    pub handle: Option<u64>,
    /// The media item.
    pub item: MediaItem,
}

/// One ban registry entry, carried by `banlist` items and by `ban`/`unban`
/// confirmations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BanEntryPayload {
    /// Server-assigned ban id, the only valid key for un-banning.
    #[serde(default)]
    pub id: u64,
    /// Nick the user was banned under.
    #[serde(default)]
    pub nick: String,
    /// Account of the banned user, when signed in.
    #[serde(default)]
    pub username: Option<String>,
    /// Nick of the moderator who issued the ban.
    #[serde(default)]
    pub moderator: String,
    /// Ban reason; the server rarely fills this in.
    #[serde(default)]
    pub reason: String,
}

/// Payload of `ban` and `unban` frames: an action result wrapping a ban
/// registry entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BanActionPayload {
    /// Whether the server honored the request.
    #[serde(default = "default_true")]
    pub success: bool,
    /// The affected registry entry; meaningful on success.
    #[serde(flatten)]
    pub entry: BanEntryPayload,
}

/// Payload of a `banlist` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BanlistPayload {
    /// All current ban registry entries.
    #[serde(default)]
    pub items: Vec<BanEntryPayload>,
}

/// Payload of a `userlist` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserlistPayload {
    /// All users present in the room.
    #[serde(default)]
    pub users: Vec<UserPayload>,
}

/// The room profile carried by `joined` and `room_settings` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomPayload {
    /// Room avatar url.
    #[serde(default)]
    pub avatar: String,
    /// Room biography text.
    #[serde(default)]
    pub biography: String,
    /// Gift points the room has collected.
    #[serde(default)]
    pub giftpoints: i64,
    /// Room location.
    #[serde(default)]
    pub location: String,
    /// Room display name.
    #[serde(default)]
    pub name: String,
    /// Push-to-talk setting.
    #[serde(default, rename = "pushtotalk")]
    pub push_to_talk: bool,
    /// Recent gift events, shape left opaque.
    #[serde(default)]
    pub recent_gifts: Vec<serde_json::Value>,
    /// Subscriber count.
    #[serde(default)]
    pub subscription: i64,
    /// Room topic.
    #[serde(default)]
    pub topic: String,
    /// Room type; observed to always be `default`.
    #[serde(default = "default_room_type", rename = "type")]
    pub room_type: String,
    /// Room website, when set.
    #[serde(default)]
    pub website: String,
}

/// Payload of the `joined` frame confirming room entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinedPayload {
    /// The client's own user record.
    #[serde(rename = "self")]
    pub client: UserPayload,
    /// The room profile, pushed alongside.
    #[serde(default)]
    pub room: Option<RoomPayload>,
}

/// Payload of a `room_settings` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomSettingsPayload {
    /// The updated room profile.
    pub room: RoomPayload,
}

/// Payload of a `closed` frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClosedPayload {
    /// The server close code; see [`crate::CloseCode`].
    pub error: u16,
}

/// Payload of a `sysmsg` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SysMsgPayload {
    /// The notification text.
    #[serde(default)]
    pub text: String,
}

/// Payload of a `captcha` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptchaPayload {
    /// The captcha site key to solve against.
    pub key: String,
}

fn default_true() -> bool {
    true
}

fn default_room_type() -> String {
    "default".to_string()
}
