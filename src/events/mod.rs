//! Typed room events.
//!
//! The session layer yields raw frames; [`route`] folds each one through
//! the shared state (registry first, then the event) and produces exactly
//! one [`Event`] outcome, or none for frames that resolve to nothing.
//! Events carry owned snapshots, so handlers never hold a state lock
//! while they run.

mod router;

pub use router::route;

use serde_json::Value;
use std::time::Duration;

use crate::state::{BannedUser, MessageKind, User};
use emcee_proto::payload::MediaItem;

/// One routed room event.
#[derive(Debug, Clone)]
pub enum Event {
    /// The client entered the room; its own record is registered.
    Joined { client: User },

    /// A user joined.
    Join(User),

    /// A user changed nick; the snapshot's nick history carries the old
    /// one.
    Nick(User),

    /// A user left. None when the handle was never registered.
    Quit(Option<User>),

    /// A public or private message, already appended to the sender's
    /// history. `gap` is the time since the sender's previous message.
    Message {
        user: User,
        text: String,
        kind: MessageKind,
        gap: Option<Duration>,
    },

    /// Media started or seeked. A missing user means the playback
    /// predates our join; `is_response` marks the echo of our own
    /// request.
    MediaPlay {
        user: Option<User>,
        item: MediaItem,
        is_response: bool,
    },

    /// Media paused.
    MediaPause {
        user: Option<User>,
        item: MediaItem,
        is_response: bool,
    },

    /// Media stopped.
    MediaStop {
        user: Option<User>,
        is_response: bool,
    },

    /// A user started broadcasting.
    Publish(User),

    /// A user stopped broadcasting.
    Unpublish(User),

    /// A user is waiting for green-room approval.
    PendingModeration(User),

    /// A moderator approved a waiting broadcast.
    StreamAllowed(User),

    /// A broadcast was closed by a moderator. None when the handle is
    /// not in the registry.
    StreamClosed(Option<User>),

    /// A ban succeeded and entered the ban registry.
    Banned(BannedUser),

    /// An un-ban succeeded; the entry left the ban registry.
    Unbanned(BannedUser),

    /// The full ban registry, as re-sent by the server.
    Banlist(Vec<BannedUser>),

    /// The room occupants at join time, minus our own record.
    Userlist(Vec<User>),

    /// The room profile changed.
    RoomSettings,

    /// A server notice line.
    SysMsg { text: String },

    /// The server refused a request (ban, un-ban, broadcast close).
    ServerError { reason: String },

    /// An event name this client has no typed shape for. Forwarded so
    /// embedders can handle it; never silently dropped.
    Unrouted { name: String, payload: Value },
}
