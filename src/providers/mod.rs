//! External service abstractions.
//!
//! Everything the bot needs from outside the room goes through a trait
//! here: the room directory, the media library, the moderation list
//! store and the captcha solver. The bot only sees the traits, so tests
//! swap in fixtures and the HTTP details stay in one place.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::media::Track;
use crate::moderation::Lists;
use crate::state::Profile;

pub mod captcha;
pub mod directory;
pub mod lists;
pub mod media;

pub use captcha::AntiCaptcha;
pub use directory::HttpDirectory;
pub use lists::FileLists;
pub use media::HttpMediaLibrary;

/// What the directory hands out for one connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    /// WebSocket endpoint to dial.
    pub endpoint: String,
    /// Single-use join token.
    pub token: String,
}

/// The room directory service.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch the websocket endpoint and join token for a room.
    async fn connect_args(&self, room: &str) -> Result<ConnectArgs, ProviderError>;

    /// The client version to advertise during join, when the directory
    /// publishes one. Callers fall back to the configured version.
    async fn client_version(&self, room: &str) -> Option<String>;

    /// Look up the public profile of a signed-in account. `None` for
    /// accounts the directory does not know.
    async fn account_profile(&self, account: &str) -> Result<Option<Profile>, ProviderError>;
}

/// Track search and lookup.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Best match for a free-text query or a bare media id.
    async fn search(&self, query: &str) -> Option<Track>;

    /// Look up a track by its exact media id. Non-embeddable tracks are
    /// still returned so callers can say why playback was refused.
    async fn by_id(&self, id: &str) -> Option<Track>;

    /// Up to `amount` embeddable matches for a query, best first.
    async fn search_list(&self, query: &str, amount: usize) -> Vec<Track>;
}

/// Which moderation list a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Approved,
    NickBans,
    AccountBans,
    StringBans,
}

/// Backing store for the per-room moderation lists.
#[async_trait]
pub trait ListSource: Send + Sync {
    /// Load all lists. Missing backing data reads as empty lists.
    async fn load(&self) -> Result<Lists, ProviderError>;

    /// Append an entry. Duplicate screening is the caller's job.
    async fn add(&self, kind: ListKind, entry: &str) -> Result<(), ProviderError>;

    /// Remove an entry. `Ok(false)` when it was not present.
    async fn remove(&self, kind: ListKind, entry: &str) -> Result<bool, ProviderError>;
}

/// A recaptcha solving service.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve the captcha shown at `page_url`, returning the response
    /// token to present to the server.
    async fn solve(&self, page_url: &str, site_key: &str) -> Result<String, ProviderError>;
}
