//! User-related types and state.

use chrono::{DateTime, Utc};
use emcee_proto::payload::{BanEntryPayload, UserPayload};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// How many messages per user are kept for timing checks and `uinfo`.
pub const MAX_USER_MESSAGES: usize = 64;

/// Privilege tiers, least to most privileged. Command gating compares
/// these directly, so the variant order is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserLevel {
    Default,
    /// Granted operator rights over the bot itself.
    BotOp,
    /// On the approved list, or approved for this session.
    Approved,
    /// A room moderator.
    Moderator,
    /// Authenticated as a bot controller via the client key.
    Super,
    /// The room owner, or authenticated via the super key.
    Owner,
}

impl std::fmt::Display for UserLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UserLevel::Default => "Default",
            UserLevel::Approved => "Approved",
            UserLevel::BotOp => "Bot Op",
            UserLevel::Moderator => "Moderator",
            UserLevel::Super => "Bot Controller",
            UserLevel::Owner => "Owner",
        };
        write!(f, "{name}")
    }
}

/// What kind of message a user sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Private,
    /// A media request; the recorded text is the track title.
    Media,
}

/// One recorded user message.
#[derive(Debug, Clone)]
pub struct UserMessage {
    pub kind: MessageKind,
    pub text: String,
    pub at: Instant,
}

/// Account profile as reported by the directory service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub biography: Option<String>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub role: Option<String>,
    pub age: Option<String>,
}

/// A room occupant.
#[derive(Debug, Clone)]
pub struct User {
    /// Session-scoped handle, the primary key while connected.
    pub handle: u64,
    pub nick: String,
    /// Every nick seen for this handle, oldest first. Always contains at
    /// least the join nick.
    pub old_nicks: Vec<String>,
    /// Account name when signed in. Guests carry `None`.
    pub account: Option<String>,
    pub session_id: String,
    pub level: UserLevel,
    /// True for the bot's own user record.
    pub is_client: bool,
    /// True when the user joined without media permissions.
    pub is_lurker: bool,
    pub is_broadcasting: bool,
    /// True while waiting for green-room approval.
    pub is_waiting: bool,
    /// Cleared by the broadcast toggle to bar this user from camming up.
    pub can_broadcast: bool,
    pub joined_at: DateTime<Utc>,
    /// Directory profile, fetched lazily for signed-in users.
    pub profile: Option<Profile>,
    messages: VecDeque<UserMessage>,
    joined_instant: Instant,
}

impl User {
    pub fn new(handle: u64, nick: &str) -> Self {
        Self {
            handle,
            nick: nick.to_string(),
            old_nicks: vec![nick.to_string()],
            account: None,
            session_id: String::new(),
            level: UserLevel::Default,
            is_client: false,
            is_lurker: false,
            is_broadcasting: false,
            is_waiting: false,
            can_broadcast: true,
            joined_at: Utc::now(),
            profile: None,
            messages: VecDeque::new(),
            joined_instant: Instant::now(),
        }
    }

    /// Build a user from a join or userlist payload. The server reports
    /// guests with an empty account string; that becomes `None` here.
    pub fn from_payload(payload: &UserPayload) -> Self {
        let mut user = Self::new(payload.handle, &payload.nick);
        user.account = payload
            .username
            .clone()
            .filter(|account| !account.is_empty());
        user.session_id = payload.session_id.clone();
        user.is_lurker = payload.lurker;
        user.level = if payload.owner {
            UserLevel::Owner
        } else if payload.moderator {
            UserLevel::Moderator
        } else {
            UserLevel::Default
        };
        user
    }

    /// True for room moderators and anything above.
    pub fn is_mod(&self) -> bool {
        self.level >= UserLevel::Moderator
    }

    /// How long this user has been in the room.
    pub fn online(&self) -> Duration {
        self.joined_instant.elapsed()
    }

    /// Adopt a new nick, keeping the old one in the history.
    pub fn set_nick(&mut self, nick: &str) {
        self.old_nicks.push(nick.to_string());
        self.nick = nick.to_string();
    }

    /// The nick this user had before the current one, or the current nick
    /// when it never changed.
    pub fn last_nick(&self) -> &str {
        if self.old_nicks.len() > 1 {
            &self.old_nicks[self.old_nicks.len() - 2]
        } else {
            &self.nick
        }
    }

    /// Record a message and return the time since the previous one, used
    /// by the flood timing check.
    pub fn record_message(&mut self, kind: MessageKind, text: &str) -> Option<Duration> {
        let now = Instant::now();
        let elapsed = self.messages.back().map(|prev| now - prev.at);
        if self.messages.len() == MAX_USER_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(UserMessage {
            kind,
            text: text.to_string(),
            at: now,
        });
        elapsed
    }

    /// The most recent message, rendered for display. Private message
    /// contents are never shown.
    pub fn last_message(&self) -> Option<&str> {
        self.messages.back().map(|msg| match msg.kind {
            MessageKind::Private => "Not showing PM.",
            _ => msg.text.as_str(),
        })
    }

    pub fn messages(&self) -> &VecDeque<UserMessage> {
        &self.messages
    }
}

/// One entry in the room's ban registry.
#[derive(Debug, Clone, PartialEq)]
pub struct BannedUser {
    /// Server-assigned ban id; the only key the server accepts for unban.
    pub ban_id: u64,
    pub nick: String,
    pub account: Option<String>,
    /// Nick of the moderator who issued the ban.
    pub banned_by: String,
    /// Ban reason; empty unless the server fills it in.
    pub reason: String,
}

impl BannedUser {
    pub fn from_payload(payload: &BanEntryPayload) -> Self {
        Self {
            ban_id: payload.id,
            nick: payload.nick.clone(),
            account: payload
                .username
                .clone()
                .filter(|account| !account.is_empty()),
            banned_by: payload.moderator.clone(),
            reason: payload.reason.clone(),
        }
    }

    /// True when the banned user was signed in to an account.
    pub fn has_account(&self) -> bool {
        self.account.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(raw: &str) -> UserPayload {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_empty_account_becomes_none() {
        let user = User::from_payload(&payload(r#"{"handle": 1, "nick": "a", "username": ""}"#));
        assert_eq!(user.account, None);

        let user = User::from_payload(&payload(r#"{"handle": 2, "nick": "b", "username": "bee"}"#));
        assert_eq!(user.account.as_deref(), Some("bee"));
    }

    #[test]
    fn test_level_from_payload_flags() {
        let owner = User::from_payload(&payload(r#"{"handle": 1, "owner": true, "mod": true}"#));
        assert_eq!(owner.level, UserLevel::Owner);

        let moderator = User::from_payload(&payload(r#"{"handle": 2, "mod": true}"#));
        assert_eq!(moderator.level, UserLevel::Moderator);

        let guest = User::from_payload(&payload(r#"{"handle": 3}"#));
        assert_eq!(guest.level, UserLevel::Default);
    }

    #[test]
    fn test_level_ordering() {
        assert!(UserLevel::Owner > UserLevel::Super);
        assert!(UserLevel::Super > UserLevel::Moderator);
        assert!(UserLevel::Moderator > UserLevel::Approved);
        assert!(UserLevel::Approved > UserLevel::BotOp);
        assert!(UserLevel::BotOp > UserLevel::Default);
    }

    #[test]
    fn test_last_nick_tracks_history() {
        let mut user = User::new(1, "first");
        assert_eq!(user.last_nick(), "first");

        user.set_nick("second");
        assert_eq!(user.nick, "second");
        assert_eq!(user.last_nick(), "first");

        user.set_nick("third");
        assert_eq!(user.last_nick(), "second");
        assert_eq!(user.old_nicks, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_message_history_is_bounded() {
        let mut user = User::new(1, "chatty");
        for i in 0..MAX_USER_MESSAGES + 10 {
            user.record_message(MessageKind::Chat, &format!("msg {i}"));
        }
        assert_eq!(user.messages().len(), MAX_USER_MESSAGES);
        assert_eq!(user.last_message(), Some("msg 73"));
    }

    #[test]
    fn test_record_message_reports_elapsed() {
        let mut user = User::new(1, "a");
        assert_eq!(user.record_message(MessageKind::Chat, "hi"), None);
        let elapsed = user.record_message(MessageKind::Chat, "again");
        assert!(elapsed.is_some());
    }

    #[test]
    fn test_private_messages_are_not_shown() {
        let mut user = User::new(1, "a");
        user.record_message(MessageKind::Private, "my secret");
        assert_eq!(user.last_message(), Some("Not showing PM."));

        user.record_message(MessageKind::Media, "Song Title");
        assert_eq!(user.last_message(), Some("Song Title"));
    }

    #[test]
    fn test_banned_user_from_payload() {
        let raw = r#"{"id": 9, "nick": "spam", "username": "", "moderator": "harley"}"#;
        let entry: BanEntryPayload = serde_json::from_str(raw).unwrap();
        let banned = BannedUser::from_payload(&entry);
        assert_eq!(banned.ban_id, 9);
        assert!(!banned.has_account());
        assert_eq!(banned.banned_by, "harley");
        assert_eq!(banned.reason, "");
    }
}
