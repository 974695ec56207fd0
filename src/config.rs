//! Configuration loading and validation.
//!
//! The bot reads a single TOML file at startup. Only `[room].name` and
//! `[providers].directory` are required; everything else has conservative
//! defaults (moderation toggles all start disabled).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::text;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The room to sit in and the identity to use.
    pub room: RoomConfig,
    /// Client behavior knobs.
    #[serde(default)]
    pub client: ClientConfig,
    /// Auto-moderation toggles.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// List file locations.
    #[serde(default)]
    pub lists: ListsConfig,
    /// External service endpoints and keys.
    pub providers: ProviderConfig,
    /// Worker pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Room and identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// Room name, plain alphanumeric.
    pub name: String,
    /// Nick to join with. A random one is generated when unset.
    #[serde(default)]
    pub nick: Option<String>,
    /// Account name the bot is signed in as, if any.
    #[serde(default)]
    pub account: Option<String>,
    /// Password for password-protected rooms.
    #[serde(default)]
    pub password: Option<String>,
}

/// Client behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Command prefix for chat commands.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Allow everyone to use the public command tier.
    #[serde(default)]
    pub public_commands: bool,
    /// Greet users as they join or shed a guest nick.
    #[serde(default)]
    pub greet: bool,
    /// Client version sent in the join frame when the directory does not
    /// report one.
    #[serde(default = "default_version")]
    pub version: String,
    /// Controller key for the `opkey` command.
    #[serde(default)]
    pub key: Option<String>,
    /// Owner-level controller key.
    #[serde(default)]
    pub super_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            public_commands: false,
            greet: false,
            version: default_version(),
            key: None,
            super_key: None,
        }
    }
}

/// Auto-moderation configuration. Every toggle defaults to off.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    #[serde(default)]
    pub allow_guests: bool,
    #[serde(default)]
    pub allow_lurkers: bool,
    /// Allow users to keep their auto-assigned `guest-` nicks.
    #[serde(default)]
    pub allow_guest_nicks: bool,
    /// Kick instead of ban for every auto-moderation verdict.
    #[serde(default)]
    pub kick_as_autoban: bool,
    /// Remove everyone who is not approved or a moderator.
    #[serde(default)]
    pub vip_mode: bool,
    #[serde(default)]
    pub enable_voting: bool,
    /// Enable the sub-400ms message timing check.
    #[serde(default)]
    pub timed_checks: bool,
    /// Announce auto-moderation actions in chat.
    #[serde(default)]
    pub notify_on_ban: bool,
    /// Cap on wildcard matches a single kick/ban command may act on.
    #[serde(default = "default_max_match_bans")]
    pub max_match_bans: usize,
    /// Upper bound in seconds for the random notification delay.
    #[serde(default = "default_max_notify_delay")]
    pub max_notify_delay: f64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            allow_guests: false,
            allow_lurkers: false,
            allow_guest_nicks: false,
            kick_as_autoban: false,
            vip_mode: false,
            enable_voting: false,
            timed_checks: false,
            notify_on_ban: false,
            max_match_bans: default_max_match_bans(),
            max_notify_delay: default_max_notify_delay(),
        }
    }
}

/// Where the per-room list files live and what they are called.
#[derive(Debug, Clone, Deserialize)]
pub struct ListsConfig {
    /// Base directory; the room name is appended as a subdirectory.
    #[serde(default = "default_lists_path")]
    pub path: PathBuf,
    #[serde(default = "default_approved_file")]
    pub approved: String,
    #[serde(default = "default_nick_bans_file")]
    pub nick_bans: String,
    #[serde(default = "default_account_bans_file")]
    pub account_bans: String,
    #[serde(default = "default_string_bans_file")]
    pub string_bans: String,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            path: default_lists_path(),
            approved: default_approved_file(),
            nick_bans: default_nick_bans_file(),
            account_bans: default_account_bans_file(),
            string_bans: default_string_bans_file(),
        }
    }
}

/// Provider endpoints and keys.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the room directory API.
    pub directory: String,
    /// Base URL of the media library API. Media search commands are
    /// disabled when unset.
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub media_key: Option<String>,
    /// Captcha solver API key. Without one, captcha challenges end the
    /// session.
    #[serde(default)]
    pub captcha_key: Option<String>,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue")]
    pub queue: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue: default_queue(),
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_version() -> String {
    "2.0.22-4".to_string()
}

fn default_max_match_bans() -> usize {
    2
}

fn default_max_notify_delay() -> f64 {
    2.0
}

fn default_lists_path() -> PathBuf {
    PathBuf::from("rooms/")
}

fn default_approved_file() -> String {
    "approved_accounts.txt".to_string()
}

fn default_nick_bans_file() -> String {
    "nick_bans.txt".to_string()
}

fn default_account_bans_file() -> String {
    "account_bans.txt".to_string()
}

fn default_string_bans_file() -> String {
    "string_bans.txt".to_string()
}

fn default_workers() -> usize {
    10
}

fn default_queue() -> usize {
    64
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a typo would otherwise turn into runtime surprises.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !text::is_valid_room(&self.room.name) {
            return Err(ConfigError::Invalid {
                field: "room.name",
                reason: format!("`{}` may only contain letters and numbers", self.room.name),
            });
        }
        if let Some(nick) = &self.room.nick {
            if !text::is_valid_nick(nick) {
                return Err(ConfigError::Invalid {
                    field: "room.nick",
                    reason: format!("`{nick}` is not a valid nick"),
                });
            }
        }
        if self.client.prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "client.prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.moderation.max_notify_delay < 0.5 {
            return Err(ConfigError::Invalid {
                field: "moderation.max_notify_delay",
                reason: "must be at least 0.5 seconds".to_string(),
            });
        }
        if self.pool.workers == 0 || self.pool.queue == 0 {
            return Err(ConfigError::Invalid {
                field: "pool",
                reason: "workers and queue must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> &'static str {
        r#"
            [room]
            name = "lounge"

            [providers]
            directory = "http://127.0.0.1:3000"
        "#
    }

    #[test]
    fn test_parse_minimal() {
        let config: Config = toml::from_str(minimal()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.room.name, "lounge");
        assert!(config.room.nick.is_none());
        assert_eq!(config.client.prefix, "!");
        assert!(!config.moderation.allow_guests);
        assert_eq!(config.moderation.max_match_bans, 2);
        assert_eq!(config.lists.approved, "approved_accounts.txt");
        assert_eq!(config.pool.workers, 10);
        assert!(config.providers.media.is_none());
    }

    #[test]
    fn test_parse_full() {
        let raw = r#"
            [room]
            name = "lounge"
            nick = "emcee"
            account = "emceebot"
            password = "hunter2"

            [client]
            prefix = "."
            public_commands = true
            greet = true

            [moderation]
            allow_guests = true
            kick_as_autoban = true
            max_notify_delay = 1.5

            [lists]
            path = "data/"

            [providers]
            directory = "http://127.0.0.1:3000"
            media = "http://127.0.0.1:3001"
            captcha_key = "0123456789abcdef0123456789abcdef"

            [pool]
            workers = 4
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();

        assert_eq!(config.client.prefix, ".");
        assert!(config.moderation.allow_guests);
        assert!(config.moderation.kick_as_autoban);
        assert_eq!(config.lists.path, PathBuf::from("data/"));
        assert_eq!(config.pool.workers, 4);
        assert!(config.providers.captcha_key.is_some());
    }

    #[test]
    fn test_invalid_room_name() {
        let raw = r#"
            [room]
            name = "no spaces allowed"

            [providers]
            directory = "http://127.0.0.1:3000"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "room.name",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_nick_rejected() {
        let raw = r#"
            [room]
            name = "lounge"
            nick = "bad nick!"

            [providers]
            directory = "http://127.0.0.1:3000"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_directory_fails_parse() {
        let result = toml::from_str::<Config>(
            r#"
                [room]
                name = "lounge"
            "#,
        );
        assert!(result.is_err());
    }
}
