//! Chat command registry and dispatch.
//!
//! Commands arrive as prefixed chat or private messages and only while
//! the client moderates the room. Each command declares a minimum
//! [`UserLevel`]; level `Default` commands additionally honor the
//! public-commands toggle, and the vote family is gated on the voting
//! toggle alone. Refusals and unknown names are silent in chat, visible
//! at debug level.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, debug_span, Instrument};

use crate::bot::Bot;
use crate::error::SessionError;
use crate::state::{MessageKind, User, UserLevel};

mod media;
mod moderation;
mod session;
mod settings;
mod vote;

/// One chat command.
#[async_trait]
pub trait Command: Send + Sync {
    /// The word after the prefix.
    fn name(&self) -> &'static str;

    /// Minimum issuer level.
    fn level(&self) -> UserLevel;

    /// Gate on the voting toggle instead of a level.
    fn voting(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError>;
}

/// Everything a command gets to work with: the bot, a snapshot of the
/// issuer, and where the command came from.
pub struct Context {
    pub bot: Arc<Bot>,
    pub user: User,
    pub kind: MessageKind,
    pub args: String,
}

impl Context {
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn is_private(&self) -> bool {
        self.kind == MessageKind::Private
    }

    /// Reply on the channel the command arrived on.
    pub async fn respond(&self, text: &str) -> Result<(), SessionError> {
        let Some(sender) = self.bot.sender() else {
            return Err(SessionError::NotConnected);
        };
        match self.kind {
            MessageKind::Private => sender.pvtmsg(self.user.handle, text).await,
            _ => sender.msg(text).await,
        }
    }
}

/// The registered commands, keyed by name.
pub struct CommandSet {
    commands: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandSet {
    pub fn new() -> Self {
        let mut set = Self {
            commands: HashMap::new(),
        };

        // ===== Media =====
        set.add(Box::new(media::Play));
        set.add(Box::new(media::NowPlaying));
        set.add(Box::new(media::NextUp));
        set.add(Box::new(media::QueueStatus));
        set.add(Box::new(media::WhoPlays));
        set.add(Box::new(media::Skip));
        set.add(Box::new(media::Delete));
        set.add(Box::new(media::Replay));
        set.add(Box::new(media::Resume));
        set.add(Box::new(media::Pause));
        set.add(Box::new(media::Seek));
        set.add(Box::new(media::Stop));
        set.add(Box::new(media::ClearPlaylist));
        set.add(Box::new(media::PlaylistInfo));
        set.add(Box::new(media::MediaInfo));

        // ===== Moderation =====
        set.add(Box::new(moderation::Kick));
        set.add(Box::new(moderation::Ban));
        set.add(Box::new(moderation::Unban));
        set.add(Box::new(moderation::BanlistSearch));
        set.add(Box::new(moderation::Forgive));
        set.add(Box::new(moderation::BanNick));
        set.add(Box::new(moderation::RemoveBanNick));
        set.add(Box::new(moderation::BanString));
        set.add(Box::new(moderation::RemoveBanString));
        set.add(Box::new(moderation::BanAccount));
        set.add(Box::new(moderation::RemoveBanAccount));
        set.add(Box::new(moderation::ListInfo));
        set.add(Box::new(moderation::UserInfo));
        set.add(Box::new(moderation::CamApprove));
        set.add(Box::new(moderation::AllowBroadcast));
        set.add(Box::new(moderation::CloseBroadcast));
        set.add(Box::new(moderation::Approve));
        set.add(Box::new(moderation::Deapprove));
        set.add(Box::new(moderation::BannedBy));
        set.add(Box::new(moderation::Reload));

        // ===== Settings =====
        set.add(Box::new(settings::AllowGuests));
        set.add(Box::new(settings::AllowLurkers));
        set.add(Box::new(settings::AllowGuestNicks));
        set.add(Box::new(settings::Greet));
        set.add(Box::new(settings::PublicCommands));
        set.add(Box::new(settings::KickAsBan));
        set.add(Box::new(settings::NotifyOnBan));
        set.add(Box::new(settings::VipMode));
        set.add(Box::new(settings::Voting));
        set.add(Box::new(settings::GreenRoom));
        set.add(Box::new(settings::RoomInfo));
        set.add(Box::new(settings::Op));
        set.add(Box::new(settings::Deop));
        set.add(Box::new(settings::Key));

        // ===== Votes =====
        set.add(Box::new(vote::VoteBan));
        set.add(Box::new(vote::VoteKick));
        set.add(Box::new(vote::VoteClose));
        set.add(Box::new(vote::CastVote));
        set.add(Box::new(vote::CancelVote));

        // ===== Session =====
        set.add(Box::new(session::Nick));
        set.add(Box::new(session::Uptime));
        set.add(Box::new(session::Pvt));
        set.add(Box::new(session::OpKey));
        set.add(Box::new(session::Kill));
        set.add(Box::new(session::Reboot));

        set
    }

    fn add(&mut self, command: Box<dyn Command>) {
        self.commands.insert(command.name(), command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Parse and run one command line.
    pub async fn dispatch(&self, bot: &Arc<Bot>, user: User, kind: MessageKind, text: &str) {
        let Some((name, args)) = parse(&bot.config().client.prefix, text) else {
            return;
        };
        let Some(command) = self.commands.get(name.as_str()) else {
            debug!(command = %name, "Unknown command");
            return;
        };

        let (public_commands, voting_enabled) = {
            let settings = bot.settings();
            (settings.public_commands, settings.moderation.enable_voting)
        };
        if !permitted(command.as_ref(), user.level, public_commands, voting_enabled) {
            debug!(command = %name, nick = %user.nick, level = ?user.level, "Command refused");
            return;
        }

        let span = debug_span!("command", name = %name, nick = %user.nick);
        let ctx = Context {
            bot: Arc::clone(bot),
            user,
            kind,
            args,
        };
        if let Err(e) = command.run(&ctx).instrument(span).await {
            debug!(command = %name, error = %e, "Command failed");
        }
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a prefixed line into command name and trimmed argument string.
/// The name is lowercased; a bare prefix parses to nothing.
fn parse(prefix: &str, text: &str) -> Option<(String, String)> {
    let body = text.strip_prefix(prefix)?;
    let mut parts = body.splitn(2, ' ');
    let name = parts.next()?.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let args = parts.next().unwrap_or("").trim().to_string();
    Some((name, args))
}

/// The tier rule: vote-family commands follow the voting toggle alone,
/// level `Default` commands are public only while the toggle says so,
/// everything else compares levels.
fn permitted(command: &dyn Command, level: UserLevel, public_commands: bool, voting: bool) -> bool {
    if command.voting() {
        return voting;
    }
    if command.level() == UserLevel::Default {
        return public_commands || level > UserLevel::Default;
    }
    level >= command.level()
}
