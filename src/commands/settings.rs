//! Runtime settings commands: moderation toggles, bot controller
//! grants and the controller key.
//!
//! Toggles mutate the [`Settings`](crate::bot::Settings) copy only; the
//! loaded config file never changes.

use async_trait::async_trait;

use crate::bot::Settings;
use crate::error::SessionError;
use crate::state::UserLevel;

use super::{Command, Context};

/// Flip one settings field and report the new value.
async fn toggle(
    ctx: &Context,
    label: &str,
    flip: impl FnOnce(&mut Settings) -> bool + Send,
) -> Result<(), SessionError> {
    let value = {
        let mut settings = ctx.bot.settings();
        flip(&mut settings)
    };
    ctx.respond(&format!("{label}: {value}")).await
}

/// `guests`: allow or remove guest joins.
pub struct AllowGuests;

#[async_trait]
impl Command for AllowGuests {
    fn name(&self) -> &'static str {
        "guests"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Allow Guests", |settings| {
            settings.moderation.allow_guests = !settings.moderation.allow_guests;
            settings.moderation.allow_guests
        })
        .await
    }
}

/// `lurkers`: allow or remove lurkers.
pub struct AllowLurkers;

#[async_trait]
impl Command for AllowLurkers {
    fn name(&self) -> &'static str {
        "lurkers"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Allow Lurkers", |settings| {
            settings.moderation.allow_lurkers = !settings.moderation.allow_lurkers;
            settings.moderation.allow_lurkers
        })
        .await
    }
}

/// `guestnicks`: allow or refuse default `guest-` nicks.
pub struct AllowGuestNicks;

#[async_trait]
impl Command for AllowGuestNicks {
    fn name(&self) -> &'static str {
        "guestnicks"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Allow Guest Nicks", |settings| {
            settings.moderation.allow_guest_nicks = !settings.moderation.allow_guest_nicks;
            settings.moderation.allow_guest_nicks
        })
        .await
    }
}

/// `greet`: greet users as they join.
pub struct Greet;

#[async_trait]
impl Command for Greet {
    fn name(&self) -> &'static str {
        "greet"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Greet Users", |settings| {
            settings.greet = !settings.greet;
            settings.greet
        })
        .await
    }
}

/// `public`: open the public command tier to everyone.
pub struct PublicCommands;

#[async_trait]
impl Command for PublicCommands {
    fn name(&self) -> &'static str {
        "public"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Public Commands Enabled", |settings| {
            settings.public_commands = !settings.public_commands;
            settings.public_commands
        })
        .await
    }
}

/// `kickban`: auto-moderation kicks instead of banning.
pub struct KickAsBan;

#[async_trait]
impl Command for KickAsBan {
    fn name(&self) -> &'static str {
        "kickban"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Use Kick As Auto Ban", |settings| {
            settings.moderation.kick_as_autoban = !settings.moderation.kick_as_autoban;
            settings.moderation.kick_as_autoban
        })
        .await
    }
}

/// `notify`: announce auto-moderation actions in chat.
pub struct NotifyOnBan;

#[async_trait]
impl Command for NotifyOnBan {
    fn name(&self) -> &'static str {
        "notify"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Notify On Ban", |settings| {
            settings.moderation.notify_on_ban = !settings.moderation.notify_on_ban;
            settings.moderation.notify_on_ban
        })
        .await
    }
}

/// `vip`: only approved users and moderators may stay.
pub struct VipMode;

#[async_trait]
impl Command for VipMode {
    fn name(&self) -> &'static str {
        "vip"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        toggle(ctx, "Vip Mode", |settings| {
            settings.moderation.vip_mode = !settings.moderation.vip_mode;
            settings.moderation.vip_mode
        })
        .await
    }
}

/// `voting`: enable or disable the vote commands. Disabling with a
/// session running cancels it.
pub struct Voting;

#[async_trait]
impl Command for Voting {
    fn name(&self) -> &'static str {
        "voting"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let enabled = {
            let mut settings = ctx.bot.settings();
            settings.moderation.enable_voting = !settings.moderation.enable_voting;
            settings.moderation.enable_voting
        };
        let vote_active = ctx.bot.vote().is_some();
        if vote_active {
            if ctx.is_private() {
                return ctx.respond("Not supported in PM.").await;
            }
            ctx.bot.cancel_vote();
        }
        ctx.respond(&format!("Voting Enabled: {enabled}")).await
    }
}

/// `greenroom [on|off]`: align the bot's view of green-room mode with
/// the room, or show the current view.
pub struct GreenRoom;

#[async_trait]
impl Command for GreenRoom {
    fn name(&self) -> &'static str {
        "greenroom"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let enabled = {
            let mut room = ctx.bot.room();
            match ctx.args() {
                "on" => {
                    room.green_room = true;
                    true
                }
                "off" => {
                    room.green_room = false;
                    false
                }
                _ => room.green_room,
            }
        };
        if enabled {
            ctx.respond("Green room is enabled.").await
        } else {
            ctx.respond("Green room is disabled.").await
        }
    }
}

/// `room`: the room profile as reported by the server.
pub struct RoomInfo;

#[async_trait]
impl Command for RoomInfo {
    fn name(&self) -> &'static str {
        "room"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let formatted = ctx.bot.room().formatted();
        ctx.respond(&formatted).await
    }
}

/// `op <nick>`: grant bot controller rights for this session.
pub struct Op;

#[async_trait]
impl Command for Op {
    fn name(&self) -> &'static str {
        "op"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        set_controller(ctx, UserLevel::BotOp, "is now a bot controller").await
    }
}

/// `deop <nick>`: revoke bot controller rights.
pub struct Deop;

#[async_trait]
impl Command for Deop {
    fn name(&self) -> &'static str {
        "deop"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        set_controller(ctx, UserLevel::Default, "is not a bot controller anymore.").await
    }
}

async fn set_controller(
    ctx: &Context,
    level: UserLevel,
    reply: &str,
) -> Result<(), SessionError> {
    let name = ctx.args();
    if name.is_empty() {
        return ctx.respond("Missing username.").await;
    }
    enum Outcome {
        Set,
        Exempt,
        Missing,
    }
    let outcome = {
        let mut users = ctx.bot.users();
        match users.search_by_nick(name).map(|user| user.handle) {
            None => Outcome::Missing,
            Some(handle) => match users.search_mut(handle) {
                // Only an owner holding the mod flag is exempt.
                Some(user) if user.level != UserLevel::Owner || !user.is_mod() => {
                    user.level = level;
                    Outcome::Set
                }
                Some(_) => Outcome::Exempt,
                None => Outcome::Missing,
            },
        }
    };
    match outcome {
        Outcome::Set => ctx.respond(&format!("{name} {reply}")).await,
        Outcome::Exempt => Ok(()),
        Outcome::Missing => ctx.respond(&format!("No user named: {name}")).await,
    }
}

/// `key [new]`: show or replace the bot controller key. Replacing it
/// demotes everyone holding key-granted levels.
pub struct Key;

#[async_trait]
impl Command for Key {
    fn name(&self) -> &'static str {
        "key"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Owner
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if !ctx.is_private() {
            return ctx.respond("Command only supported in PM.").await;
        }
        let new_key = ctx.args();
        if new_key.is_empty() {
            let current = {
                let settings = ctx.bot.settings();
                settings.key.clone().unwrap_or_else(|| "None".to_string())
            };
            return ctx
                .respond(&format!("The current secret key is: {current}"))
                .await;
        }
        if new_key.len() < 6 {
            return ctx
                .respond(&format!(
                    "The key is to short, it must be at least 6 characters long. It is {} long.",
                    new_key.len()
                ))
                .await;
        }

        {
            let mut users = ctx.bot.users();
            let granted: Vec<u64> = users
                .users()
                .filter(|user| {
                    user.level == UserLevel::Super || user.level == UserLevel::BotOp
                })
                .map(|user| user.handle)
                .collect();
            for handle in granted {
                if let Some(user) = users.search_mut(handle) {
                    user.level = UserLevel::Default;
                }
            }
        }
        ctx.bot.settings().key = Some(new_key.to_string());
        ctx.respond(&format!("The key was changed to: {new_key}")).await
    }
}
