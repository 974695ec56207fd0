//! Session commands: the bot's own nick, uptime, PM plumbing, key
//! authentication and the shutdown/reconnect controls.

use async_trait::async_trait;

use crate::bot::Control;
use crate::error::SessionError;
use crate::state::UserLevel;
use crate::text;

use super::{Command, Context};

/// `nick [new]`: change the bot's nick, random when omitted.
pub struct Nick;

#[async_trait]
impl Command for Nick {
    fn name(&self) -> &'static str {
        "nick"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let new_nick = ctx.args();
        if new_nick.is_empty() {
            ctx.bot.change_nick(None).await;
        } else if !text::is_valid_nick(new_nick) {
            return ctx.respond("Nick name may only contain a-zA-z0-9_").await;
        } else {
            ctx.bot.change_nick(Some(new_nick.to_string())).await;
        }
        Ok(())
    }
}

/// `uptime`: how long the bot has been running.
pub struct Uptime;

#[async_trait]
impl Command for Uptime {
    fn name(&self) -> &'static str {
        "uptime"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let uptime = text::format_time(ctx.bot.uptime().as_secs());
        ctx.respond(&format!("Bot-Uptime: {uptime}")).await
    }
}

/// `pvt [nick text]`: without arguments, open a PM session with the
/// bot; with them, relay a message to a user by PM.
pub struct Pvt;

#[async_trait]
impl Command for Pvt {
    fn name(&self) -> &'static str {
        "pvt"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let args = ctx.args();
        if args.is_empty() {
            ctx.bot
                .say_private(
                    ctx.user.handle,
                    &format!("How can i help you {}?", ctx.user.nick),
                )
                .await;
            return Ok(());
        }
        let Some((name, text)) = args.split_once(' ') else {
            return Ok(());
        };
        let target = {
            let users = ctx.bot.users();
            users.search_by_nick(name).map(|user| user.handle)
        };
        match target {
            Some(handle) => {
                ctx.bot
                    .say_private(handle, &format!("[{}] {}", ctx.user.nick, text.trim()))
                    .await;
                Ok(())
            }
            None => ctx.respond(&format!("No user named: {name}")).await,
        }
    }
}

/// `opkey <key>`: self-service level grant against the controller keys.
pub struct OpKey;

#[async_trait]
impl Command for OpKey {
    fn name(&self) -> &'static str {
        "opkey"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if !ctx.is_private() {
            return ctx.respond("Command only supported in PM.").await;
        }
        let key = ctx.args();
        if key.is_empty() {
            return ctx.respond("Missing key.").await;
        }

        let super_key = ctx.bot.config().client.super_key.clone();
        let controller_key = ctx.bot.settings().key.clone();
        if super_key.as_deref() == Some(key) {
            // The owner grant only works when the bot itself holds the
            // owner account.
            let client_is_owner = {
                let users = ctx.bot.users();
                users
                    .client()
                    .is_some_and(|client| client.level == UserLevel::Owner)
            };
            if client_is_owner {
                set_level(ctx, UserLevel::Owner);
                ctx.respond("You are now a super mod.").await
            } else {
                ctx.respond("The client is not using the owner account.").await
            }
        } else if controller_key.as_deref() == Some(key) {
            if ctx.bot.client_is_mod() {
                set_level(ctx, UserLevel::Super);
                ctx.respond("You are now a bot controller.").await
            } else {
                ctx.respond("The client is not moderator.").await
            }
        } else {
            ctx.respond("Wrong key.").await
        }
    }
}

fn set_level(ctx: &Context, level: UserLevel) {
    let mut users = ctx.bot.users();
    if let Some(user) = users.search_mut(ctx.user.handle) {
        user.level = level;
    }
}

/// `kill`: leave the room and exit.
pub struct Kill;

#[async_trait]
impl Command for Kill {
    fn name(&self) -> &'static str {
        "kill"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Owner
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if let Some(control) = ctx.bot.control() {
            control.send(Control::Shutdown).await.ok();
        }
        Ok(())
    }
}

/// `reboot`: drop the session and dial the room again.
pub struct Reboot;

#[async_trait]
impl Command for Reboot {
    fn name(&self) -> &'static str {
        "reboot"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Owner
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if let Some(control) = ctx.bot.control() {
            control.send(Control::Reconnect).await.ok();
        }
        Ok(())
    }
}
