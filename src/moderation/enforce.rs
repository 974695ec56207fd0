//! Enforcement pipelines run off the worker pool.
//!
//! Each pipeline gets an owned user snapshot and reads one settings and
//! lists snapshot up front, so a toggle flipped mid-check cannot produce
//! a half-applied decision. The caller only submits these while the
//! client is a moderator.

use std::time::Duration;

use tracing::{debug, info};

use crate::bot::{Bot, Settings};
use crate::state::User;

use super::{join_violation, message_violation, nick_violation, verdict, Rule, Verdict};

/// Join pipeline.
///
/// Moderators and approved accounts bypass the rules and get a profile
/// lookup before the greeting. Guests who pass are greeted without a
/// lookup since there is no account to resolve.
pub async fn on_join(bot: &Bot, user: User) {
    let settings = bot.settings().clone();
    let lists = bot.lists().snapshot();

    match user.account.clone() {
        Some(account) => {
            if user.is_mod() {
                bot.fetch_profile(user.handle, &account).await;
                greet_joined(bot, &settings, &user).await;
            } else if lists.is_approved(&account) {
                bot.fetch_profile(user.handle, &account).await;
                bot.users().mark_as_approved(user.handle);
                greet_joined(bot, &settings, &user).await;
            } else {
                match join_violation(&settings.moderation, &lists, &user) {
                    Some(rule) => act(bot, &settings, rule, &user).await,
                    None => {
                        bot.fetch_profile(user.handle, &account).await;
                        greet_joined(bot, &settings, &user).await;
                    }
                }
            }
        }
        None => match join_violation(&settings.moderation, &lists, &user) {
            Some(rule) => act(bot, &settings, rule, &user).await,
            None => greet_joined(bot, &settings, &user).await,
        },
    }
}

/// Nick-change pipeline.
///
/// Re-runs the nick rule for everyone below moderator, then greets users
/// shedding a server-assigned guest nick for a real one.
pub async fn on_nick(bot: &Bot, user: User) {
    let settings = bot.settings().clone();
    let lists = bot.lists().snapshot();

    if !user.is_mod() {
        if let Some(rule) = nick_violation(&lists, &user) {
            act(bot, &settings, rule, &user).await;
            return;
        }
    }

    if user.is_client || !settings.greet || !user.last_nick().starts_with("guest-") {
        return;
    }
    bot.notify(&welcome(&user)).await;
}

/// Message pipeline. Moderators are exempt; timing is checked before
/// content.
pub async fn on_message(bot: &Bot, user: &User, text: &str, gap: Option<Duration>) {
    if user.is_mod() {
        return;
    }
    let settings = bot.settings().clone();
    let lists = bot.lists().snapshot();

    if let Some(rule) = message_violation(&settings.moderation, &lists, text, user.online(), gap) {
        act(bot, &settings, rule, user).await;
    }
}

/// Carry out a verdict: the removal frame first, then the chat notice.
async fn act(bot: &Bot, settings: &Settings, rule: Rule, user: &User) {
    let Some(sender) = bot.sender() else {
        return;
    };
    match verdict(&settings.moderation, rule) {
        Verdict::Allow => {}
        Verdict::Kick(notice) => {
            info!(nick = %user.nick, handle = user.handle, ?rule, "Auto kick");
            if let Err(e) = sender.kick(user.handle).await {
                debug!(error = %e, "Kick send failed");
                return;
            }
            if let Some(notice) = notice {
                bot.notify(&notice).await;
            }
        }
        Verdict::Ban(notice) => {
            info!(nick = %user.nick, handle = user.handle, ?rule, "Auto ban");
            if let Err(e) = sender.ban(user.handle).await {
                debug!(error = %e, "Ban send failed");
                return;
            }
            if let Some(notice) = notice {
                bot.notify(&notice).await;
            }
        }
    }
}

/// Greeting for a user who passed the join checks. Server-assigned guest
/// nicks are never greeted; they get theirs after a rename.
async fn greet_joined(bot: &Bot, settings: &Settings, user: &User) {
    if !settings.greet || user.nick.starts_with("guest-") {
        return;
    }
    bot.notify(&welcome(user)).await;
}

fn welcome(user: &User) -> String {
    match &user.account {
        Some(account) => format!(
            "Welcome to the room {}:{}:{}",
            user.nick, account, user.handle
        ),
        None => format!("Welcome to the room {}:{}", user.nick, user.handle),
    }
}
