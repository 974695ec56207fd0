//! Vote commands. The session bookkeeping lives in
//! [`crate::moderation::vote`]; these handlers only gate who may start
//! one and relay ballots.

use async_trait::async_trait;
use tracing::debug;

use crate::error::SessionError;
use crate::moderation::{VoteChoice, VoteKind, VoteSession};
use crate::state::UserLevel;

use super::{Command, Context};

/// `vban <nick> [secs]`: vote to ban a user.
pub struct VoteBan;

#[async_trait]
impl Command for VoteBan {
    fn name(&self) -> &'static str {
        "vban"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    fn voting(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        start_vote(ctx, VoteKind::Ban).await
    }
}

/// `vkick <nick> [secs]`: vote to kick a user.
pub struct VoteKick;

#[async_trait]
impl Command for VoteKick {
    fn name(&self) -> &'static str {
        "vkick"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    fn voting(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        start_vote(ctx, VoteKind::Kick).await
    }
}

/// `vclose <nick> [secs]`: vote to close a user's broadcast.
pub struct VoteClose;

#[async_trait]
impl Command for VoteClose {
    fn name(&self) -> &'static str {
        "vclose"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    fn voting(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        start_vote(ctx, VoteKind::Close).await
    }
}

async fn start_vote(ctx: &Context, kind: VoteKind) -> Result<(), SessionError> {
    // Sessions concern the whole room, so they cannot start from PM.
    if ctx.is_private() {
        return Ok(());
    }
    let args = ctx.args();
    if args.is_empty() {
        return ctx.respond("Missing required user nick.").await;
    }

    let running = {
        let vote = ctx.bot.vote();
        vote.as_ref().map(|session| session.kind())
    };
    if let Some(running) = running {
        return ctx
            .respond(&format!("A vote to {running} session is in progress."))
            .await;
    }
    if !VoteSession::can_start(&ctx.user) {
        debug!(nick = %ctx.user.nick, "Not allowed to start a vote session");
        return Ok(());
    }

    let mut parts = args.split(' ');
    let nick = parts.next().unwrap_or_default();
    let mut duration = 60;
    if let Some(secs) = parts.next() {
        let Ok(secs) = secs.parse::<u64>() else {
            return Ok(());
        };
        if !(60..=600).contains(&secs) {
            return ctx
                .respond("Vote session must be between 60 seconds and 10 minutes.")
                .await;
        }
        duration = secs;
    }

    enum Start {
        Protected,
        Session(VoteSession),
    }
    let outcome = {
        let users = ctx.bot.users();
        let Some(target) = users.search_by_nick(nick) else {
            debug!(nick, "Vote target not in room");
            return Ok(());
        };
        let moderation_vote = matches!(kind, VoteKind::Ban | VoteKind::Kick);
        if moderation_vote && target.level >= UserLevel::Moderator {
            Start::Protected
        } else {
            let eligible = VoteSession::eligible_voters(users.users());
            Start::Session(VoteSession::new(target, kind, duration, eligible))
        }
    };
    match outcome {
        Start::Protected => {
            ctx.respond(&format!("You can't vote to {kind} this user."))
                .await
        }
        Start::Session(session) => {
            ctx.bot.begin_vote(session);
            let prefix = &ctx.bot.config().client.prefix;
            ctx.respond(&format!(
                "Vote to {kind} has started.\n Vote using {prefix}vote yes or {prefix}vote no"
            ))
            .await
        }
    }
}

/// `vote <yes|no>`: cast a ballot in the running session.
pub struct CastVote;

#[async_trait]
impl Command for CastVote {
    fn name(&self) -> &'static str {
        "vote"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    fn voting(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let word = ctx.args();
        if word.is_empty() {
            return Ok(());
        }
        let accepted = {
            let mut vote = ctx.bot.vote();
            match (vote.as_mut(), VoteChoice::parse(word)) {
                (Some(session), Some(choice)) => session.cast(ctx.user.handle, choice),
                _ => false,
            }
        };
        if accepted {
            // The receipt always goes by PM, wherever the ballot came from.
            ctx.bot
                .say_private(ctx.user.handle, &format!("Your {word} vote was accepted."))
                .await;
        }
        Ok(())
    }
}

/// `vcancel`: scrap the running vote session.
pub struct CancelVote;

#[async_trait]
impl Command for CancelVote {
    fn name(&self) -> &'static str {
        "vcancel"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if ctx.is_private() {
            return ctx.respond("Not supported in PM.").await;
        }
        match ctx.bot.cancel_vote() {
            Some(session) => {
                ctx.respond(&format!(
                    "{} cancelled vote to {} {}",
                    ctx.user.nick,
                    session.kind(),
                    session.target_nick()
                ))
                .await
            }
            None => Ok(()),
        }
    }
}
