//! Moderation commands: kicks, bans, the ban lists and the banlist.
//!
//! Registry lookups happen under the users lock, wire sends after it is
//! released. List mutations go through the list source and finish with a
//! reload so the in-memory snapshot matches the backing store.

use async_trait::async_trait;
use tracing::warn;

use crate::error::SessionError;
use crate::providers::ListKind;
use crate::state::UserLevel;
use crate::text;

use super::{Command, Context};

/// `kick <nick|*part>`: kick one user, or everyone matching a `*`
/// pattern up to the configured match cap.
pub struct Kick;

#[async_trait]
impl Command for Kick {
    fn name(&self) -> &'static str {
        "kick"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        remove_user(ctx, Removal::Kick).await
    }
}

/// `ban <nick|*part>`: like `kick`, but with a ban.
pub struct Ban;

#[async_trait]
impl Command for Ban {
    fn name(&self) -> &'static str {
        "ban"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        remove_user(ctx, Removal::Ban).await
    }
}

enum Removal {
    Kick,
    Ban,
}

async fn remove_user(ctx: &Context, removal: Removal) -> Result<(), SessionError> {
    let name = ctx.args();
    if name.is_empty() {
        return ctx.respond("Missing username.").await;
    }
    if name == ctx.bot.nick() {
        return ctx.respond("Action not allowed.").await;
    }

    if name.starts_with('*') {
        let part = name.trim_start_matches('*');
        let max = ctx.bot.config().moderation.max_match_bans;
        let bot_nick = ctx.bot.nick();
        // The cap counts matches, not removals, so ineligible matches at
        // the front of the result eat into it.
        let handles: Vec<u64> = {
            let users = ctx.bot.users();
            users
                .search_containing(part)
                .into_iter()
                .enumerate()
                .filter(|(i, user)| {
                    *i < max && user.nick != bot_nick && user.level < ctx.user.level
                })
                .map(|(_, user)| user.handle)
                .collect()
        };
        if let Some(sender) = ctx.bot.sender() {
            for handle in handles {
                match removal {
                    Removal::Kick => sender.kick(handle).await?,
                    Removal::Ban => sender.ban(handle).await?,
                }
            }
        }
        return Ok(());
    }

    let target = {
        let users = ctx.bot.users();
        users.search_by_nick(name).map(|user| (user.handle, user.level))
    };
    match target {
        None => ctx.respond(&format!("No user named: {name}")).await,
        Some((_, level)) if level > ctx.user.level => ctx.respond("Not allowed.").await,
        Some((handle, _)) => {
            if let Some(sender) = ctx.bot.sender() {
                match removal {
                    Removal::Kick => sender.kick(handle).await?,
                    Removal::Ban => sender.ban(handle).await?,
                }
            }
            Ok(())
        }
    }
}

/// `unban [nick]`: lift the last ban, or a named one.
pub struct Unban;

#[async_trait]
impl Command for Unban {
    fn name(&self) -> &'static str {
        "unban"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let name = ctx.args();
        let found = {
            let users = ctx.bot.users();
            if name.is_empty() {
                users.last_banned().map(|banned| (banned.ban_id, banned.nick.clone()))
            } else {
                users
                    .search_banlist_by_nick(name)
                    .map(|banned| (banned.ban_id, banned.nick.clone()))
            }
        };
        match found {
            Some((ban_id, nick)) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender.unban(ban_id).await?;
                }
                ctx.respond(&format!("Unbanned: {nick}")).await
            }
            None if name.is_empty() => {
                ctx.respond("Failed to find the last banned user.").await
            }
            None => {
                ctx.respond(&format!("No user named: {name} in the banlist."))
                    .await
            }
        }
    }
}

/// `banlist <part>`: search the banlist and keep the hits around for
/// `forgive`.
pub struct BanlistSearch;

#[async_trait]
impl Command for BanlistSearch {
    fn name(&self) -> &'static str {
        "banlist"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let part = ctx.args();
        if part.is_empty() {
            return ctx.respond("Missing user name to search for.").await;
        }
        let lines = {
            let mut users = ctx.bot.users();
            let matches: Vec<_> = users
                .search_banlist_containing(part)
                .into_iter()
                .cloned()
                .collect();
            let lines: Vec<String> = matches
                .iter()
                .enumerate()
                .map(|(i, banned)| {
                    format!(
                        "({}) {}:{} [{}]",
                        i,
                        banned.nick,
                        banned.account.as_deref().unwrap_or("None"),
                        banned.ban_id
                    )
                })
                .collect();
            users.set_ban_search(matches);
            lines
        };
        if lines.is_empty() {
            return ctx.respond("No banlist matches.").await;
        }
        let joined = lines.join("\n");
        if joined.len() < 400 {
            ctx.respond(&joined).await
        } else {
            ctx.respond("To many banlist items to show.").await
        }
    }
}

/// `forgive <index>`: unban an entry from the last `banlist` search.
pub struct Forgive;

#[async_trait]
impl Command for Forgive {
    fn name(&self) -> &'static str {
        "forgive"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let arg = ctx.args();
        let Ok(index) = arg.parse::<usize>() else {
            return ctx.respond(&format!("Only numbers allowed ({arg})")).await;
        };
        enum Outcome {
            Unban(u64),
            OutOfRange(usize),
            Empty,
        }
        let outcome = {
            let users = ctx.bot.users();
            let search = users.ban_search();
            if search.is_empty() {
                Outcome::Empty
            } else if let Some(banned) = search.get(index) {
                Outcome::Unban(banned.ban_id)
            } else {
                Outcome::OutOfRange(search.len())
            }
        };
        match outcome {
            Outcome::Unban(ban_id) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender.unban(ban_id).await?;
                }
                Ok(())
            }
            // A single stale result gets no range hint.
            Outcome::OutOfRange(len) if len > 1 => {
                ctx.respond(&format!("Please make a choice between 0-{len}")).await
            }
            Outcome::OutOfRange(_) => Ok(()),
            Outcome::Empty => ctx.respond("The ban search is empty.").await,
        }
    }
}

/// Membership check against the current list snapshot.
fn in_list(ctx: &Context, kind: ListKind, entry: &str) -> bool {
    let lists = ctx.bot.lists().snapshot();
    let list = match kind {
        ListKind::Approved => &lists.approved,
        ListKind::NickBans => &lists.nick_bans,
        ListKind::AccountBans => &lists.account_bans,
        ListKind::StringBans => &lists.string_bans,
    };
    list.iter().any(|item| item == entry)
}

async fn add_to_list(ctx: &Context, kind: ListKind, entry: &str) -> Result<(), SessionError> {
    if let Err(error) = ctx.bot.list_source().add(kind, entry).await {
        warn!(%error, ?kind, "List update failed");
        return Ok(());
    }
    ctx.respond(&format!("{entry} was added to file.")).await?;
    ctx.bot.reload_lists().await;
    Ok(())
}

async fn remove_from_list(ctx: &Context, kind: ListKind, entry: &str) -> Result<(), SessionError> {
    if !in_list(ctx, kind, entry) {
        return Ok(());
    }
    match ctx.bot.list_source().remove(kind, entry).await {
        Ok(true) => {
            ctx.respond(&format!("{entry} was removed.")).await?;
            ctx.bot.reload_lists().await;
        }
        Ok(false) => {}
        Err(error) => warn!(%error, ?kind, "List update failed"),
    }
    Ok(())
}

/// `bannick <nick|*part>`: add a nick pattern to the nick bans.
pub struct BanNick;

#[async_trait]
impl Command for BanNick {
    fn name(&self) -> &'static str {
        "bannick"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let nick = ctx.args();
        if nick.is_empty() {
            ctx.respond("Missing username.").await
        } else if in_list(ctx, ListKind::NickBans, nick) {
            ctx.respond(&format!("{nick} is already in list.")).await
        } else if !text::is_valid_nick_pattern(nick) {
            ctx.respond("the nick provided is not valid.").await
        } else {
            add_to_list(ctx, ListKind::NickBans, nick).await
        }
    }
}

/// `rmbannick <nick>`: drop a nick pattern from the nick bans.
pub struct RemoveBanNick;

#[async_trait]
impl Command for RemoveBanNick {
    fn name(&self) -> &'static str {
        "rmbannick"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let nick = ctx.args();
        if nick.is_empty() {
            ctx.respond("Missing username").await
        } else {
            remove_from_list(ctx, ListKind::NickBans, nick).await
        }
    }
}

/// `banstring <word|*part>`: add a word to the string bans.
pub struct BanString;

#[async_trait]
impl Command for BanString {
    fn name(&self) -> &'static str {
        "banstring"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let word = ctx.args();
        if word.is_empty() {
            ctx.respond("Ban string can't be blank.").await
        } else if word.len() < 3 {
            ctx.respond(&format!("Ban string to short: {}", word.len())).await
        } else if in_list(ctx, ListKind::StringBans, word) {
            ctx.respond(&format!("{word} is already in list.")).await
        } else {
            add_to_list(ctx, ListKind::StringBans, word).await
        }
    }
}

/// `rmbanstring <word>`: drop a word from the string bans.
pub struct RemoveBanString;

#[async_trait]
impl Command for RemoveBanString {
    fn name(&self) -> &'static str {
        "rmbanstring"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let word = ctx.args();
        if word.is_empty() {
            ctx.respond("Missing word string.").await
        } else {
            remove_from_list(ctx, ListKind::StringBans, word).await
        }
    }
}

/// `banacc <account>`: add an account to the account bans.
pub struct BanAccount;

#[async_trait]
impl Command for BanAccount {
    fn name(&self) -> &'static str {
        "banacc"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let account = ctx.args();
        if account.is_empty() {
            ctx.respond("Account can't be blank.").await
        } else if in_list(ctx, ListKind::AccountBans, account) {
            ctx.respond(&format!("{account} is already in list.")).await
        } else if !text::is_valid_account(account) {
            ctx.respond("Account name may only be a-zA-Z0-9 with a length of max 64 characters.")
                .await
        } else {
            add_to_list(ctx, ListKind::AccountBans, account).await
        }
    }
}

/// `rmbanacc <account>`: drop an account from the account bans.
pub struct RemoveBanAccount;

#[async_trait]
impl Command for RemoveBanAccount {
    fn name(&self) -> &'static str {
        "rmbanacc"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let account = ctx.args();
        if account.is_empty() {
            ctx.respond("Missing account.").await
        } else {
            remove_from_list(ctx, ListKind::AccountBans, account).await
        }
    }
}

/// `list <ap|bn|bs|ba|bl>`: item counts for the moderation lists, or
/// the room banlist itself.
pub struct ListInfo;

#[async_trait]
impl Command for ListInfo {
    fn name(&self) -> &'static str {
        "list"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let kind = ctx.args().to_lowercase();
        if kind.is_empty() {
            return ctx.respond("Missing list type.").await;
        }
        let count_reply = |count: usize, what: &str| {
            if count == 0 {
                "No items in this list.".to_string()
            } else {
                format!("{count} {what} in list.")
            }
        };
        match kind.as_str() {
            "ap" => {
                let count = ctx.bot.lists().snapshot().approved.len();
                ctx.respond(&count_reply(count, "approved accounts")).await
            }
            "bn" => {
                let count = ctx.bot.lists().snapshot().nick_bans.len();
                ctx.respond(&count_reply(count, "nicks bans")).await
            }
            "bs" => {
                let count = ctx.bot.lists().snapshot().string_bans.len();
                ctx.respond(&count_reply(count, "string bans")).await
            }
            "ba" => {
                let count = ctx.bot.lists().snapshot().account_bans.len();
                ctx.respond(&count_reply(count, "account bans")).await
            }
            "bl" => {
                let lines: Vec<String> = {
                    let users = ctx.bot.users();
                    users
                        .banlist()
                        .iter()
                        .enumerate()
                        .map(|(i, banned)| {
                            format!(
                                "({}) {}:{} [{}]",
                                i,
                                banned.nick,
                                banned.account.as_deref().unwrap_or("None"),
                                banned.ban_id
                            )
                        })
                        .collect()
                };
                if lines.is_empty() {
                    return ctx.respond("The banlist is empty.").await;
                }
                let joined = lines.join("\n");
                if joined.len() > 450 {
                    ctx.respond("To many banned users to show.").await
                } else {
                    ctx.respond(&joined).await
                }
            }
            _ => Ok(()),
        }
    }
}

/// `uinfo <nick>`: what the bot knows about a user, with the directory
/// profile filled in on first ask.
pub struct UserInfo;

#[async_trait]
impl Command for UserInfo {
    fn name(&self) -> &'static str {
        "uinfo"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let name = ctx.args();
        if name.is_empty() {
            return ctx.respond("Missing username.").await;
        }
        let found = {
            let users = ctx.bot.users();
            users
                .search_by_nick(name)
                .map(|user| (user.handle, user.account.clone(), user.profile.is_none()))
        };
        let Some((handle, account, missing_profile)) = found else {
            return ctx.respond(&format!("No user named: {name}")).await;
        };
        if missing_profile {
            if let Some(account) = account {
                ctx.bot.fetch_profile(handle, &account).await;
            }
        }

        let reply = {
            let users = ctx.bot.users();
            users.search(handle).map(|user| {
                let mut info = vec![
                    format!("User Level: {}", user.level),
                    format!("Join Time: {}", user.joined_at.format("%Y-%m-%d %H:%M:%S")),
                    format!("Last Message: {}", user.last_message().unwrap_or("None")),
                ];
                if let Some(profile) = &user.profile {
                    let field = |value: &Option<String>| {
                        value.clone().unwrap_or_else(|| "None".to_string())
                    };
                    info.push(format!("Role: {}", field(&profile.role)));
                    info.push(format!("Age: {}", field(&profile.age)));
                    info.push(format!("Gender: {}", field(&profile.gender)));
                    info.push(format!("Location: {}", field(&profile.location)));
                    info.push(format!("Biography {}", field(&profile.biography)));
                }
                info.join("\n")
            })
        };
        match reply {
            Some(reply) => ctx.respond(&reply).await,
            None => ctx.respond(&format!("No user named: {name}")).await,
        }
    }
}

/// `cam [nick]`: green-room approve a waiting user, or the issuer.
pub struct CamApprove;

#[async_trait]
impl Command for CamApprove {
    fn name(&self) -> &'static str {
        "cam"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if !ctx.bot.room().green_room {
            return Ok(());
        }
        let name = ctx.args();
        if name.is_empty() {
            let waiting = {
                let users = ctx.bot.users();
                users
                    .search(ctx.user.handle)
                    .filter(|user| user.is_waiting)
                    .map(|user| user.handle)
            };
            if let Some(handle) = waiting {
                if let Some(sender) = ctx.bot.sender() {
                    sender.cam_approve(handle).await?;
                }
            }
            return Ok(());
        }
        let waiting = {
            let users = ctx.bot.users();
            users
                .search_by_nick(name)
                .filter(|user| user.is_waiting)
                .map(|user| user.handle)
        };
        match waiting {
            Some(handle) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender.cam_approve(handle).await?;
                }
                Ok(())
            }
            None => ctx.respond(&format!("No user named: {name}")).await,
        }
    }
}

/// `broadcast <nick>`: toggle whether a user may hold a broadcast.
pub struct AllowBroadcast;

#[async_trait]
impl Command for AllowBroadcast {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let name = ctx.args();
        if name.is_empty() {
            return ctx.respond("Missing username.").await;
        }
        enum Outcome {
            Allowed,
            Barred,
            Outranked,
            Missing,
        }
        let outcome = {
            let mut users = ctx.bot.users();
            match users.search_by_nick(name).map(|user| (user.handle, user.level)) {
                None => Outcome::Missing,
                Some((_, level)) if ctx.user.level < level => Outcome::Outranked,
                Some((handle, _)) => match users.search_mut(handle) {
                    Some(user) => {
                        user.can_broadcast = !user.can_broadcast;
                        if user.can_broadcast {
                            Outcome::Allowed
                        } else {
                            Outcome::Barred
                        }
                    }
                    None => Outcome::Missing,
                },
            }
        };
        match outcome {
            Outcome::Allowed => ctx.respond(&format!("{name} is allowed to broadcast.")).await,
            Outcome::Barred => {
                ctx.respond(&format!("{name} is not allowed to broadcast.")).await
            }
            Outcome::Outranked => Ok(()),
            Outcome::Missing => ctx.respond(&format!("No user named: {name}")).await,
        }
    }
}

/// `close <nick>`: close a running broadcast.
pub struct CloseBroadcast;

#[async_trait]
impl Command for CloseBroadcast {
    fn name(&self) -> &'static str {
        "close"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let name = ctx.args();
        if name.is_empty() {
            return ctx.respond("Missing user name.").await;
        }
        let broadcasting = {
            let users = ctx.bot.users();
            users
                .search_by_nick(name)
                .filter(|user| user.is_broadcasting)
                .map(|user| user.handle)
        };
        match broadcasting {
            Some(handle) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender.cam_close(handle).await?;
                }
                Ok(())
            }
            None => ctx.respond(&format!("No user named: {name}")).await,
        }
    }
}

/// `approve <nick>`: put a signed-in user's account on the approved
/// list and lift them to approved for this session.
pub struct Approve;

#[async_trait]
impl Command for Approve {
    fn name(&self) -> &'static str {
        "approve"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let name = ctx.args();
        if name.is_empty() {
            return ctx.respond("Missing user name.").await;
        }
        enum Outcome {
            NotSignedIn,
            Already,
            Approve(u64, String),
            Skip,
        }
        let bot_account = ctx.bot.config().room.account.clone();
        let outcome = {
            let users = ctx.bot.users();
            match users.search_by_nick(name) {
                None => Outcome::Skip,
                Some(user) => match &user.account {
                    None => Outcome::NotSignedIn,
                    Some(account) if in_list(ctx, ListKind::Approved, account) => Outcome::Already,
                    Some(account) if bot_account.as_deref() != Some(account.as_str()) => {
                        Outcome::Approve(user.handle, account.clone())
                    }
                    Some(_) => Outcome::Skip,
                },
            }
        };
        match outcome {
            Outcome::NotSignedIn => {
                ctx.respond(&format!("{name} is not signed in.")).await
            }
            Outcome::Already => ctx.respond(&format!("{name} is already approved.")).await,
            Outcome::Approve(handle, account) => {
                if let Err(error) = ctx.bot.list_source().add(ListKind::Approved, &account).await {
                    warn!(%error, "List update failed");
                    return Ok(());
                }
                ctx.respond(&format!("{account} was added to file.")).await?;
                ctx.bot.users().mark_as_approved(handle);
                ctx.bot.reload_lists().await;
                Ok(())
            }
            Outcome::Skip => Ok(()),
        }
    }
}

/// `deapprove <account>`: take an account off the approved list, and
/// demote them in the room if present.
pub struct Deapprove;

#[async_trait]
impl Command for Deapprove {
    fn name(&self) -> &'static str {
        "deapprove"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let account = ctx.args();
        if account.is_empty() {
            return ctx.respond("Missing account name.").await;
        }
        if !in_list(ctx, ListKind::Approved, account) {
            return ctx.respond(&format!("{account} is not an approved account.")).await;
        }
        match ctx.bot.list_source().remove(ListKind::Approved, account).await {
            Ok(true) => {
                ctx.respond(&format!("{account} was removed.")).await?;
                {
                    let mut users = ctx.bot.users();
                    let handle = users.search_by_account(account).map(|user| user.handle);
                    if let Some(handle) = handle {
                        if let Some(user) = users.search_mut(handle) {
                            // Only an owner holding the mod flag is exempt.
                            if user.level != UserLevel::Owner || !user.is_mod() {
                                user.level = UserLevel::Default;
                            }
                        }
                    }
                }
                ctx.bot.reload_lists().await;
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(error) => {
                warn!(%error, "List update failed");
                Ok(())
            }
        }
    }
}

/// `banned [moderator]`: how many banlist entries a moderator issued.
/// Defaults to the bot's own account.
pub struct BannedBy;

#[async_trait]
impl Command for BannedBy {
    fn name(&self) -> &'static str {
        "banned"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let arg = ctx.args();
        let moderator = if arg.is_empty() {
            ctx.bot.config().room.account.clone().unwrap_or_default()
        } else {
            arg.to_string()
        };
        let count = {
            let users = ctx.bot.users();
            users.search_banlist_by_moderator(&moderator).len()
        };
        if count == 0 {
            ctx.respond(&format!("No users banned by: {moderator}")).await
        } else {
            ctx.respond(&format!("{count} user(s) have been banned by: {moderator}"))
                .await
        }
    }
}

/// `reload`: re-read the moderation lists from the list source.
pub struct Reload;

#[async_trait]
impl Command for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Moderator
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        ctx.bot.reload_lists().await;
        ctx.respond("Lists reloaded.").await
    }
}
