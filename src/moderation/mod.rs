//! Auto-moderation: ban lists, rule checks, vote sessions and the
//! enforcement pipelines that tie them to room events.

use parking_lot::RwLock;

pub mod enforce;
mod rules;
mod vote;

pub use rules::{
    join_violation, message_violation, nick_violation, timed_violation, verdict, Rule,
};
pub use vote::{VoteChoice, VoteDecision, VoteKind, VoteSession, MIN_VOTE_PRESENCE};

/// What to do with a user after a rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Remove without a ban entry; the notice, when present, goes to chat.
    Kick(Option<String>),
    /// Ban; the notice, when present, goes to chat.
    Ban(Option<String>),
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// One snapshot of the moderation lists.
///
/// Nick-ban and string-ban entries may start with `*` to switch from exact
/// matching to substring matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lists {
    /// Accounts greeted and auto-approved on join.
    pub approved: Vec<String>,
    pub nick_bans: Vec<String>,
    pub account_bans: Vec<String>,
    pub string_bans: Vec<String>,
}

impl Lists {
    pub fn is_approved(&self, account: &str) -> bool {
        self.approved.iter().any(|entry| entry == account)
    }

    pub fn account_banned(&self, account: &str) -> bool {
        self.account_bans.iter().any(|entry| entry == account)
    }

    /// Exact nick match, or substring match for `*`-prefixed patterns.
    pub fn nick_banned(&self, nick: &str) -> bool {
        self.nick_bans.iter().any(|pattern| {
            if pattern.starts_with('*') {
                nick.contains(pattern.trim_start_matches('*'))
            } else {
                pattern == nick
            }
        })
    }

    /// Exact token match on space-separated words, or substring match on
    /// the whole text for `*`-marked patterns.
    pub fn string_banned(&self, text: &str) -> bool {
        let words: Vec<&str> = text.split(' ').collect();
        self.string_bans.iter().any(|pattern| {
            if pattern.starts_with('*') {
                text.contains(&pattern.replace('*', ""))
            } else {
                words.iter().any(|word| *word == pattern)
            }
        })
    }
}

/// Shared, refreshable list store. Checks read a cloned snapshot so rule
/// evaluation never holds the lock.
#[derive(Debug, Default)]
pub struct RuleLists {
    inner: RwLock<Lists>,
}

impl RuleLists {
    pub fn new(lists: Lists) -> Self {
        Self {
            inner: RwLock::new(lists),
        }
    }

    pub fn snapshot(&self) -> Lists {
        self.inner.read().clone()
    }

    pub fn replace(&self, lists: Lists) {
        *self.inner.write() = lists;
    }
}
