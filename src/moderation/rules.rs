//! Pure rule checks over a user, a lists snapshot and the toggles.
//!
//! Nothing here sends anything; the enforcement layer turns verdicts into
//! kick/ban frames and chat notices.

use std::time::Duration;

use crate::config::ModerationConfig;
use crate::state::User;

use super::{Lists, Verdict};

/// New messages arriving faster than this are treated as flooding.
const TIMED_LIMIT: Duration = Duration::from_millis(400);

/// Which rule a user tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Account,
    Guest,
    Lurker,
    Vip,
    Nick,
    Message,
    /// Message timing; always a silent ban.
    Timed,
}

impl Rule {
    fn reason(self) -> Option<&'static str> {
        match self {
            Rule::Account => Some("account not allowed"),
            Rule::Guest => Some("guests not allowed"),
            Rule::Lurker => Some("lurkers not allowed"),
            Rule::Vip => Some("vip mode enabled"),
            Rule::Nick => Some("nick not allowed"),
            Rule::Message | Rule::Timed => None,
        }
    }
}

/// First rule a joining user violates, or None to let them stay.
///
/// Callers only run this for users who are neither moderators nor on the
/// approved list; those skip checks entirely. Signed-in users are never
/// checked as lurkers.
pub fn join_violation(config: &ModerationConfig, lists: &Lists, user: &User) -> Option<Rule> {
    match &user.account {
        Some(account) => {
            if lists.account_banned(account) {
                Some(Rule::Account)
            } else if config.vip_mode {
                Some(Rule::Vip)
            } else if lists.nick_banned(&user.nick) {
                Some(Rule::Nick)
            } else {
                None
            }
        }
        None => {
            if !config.allow_guests {
                Some(Rule::Guest)
            } else if user.is_lurker && !config.allow_lurkers {
                Some(Rule::Lurker)
            } else if config.vip_mode {
                Some(Rule::Vip)
            } else if lists.nick_banned(&user.nick) {
                Some(Rule::Nick)
            } else {
                None
            }
        }
    }
}

/// Re-check after a nick change. Moderators are never checked.
pub fn nick_violation(lists: &Lists, user: &User) -> Option<Rule> {
    if !user.is_mod() && lists.nick_banned(&user.nick) {
        return Some(Rule::Nick);
    }
    None
}

/// True when a message lands faster than the flood limit, either right
/// after joining or right after the sender's previous message.
pub fn timed_violation(config: &ModerationConfig, online: Duration, gap: Option<Duration>) -> bool {
    if !config.timed_checks {
        return false;
    }
    if online < TIMED_LIMIT {
        return true;
    }
    matches!(gap, Some(gap) if gap < TIMED_LIMIT)
}

/// Rule a message trips, timing first. Callers skip moderators.
pub fn message_violation(
    config: &ModerationConfig,
    lists: &Lists,
    text: &str,
    online: Duration,
    gap: Option<Duration>,
) -> Option<Rule> {
    if timed_violation(config, online, gap) {
        Some(Rule::Timed)
    } else if lists.string_banned(text) {
        Some(Rule::Message)
    } else {
        None
    }
}

/// Turn a tripped rule into an action. Every rule honors the global
/// kick-instead-of-ban toggle except timing, which always bans. Notices
/// are only attached while ban notifications are enabled.
pub fn verdict(config: &ModerationConfig, rule: Rule) -> Verdict {
    if rule == Rule::Timed {
        return Verdict::Ban(None);
    }
    let label = if config.kick_as_autoban {
        "Auto-Kicked"
    } else {
        "Auto-Banned"
    };
    let notice = config.notify_on_ban.then(|| match rule.reason() {
        Some(reason) => format!("{label}: ({reason})"),
        None => label.to_string(),
    });
    if config.kick_as_autoban {
        Verdict::Kick(notice)
    } else {
        Verdict::Ban(notice)
    }
}
