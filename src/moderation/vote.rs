//! Vote-to-moderate sessions.
//!
//! A session freezes its electorate when it starts: only users already in
//! the room for five minutes may vote, and each handle votes once. The
//! deadline timer lives with the bot; this type only tallies.

use std::collections::HashSet;
use std::time::Duration;

use crate::state::User;

/// How long a user must have been present to start or join a vote.
pub const MIN_VOTE_PRESENCE: Duration = Duration::from_secs(300);

/// What the room is voting to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Ban,
    Kick,
    /// Close the target's broadcast and bar them from camming again.
    Close,
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            VoteKind::Ban => "ban",
            VoteKind::Kick => "kick",
            VoteKind::Close => "close",
        };
        write!(f, "{word}")
    }
}

/// A single ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    /// Parse an accepted vote word. The accepted spellings are a closed
    /// set; anything else is not a vote.
    pub fn parse(word: &str) -> Option<Self> {
        const YES: [&str; 8] = ["1", "true", "True", "YES", "Yes", "yes", "y", "Y"];
        const NO: [&str; 8] = ["0", "false", "False", "NO", "No", "no", "n", "N"];
        if YES.contains(&word) {
            Some(VoteChoice::Yes)
        } else if NO.contains(&word) {
            Some(VoteChoice::No)
        } else {
            None
        }
    }
}

/// The outcome of a concluded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    /// Less than a third of the electorate voted; no action.
    NoQuorum { voters: usize, percent: usize },
    Carried { voters: usize, percent: usize },
    /// Majority no, or a tie.
    Rejected { voters: usize, percent: usize },
}

/// One active vote session.
#[derive(Debug)]
pub struct VoteSession {
    target_handle: u64,
    target_nick: String,
    kind: VoteKind,
    duration: u64,
    eligible: HashSet<u64>,
    ballots: Vec<(u64, VoteChoice)>,
    voted: HashSet<u64>,
}

impl VoteSession {
    pub fn new(target: &User, kind: VoteKind, duration: u64, eligible: HashSet<u64>) -> Self {
        Self {
            target_handle: target.handle,
            target_nick: target.nick.clone(),
            kind,
            duration,
            eligible,
            ballots: Vec::new(),
            voted: HashSet::new(),
        }
    }

    /// Whether a user has been around long enough to start a session.
    pub fn can_start(user: &User) -> bool {
        may_vote(user.online(), user.is_client)
    }

    /// Snapshot the electorate: everyone present long enough, bot excluded.
    pub fn eligible_voters<'a>(users: impl Iterator<Item = &'a User>) -> HashSet<u64> {
        users
            .filter(|user| may_vote(user.online(), user.is_client))
            .map(|user| user.handle)
            .collect()
    }

    /// Record a ballot. Rejected for handles outside the frozen electorate
    /// and for repeat votes.
    pub fn cast(&mut self, handle: u64, choice: VoteChoice) -> bool {
        if !self.eligible.contains(&handle) || self.voted.contains(&handle) {
            return false;
        }
        self.ballots.push((handle, choice));
        self.voted.insert(handle);
        true
    }

    /// Tally the ballots. Turnout below one third of the electorate means
    /// no decision; among cast ballots a strict yes-majority carries.
    pub fn decide(&self) -> VoteDecision {
        let voters = self.ballots.len();
        if self.eligible.is_empty() {
            return VoteDecision::NoQuorum { voters, percent: 0 };
        }
        let percent = voters * 100 / self.eligible.len();
        if percent < 33 {
            return VoteDecision::NoQuorum { voters, percent };
        }
        let yes = self
            .ballots
            .iter()
            .filter(|(_, choice)| *choice == VoteChoice::Yes)
            .count();
        if yes > voters - yes {
            VoteDecision::Carried { voters, percent }
        } else {
            VoteDecision::Rejected { voters, percent }
        }
    }

    pub fn kind(&self) -> VoteKind {
        self.kind
    }

    pub fn target_handle(&self) -> u64 {
        self.target_handle
    }

    pub fn target_nick(&self) -> &str {
        &self.target_nick
    }

    /// Session length in seconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }
}

fn may_vote(online: Duration, is_client: bool) -> bool {
    !is_client && online > MIN_VOTE_PRESENCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(eligible: &[u64]) -> VoteSession {
        let target = User::new(99, "target");
        VoteSession::new(
            &target,
            VoteKind::Ban,
            120,
            eligible.iter().copied().collect(),
        )
    }

    #[test]
    fn test_choice_words_are_a_closed_set() {
        for word in ["1", "true", "True", "YES", "Yes", "yes", "y", "Y"] {
            assert_eq!(VoteChoice::parse(word), Some(VoteChoice::Yes), "{word}");
        }
        for word in ["0", "false", "False", "NO", "No", "no", "n", "N"] {
            assert_eq!(VoteChoice::parse(word), Some(VoteChoice::No), "{word}");
        }
        for word in ["TRUE", "FALSE", "yep", "nah", "", "2"] {
            assert_eq!(VoteChoice::parse(word), None, "{word}");
        }
    }

    #[test]
    fn test_presence_threshold_is_strict() {
        assert!(may_vote(Duration::from_secs(301), false));
        assert!(!may_vote(Duration::from_secs(300), false));
        assert!(!may_vote(Duration::from_secs(10), false));
        // The bot never votes.
        assert!(!may_vote(Duration::from_secs(3000), true));
    }

    #[test]
    fn test_cast_enforces_electorate_and_single_vote() {
        let mut vote = session(&[1, 2, 3]);
        assert!(vote.cast(1, VoteChoice::Yes));
        assert!(!vote.cast(1, VoteChoice::No));
        assert!(!vote.cast(9, VoteChoice::Yes));
        assert!(vote.cast(2, VoteChoice::No));
        assert_eq!(vote.ballots.len(), 2);
    }

    #[test]
    fn test_decide_carried() {
        let mut vote = session(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        for handle in 1..=3 {
            vote.cast(handle, VoteChoice::Yes);
        }
        vote.cast(4, VoteChoice::No);

        assert_eq!(
            vote.decide(),
            VoteDecision::Carried {
                voters: 4,
                percent: 40
            }
        );
    }

    #[test]
    fn test_decide_tie_is_rejected() {
        let mut vote = session(&[1, 2, 3, 4]);
        vote.cast(1, VoteChoice::Yes);
        vote.cast(2, VoteChoice::Yes);
        vote.cast(3, VoteChoice::No);
        vote.cast(4, VoteChoice::No);

        assert_eq!(
            vote.decide(),
            VoteDecision::Rejected {
                voters: 4,
                percent: 100
            }
        );
    }

    #[test]
    fn test_decide_below_quorum() {
        let mut vote = session(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        vote.cast(1, VoteChoice::Yes);
        vote.cast(2, VoteChoice::Yes);
        vote.cast(3, VoteChoice::Yes);

        assert_eq!(
            vote.decide(),
            VoteDecision::NoQuorum {
                voters: 3,
                percent: 30
            }
        );
    }

    #[test]
    fn test_decide_with_empty_electorate() {
        let vote = session(&[]);
        assert_eq!(
            vote.decide(),
            VoteDecision::NoQuorum {
                voters: 0,
                percent: 0
            }
        );
    }

    #[test]
    fn test_kind_words() {
        assert_eq!(VoteKind::Ban.to_string(), "ban");
        assert_eq!(VoteKind::Kick.to_string(), "kick");
        assert_eq!(VoteKind::Close.to_string(), "close");
    }
}
