//! Room membership and ban registry for one connection.
//!
//! Cleared and rebuilt on every reconnect; handles are only meaningful
//! within a single session. All mutation goes through here so join/quit
//! ordering stays coherent with event dispatch.

use emcee_proto::payload::{BanEntryPayload, UserPayload};
use std::collections::HashMap;

use super::user::{BannedUser, Profile, User, UserLevel};

/// Tracks everyone in the room plus the server's ban registry.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<u64, User>,
    client_handle: Option<u64>,
    banlist: HashMap<u64, BannedUser>,
    /// Results of the last banlist search, indexed by the forgive command.
    ban_search: Vec<BannedUser>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user from a payload. Idempotent by handle: an existing record
    /// is returned unchanged so in-session mutations survive a repeated
    /// join or userlist entry. `is_client` remembers the handle as self.
    pub fn add(&mut self, payload: &UserPayload, is_client: bool) -> &User {
        if is_client {
            self.client_handle = Some(payload.handle);
        }
        let user = self
            .users
            .entry(payload.handle)
            .or_insert_with(|| User::from_payload(payload));
        user.is_client = is_client || user.is_client;
        &*user
    }

    /// Rename a user, keeping nick history. None when the handle is unknown.
    pub fn change_nick(&mut self, handle: u64, nick: &str) -> Option<&User> {
        let user = self.users.get_mut(&handle)?;
        user.set_nick(nick);
        Some(&*user)
    }

    /// Remove and return a user. Absent handles are not an error.
    pub fn delete(&mut self, handle: u64) -> Option<User> {
        self.users.remove(&handle)
    }

    /// Attach a directory profile to an existing record.
    pub fn attach_profile(&mut self, handle: u64, profile: Profile) {
        if let Some(user) = self.users.get_mut(&handle) {
            user.profile = Some(profile);
        }
    }

    /// Set a user's level to Approved. Keeps owner+mod exempt as written;
    /// `!(owner || mod)` may be the intended reading, which would also
    /// exempt plain moderators from the downgrade.
    pub fn mark_as_approved(&mut self, handle: u64) {
        if let Some(user) = self.users.get_mut(&handle) {
            let is_owner = user.level == UserLevel::Owner;
            if !is_owner || !user.is_mod() {
                user.level = UserLevel::Approved;
            }
        }
    }

    pub fn search(&self, handle: u64) -> Option<&User> {
        self.users.get(&handle)
    }

    pub fn search_mut(&mut self, handle: u64) -> Option<&mut User> {
        self.users.get_mut(&handle)
    }

    /// First user with this exact nick. Nicks are not unique; order among
    /// duplicates is unspecified.
    pub fn search_by_nick(&self, nick: &str) -> Option<&User> {
        self.users.values().find(|user| user.nick == nick)
    }

    pub fn search_by_account(&self, account: &str) -> Option<&User> {
        self.users
            .values()
            .find(|user| user.account.as_deref() == Some(account))
    }

    /// All users whose nick contains the given fragment, ordered by handle.
    pub fn search_containing(&self, part: &str) -> Vec<&User> {
        let mut matches: Vec<&User> = self
            .users
            .values()
            .filter(|user| user.nick.contains(part))
            .collect();
        matches.sort_by_key(|user| user.handle);
        matches
    }

    /// The bot's own user record, when joined.
    pub fn client(&self) -> Option<&User> {
        self.client_handle.and_then(|handle| self.users.get(&handle))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn mods(&self) -> Vec<&User> {
        self.users.values().filter(|user| user.is_mod()).collect()
    }

    pub fn signed_in(&self) -> Vec<&User> {
        self.users
            .values()
            .filter(|user| user.account.is_some())
            .collect()
    }

    pub fn lurkers(&self) -> Vec<&User> {
        self.users.values().filter(|user| user.is_lurker).collect()
    }

    /// Ordinary occupants: neither moderators nor lurkers.
    pub fn norms(&self) -> Vec<&User> {
        self.users
            .values()
            .filter(|user| !user.is_mod() && !user.is_lurker)
            .collect()
    }

    pub fn broadcasters(&self) -> Vec<&User> {
        self.users
            .values()
            .filter(|user| user.is_broadcasting)
            .collect()
    }

    /// Forget everyone, the client handle included. Run on disconnect.
    pub fn clear(&mut self) {
        self.users.clear();
        self.client_handle = None;
    }

    // ===== Ban registry =====

    /// Record a ban registry entry. Idempotent by ban id.
    pub fn add_banned(&mut self, payload: &BanEntryPayload) -> &BannedUser {
        &*self
            .banlist
            .entry(payload.id)
            .or_insert_with(|| BannedUser::from_payload(payload))
    }

    pub fn delete_banned(&mut self, ban_id: u64) -> Option<BannedUser> {
        self.banlist.remove(&ban_id)
    }

    pub fn clear_banlist(&mut self) {
        self.banlist.clear();
        self.ban_search.clear();
    }

    pub fn search_banlist(&self, ban_id: u64) -> Option<&BannedUser> {
        self.banlist.get(&ban_id)
    }

    /// Most recent ban carrying this nick. Ban ids increase monotonically,
    /// so highest id wins among duplicates.
    pub fn search_banlist_by_nick(&self, nick: &str) -> Option<&BannedUser> {
        self.banlist
            .values()
            .filter(|banned| banned.nick == nick)
            .max_by_key(|banned| banned.ban_id)
    }

    pub fn search_banlist_by_account(&self, account: &str) -> Option<&BannedUser> {
        self.banlist
            .values()
            .filter(|banned| banned.account.as_deref() == Some(account))
            .max_by_key(|banned| banned.ban_id)
    }

    /// All bans whose nick contains the fragment, ordered by ban id.
    pub fn search_banlist_containing(&self, part: &str) -> Vec<&BannedUser> {
        let mut matches: Vec<&BannedUser> = self
            .banlist
            .values()
            .filter(|banned| banned.nick.contains(part))
            .collect();
        matches.sort_by_key(|banned| banned.ban_id);
        matches
    }

    /// All bans issued by the given moderator nick, ordered by ban id.
    pub fn search_banlist_by_moderator(&self, nick: &str) -> Vec<&BannedUser> {
        let mut matches: Vec<&BannedUser> = self
            .banlist
            .values()
            .filter(|banned| banned.banned_by == nick)
            .collect();
        matches.sort_by_key(|banned| banned.ban_id);
        matches
    }

    /// Bans that carry an account name.
    pub fn banned_accounts(&self) -> Vec<&BannedUser> {
        let mut matches: Vec<&BannedUser> = self
            .banlist
            .values()
            .filter(|banned| banned.has_account())
            .collect();
        matches.sort_by_key(|banned| banned.ban_id);
        matches
    }

    /// The newest ban on record, by id.
    pub fn last_banned(&self) -> Option<&BannedUser> {
        self.banlist.values().max_by_key(|banned| banned.ban_id)
    }

    /// Every ban on record, ordered by ban id.
    pub fn banlist(&self) -> Vec<&BannedUser> {
        let mut all: Vec<&BannedUser> = self.banlist.values().collect();
        all.sort_by_key(|banned| banned.ban_id);
        all
    }

    pub fn set_ban_search(&mut self, results: Vec<BannedUser>) {
        self.ban_search = results;
    }

    pub fn ban_search(&self) -> &[BannedUser] {
        &self.ban_search
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_payload(handle: u64, nick: &str) -> UserPayload {
        serde_json::from_str(&format!(r#"{{"handle": {handle}, "nick": "{nick}"}}"#)).unwrap()
    }

    fn mod_payload(handle: u64, nick: &str) -> UserPayload {
        serde_json::from_str(&format!(
            r#"{{"handle": {handle}, "nick": "{nick}", "mod": true}}"#
        ))
        .unwrap()
    }

    fn ban_payload(id: u64, nick: &str, account: &str) -> BanEntryPayload {
        serde_json::from_str(&format!(
            r#"{{"id": {id}, "nick": "{nick}", "username": "{account}", "moderator": "harls"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = UserRegistry::new();
        registry.add(&user_payload(1, "original"), false);
        registry.search_mut(1).unwrap().set_nick("renamed");

        let user = registry.add(&user_payload(1, "original"), false);
        assert_eq!(user.nick, "renamed");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_delete_search() {
        let mut registry = UserRegistry::new();
        registry.add(&user_payload(7, "someone"), false);
        assert!(registry.search(7).is_some());

        let removed = registry.delete(7).unwrap();
        assert_eq!(removed.nick, "someone");
        assert!(registry.search(7).is_none());
        assert!(registry.delete(7).is_none());
    }

    #[test]
    fn test_client_handle_tracking() {
        let mut registry = UserRegistry::new();
        registry.add(&user_payload(2, "other"), false);
        registry.add(&mod_payload(1, "emcee"), true);

        let client = registry.client().unwrap();
        assert_eq!(client.handle, 1);
        assert!(client.is_client);
        assert!(client.is_mod());

        registry.clear();
        assert!(registry.client().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_change_nick_unknown_handle() {
        let mut registry = UserRegistry::new();
        assert!(registry.change_nick(99, "ghost").is_none());

        registry.add(&user_payload(1, "before"), false);
        let user = registry.change_nick(1, "after").unwrap();
        assert_eq!(user.nick, "after");
        assert_eq!(user.last_nick(), "before");
    }

    #[test]
    fn test_mark_as_approved_exemption_as_written() {
        let mut registry = UserRegistry::new();
        let owner: UserPayload =
            serde_json::from_str(r#"{"handle": 1, "nick": "boss", "owner": true, "mod": true}"#)
                .unwrap();
        registry.add(&owner, false);
        registry.add(&mod_payload(2, "deputy"), false);
        registry.add(&user_payload(3, "guest"), false);

        registry.mark_as_approved(1);
        registry.mark_as_approved(2);
        registry.mark_as_approved(3);
        registry.mark_as_approved(99);

        assert_eq!(registry.search(1).unwrap().level, UserLevel::Owner);
        // A plain moderator is re-leveled by the check as written.
        assert_eq!(registry.search(2).unwrap().level, UserLevel::Approved);
        assert_eq!(registry.search(3).unwrap().level, UserLevel::Approved);
    }

    #[test]
    fn test_views() {
        let mut registry = UserRegistry::new();
        registry.add(&mod_payload(1, "deputy"), false);
        let signed: UserPayload =
            serde_json::from_str(r#"{"handle": 2, "nick": "member", "username": "member1"}"#)
                .unwrap();
        registry.add(&signed, false);
        let lurker: UserPayload =
            serde_json::from_str(r#"{"handle": 3, "nick": "shadow", "lurker": true}"#).unwrap();
        registry.add(&lurker, false);

        assert_eq!(registry.mods().len(), 1);
        assert_eq!(registry.signed_in().len(), 1);
        assert_eq!(registry.lurkers().len(), 1);
        // Mods and lurkers are excluded; the signed-in member remains.
        assert_eq!(registry.norms().len(), 1);
        assert!(registry.broadcasters().is_empty());

        registry.search_mut(3).unwrap().is_broadcasting = true;
        assert_eq!(registry.broadcasters().len(), 1);
    }

    #[test]
    fn test_banlist_idempotent_and_last_banned() {
        let mut registry = UserRegistry::new();
        registry.add_banned(&ban_payload(5, "early", ""));
        registry.add_banned(&ban_payload(9, "late", "late1"));
        registry.add_banned(&ban_payload(7, "middle", ""));
        registry.add_banned(&ban_payload(5, "other", ""));

        assert_eq!(registry.banlist().len(), 3);
        assert_eq!(registry.search_banlist(5).unwrap().nick, "early");
        assert_eq!(registry.last_banned().unwrap().ban_id, 9);
        assert_eq!(registry.banned_accounts().len(), 1);
    }

    #[test]
    fn test_search_banlist_by_nick_prefers_highest_id() {
        let mut registry = UserRegistry::new();
        registry.add_banned(&ban_payload(3, "repeat", ""));
        registry.add_banned(&ban_payload(8, "repeat", ""));

        assert_eq!(registry.search_banlist_by_nick("repeat").unwrap().ban_id, 8);
        assert!(registry.search_banlist_by_nick("unknown").is_none());

        let containing = registry.search_banlist_containing("rep");
        assert_eq!(containing.len(), 2);
        assert_eq!(containing[0].ban_id, 3);
    }

    #[test]
    fn test_delete_banned_and_clear() {
        let mut registry = UserRegistry::new();
        registry.add_banned(&ban_payload(4, "gone", ""));
        registry.set_ban_search(vec![BannedUser::from_payload(&ban_payload(4, "gone", ""))]);

        let removed = registry.delete_banned(4).unwrap();
        assert_eq!(removed.nick, "gone");
        assert!(registry.delete_banned(4).is_none());

        registry.add_banned(&ban_payload(6, "other", ""));
        registry.clear_banlist();
        assert!(registry.banlist().is_empty());
        assert!(registry.ban_search().is_empty());
    }
}
