//! Event handling for one session.
//!
//! Fast bookkeeping happens inline; rule pipelines and command dispatch
//! go to the worker pool with owned snapshots. Media frames drive the
//! playlist and the end-of-track timer.

use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::media::Track;
use crate::moderation::{enforce, VoteDecision, VoteKind, VoteSession};
use crate::state::{MessageKind, User};

use super::Bot;

enum TrackEnd {
    Reset,
    Advance(Track),
}

impl Bot {
    pub(crate) async fn handle_event(self: &Arc<Self>, event: Event) {
        match event {
            Event::Joined { client } => self.on_joined(client),
            Event::Userlist(users) => self.on_userlist(users),
            Event::Join(user) => self.on_join(user),
            Event::Nick(user) => self.on_nick(user),
            Event::Quit(user) => match user {
                Some(user) => info!(nick = %user.nick, "User left"),
                None => debug!("Unknown user left"),
            },
            Event::Message {
                user,
                text,
                kind,
                gap,
            } => self.on_message(user, text, kind, gap),
            Event::MediaPlay {
                user,
                item,
                is_response,
            } => match user {
                None => {
                    // A track was already running when we joined.
                    let track = Track::from_item(&item);
                    info!(title = %track.title, offset = item.offset, "Media running at join");
                    let remaining = {
                        let mut playlist = self.playlist();
                        playlist.start("started @ join", track);
                        playlist.play(item.offset as u64)
                    };
                    self.arm_track_timer(remaining);
                }
                Some(user) if !is_response => {
                    if item.offset == 0.0 {
                        let track = Track::from_item(&item);
                        info!(nick = %user.nick, title = %track.title, "Media started");
                        let duration = track.duration;
                        self.playlist().start(&user.nick, track);
                        self.arm_track_timer(duration);
                    } else {
                        debug!(nick = %user.nick, offset = item.offset, "Media seek");
                        let remaining = self.playlist().play(item.offset as u64);
                        self.arm_track_timer(remaining);
                    }
                }
                Some(_) => {}
            },
            Event::MediaPause {
                user,
                item,
                is_response,
            } => match user {
                None => {
                    let track = Track::from_item(&item);
                    info!(title = %track.title, "Media paused at join");
                    let mut playlist = self.playlist();
                    playlist.start("paused @ join", track);
                    playlist.pause(Some(item.offset as u64));
                }
                Some(user) if !is_response => {
                    debug!(nick = %user.nick, offset = item.offset, "Media paused");
                    self.track_timer.cancel();
                    self.playlist().pause(None);
                }
                Some(_) => {}
            },
            Event::MediaStop { user, .. } => {
                // The timer stays armed: a moderator stopping the video
                // does not shorten its slot, so the playlist advances
                // when the stopped track would have ended.
                if let Some(user) = user {
                    debug!(nick = %user.nick, "Media stopped");
                }
                self.playlist().stop();
            }
            Event::Publish(user) => self.on_publish(user).await,
            Event::Unpublish(user) => debug!(nick = %user.nick, "Broadcast ended"),
            Event::PendingModeration(user) => self.on_pending_moderation(user).await,
            Event::StreamAllowed(user) => {
                info!(nick = %user.nick, "Broadcast approved")
            }
            Event::StreamClosed(user) => match user {
                Some(user) => info!(nick = %user.nick, "Broadcast closed"),
                None => debug!("Broadcast closed for unknown user"),
            },
            Event::Banned(entry) => {
                info!(nick = %entry.nick, ban_id = entry.ban_id, "User banned")
            }
            Event::Unbanned(entry) => info!(nick = %entry.nick, "User unbanned"),
            Event::Banlist(entries) => debug!(count = entries.len(), "Banlist received"),
            Event::RoomSettings => debug!("Room profile updated"),
            Event::SysMsg { text } => self.on_sysmsg(text).await,
            Event::ServerError { reason } => warn!(reason = %reason, "Server error"),
            Event::Unrouted { name, payload } => {
                debug!(frame = %name, %payload, "Unrouted frame")
            }
        }
    }

    fn on_joined(self: &Arc<Self>, client: User) {
        match &client.account {
            Some(account) => info!(
                room = %self.config.room.name,
                nick = %client.nick,
                handle = client.handle,
                account = %account,
                "Joined room"
            ),
            None => info!(
                room = %self.config.room.name,
                nick = %client.nick,
                handle = client.handle,
                "Joined room"
            ),
        }

        if client.is_mod() {
            let bot = Arc::clone(self);
            self.pool.submit(
                async move {
                    if let Some(sender) = bot.sender() {
                        if let Err(e) = sender.banlist().await {
                            debug!(error = %e, "Banlist request failed");
                        }
                    }
                    bot.reload_lists().await;
                }
                .boxed(),
            );
        }
    }

    fn on_userlist(&self, users: Vec<User>) {
        let lists = self.lists.snapshot();
        for user in users {
            if user.is_mod() {
                info!(
                    nick = %user.nick,
                    handle = user.handle,
                    account = ?user.account,
                    level = ?user.level,
                    "In room"
                );
            } else if let Some(account) = &user.account {
                if lists.is_approved(account) {
                    self.users().mark_as_approved(user.handle);
                } else {
                    info!(nick = %user.nick, handle = user.handle, account = %account, "In room");
                }
            } else {
                info!(nick = %user.nick, handle = user.handle, "In room");
            }
        }
    }

    fn on_join(self: &Arc<Self>, user: User) {
        info!(
            nick = %user.nick,
            handle = user.handle,
            account = ?user.account,
            "User joined"
        );
        if self.client_is_mod() {
            let bot = Arc::clone(self);
            self.pool
                .submit(async move { enforce::on_join(&bot, user).await }.boxed());
        }
    }

    fn on_nick(self: &Arc<Self>, user: User) {
        info!(old = %user.last_nick(), new = %user.nick, "Nick change");
        if user.is_client {
            return;
        }
        if self.client_is_mod() {
            let bot = Arc::clone(self);
            self.pool
                .submit(async move { enforce::on_nick(&bot, user).await }.boxed());
        }
    }

    fn on_message(
        self: &Arc<Self>,
        user: User,
        text: String,
        kind: MessageKind,
        gap: Option<std::time::Duration>,
    ) {
        if user.is_client {
            return;
        }
        match kind {
            MessageKind::Private => info!(nick = %user.nick, text = %text, "Private message"),
            _ => info!(nick = %user.nick, text = %text, "Message"),
        }
        if !self.client_is_mod() {
            return;
        }

        let prefix = self.config.client.prefix.clone();
        let bot = Arc::clone(self);
        self.pool.submit(
            async move {
                enforce::on_message(&bot, &user, &text, gap).await;
                if text.starts_with(&prefix) {
                    bot.commands().dispatch(&bot, user, kind, &text).await;
                }
            }
            .boxed(),
        );
    }

    async fn on_publish(self: &Arc<Self>, user: User) {
        if user.can_broadcast {
            info!(nick = %user.nick, handle = user.handle, "Broadcasting");
            return;
        }
        if let Some(sender) = self.sender() {
            if let Err(e) = sender.cam_close(user.handle).await {
                debug!(error = %e, "Close send failed");
            }
        }
        self.say(&format!(
            "Auto closing broadcast for: {}:{}",
            user.nick, user.handle
        ))
        .await;
    }

    async fn on_pending_moderation(self: &Arc<Self>, user: User) {
        let approved = user
            .account
            .as_deref()
            .is_some_and(|account| self.lists.snapshot().is_approved(account));

        if approved {
            if let Some(sender) = self.sender() {
                if let Err(e) = sender.cam_approve(user.handle).await {
                    debug!(error = %e, "Approve send failed");
                }
            }
            info!(nick = %user.nick, handle = user.handle, "Auto approved for broadcast");
        } else {
            info!(nick = %user.nick, handle = user.handle, "Waiting for broadcast approval");
        }
    }

    async fn on_sysmsg(self: &Arc<Self>, text: String) {
        info!("[SYSTEM]: {text}");

        if text.contains("banned") && self.client_is_mod() {
            // A ban changed the server-side list; re-request it so ban
            // ids stay usable for unban.
            self.users().clear_banlist();
            if let Some(sender) = self.sender() {
                if let Err(e) = sender.banlist().await {
                    debug!(error = %e, "Banlist request failed");
                }
            }
        } else if text.contains("green room enabled") {
            self.room().green_room = true;
        } else if text.contains("green room disabled") {
            self.room().green_room = false;
        }
    }

    /// End-of-track: advance the playlist, or announce the reset once
    /// the last track runs out.
    pub(crate) async fn track_finished(self: &Arc<Self>) {
        let outcome = {
            let mut playlist = self.playlist();
            if playlist.is_empty() {
                None
            } else {
                match playlist.is_last_track() {
                    Some(true) => {
                        playlist.clear();
                        Some(TrackEnd::Reset)
                    }
                    Some(false) => playlist.next_track().cloned().map(TrackEnd::Advance),
                    None => None,
                }
            }
        };

        match outcome {
            Some(TrackEnd::Reset) => self.say("Resetting playlist.").await,
            Some(TrackEnd::Advance(track)) => {
                debug!(title = %track.title, "Next track");
                self.play_track(&track).await;
            }
            None => {}
        }
    }

    /// Vote deadline: tally, announce, maybe act.
    pub(crate) async fn conclude_vote(self: &Arc<Self>) {
        self.vote_timer.cancel();
        let Some(session) = self.vote.lock().take() else {
            return;
        };

        match session.decide() {
            VoteDecision::NoQuorum { voters, percent } => {
                self.say(&format!(
                    "With {voters} voters ({percent}%) there were not enough votes to make a decision."
                ))
                .await;
            }
            VoteDecision::Rejected { voters, percent } => {
                self.say(&format!(
                    "With {voters} voters ({percent}%) the room has decided NOT to {} {}.",
                    session.kind(),
                    session.target_nick()
                ))
                .await;
            }
            VoteDecision::Carried { voters, percent } => {
                self.say(&format!(
                    "With {voters} voters ({percent}%) the room has decided to {} {}.",
                    session.kind(),
                    session.target_nick()
                ))
                .await;
                self.apply_vote(&session).await;
            }
        }
    }

    /// Act on a carried vote. The target is re-resolved by handle first
    /// and nick second, in case they renamed during the session.
    async fn apply_vote(self: &Arc<Self>, session: &VoteSession) {
        let target = {
            let users = self.users();
            users
                .search(session.target_handle())
                .or_else(|| users.search_by_nick(session.target_nick()))
                .cloned()
        };
        let Some(target) = target else {
            debug!(nick = %session.target_nick(), "Vote target already gone");
            return;
        };
        let Some(sender) = self.sender() else {
            return;
        };

        let result = match session.kind() {
            VoteKind::Ban => sender.ban(target.handle).await,
            VoteKind::Kick => sender.kick(target.handle).await,
            VoteKind::Close => {
                let result = if target.is_broadcasting {
                    sender.cam_close(target.handle).await
                } else {
                    Ok(())
                };
                // Closed by vote also means barred from camming again.
                if let Some(user) = self.users().search_mut(target.handle) {
                    user.can_broadcast = false;
                }
                result
            }
        };
        if let Err(e) = result {
            debug!(error = %e, "Vote action send failed");
        }
    }
}
