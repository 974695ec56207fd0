//! The bot itself: one struct owning room state, providers and the
//! background machinery, driven by a reconnect loop over sessions.
//!
//! Locking discipline: every mutex is taken briefly and released before
//! any await. Event handlers and command handlers work on owned
//! snapshots; anything slow runs on the worker pool.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::commands::CommandSet;
use crate::config::{Config, ModerationConfig};
use crate::error::SessionError;
use crate::events::route;
use crate::media::{Playlist, Track};
use crate::moderation::{RuleLists, VoteSession};
use crate::providers::{
    AntiCaptcha, CaptchaSolver, Directory, FileLists, HttpDirectory, HttpMediaLibrary, ListSource,
    MediaLibrary,
};
use crate::session::{Sender, Session};
use crate::state::{RoomProfile, UserRegistry};
use crate::tasks::{OneShot, WorkerPool};
use crate::text;

mod events;

/// Pause before dialing again after a recoverable failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Runtime-adjustable behavior, seeded from config and flipped by
/// moderator commands. Mutating these never touches the [`Config`] they
/// came from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub moderation: ModerationConfig,
    pub greet: bool,
    pub public_commands: bool,
    /// Current bot-controller key. Replacing it demotes everyone who
    /// used the old one.
    pub key: Option<String>,
}

impl Settings {
    fn from_config(config: &Config) -> Self {
        Self {
            moderation: config.moderation.clone(),
            greet: config.client.greet,
            public_commands: config.client.public_commands,
            key: config.client.key.clone(),
        }
    }
}

/// Session control raised from command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Leave the room and exit.
    Shutdown,
    /// Drop the session and dial again.
    Reconnect,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

pub struct Bot {
    config: Config,
    settings: Mutex<Settings>,
    nick: Mutex<String>,
    users: Mutex<UserRegistry>,
    room: Mutex<RoomProfile>,
    playlist: Mutex<Playlist>,
    lists: RuleLists,
    vote: Mutex<Option<VoteSession>>,
    sender: Mutex<Option<Sender>>,
    control: Mutex<Option<mpsc::Sender<Control>>>,
    directory: Arc<dyn Directory>,
    media: Option<Arc<dyn MediaLibrary>>,
    list_source: Arc<dyn ListSource>,
    captcha: Option<Arc<dyn CaptchaSolver>>,
    pool: WorkerPool,
    track_timer: OneShot,
    vote_timer: OneShot,
    commands: CommandSet,
    started: Instant,
}

impl Bot {
    /// Wire the real providers from config.
    pub fn new(config: Config) -> Arc<Self> {
        let directory: Arc<dyn Directory> =
            Arc::new(HttpDirectory::new(&config.providers.directory));
        let media: Option<Arc<dyn MediaLibrary>> = config.providers.media.as_ref().map(|base| {
            Arc::new(HttpMediaLibrary::new(
                base,
                config.providers.media_key.as_deref(),
            )) as Arc<dyn MediaLibrary>
        });
        let list_source: Arc<dyn ListSource> =
            Arc::new(FileLists::new(&config.room.name, &config.lists));
        let captcha: Option<Arc<dyn CaptchaSolver>> = config
            .providers
            .captcha_key
            .as_ref()
            .map(|key| Arc::new(AntiCaptcha::new(key)) as Arc<dyn CaptchaSolver>);

        Self::with_providers(config, directory, media, list_source, captcha)
    }

    /// Wire explicit providers. This is the seam the integration tests
    /// plug mocks into.
    pub fn with_providers(
        config: Config,
        directory: Arc<dyn Directory>,
        media: Option<Arc<dyn MediaLibrary>>,
        list_source: Arc<dyn ListSource>,
        captcha: Option<Arc<dyn CaptchaSolver>>,
    ) -> Arc<Self> {
        let settings = Settings::from_config(&config);
        let nick = config.room.nick.clone().unwrap_or_else(text::random_nick);
        let pool = WorkerPool::new(config.pool.workers, config.pool.queue);

        Arc::new(Self {
            config,
            settings: Mutex::new(settings),
            nick: Mutex::new(nick),
            users: Mutex::new(UserRegistry::new()),
            room: Mutex::new(RoomProfile::default()),
            playlist: Mutex::new(Playlist::new()),
            lists: RuleLists::default(),
            vote: Mutex::new(None),
            sender: Mutex::new(None),
            control: Mutex::new(None),
            directory,
            media,
            list_source,
            captcha,
            pool,
            track_timer: OneShot::new(),
            vote_timer: OneShot::new(),
            commands: CommandSet::new(),
            started: Instant::now(),
        })
    }

    // ===== Lifecycle =====

    /// Connect and stay connected until an operator shutdown or a fatal
    /// error. Recoverable session ends redial after a short pause; the
    /// playlist survives a redial, everything else per-connection is
    /// reset.
    pub async fn run(self: &Arc<Self>) -> Result<(), SessionError> {
        loop {
            let nick = self.nick();
            let session = match Session::connect(
                &self.config,
                &nick,
                self.directory.as_ref(),
                self.captcha.clone(),
            )
            .await
            {
                Ok(session) => session,
                Err(e) if e.should_reconnect() => {
                    warn!(error = %e, "Connect failed, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let end = self.run_session(session).await;
            self.teardown();

            match end {
                Ok(SessionEnd::Shutdown) => {
                    info!("Shutting down");
                    return Ok(());
                }
                Ok(SessionEnd::Reconnect) => info!("Rejoining room"),
                Err(e) if e.should_reconnect() => {
                    warn!(error = %e, "Session ended, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_session(self: &Arc<Self>, mut session: Session) -> Result<SessionEnd, SessionError> {
        let (control_tx, mut control_rx) = mpsc::channel(4);
        *self.sender.lock() = Some(session.sender());
        *self.control.lock() = Some(control_tx);

        loop {
            tokio::select! {
                frame = session.next() => {
                    let frame = frame?;
                    let event = {
                        let mut users = self.users.lock();
                        let mut room = self.room.lock();
                        route(&frame, &mut users, &mut room)
                    };
                    match event {
                        Ok(Some(event)) => self.handle_event(event).await,
                        Ok(None) => {}
                        Err(e) => debug!(error = %e, "Dropping malformed frame"),
                    }
                }
                Some(control) = control_rx.recv() => match control {
                    Control::Shutdown => return Ok(SessionEnd::Shutdown),
                    Control::Reconnect => return Ok(SessionEnd::Reconnect),
                },
            }
        }
    }

    /// Per-connection reset. Queued pool jobs and armed timers belong to
    /// the dead session and are invalidated here.
    fn teardown(&self) {
        *self.sender.lock() = None;
        *self.control.lock() = None;
        self.pool.bump_epoch();
        self.track_timer.cancel();
        self.vote_timer.cancel();
        *self.vote.lock() = None;
        let mut users = self.users.lock();
        users.clear();
        users.clear_banlist();
    }

    // ===== State access =====

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock()
    }

    pub fn users(&self) -> MutexGuard<'_, UserRegistry> {
        self.users.lock()
    }

    pub fn room(&self) -> MutexGuard<'_, RoomProfile> {
        self.room.lock()
    }

    pub fn playlist(&self) -> MutexGuard<'_, Playlist> {
        self.playlist.lock()
    }

    pub fn lists(&self) -> &RuleLists {
        &self.lists
    }

    pub fn vote(&self) -> MutexGuard<'_, Option<VoteSession>> {
        self.vote.lock()
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn media(&self) -> Option<&Arc<dyn MediaLibrary>> {
        self.media.as_ref()
    }

    pub fn list_source(&self) -> &Arc<dyn ListSource> {
        &self.list_source
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// The current nick, which may differ from config after a `nick`
    /// command or a server-assigned guest nick.
    pub fn nick(&self) -> String {
        self.nick.lock().clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// A sender for the live session, if there is one.
    pub fn sender(&self) -> Option<Sender> {
        self.sender.lock().clone()
    }

    pub fn control(&self) -> Option<mpsc::Sender<Control>> {
        self.control.lock().clone()
    }

    pub fn client_is_mod(&self) -> bool {
        self.users.lock().client().is_some_and(|client| client.is_mod())
    }

    // ===== Chat output =====

    /// Room chat message. Send failures on a dying session only log.
    pub async fn say(&self, text: &str) {
        if let Some(sender) = self.sender() {
            if let Err(e) = sender.msg(text).await {
                debug!(error = %e, "Chat send failed");
            }
        }
    }

    /// Private message to one user.
    pub async fn say_private(&self, handle: u64, text: &str) {
        if let Some(sender) = self.sender() {
            if let Err(e) = sender.pvtmsg(handle, text).await {
                debug!(error = %e, "Private send failed");
            }
        }
    }

    /// Room notice delayed by a small random amount, so automated
    /// reactions do not all land in the same instant as their trigger.
    pub async fn notify(&self, text: &str) {
        tokio::time::sleep(self.notify_delay()).await;
        self.say(text).await;
    }

    fn notify_delay(&self) -> Duration {
        let max = self.settings().moderation.max_notify_delay.max(0.5);
        let secs = rand::thread_rng().gen_range(0.5..=max);
        Duration::from_secs_f64((secs * 100.0).round() / 100.0)
    }

    // ===== Shared operations =====

    /// Refresh the moderation lists from the backing store.
    pub async fn reload_lists(&self) {
        match self.list_source.load().await {
            Ok(lists) => {
                debug!(
                    approved = lists.approved.len(),
                    nicks = lists.nick_bans.len(),
                    accounts = lists.account_bans.len(),
                    strings = lists.string_bans.len(),
                    "Lists loaded"
                );
                self.lists.replace(lists);
            }
            Err(e) => warn!(error = %e, "List reload failed"),
        }
    }

    /// Fetch an account profile and attach it to the user's record.
    /// Lookup failures only log; a profile is never required.
    pub async fn fetch_profile(&self, handle: u64, account: &str) {
        match self.directory.account_profile(account).await {
            Ok(Some(profile)) => {
                if let Some(user) = self.users.lock().search_mut(handle) {
                    user.profile = Some(profile);
                }
            }
            Ok(None) => {}
            Err(e) => debug!(account = %account, error = %e, "Profile lookup failed"),
        }
    }

    /// Pick a new nick, or a random one when `None`, and announce it.
    pub async fn change_nick(&self, nick: Option<String>) {
        let nick = nick.unwrap_or_else(text::random_nick);
        *self.nick.lock() = nick.clone();
        if let Some(sender) = self.sender() {
            if let Err(e) = sender.nick(&nick).await {
                debug!(error = %e, "Nick send failed");
            }
        }
    }

    /// Announce `track` from the start and arm the end-of-track timer.
    pub async fn play_track(self: &Arc<Self>, track: &Track) {
        if let Some(sender) = self.sender() {
            if let Err(e) = sender
                .media_play(&track.id, track.duration as f64, &track.title, 0.0)
                .await
            {
                debug!(error = %e, "Play send failed");
            }
        }
        self.arm_track_timer(track.duration);
    }

    /// Arm the end-of-track timer. The callback carries the connection
    /// epoch it was armed under and does nothing if a reconnect happened
    /// in between.
    pub(crate) fn arm_track_timer(self: &Arc<Self>, secs: u64) {
        let bot = Arc::clone(self);
        let epoch = self.pool.epoch();
        self.track_timer.arm(
            Duration::from_secs(secs),
            async move {
                if bot.pool.epoch() == epoch {
                    bot.track_finished().await;
                }
            }
            .boxed(),
        );
    }

    /// Stop waiting for the current track to end. Only local stop and
    /// pause do this; a remote stop leaves the timer armed.
    pub(crate) fn cancel_track_timer(&self) {
        self.track_timer.cancel();
    }

    /// Store a fresh vote session and arm its deadline.
    pub(crate) fn begin_vote(self: &Arc<Self>, session: VoteSession) {
        let duration = session.duration();
        *self.vote.lock() = Some(session);

        let bot = Arc::clone(self);
        let epoch = self.pool.epoch();
        self.vote_timer.arm(
            Duration::from_secs(duration),
            async move {
                if bot.pool.epoch() == epoch {
                    bot.conclude_vote().await;
                }
            }
            .boxed(),
        );
    }

    /// Drop any active vote session along with its deadline.
    pub(crate) fn cancel_vote(&self) -> Option<VoteSession> {
        self.vote_timer.cancel();
        self.vote.lock().take()
    }
}
