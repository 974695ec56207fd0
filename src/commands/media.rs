//! Playlist and playback commands.
//!
//! The playlist lock is taken once per command for the bookkeeping and
//! released before anything goes out on the wire.

use async_trait::async_trait;
use tracing::warn;

use crate::error::SessionError;
use crate::media::Track;
use crate::state::UserLevel;
use crate::text;

use super::{Command, Context};

fn link(track: &Track) -> String {
    format!("https://youtu.be/{}", track.id)
}

/// `play <query>`: search, then start or queue the result. A query
/// carrying `list=` is treated as a playlist and imported whole.
pub struct Play;

#[async_trait]
impl Command for Play {
    fn name(&self) -> &'static str {
        "play"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let query = ctx.args();
        if query.is_empty() {
            return ctx.respond("Please specify youtube title or link.").await;
        }
        let Some(library) = ctx.bot.media() else {
            return ctx.respond("Media search is not available.").await;
        };

        if query.contains("list=") {
            let tracks = library.search_list(query, 50).await;
            if tracks.is_empty() {
                warn!(query = %query, "No playlist results");
                return ctx.respond(&format!("No video(s) found: {query}")).await;
            }

            let (count, start) = {
                let mut playlist = ctx.bot.playlist();
                let count = tracks.len();
                playlist.add_list(&ctx.user.nick, tracks);
                let start = if playlist.has_active_track() {
                    None
                } else {
                    playlist.next_track().cloned()
                };
                (count, start)
            };
            ctx.respond(&format!("Added {count} tracks from youtube playlist."))
                .await?;
            if let Some(track) = start {
                ctx.bot.play_track(&track).await;
            }
            return Ok(());
        }

        let found = if text::is_media_id(query) {
            library.by_id(query).await
        } else {
            library.search(query).await
        };
        let Some(track) = found else {
            warn!(query = %query, "No results");
            return ctx.respond(&format!("No video(s) found: {query}")).await;
        };
        if !track.embeddable {
            return ctx.respond("This track is not embeddable.").await;
        }

        let queued_at = {
            let mut playlist = ctx.bot.playlist();
            if playlist.has_active_track() {
                playlist.add(&ctx.user.nick, track.clone());
                Some(playlist.len() - 1)
            } else {
                playlist.start(&ctx.user.nick, track.clone());
                None
            }
        };
        match queued_at {
            Some(index) => {
                ctx.respond(&format!(
                    "({}) {} {}",
                    index,
                    track.title,
                    text::format_time(track.duration)
                ))
                .await
            }
            None => {
                ctx.bot.play_track(&track).await;
                Ok(())
            }
        }
    }
}

/// `track`: what is playing right now.
pub struct NowPlaying;

#[async_trait]
impl Command for NowPlaying {
    fn name(&self) -> &'static str {
        "track"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let reply = {
            let playlist = ctx.bot.playlist();
            match (playlist.has_active_track(), playlist.track_index(), playlist.track()) {
                (true, Some(index), Some(track)) => format!(
                    "({}) {} {}\n{}",
                    index,
                    track.title,
                    text::format_time(track.duration),
                    link(track)
                ),
                _ => "No track playing.".to_string(),
            }
        };
        ctx.respond(&reply).await
    }
}

/// `next`: peek at the upcoming track without advancing.
pub struct NextUp;

#[async_trait]
impl Command for NextUp {
    fn name(&self) -> &'static str {
        "next"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let reply = {
            let playlist = ctx.bot.playlist();
            match playlist.is_last_track() {
                None => "The playlist is empty.".to_string(),
                Some(true) => "This is the last track.".to_string(),
                Some(false) => match playlist.next_track_info() {
                    Some((index, track)) => format!(
                        "({}) {} {}",
                        index,
                        track.title,
                        text::format_time(track.duration)
                    ),
                    None => "The playlist is empty.".to_string(),
                },
            }
        };
        ctx.respond(&reply).await
    }
}

/// `queue`: playlist length and what is still unplayed.
pub struct QueueStatus;

#[async_trait]
impl Command for QueueStatus {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let reply = {
            let playlist = ctx.bot.playlist();
            if playlist.is_empty() {
                "The playlist is empty.".to_string()
            } else {
                format!(
                    "{} items in the playlist, {} still in queue.",
                    playlist.len(),
                    playlist.queued()
                )
            }
        };
        ctx.respond(&reply).await
    }
}

/// `who`: who queued the current track, and how long ago.
pub struct WhoPlays;

#[async_trait]
impl Command for WhoPlays {
    fn name(&self) -> &'static str {
        "who"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Default
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let reply = {
            let playlist = ctx.bot.playlist();
            if playlist.has_active_track() {
                playlist.track().map(|track| {
                    format!(
                        "{} requested this track {} ago.",
                        track.owner,
                        text::format_time(track.requested_ago())
                    )
                })
            } else {
                None
            }
        };
        match reply {
            Some(reply) => ctx.respond(&reply).await,
            None => ctx.respond("No track playing.").await,
        }
    }
}

/// `skip`: jump to the next track.
pub struct Skip;

#[async_trait]
impl Command for Skip {
    fn name(&self) -> &'static str {
        "skip"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        enum Outcome {
            Empty,
            Last,
            Advance(Track),
        }
        let outcome = {
            let mut playlist = ctx.bot.playlist();
            match playlist.is_last_track() {
                None => Outcome::Empty,
                Some(true) => Outcome::Last,
                Some(false) => match playlist.next_track().cloned() {
                    Some(track) => Outcome::Advance(track),
                    None => Outcome::Empty,
                },
            }
        };
        match outcome {
            Outcome::Empty => ctx.respond("No tunes to skip. The playlist is empty.").await,
            Outcome::Last => ctx.respond("This is the last track in the playlist.").await,
            Outcome::Advance(track) => {
                ctx.bot.play_track(&track).await;
                Ok(())
            }
        }
    }
}

/// `delete <i[,j]|i-j>`: remove tracks by index list or inclusive range.
pub struct Delete;

#[async_trait]
impl Command for Delete {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        if ctx.bot.playlist().is_empty() {
            return ctx.respond("The playlist is empty.").await;
        }
        let args = ctx.args();
        if args.is_empty() {
            return ctx.respond("No indexes provided.").await;
        }
        let Some((indexes, by_range)) = parse_indexes(args) else {
            warn!(input = %args, "Bad delete indexes");
            return Ok(());
        };
        if indexes.is_empty() {
            return Ok(());
        }

        let summary = ctx.bot.playlist().delete(&indexes, by_range);
        match summary {
            None => ctx.respond("Nothing was deleted.").await,
            Some(summary) if by_range => {
                let first = summary.deleted.first().copied().unwrap_or(0);
                let last = summary.deleted.last().copied().unwrap_or(first);
                ctx.respond(&format!("Deleted from index: {first} to index: {last}"))
                    .await
            }
            Some(summary) if summary.deleted.len() == 1 => {
                ctx.respond(&format!("Deleted track at index: {}", summary.deleted[0]))
                    .await
            }
            Some(summary) => {
                let joined = summary
                    .deleted
                    .iter()
                    .map(|index| index.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                ctx.respond(&format!("Deleted tracks at index: {joined}")).await
            }
        }
    }
}

/// Index arguments: `i,j,k` deletes a set, `i-j` an inclusive range.
/// A backwards range resolves to nothing; unparsable input to `None`.
fn parse_indexes(input: &str) -> Option<(Vec<usize>, bool)> {
    if let Some((a, b)) = input.split_once('-') {
        let start = a.trim().parse::<usize>().ok()?;
        let end = b.trim().parse::<usize>().ok()?;
        if start > end {
            return Some((Vec::new(), false));
        }
        if start == end {
            return Some((vec![start], false));
        }
        return Some((vec![start, end], true));
    }
    let mut indexes = Vec::new();
    for part in input.split(',') {
        indexes.push(part.trim().parse::<usize>().ok()?);
    }
    Some((indexes, false))
}

/// `replay`: restart the current track from the top.
pub struct Replay;

#[async_trait]
impl Command for Replay {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let track = ctx.bot.playlist().replay().cloned();
        if let Some(track) = track {
            ctx.bot.play_track(&track).await;
        }
        Ok(())
    }
}

/// `resume`: pick a paused track back up where it stopped.
pub struct Resume;

#[async_trait]
impl Command for Resume {
    fn name(&self) -> &'static str {
        "resume"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let resumed = {
            let mut playlist = ctx.bot.playlist();
            if playlist.track().is_none() || !playlist.is_paused() {
                None
            } else {
                let offset = playlist.elapsed();
                let remaining = playlist.play(offset);
                playlist.track().cloned().map(|track| (track, offset, remaining))
            }
        };
        if let Some((track, offset, remaining)) = resumed {
            if let Some(sender) = ctx.bot.sender() {
                sender
                    .media_play(&track.id, track.duration as f64, &track.title, offset as f64)
                    .await?;
            }
            ctx.bot.arm_track_timer(remaining);
        }
        Ok(())
    }
}

/// `pause`: freeze playback, keeping the spot for `resume`.
pub struct Pause;

#[async_trait]
impl Command for Pause {
    fn name(&self) -> &'static str {
        "pause"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let paused = {
            let mut playlist = ctx.bot.playlist();
            match playlist.track().cloned() {
                None => None,
                Some(track) => {
                    playlist.pause(None);
                    Some((track, playlist.elapsed()))
                }
            }
        };
        if let Some((track, elapsed)) = paused {
            ctx.bot.cancel_track_timer();
            if let Some(sender) = ctx.bot.sender() {
                sender
                    .media_pause(&track.id, track.duration as f64, elapsed as f64)
                    .await?;
            }
        }
        Ok(())
    }
}

/// `seek <2m58s>`: jump within the current track.
pub struct Seek;

#[async_trait]
impl Command for Seek {
    fn name(&self) -> &'static str {
        "seek"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        enum Outcome {
            Paused(Track, u64),
            Playing(Track, u64, u64),
        }
        let point = ctx.args();
        if !point.contains(&['h', 'm', 's'][..]) {
            return Ok(());
        }
        let offset = text::parse_hms(point);
        if offset == 0 {
            return ctx.respond("Invalid seek time.").await;
        }

        let outcome = {
            let mut playlist = ctx.bot.playlist();
            match playlist.track().cloned() {
                Some(track) if offset < track.duration => {
                    if playlist.is_paused() {
                        playlist.pause(Some(offset));
                        Some(Outcome::Paused(track, offset))
                    } else {
                        let remaining = playlist.play(offset);
                        Some(Outcome::Playing(track, offset, remaining))
                    }
                }
                _ => None,
            }
        };
        match outcome {
            Some(Outcome::Paused(track, offset)) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender
                        .media_pause(&track.id, track.duration as f64, offset as f64)
                        .await?;
                }
            }
            Some(Outcome::Playing(track, offset, remaining)) => {
                if let Some(sender) = ctx.bot.sender() {
                    sender
                        .media_play(&track.id, track.duration as f64, &track.title, offset as f64)
                        .await?;
                }
                ctx.bot.arm_track_timer(remaining);
            }
            None => {}
        }
        Ok(())
    }
}

/// `stop`: stop playback. This is the one path that also cancels the
/// end-of-track timer; a stop from another moderator leaves it armed.
pub struct Stop;

#[async_trait]
impl Command for Stop {
    fn name(&self) -> &'static str {
        "stop"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let stopped = {
            let mut playlist = ctx.bot.playlist();
            if !playlist.has_active_track() {
                None
            } else {
                let elapsed = playlist.elapsed();
                let track = playlist.track().cloned();
                playlist.stop();
                track.map(|track| (track, elapsed))
            }
        };
        if let Some((track, elapsed)) = stopped {
            ctx.bot.cancel_track_timer();
            if let Some(sender) = ctx.bot.sender() {
                sender
                    .media_stop(&track.id, track.duration as f64, elapsed as f64)
                    .await?;
            }
        }
        Ok(())
    }
}

/// `clearpl`: empty the playlist.
pub struct ClearPlaylist;

#[async_trait]
impl Command for ClearPlaylist {
    fn name(&self) -> &'static str {
        "clearpl"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Approved
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let cleared = {
            let mut playlist = ctx.bot.playlist();
            if playlist.is_empty() {
                None
            } else {
                Some(playlist.clear())
            }
        };
        match cleared {
            Some(count) => {
                ctx.respond(&format!("Deleted {count} items in the playlist."))
                    .await
            }
            None => ctx.respond("The playlist is empty, nothing to delete.").await,
        }
    }
}

/// `playlist [n]`: the next tracks coming up, three by default.
pub struct PlaylistInfo;

#[async_trait]
impl Command for PlaylistInfo {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn level(&self) -> UserLevel {
        UserLevel::BotOp
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let amount = ctx.args().parse::<usize>().unwrap_or(3);
        let reply = {
            let playlist = ctx.bot.playlist();
            if playlist.is_empty() {
                None
            } else {
                let lines: Vec<String> = playlist
                    .get_tracks(amount)
                    .into_iter()
                    .enumerate()
                    .map(|(i, (index, track))| {
                        let time = text::format_time(track.duration);
                        if i == 0 {
                            format!("Next track ({}) - {} {}", index, track.title, time)
                        } else {
                            format!("({}) - {} {}", index, track.title, time)
                        }
                    })
                    .collect();
                Some(lines.join("\n"))
            }
        };
        match reply {
            Some(reply) if reply.len() < 450 => ctx.respond(&reply).await,
            Some(_) => ctx.respond("To many items in playlist to show.").await,
            None => Ok(()),
        }
    }
}

/// `info`: playback internals for the bot controller.
pub struct MediaInfo;

#[async_trait]
impl Command for MediaInfo {
    fn name(&self) -> &'static str {
        "info"
    }

    fn level(&self) -> UserLevel {
        UserLevel::Super
    }

    async fn run(&self, ctx: &Context) -> Result<(), SessionError> {
        let reply = {
            let playlist = ctx.bot.playlist();
            if playlist.has_active_track() {
                playlist.track().map(|track| {
                    format!(
                        "Playlist Tracks: {}\nTrack Title: {}\nTrack Index: {}\nElapsed Track Time: {}\nRemaining Track Time: {}",
                        playlist.len(),
                        track.title,
                        playlist.track_index().unwrap_or(0),
                        text::format_time(playlist.elapsed()),
                        text::format_time(playlist.remaining())
                    )
                })
            } else {
                None
            }
        };
        match reply {
            Some(reply) => ctx.respond(&reply).await,
            None => ctx.respond("No media info available.").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indexes_list() {
        assert_eq!(parse_indexes("3"), Some((vec![3], false)));
        assert_eq!(parse_indexes("1, 4,2"), Some((vec![1, 4, 2], false)));
        assert_eq!(parse_indexes("1,x"), None);
    }

    #[test]
    fn test_parse_indexes_range() {
        assert_eq!(parse_indexes("2-5"), Some((vec![2, 5], true)));
        // A single-point range is a plain delete.
        assert_eq!(parse_indexes("4-4"), Some((vec![4], false)));
        // A backwards range deletes nothing.
        assert_eq!(parse_indexes("5-2"), Some((Vec::new(), false)));
    }
}
