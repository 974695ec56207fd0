//! Single-track playback timeline with a queue.
//!
//! One track is current at a time; the cursor only moves forward. Elapsed
//! time is derived from a start instant plus the seek offset, so pausing
//! and seeking never wind an `Instant` backwards.

use tokio::time::Instant;

use super::track::Track;

/// What a delete operation actually removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Indexes removed, ascending, as they were before removal.
    pub deleted: Vec<usize>,
    /// Tracks left afterwards.
    pub remaining: usize,
}

/// The playlist and its playback state.
#[derive(Debug, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    /// Cursor into `tracks`; `None` until the first start.
    index: Option<usize>,
    active: bool,
    paused: bool,
    /// When the current play segment began.
    start: Option<Instant>,
    /// Seconds already consumed when the segment began (seek offset).
    offset: u64,
    /// Elapsed seconds frozen while paused.
    pause: u64,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track and start playing it. The cursor jumps to the new
    /// entry regardless of what it pointed at before.
    pub fn start(&mut self, owner: &str, mut track: Track) -> &Track {
        track.owner = owner.to_string();
        self.tracks.push(track);
        let index = self.tracks.len() - 1;
        self.index = Some(index);
        self.begin_segment(0);
        &self.tracks[index]
    }

    /// Append a track without touching playback state.
    pub fn add(&mut self, owner: &str, mut track: Track) -> &Track {
        track.owner = owner.to_string();
        self.tracks.push(track);
        &self.tracks[self.tracks.len() - 1]
    }

    /// Append several tracks at once, all owned by the same requester.
    pub fn add_list(&mut self, owner: &str, tracks: Vec<Track>) {
        for track in tracks {
            self.add(owner, track);
        }
    }

    /// Resume or seek. Returns the seconds left to play, clamped to zero.
    /// A call without a current track is a no-op returning 0.
    pub fn play(&mut self, offset: u64) -> u64 {
        let Some(index) = self.index else {
            return 0;
        };
        let duration = self.tracks[index].duration;
        self.begin_segment(offset);
        duration.saturating_sub(offset)
    }

    /// Freeze playback. An explicit offset overrides the computed elapsed
    /// time, for the pause-while-seeking case.
    pub fn pause(&mut self, offset: Option<u64>) {
        let elapsed = match offset {
            Some(secs) => secs,
            None => self.elapsed(),
        };
        self.pause = elapsed;
        self.paused = true;
    }

    /// Mark playback inactive. The current track and cursor stay put, and
    /// a finished-timer armed for this track is not cancelled here; left
    /// armed, it will still advance the playlist when it fires.
    pub fn stop(&mut self) {
        self.active = false;
        self.paused = false;
    }

    /// Restart the current track from the beginning.
    pub fn replay(&mut self) -> Option<&Track> {
        let index = self.index?;
        self.begin_segment(0);
        self.tracks.get(index)
    }

    /// Advance to the next track and start it. None when already at the
    /// end of the list.
    pub fn next_track(&mut self) -> Option<&Track> {
        let next = self.index? + 1;
        if next >= self.tracks.len() {
            return None;
        }
        self.index = Some(next);
        self.begin_segment(0);
        self.tracks.get(next)
    }

    /// Seconds into the current track, clamped to its duration.
    pub fn elapsed(&self) -> u64 {
        let Some(index) = self.index else {
            return 0;
        };
        let duration = self.tracks[index].duration;
        if self.paused {
            return self.pause.min(duration);
        }
        let running = match self.start {
            Some(start) => self.offset + start.elapsed().as_secs(),
            None => 0,
        };
        running.min(duration)
    }

    /// Seconds left on the current track.
    pub fn remaining(&self) -> u64 {
        let Some(index) = self.index else {
            return 0;
        };
        self.tracks[index].duration.saturating_sub(self.elapsed())
    }

    /// Remove tracks by index. Out-of-range indexes are dropped silently;
    /// None when nothing valid remains to delete. With `by_range`, the
    /// first two indexes are treated as inclusive endpoints.
    pub fn delete(&mut self, indexes: &[usize], by_range: bool) -> Option<DeleteSummary> {
        let wanted: Vec<usize> = if by_range {
            match (indexes.first(), indexes.get(1)) {
                (Some(&from), Some(&to)) if from <= to => (from..=to).collect(),
                _ => Vec::new(),
            }
        } else {
            indexes.to_vec()
        };
        let mut deleted: Vec<usize> = wanted
            .into_iter()
            .filter(|&index| index < self.tracks.len())
            .collect();
        deleted.sort_unstable();
        deleted.dedup();
        if deleted.is_empty() {
            return None;
        }

        for &index in deleted.iter().rev() {
            self.tracks.remove(index);
        }
        if let Some(current) = self.index {
            if self.tracks.is_empty() {
                self.index = None;
                self.active = false;
                self.paused = false;
            } else {
                let below = deleted.iter().filter(|&&index| index < current).count();
                self.index = Some((current - below).min(self.tracks.len() - 1));
            }
        }
        Some(DeleteSummary {
            deleted,
            remaining: self.tracks.len(),
        })
    }

    /// Drop everything and reset playback. Returns how many tracks went.
    pub fn clear(&mut self) -> usize {
        let count = self.tracks.len();
        self.tracks.clear();
        self.index = None;
        self.active = false;
        self.paused = false;
        self.start = None;
        self.offset = 0;
        self.pause = 0;
        count
    }

    pub fn has_active_track(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// None when the list is empty, else whether the cursor sits on the
    /// final track.
    pub fn is_last_track(&self) -> Option<bool> {
        self.index.map(|index| index + 1 == self.tracks.len())
    }

    pub fn track(&self) -> Option<&Track> {
        self.tracks.get(self.index?)
    }

    pub fn track_index(&self) -> Option<usize> {
        self.index
    }

    /// The upcoming track and its index, without advancing.
    pub fn next_track_info(&self) -> Option<(usize, &Track)> {
        let next = self.index? + 1;
        self.tracks.get(next).map(|track| (next, track))
    }

    /// Tracks from the cursor onward, up to `amount`, with their indexes.
    pub fn get_tracks(&self, amount: usize) -> Vec<(usize, &Track)> {
        if self.tracks.is_empty() {
            return Vec::new();
        }
        let start = self.index.unwrap_or(0);
        self.tracks
            .iter()
            .enumerate()
            .skip(start)
            .take(amount)
            .collect()
    }

    /// How many tracks wait after the cursor.
    pub fn queued(&self) -> usize {
        match self.index {
            Some(index) => self.tracks.len().saturating_sub(index + 1),
            None => self.tracks.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn begin_segment(&mut self, offset: u64) {
        self.start = Some(Instant::now());
        self.offset = offset;
        self.pause = 0;
        self.active = true;
        self.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, duration: u64) -> Track {
        Track::new("id", title, duration, None)
    }

    #[test]
    fn test_start_from_empty() {
        let mut playlist = Playlist::new();
        assert!(!playlist.has_active_track());

        let started = playlist.start("alice", track("first", 180));
        assert_eq!(started.title, "first");
        assert_eq!(started.owner, "alice");

        assert!(playlist.has_active_track());
        assert!(!playlist.is_paused());
        assert_eq!(playlist.track_index(), Some(0));
        assert_eq!(playlist.elapsed(), 0);
        assert_eq!(playlist.remaining(), 180);
        assert_eq!(playlist.is_last_track(), Some(true));
    }

    #[test]
    fn test_add_queues_without_state_change() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("first", 180));
        playlist.add("bob", track("second", 90));

        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.queued(), 1);
        assert_eq!(playlist.track().unwrap().title, "first");
        assert_eq!(playlist.is_last_track(), Some(false));

        let (index, next) = playlist.next_track_info().unwrap();
        assert_eq!(index, 1);
        assert_eq!(next.title, "second");
        assert_eq!(next.owner, "bob");
    }

    #[test]
    fn test_add_list_shares_owner() {
        let mut playlist = Playlist::new();
        playlist.add_list("carol", vec![track("a", 10), track("b", 20)]);
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.queued(), 2);
        assert!(playlist.get_tracks(5).iter().all(|(_, t)| t.owner == "carol"));
    }

    #[test]
    fn test_pause_and_resume_with_offset() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("first", 180));

        playlist.pause(Some(60));
        assert!(playlist.is_paused());
        assert_eq!(playlist.elapsed(), 60);
        assert_eq!(playlist.remaining(), 120);

        let remaining = playlist.play(30);
        assert!(!playlist.is_paused());
        assert_eq!(remaining, 150);
        assert_eq!(playlist.elapsed(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_the_clock() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("first", 180));
        assert_eq!(playlist.elapsed(), 0);

        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        assert_eq!(playlist.elapsed(), 60);
        assert_eq!(playlist.remaining(), 120);

        playlist.pause(None);
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        assert_eq!(playlist.elapsed(), 60);

        tokio::time::advance(std::time::Duration::from_secs(200)).await;
        playlist.play(60);
        tokio::time::advance(std::time::Duration::from_secs(500)).await;
        assert_eq!(playlist.elapsed(), 180);
        assert_eq!(playlist.remaining(), 0);
    }

    #[test]
    fn test_play_on_empty_is_noop() {
        let mut playlist = Playlist::new();
        assert_eq!(playlist.play(30), 0);
        assert!(!playlist.has_active_track());
        assert_eq!(playlist.elapsed(), 0);
        assert_eq!(playlist.remaining(), 0);
    }

    #[test]
    fn test_seek_past_end_clamps() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("short", 100));
        assert_eq!(playlist.play(500), 0);
        assert_eq!(playlist.elapsed(), 100);
        assert_eq!(playlist.remaining(), 0);
    }

    #[test]
    fn test_stop_keeps_track_and_allows_advance() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("first", 180));
        playlist.add("bob", track("second", 90));

        playlist.stop();
        assert!(!playlist.has_active_track());
        assert_eq!(playlist.track().unwrap().title, "first");

        // A finished-timer left armed across a stop advances from here.
        let next = playlist.next_track().unwrap();
        assert_eq!(next.title, "second");
        assert!(playlist.has_active_track());
        assert_eq!(playlist.track_index(), Some(1));
    }

    #[test]
    fn test_replay_restarts_current() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("first", 180));
        playlist.pause(Some(120));

        let replayed = playlist.replay().unwrap();
        assert_eq!(replayed.title, "first");
        assert!(playlist.has_active_track());
        assert!(!playlist.is_paused());
        assert_eq!(playlist.elapsed(), 0);

        assert!(Playlist::new().replay().is_none());
    }

    #[test]
    fn test_next_track_stops_at_end() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("only", 60));
        assert!(playlist.next_track().is_none());
        assert_eq!(playlist.track_index(), Some(0));
    }

    #[test]
    fn test_delete_filters_out_of_range() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("t0", 10));
        playlist.add("alice", track("t1", 10));
        playlist.add("alice", track("t2", 10));
        playlist.add("alice", track("t3", 10));

        let summary = playlist.delete(&[1, 3, 9], false).unwrap();
        assert_eq!(summary.deleted, vec![1, 3]);
        assert_eq!(summary.remaining, 2);
        assert!(playlist.delete(&[9], false).is_none());
        assert!(playlist.delete(&[], false).is_none());
    }

    #[test]
    fn test_delete_by_range() {
        let mut playlist = Playlist::new();
        for i in 0..5 {
            playlist.add("alice", track(&format!("t{i}"), 10));
        }
        let summary = playlist.delete(&[1, 3], true).unwrap();
        assert_eq!(summary.deleted, vec![1, 2, 3]);
        assert_eq!(summary.remaining, 2);
        assert!(playlist.delete(&[3, 1], true).is_none());
    }

    #[test]
    fn test_delete_shifts_cursor() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("t0", 10));
        playlist.add("alice", track("t1", 10));
        playlist.add("alice", track("t2", 10));
        playlist.next_track();
        assert_eq!(playlist.track_index(), Some(1));

        playlist.delete(&[0], false);
        assert_eq!(playlist.track_index(), Some(0));
        assert_eq!(playlist.track().unwrap().title, "t1");
        assert!(playlist.has_active_track());
    }

    #[test]
    fn test_delete_everything_resets_playback() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("t0", 10));
        playlist.add("alice", track("t1", 10));

        let summary = playlist.delete(&[0, 1], false).unwrap();
        assert_eq!(summary.remaining, 0);
        assert!(playlist.track_index().is_none());
        assert!(!playlist.has_active_track());
        assert_eq!(playlist.is_last_track(), None);
    }

    #[test]
    fn test_clear_reports_count() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("t0", 10));
        playlist.add("alice", track("t1", 10));

        assert_eq!(playlist.clear(), 2);
        assert!(playlist.is_empty());
        assert!(playlist.track().is_none());
        assert_eq!(playlist.elapsed(), 0);
    }

    #[test]
    fn test_get_tracks_window_from_cursor() {
        let mut playlist = Playlist::new();
        playlist.start("alice", track("t0", 10));
        for i in 1..6 {
            playlist.add("alice", track(&format!("t{i}"), 10));
        }
        playlist.next_track();

        let window = playlist.get_tracks(3);
        let titles: Vec<&str> = window.iter().map(|(_, t)| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t1", "t2", "t3"]);
        assert_eq!(window[0].0, 1);
    }
}
