use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info};

use super::track::Track;
use crate::error::QueueError;

/// Playback state of one guild's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Connecting,
    Playing,
    Paused,
    ErrorRetry,
    Draining,
}

impl PlaybackState {
    /// States in which the head track is playing or about to play.
    pub fn holds_head(&self) -> bool {
        matches!(
            self,
            PlaybackState::Connecting
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::ErrorRetry
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Connecting => "connecting",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::ErrorRetry => "retrying",
            PlaybackState::Draining => "draining",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-level volume, always within 0..=100 percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: u8 = 100;

    pub fn clamped(percent: i64) -> Self {
        Self(percent.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Gain fraction handed to the sink (50% -> 0.5).
    pub fn gain(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(50)
    }
}

/// Pending tracks, state and volume of one guild.
///
/// `pending[0]` is the head track: the one playing or about to play. Tracks are only ever
/// appended at the back and removed from the front.
#[derive(Debug)]
pub struct GuildQueue {
    guild_id: GuildId,
    channel_id: ChannelId,
    pending: VecDeque<Track>,
    volume: Volume,
    state: PlaybackState,
    max_size: usize,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId, channel_id: ChannelId, volume: Volume, max_size: usize) -> Self {
        Self {
            guild_id,
            channel_id,
            pending: VecDeque::new(),
            volume,
            state: PlaybackState::Idle,
            max_size,
        }
    }

    /// Appends a track and returns its 1-based position.
    pub fn push(&mut self, track: Track) -> Result<usize, QueueError> {
        if self.pending.len() >= self.max_size {
            return Err(QueueError::QueueFull { max: self.max_size });
        }

        info!("➕ Queued '{}' in guild {}", track.title(), self.guild_id);
        self.pending.push_back(track);
        Ok(self.pending.len())
    }

    /// Removes the head track (finished, skipped or dropped).
    pub fn pop_head(&mut self) -> Option<Track> {
        let head = self.pending.pop_front();
        if let Some(ref track) = head {
            debug!("➡️ Removed head '{}' in guild {}", track.title(), self.guild_id);
        }
        head
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        if cleared > 0 {
            info!("🗑️ Cleared {} pending tracks in guild {}", cleared, self.guild_id);
        }
        cleared
    }

    pub fn head(&self) -> Option<&Track> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        debug_assert!(
            !state.holds_head() || !self.pending.is_empty(),
            "{} requires a head track",
            state
        );
        if self.state != state {
            debug!("🔄 Guild {}: {} -> {}", self.guild_id, self.state, state);
            self.state = state;
        }
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn set_volume(&mut self, percent: i64) -> Volume {
        self.volume = Volume::clamped(percent);
        self.volume
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            guild_id: self.guild_id,
            state: self.state,
            volume: self.volume.percent(),
            pending: self.pending.iter().cloned().collect(),
        }
    }
}

/// Read-only observation of a guild queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub guild_id: GuildId,
    pub state: PlaybackState,
    pub volume: u8,
    pub pending: Vec<Track>,
}

impl QueueSnapshot {
    pub fn head(&self) -> Option<&Track> {
        self.pending.first()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Tracks waiting behind the head.
    pub fn upcoming(&self) -> &[Track] {
        self.pending.get(1..).unwrap_or(&[])
    }

    /// Sum of known durations; live/unknown tracks count as zero.
    pub fn total_duration(&self) -> Duration {
        self.pending.iter().filter_map(|track| track.duration()).sum()
    }

    /// Page of the upcoming tracks, 1-based page numbers.
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let upcoming = self.upcoming();
        let per_page = items_per_page.max(1);
        let total_pages = upcoming.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(upcoming.len());

        QueuePage {
            items: upcoming.get(start..end).map(<[Track]>::to_vec).unwrap_or_default(),
            // position 1 is the head, upcoming starts at 2
            first_position: start + 2,
            current_page,
            total_pages,
            total_items: upcoming.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str, secs: u64) -> Track {
        Track::new(title, format!("https://example.com/{}", title), UserId::new(1)).with_duration_secs(secs)
    }

    fn queue(max: usize) -> GuildQueue {
        GuildQueue::new(GuildId::new(1), ChannelId::new(2), Volume::default(), max)
    }

    #[test]
    fn test_push_preserves_arrival_order() {
        let mut q = queue(10);
        let titles = ["a", "b", "c", "d", "e"];
        for (i, title) in titles.iter().enumerate() {
            assert_eq!(q.push(track(title, 10)).unwrap(), i + 1);
        }

        let snapshot = q.snapshot();
        let order: Vec<&str> = snapshot.pending.iter().map(|t| t.title()).collect();
        assert_eq!(order, titles.to_vec());

        assert_eq!(q.pop_head().unwrap().title(), "a");
        assert_eq!(q.head().unwrap().title(), "b");
    }

    #[test]
    fn test_push_rejects_when_full() {
        let mut q = queue(2);
        q.push(track("a", 1)).unwrap();
        q.push(track("b", 1)).unwrap();

        let err = q.push(track("c", 1)).unwrap_err();
        assert!(matches!(err, QueueError::QueueFull { max: 2 }));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(Volume::clamped(150).percent(), 100);
        assert_eq!(Volume::clamped(-10).percent(), 0);
        assert_eq!(Volume::clamped(75).percent(), 75);
        assert_eq!(Volume::default().gain(), 0.5);

        let mut q = queue(1);
        assert_eq!(q.set_volume(1000).percent(), 100);
        assert_eq!(q.volume().gain(), 1.0);
    }

    #[test]
    fn test_snapshot_totals_and_pages() {
        let mut q = queue(100);
        q.push(track("head", 60)).unwrap();
        for i in 0..12 {
            q.push(track(&format!("t{}", i), 30)).unwrap();
        }
        q.push(track("live", 0)).unwrap();

        let snap = q.snapshot();
        assert_eq!(snap.len(), 14);
        assert_eq!(snap.upcoming().len(), 13);
        assert_eq!(snap.total_duration(), Duration::from_secs(60 + 12 * 30));

        let first = snap.page(1, 10);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.first_position, 2);

        let second = snap.page(5, 10);
        assert_eq!(second.current_page, 2);
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.first_position, 12);
        assert_eq!(second.items[2].title(), "live");
    }

    #[test]
    fn test_empty_snapshot_has_single_page() {
        let snap = queue(5).snapshot();
        let page = snap.page(0, 10);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
        assert_eq!(snap.state, PlaybackState::Idle);
        assert_eq!(snap.volume, 50);
    }
}
