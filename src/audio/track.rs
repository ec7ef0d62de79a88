use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;

/// Immutable descriptor of a playable item.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    source_locator: String,
    duration_secs: u64,
    thumbnail_url: Option<String>,
    requester: UserId,
    enqueued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, source_locator: impl Into<String>, requester: UserId) -> Self {
        Self {
            title: title.into(),
            source_locator: source_locator.into(),
            duration_secs: 0,
            thumbnail_url: None,
            requester,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source_locator(&self) -> &str {
        &self.source_locator
    }
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
    pub fn requester(&self) -> UserId {
        self.requester
    }
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// `None` for live streams and sources that did not report a length.
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }

    pub fn is_live_or_unknown(&self) -> bool {
        self.duration_secs == 0
    }

    pub fn display_duration(&self) -> String {
        format_duration_secs(self.duration_secs)
    }
}

/// Formats seconds as `m:ss` or `h:mm:ss`; zero means live or unknown.
pub fn format_duration_secs(secs: u64) -> String {
    if secs == 0 {
        return "Live/Unknown".to_string();
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration_secs(0), "Live/Unknown");
        assert_eq!(format_duration_secs(5), "0:05");
        assert_eq!(format_duration_secs(185), "3:05");
        assert_eq!(format_duration_secs(3600), "1:00:00");
        assert_eq!(format_duration_secs(3725), "1:02:05");
    }

    #[test]
    fn test_live_track_has_no_duration() {
        let track = Track::new("Radio", "https://example.com/live", UserId::new(7));
        assert!(track.is_live_or_unknown());
        assert_eq!(track.duration(), None);
        assert_eq!(track.display_duration(), "Live/Unknown");

        let track = track.with_duration_secs(90).with_thumbnail("https://img.example.com/t.jpg");
        assert_eq!(track.duration(), Some(Duration::from_secs(90)));
        assert_eq!(track.thumbnail_url(), Some("https://img.example.com/t.jpg"));
        assert_eq!(track.requester(), UserId::new(7));
    }
}
