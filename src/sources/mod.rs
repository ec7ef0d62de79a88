//! Turning a user's `/play` query into a [`Track`].
//!
//! The queue core never searches or ranks results itself; a [`Resolver`] hands it exactly one
//! best match (or [`ResolveError::NotFound`]).

pub mod ytdlp;

use async_trait::async_trait;
use regex::Regex;
use serenity::model::id::UserId;
use std::sync::LazyLock;
use url::Url;

use crate::{audio::track::Track, error::ResolveError};

pub use ytdlp::YtDlpResolver;

static YOUTUBE_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.|music\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("static regex is valid")
});

/// How a query was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// An http(s) link handed straight to the backend
    DirectUrl,
    /// Free text; the first search hit is used
    Search,
}

impl QueryKind {
    pub fn of(query: &str) -> Self {
        match Url::parse(query.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => QueryKind::DirectUrl,
            _ => QueryKind::Search,
        }
    }

    /// Label shown next to a queued track.
    pub fn label(&self) -> &'static str {
        match self {
            QueryKind::DirectUrl => "Direct URL",
            QueryKind::Search => "YouTube Search",
        }
    }
}

/// A resolved track plus how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub track: Track,
    pub kind: QueryKind,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a direct link or free-text search into one track.
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Resolved, ResolveError>;
}

/// Rewrites any YouTube video link to its plain watch URL, dropping playlist and tracking
/// parameters. Other links are returned unchanged.
pub fn canonical_locator(url: &str) -> String {
    match YOUTUBE_VIDEO.captures(url.trim()) {
        Some(caps) => format!("https://www.youtube.com/watch?v={}", &caps[1]),
        None => url.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_kind() {
        assert_eq!(QueryKind::of("https://youtu.be/dQw4w9WgXcQ"), QueryKind::DirectUrl);
        assert_eq!(QueryKind::of("http://example.com/a.mp3"), QueryKind::DirectUrl);
        assert_eq!(QueryKind::of("never gonna give you up"), QueryKind::Search);
        assert_eq!(QueryKind::of("ftp://example.com/a.mp3"), QueryKind::Search);
        assert_eq!(QueryKind::Search.label(), "YouTube Search");
    }

    #[test]
    fn test_canonical_locator_strips_playlist() {
        assert_eq!(
            canonical_locator("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123&index=4"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            canonical_locator("https://youtu.be/dQw4w9WgXcQ?si=abc"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            canonical_locator("https://music.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            canonical_locator("https://example.com/song.mp3"),
            "https://example.com/song.mp3"
        );
    }
}
