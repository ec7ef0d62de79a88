use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use tracing::{debug, info, warn};

use super::{canonical_locator, QueryKind, Resolved, Resolver};
use crate::{audio::track::Track, error::ResolveError};

/// Resolves queries by shelling out to `yt-dlp --dump-json`.
pub struct YtDlpResolver {
    program: String,
}

/// The subset of yt-dlp's JSON we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn dump_json(&self, target: &str) -> Result<String, ResolveError> {
        let output = Command::new(&self.program)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target,
            ])
            .output()
            .await
            .map_err(|e| ResolveError::Backend(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().next().unwrap_or("no output").trim().to_string();
            warn!("❌ yt-dlp failed for {}: {}", target, reason);
            return Err(ResolveError::Backend(reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Picks the first JSON document from yt-dlp's output and converts it into a track.
fn parse_first(stdout: &str, query: &str, requested_by: UserId) -> Result<Track, ResolveError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| ResolveError::Backend(format!("unreadable yt-dlp output: {}", e)))?;

    let locator = info
        .webpage_url
        .or(info.url)
        .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

    let duration_secs = match (info.is_live, info.duration) {
        (Some(true), _) | (_, None) => 0,
        (_, Some(secs)) => secs.max(0.0).round() as u64,
    };

    let mut track = Track::new(info.title, canonical_locator(&locator), requested_by)
        .with_duration_secs(duration_secs);
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    Ok(track)
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Resolved, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }

        let kind = QueryKind::of(query);
        let target = match kind {
            QueryKind::DirectUrl => canonical_locator(query),
            QueryKind::Search => format!("ytsearch1:{}", query),
        };

        info!("🔍 Resolving {} query: {}", kind.label(), query);
        let stdout = self.dump_json(&target).await?;
        let track = parse_first(&stdout, query, requested_by)?;
        debug!("✅ Resolved '{}' -> {}", query, track.source_locator());

        Ok(Resolved { track, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const USER: UserId = UserId::new(5);

    #[test]
    fn test_parse_search_hit() {
        let stdout = r#"{"title":"Song","webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","duration":212.4,"thumbnail":"https://i.ytimg.com/x.jpg","is_live":false}
"#;
        let track = parse_first(stdout, "song", USER).unwrap();
        assert_eq!(track.title(), "Song");
        assert_eq!(track.source_locator(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.duration_secs(), 212);
        assert_eq!(track.thumbnail_url(), Some("https://i.ytimg.com/x.jpg"));
        assert_eq!(track.requester(), USER);
    }

    #[test]
    fn test_live_streams_have_unknown_duration() {
        let stdout = r#"{"title":"Radio","webpage_url":"https://example.com/live","duration":99.0,"is_live":true}"#;
        let track = parse_first(stdout, "radio", USER).unwrap();
        assert!(track.is_live_or_unknown());
    }

    #[test]
    fn test_empty_output_is_not_found() {
        assert!(matches!(
            parse_first("\n", "nothing", USER),
            Err(ResolveError::NotFound(q)) if q == "nothing"
        ));
    }

    #[test]
    fn test_garbage_output_is_backend_error() {
        assert!(matches!(
            parse_first("not json", "q", USER),
            Err(ResolveError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_executable_reports_backend_error() {
        let resolver = YtDlpResolver::new("definitely-not-yt-dlp-on-this-host");
        let result = resolver.resolve("anything", USER).await;
        assert!(matches!(result, Err(ResolveError::Backend(_))));
    }

    #[tokio::test]
    async fn test_blank_query_is_not_found() {
        let resolver = YtDlpResolver::new("yt-dlp");
        assert!(matches!(
            resolver.resolve("   ", USER).await,
            Err(ResolveError::NotFound(_))
        ));
    }
}
