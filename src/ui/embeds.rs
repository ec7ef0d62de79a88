use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{
        manager::ControlOutcome,
        queue::{PlaybackState, QueueSnapshot},
        track::{format_duration_secs, Track},
    },
    error::{QueueError, ResolveError},
    sources::QueryKind,
};

/// Standard colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Tracks listed per queue page.
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Heading for a `/play` reply: position 1 starts right away.
pub fn play_title(position: usize) -> String {
    if position <= 1 {
        "🎵 Now Playing".to_string()
    } else {
        format!("📝 Queued at position {}", position)
    }
}

/// Reply to a successful `/play`.
pub fn create_track_added_embed(track: &Track, position: usize, kind: QueryKind) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(play_title(position))
        .description(format!("**{}**", track.title()))
        .color(if position <= 1 {
            colors::SUCCESS_GREEN
        } else {
            colors::INFO_BLUE
        })
        .field("⏱️ Duration", track.display_duration(), true)
        .field("👤 Requested by", format!("<@{}>", track.requester()), true)
        .field("🔗 Source", kind.label(), true);

    if let Some(thumbnail) = track.thumbnail_url() {
        embed = embed.thumbnail(thumbnail);
    }
    if track.source_locator().starts_with("http") {
        embed = embed.url(track.source_locator());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "▶️ Playing",
        PlaybackState::Paused => "⏸️ Paused",
        PlaybackState::Connecting => "🔌 Connecting",
        PlaybackState::ErrorRetry => "⚠️ Retrying",
        PlaybackState::Idle => "😴 Idle",
        PlaybackState::Draining => "🧹 Leaving",
    }
}

/// The head track of a queue, or `None` when nothing is loaded.
pub fn create_now_playing_embed(snapshot: &QueueSnapshot) -> Option<CreateEmbed> {
    let track = snapshot.head()?;

    let mut embed = CreateEmbed::default()
        .title(state_label(snapshot.state))
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Duration", track.display_duration(), true)
        .field("👤 Requested by", format!("<@{}>", track.requester()), true)
        .field("🔊 Volume", format!("{}%", snapshot.volume), true)
        .field("📋 Up next", snapshot.upcoming().len().to_string(), true);

    if let Some(thumbnail) = track.thumbnail_url() {
        embed = embed.thumbnail(thumbnail);
    }

    Some(
        embed
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
    )
}

/// Numbered lines for one page of upcoming tracks.
pub fn queue_page_lines(snapshot: &QueueSnapshot, page: usize) -> (Vec<String>, usize, usize) {
    let queue_page = snapshot.page(page, QUEUE_PAGE_SIZE);
    let lines = queue_page
        .items
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "**{}**. {} `[{}]`",
                queue_page.first_position + i,
                track.title(),
                track.display_duration()
            )
        })
        .collect();
    (lines, queue_page.current_page, queue_page.total_pages)
}

pub fn create_queue_embed(snapshot: Option<&QueueSnapshot>, page: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    let Some(snapshot) = snapshot.filter(|s| !s.is_empty()) else {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    };

    let mut embed = embed;
    if let Some(current) = snapshot.head() {
        embed = embed.field(
            state_label(snapshot.state),
            format!("**{}** `[{}]`", current.title(), current.display_duration()),
            false,
        );
    }

    let (lines, current_page, total_pages) = queue_page_lines(snapshot, page);
    if !lines.is_empty() {
        embed = embed.field("Up next", lines.join("\n"), false);
    }

    let total = snapshot.total_duration().as_secs();
    let mut info = format!("**Total:** {} tracks", snapshot.len());
    if total > 0 {
        info.push_str(&format!(" • **Duration:** {}", format_duration_secs(total)));
    }
    info.push_str(&format!(" • **Volume:** {}%", snapshot.volume));
    embed = embed.field("Info", info, false);

    let footer = if total_pages > 1 {
        format!("Page {} of {} • Guild Jukebox", current_page, total_pages)
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Short reply text for a control action.
pub fn outcome_message(outcome: &ControlOutcome) -> String {
    match outcome {
        ControlOutcome::Paused => "⏸️ Playback paused".to_string(),
        ControlOutcome::Resumed => "▶️ Playback resumed".to_string(),
        ControlOutcome::AlreadyPaused => "⏸️ Already paused".to_string(),
        ControlOutcome::AlreadyPlaying => "▶️ Already playing".to_string(),
        ControlOutcome::Skipped(track) => format!("⏭️ Skipped **{}**", track.title()),
        ControlOutcome::Stopped { cleared } => {
            format!("⏹️ Stopped and cleared {} track(s)", cleared)
        }
        ControlOutcome::VolumeSet(percent) => format!("🔊 Volume set to {}%", percent),
        ControlOutcome::NothingPlaying => "❌ Nothing is playing".to_string(),
    }
}

pub fn queue_error_message(error: &QueueError) -> String {
    match error {
        QueueError::QueueFull { max } => format!("The queue is full ({} tracks max)", max),
        QueueError::Connect(_) => "Failed to join voice channel".to_string(),
        QueueError::Unavailable => "The player is restarting, try again".to_string(),
    }
}

pub fn resolve_error_message(error: &ResolveError) -> String {
    match error {
        ResolveError::NotFound(_) => "No results found".to_string(),
        ResolveError::Backend(_) => "Could not look that up right now".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::{GuildId, UserId};

    fn track(title: &str, secs: u64) -> Track {
        Track::new(title, format!("https://example.com/{}", title), UserId::new(1))
            .with_duration_secs(secs)
    }

    fn snapshot(count: usize) -> QueueSnapshot {
        QueueSnapshot {
            guild_id: GuildId::new(1),
            state: PlaybackState::Playing,
            volume: 50,
            pending: (0..count).map(|i| track(&format!("t{}", i), 60)).collect(),
        }
    }

    #[test]
    fn test_play_title_distinguishes_now_playing() {
        assert_eq!(play_title(1), "🎵 Now Playing");
        assert_eq!(play_title(4), "📝 Queued at position 4");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            outcome_message(&ControlOutcome::Skipped(track("Song", 10))),
            "⏭️ Skipped **Song**"
        );
        assert_eq!(
            outcome_message(&ControlOutcome::Stopped { cleared: 3 }),
            "⏹️ Stopped and cleared 3 track(s)"
        );
        assert_eq!(
            outcome_message(&ControlOutcome::NothingPlaying),
            "❌ Nothing is playing"
        );
    }

    #[test]
    fn test_queue_page_numbers_continue_after_head() {
        let (lines, current, total) = queue_page_lines(&snapshot(15), 2);
        assert_eq!((current, total), (2, 2));
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "**12**. t11 `[1:00]`");
    }

    #[test]
    fn test_now_playing_requires_head() {
        assert!(create_now_playing_embed(&snapshot(0)).is_none());
        assert!(create_now_playing_embed(&snapshot(1)).is_some());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            queue_error_message(&QueueError::QueueFull { max: 1000 }),
            "The queue is full (1000 tracks max)"
        );
        assert_eq!(
            resolve_error_message(&ResolveError::NotFound("x".into())),
            "No results found"
        );
    }
}
