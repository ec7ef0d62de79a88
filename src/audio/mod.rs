//! # Audio Module
//!
//! Per-guild playback queues and the state machine that drives them.
//!
//! ## Architecture
//!
//! ### [`manager`] - Queue Registry
//! - One [`manager::QueueManager`] per process, keyed by guild
//! - Entry point for enqueue and every control action
//!
//! ### [`controller`] - Playback State Machine
//! - One task per guild owning its [`queue::GuildQueue`]
//! - Retry backoff, idle disconnect and reconnect grace timers ([`timer`])
//!
//! ### [`sink`] - Audio Transport Seam
//! - [`sink::PlaybackSink`] is everything the core needs from a voice backend
//! - [`songbird_sink::SongbirdSink`] is the production implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{manager::QueueManager, songbird_sink::SongbirdSink, track::Track};
//! use guild_jukebox::config::QueueSettings;
//! use serenity::all::{ChannelId, GuildId, UserId};
//! use std::sync::Arc;
//!
//! # async fn example(songbird: Arc<songbird::Songbird>) -> anyhow::Result<()> {
//! let sink = Arc::new(SongbirdSink::new(songbird, reqwest::Client::new()));
//! let manager = QueueManager::new(sink, QueueSettings::default());
//!
//! let track = Track::new("Song", "https://example.com/song", UserId::new(1));
//! let position = manager.enqueue(GuildId::new(1), ChannelId::new(2), track).await?;
//!
//! manager.pause(GuildId::new(1)).await;
//! manager.skip(GuildId::new(1)).await;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod manager;
pub mod queue;
pub mod sink;
pub mod songbird_sink;
pub mod timer;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{ControlOutcome, GuildHandle, QueueManager};
pub use queue::{PlaybackState, QueueSnapshot};
pub use sink::PlaybackSink;
pub use track::Track;
