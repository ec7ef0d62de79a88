//! # Guild Jukebox
//!
//! Per-guild audio playback queues for Discord voice channels.
//!
//! - [`audio`] - queues, the playback state machine and the voice backend seam
//! - [`sources`] - turning a query into a playable track
//! - [`bot`] - slash commands and the serenity event handler
//! - [`ui`] - embeds and player controls

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
