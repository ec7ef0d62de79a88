//! The real-time audio transport the queue core streams into.
//!
//! The core never encodes or transports audio itself. A [`PlaybackSink`] joins voice channels,
//! turns a track's source locator into a playable resource, and reports what happens to that
//! resource and to the connection through channels the controller owns.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{mpsc, oneshot};

use crate::error::{AcquireError, TransportError};

/// Terminal outcome of one opened resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    Finished,
    Errored(String),
}

/// Connection-level notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Disconnected,
    Reconnected,
    /// The gateway reports the bot in no voice channel. May be the echo of an earlier leave,
    /// so it is confirmed against the sink before acting on it.
    Left,
}

/// Receives exactly one [`ResourceEvent`] per opened resource. A dropped sender counts as
/// [`ResourceEvent::Finished`].
pub type ResourceEvents = oneshot::Receiver<ResourceEvent>;

/// Where a sink reports connection-level events for the lifetime of a connection.
pub type TransportEvents = mpsc::UnboundedSender<TransportEvent>;

#[async_trait]
pub trait PlaybackSink: Send + Sync + 'static {
    /// Owned handle to a guild's voice connection.
    type Connection: Send + Sync + 'static;
    /// Handle to one opened, paused audio resource.
    type Resource: Send + Sync + 'static;

    /// Joins `channel_id`. Transport events for this connection must be sent to `events`,
    /// bound before this returns so none is missed.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: TransportEvents,
    ) -> Result<Self::Connection, TransportError>;

    /// Opens a stream for `locator` on `connection`. The returned resource is paused until
    /// [`PlaybackSink::play`] is called.
    async fn open_stream(
        &self,
        connection: &Self::Connection,
        locator: &str,
    ) -> Result<(Self::Resource, ResourceEvents), AcquireError>;

    /// Applies a gain fraction in `0.0..=1.0` to a live resource.
    fn set_gain(&self, resource: &Self::Resource, fraction: f32);

    fn play(&self, resource: &Self::Resource);

    fn pause(&self, resource: &Self::Resource);

    /// Terminates the resource immediately.
    fn stop(&self, resource: &Self::Resource);

    /// True while `connection` is still joined to a voice channel.
    async fn is_connected(&self, connection: &Self::Connection) -> bool;

    /// Releases the connection.
    async fn disconnect(&self, connection: Self::Connection);
}
