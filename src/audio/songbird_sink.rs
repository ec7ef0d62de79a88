//! [`PlaybackSink`] backed by songbird voice connections.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::{
        codecs::{get_codec_registry, get_probe},
        AudioStreamError, Input, MakePlayableError, YoutubeDl,
    },
    tracks::{Track as VoiceTrack, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use super::sink::{PlaybackSink, ResourceEvent, ResourceEvents, TransportEvent, TransportEvents};
use crate::error::{AcquireError, AcquireErrorKind, TransportError};

pub struct SongbirdSink {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdSink {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { songbird, http }
    }
}

/// A joined voice call.
pub struct SongbirdConnection {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
}

/// Forwards driver connection changes to the owning controller.
struct TransportNotifier {
    guild_id: GuildId,
    event: TransportEvent,
    events: TransportEvents,
}

#[async_trait]
impl VoiceEventHandler for TransportNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🔌 Voice driver event {:?} in guild {}", self.event, self.guild_id);
        let _ = self.events.send(self.event);
        None
    }
}

/// Reports the first terminal event of a track. End and Error share one slot.
struct ResourceNotifier {
    slot: Arc<parking_lot::Mutex<Option<oneshot::Sender<ResourceEvent>>>>,
    errored: bool,
}

#[async_trait]
impl VoiceEventHandler for ResourceNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let Some(tx) = self.slot.lock().take() else {
            return None;
        };

        let event = if self.errored {
            let reason = match ctx {
                EventContext::Track(tracks) => tracks
                    .first()
                    .map(|(state, _)| format!("{:?}", state.playing)),
                _ => None,
            };
            ResourceEvent::Errored(reason.unwrap_or_else(|| "playback error".to_string()))
        } else {
            ResourceEvent::Finished
        };

        let _ = tx.send(event);
        None
    }
}

fn classify(error: &MakePlayableError) -> AcquireErrorKind {
    match error {
        MakePlayableError::Create(AudioStreamError::RetryIn(_)) => AcquireErrorKind::Throttled,
        MakePlayableError::Create(AudioStreamError::Unsupported) => AcquireErrorKind::Unsupported,
        MakePlayableError::Create(AudioStreamError::Fail(_)) => AcquireErrorKind::Unavailable,
        MakePlayableError::Parse(_) => AcquireErrorKind::Unsupported,
        _ => AcquireErrorKind::Other,
    }
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    type Connection = SongbirdConnection;
    type Resource = TrackHandle;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: TransportEvents,
    ) -> Result<SongbirdConnection, TransportError> {
        let call = match self.songbird.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                // join leaves a half-initialised call registered on failure
                let _ = self.songbird.remove(guild_id).await;
                return Err(TransportError::Join(e.to_string()));
            }
        };

        {
            let mut handler = call.lock().await;
            handler.remove_all_global_events();

            if let Err(e) = handler.deafen(true).await {
                warn!("⚠️ Could not self-deafen in guild {}: {}", guild_id, e);
            }

            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                TransportNotifier {
                    guild_id,
                    event: TransportEvent::Disconnected,
                    events: events.clone(),
                },
            );
            handler.add_global_event(
                Event::Core(CoreEvent::DriverReconnect),
                TransportNotifier {
                    guild_id,
                    event: TransportEvent::Reconnected,
                    events,
                },
            );
        }

        info!("🔊 Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(SongbirdConnection { guild_id, call })
    }

    async fn open_stream(
        &self,
        connection: &SongbirdConnection,
        locator: &str,
    ) -> Result<(TrackHandle, ResourceEvents), AcquireError> {
        let input: Input = YoutubeDl::new(self.http.clone(), locator.to_string()).into();

        // Decode headers up front so a dead link fails here rather than mid-playback
        let input = input
            .make_playable_async(get_codec_registry(), get_probe())
            .await
            .map_err(|e| AcquireError::new(classify(&e), e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(parking_lot::Mutex::new(Some(tx)));

        let handle = {
            let mut handler = connection.call.lock().await;
            handler.play(VoiceTrack::from(input).pause())
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = ResourceNotifier {
                slot: slot.clone(),
                errored: event == TrackEvent::Error,
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                let _ = handle.stop();
                return Err(AcquireError::new(
                    AcquireErrorKind::Other,
                    format!("track ended before events were bound: {}", e),
                ));
            }
        }

        debug!("🎧 Opened stream for {} in guild {}", locator, connection.guild_id);
        Ok((handle, rx))
    }

    fn set_gain(&self, resource: &TrackHandle, fraction: f32) {
        if let Err(e) = resource.set_volume(fraction) {
            warn!("⚠️ Could not set volume: {}", e);
        }
    }

    fn play(&self, resource: &TrackHandle) {
        if let Err(e) = resource.play() {
            warn!("⚠️ Could not start track: {}", e);
        }
    }

    fn pause(&self, resource: &TrackHandle) {
        if let Err(e) = resource.pause() {
            warn!("⚠️ Could not pause track: {}", e);
        }
    }

    fn stop(&self, resource: &TrackHandle) {
        // an already finished track rejects the command, which is fine
        let _ = resource.stop();
    }

    async fn is_connected(&self, connection: &SongbirdConnection) -> bool {
        connection.call.lock().await.current_channel().is_some()
    }

    async fn disconnect(&self, connection: SongbirdConnection) {
        {
            let mut handler = connection.call.lock().await;
            handler.remove_all_global_events();
            handler.stop();
        }

        match self.songbird.remove(connection.guild_id).await {
            Ok(()) => info!("👋 Left voice channel in guild {}", connection.guild_id),
            Err(e) => error!(
                "❌ Error leaving voice channel in guild {}: {}",
                connection.guild_id, e
            ),
        }
    }
}
