//! Scripted in-memory [`PlaybackSink`] for exercising controllers without a voice gateway.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::{HashMap, HashSet};
use tokio::sync::oneshot;

use super::sink::{PlaybackSink, ResourceEvent, ResourceEvents, TransportEvent, TransportEvents};
use crate::error::{AcquireError, TransportError};

/// Locators containing this marker fail to open.
pub const BROKEN: &str = "broken";

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Connect(GuildId, ChannelId),
    Open(String),
    Gain(String, u8),
    Play(String),
    Pause(String),
    Stop(String),
    Disconnect(GuildId),
}

#[derive(Debug)]
pub struct FakeConnection {
    guild_id: GuildId,
}

#[derive(Debug)]
pub struct FakeResource {
    id: u64,
    locator: String,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<SinkCall>,
    opened: Vec<String>,
    next_id: u64,
    fail_connect: bool,
    live: Option<u64>,
    finishers: HashMap<u64, oneshot::Sender<ResourceEvent>>,
    transports: HashMap<GuildId, TransportEvents>,
    kicked: HashSet<GuildId>,
}

#[derive(Default)]
pub struct FakeSink {
    state: Mutex<FakeState>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `connect` fail.
    pub fn fail_connects(&self) {
        self.state.lock().fail_connect = true;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.clone()
    }

    /// Locators of every resource that was opened successfully, in order.
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    pub fn count(&self, matches: impl Fn(&SinkCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    /// Signals a clean end of the most recently opened resource.
    pub fn finish_current(&self) {
        self.end_current(ResourceEvent::Finished);
    }

    /// Signals a mid-playback failure of the most recently opened resource.
    pub fn error_current(&self, reason: &str) {
        self.end_current(ResourceEvent::Errored(reason.to_string()));
    }

    fn end_current(&self, event: ResourceEvent) {
        let mut state = self.state.lock();
        let Some(id) = state.live.take() else {
            return;
        };
        if let Some(sender) = state.finishers.remove(&id) {
            let _ = sender.send(event);
        }
    }

    /// Drops the guild's connection from the voice channel without telling the controller.
    pub fn kick(&self, guild_id: GuildId) {
        self.state.lock().kicked.insert(guild_id);
    }

    pub fn transport(&self, guild_id: GuildId, event: TransportEvent) {
        if let Some(events) = self.state.lock().transports.get(&guild_id) {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl PlaybackSink for FakeSink {
    type Connection = FakeConnection;
    type Resource = FakeResource;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: TransportEvents,
    ) -> Result<FakeConnection, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Connect(guild_id, channel_id));
        if state.fail_connect {
            return Err(TransportError::Join("missing permissions".into()));
        }
        state.transports.insert(guild_id, events);
        state.kicked.remove(&guild_id);
        Ok(FakeConnection { guild_id })
    }

    async fn open_stream(
        &self,
        _connection: &FakeConnection,
        locator: &str,
    ) -> Result<(FakeResource, ResourceEvents), AcquireError> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Open(locator.to_string()));
        if locator.contains(BROKEN) {
            return Err(AcquireError::unavailable("Video unavailable"));
        }

        state.next_id += 1;
        let id = state.next_id;
        let (tx, rx) = oneshot::channel();
        state.finishers.insert(id, tx);
        state.opened.push(locator.to_string());
        state.live = Some(id);
        Ok((
            FakeResource {
                id,
                locator: locator.to_string(),
            },
            rx,
        ))
    }

    fn set_gain(&self, resource: &FakeResource, fraction: f32) {
        let percent = (fraction * 100.0).round() as u8;
        self.state
            .lock()
            .calls
            .push(SinkCall::Gain(resource.locator.clone(), percent));
    }

    fn play(&self, resource: &FakeResource) {
        self.state
            .lock()
            .calls
            .push(SinkCall::Play(resource.locator.clone()));
    }

    fn pause(&self, resource: &FakeResource) {
        self.state
            .lock()
            .calls
            .push(SinkCall::Pause(resource.locator.clone()));
    }

    /// Like a real driver, stopping still emits a (late) finish signal.
    fn stop(&self, resource: &FakeResource) {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Stop(resource.locator.clone()));
        if state.live == Some(resource.id) {
            state.live = None;
        }
        if let Some(sender) = state.finishers.remove(&resource.id) {
            let _ = sender.send(ResourceEvent::Finished);
        }
    }

    async fn is_connected(&self, connection: &FakeConnection) -> bool {
        let state = self.state.lock();
        state.transports.contains_key(&connection.guild_id)
            && !state.kicked.contains(&connection.guild_id)
    }

    async fn disconnect(&self, connection: FakeConnection) {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Disconnect(connection.guild_id));
        state.transports.remove(&connection.guild_id);
    }
}
