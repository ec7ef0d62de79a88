//! Per-guild playback state machine.
//!
//! Every guild queue is driven by one [`PlaybackController`] task. Inbound commands, timer
//! fires, sink resource events and transport events all arrive at that task and are handled
//! one at a time, so a guild's pending list and state are never mutated concurrently.
//!
//! ```text
//! Idle -> Connecting -> Playing <-> Paused
//! Playing|Paused -> ErrorRetry -> Playing|Idle
//! any -> Draining (terminal)
//! ```

use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{
    manager::{GuildHandle, Registry},
    queue::{GuildQueue, PlaybackState, QueueSnapshot, Volume},
    sink::{PlaybackSink, ResourceEvent, ResourceEvents, TransportEvent},
    timer::{TimerFired, TimerKind, Timers},
    track::Track,
};
use crate::{config::QueueSettings, error::QueueError};

/// Result of a pause/resume/skip/stop/volume request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    Paused,
    Resumed,
    AlreadyPaused,
    AlreadyPlaying,
    Skipped(Track),
    Stopped { cleared: usize },
    VolumeSet(u8),
    /// No queue for the guild, or nothing in a state the action applies to
    NothingPlaying,
}

impl ControlOutcome {
    /// True when the request changed nothing.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            ControlOutcome::AlreadyPaused | ControlOutcome::AlreadyPlaying | ControlOutcome::NothingPlaying
        )
    }
}

/// Why an enqueue was not accepted by a controller.
#[derive(Debug)]
pub(crate) enum EnqueueRejected {
    /// The controller is tearing down; the caller should retry on a fresh queue
    Retired(Track),
    Failed(QueueError),
}

pub(crate) type EnqueueReply = Result<usize, EnqueueRejected>;

pub(crate) enum Command {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<EnqueueReply>,
    },
    Pause {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Resume {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Skip {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Stop {
        reply: oneshot::Sender<ControlOutcome>,
    },
    SetVolume {
        percent: i64,
        reply: oneshot::Sender<ControlOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
    Timer(TimerFired),
    Transport(TransportEvent),
}

impl Command {
    /// Answers a command that arrived after teardown began.
    fn reject(self) {
        match self {
            Command::Enqueue { track, reply } => {
                let _ = reply.send(Err(EnqueueRejected::Retired(track)));
            }
            Command::Pause { reply }
            | Command::Resume { reply }
            | Command::Skip { reply }
            | Command::Stop { reply }
            | Command::SetVolume { reply, .. } => {
                let _ = reply.send(ControlOutcome::NothingPlaying);
            }
            Command::Destroy { reply } => {
                let _ = reply.send(());
            }
            // dropping the reply reports the queue as absent
            Command::Snapshot { .. } | Command::Timer(_) | Command::Transport(_) => {}
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Enqueue { .. } => "Enqueue",
            Command::Pause { .. } => "Pause",
            Command::Resume { .. } => "Resume",
            Command::Skip { .. } => "Skip",
            Command::Stop { .. } => "Stop",
            Command::SetVolume { .. } => "SetVolume",
            Command::Snapshot { .. } => "Snapshot",
            Command::Destroy { .. } => "Destroy",
            Command::Timer(_) => "Timer",
            Command::Transport(_) => "Transport",
        };
        f.write_str(name)
    }
}

struct ActiveResource<R> {
    resource: R,
    events: ResourceEvents,
}

pub(crate) struct PlaybackController<S: PlaybackSink> {
    instance: u64,
    sink: Arc<S>,
    settings: QueueSettings,
    registry: Registry,
    queue: GuildQueue,
    connection: Option<S::Connection>,
    active: Option<ActiveResource<S::Resource>>,
    timers: Timers,
    /// The armed grace was started by a gateway leave only and must be confirmed with the sink
    leave_unconfirmed: bool,
    mailbox: mpsc::UnboundedReceiver<Command>,
    mailbox_tx: mpsc::UnboundedSender<Command>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<S: PlaybackSink> PlaybackController<S> {
    /// Spawns the controller task for a fresh, idle queue and returns its handle.
    pub(crate) fn spawn(
        instance: u64,
        guild_id: GuildId,
        channel_id: ChannelId,
        sink: Arc<S>,
        settings: QueueSettings,
        registry: Registry,
    ) -> GuildHandle {
        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let queue = GuildQueue::new(
            guild_id,
            channel_id,
            Volume::clamped(settings.default_volume as i64),
            settings.max_queue_size,
        );

        let controller = Self {
            instance,
            sink,
            settings,
            registry,
            queue,
            connection: None,
            active: None,
            timers: Timers::default(),
            leave_unconfirmed: false,
            mailbox,
            mailbox_tx: mailbox_tx.clone(),
            transport_tx,
            transport_rx,
        };

        info!("🆕 Creating queue for guild {}", guild_id);
        let span = info_span!("guild", id = %guild_id);
        tokio::spawn(controller.run().instrument(span));

        GuildHandle::new(instance, mailbox_tx)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(event) = self.transport_rx.recv() => self.on_transport_event(event),
                event = next_resource_event(&mut self.active) => self.on_resource_event(event).await,
            }

            if self.queue.state() == PlaybackState::Draining {
                break;
            }
        }
        debug!("Controller for guild {} stopped", self.queue.guild_id());
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { track, reply } => self.enqueue(track, reply).await,
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::Skip { reply } => {
                let outcome = self.skip().await;
                let _ = reply.send(outcome);
            }
            Command::Stop { reply } => {
                let cleared = self.queue.len();
                self.drain("stop requested").await;
                let _ = reply.send(ControlOutcome::Stopped { cleared });
            }
            Command::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            Command::Destroy { reply } => {
                self.drain("destroyed").await;
                let _ = reply.send(());
            }
            Command::Timer(fired) => self.on_timer(fired).await,
            Command::Transport(event) => self.on_transport_event(event),
        }
    }

    async fn enqueue(&mut self, track: Track, reply: oneshot::Sender<EnqueueReply>) {
        let position = match self.queue.push(track) {
            Ok(position) => position,
            Err(e) => {
                let _ = reply.send(Err(EnqueueRejected::Failed(e)));
                return;
            }
        };

        if self.timers.cancel(TimerKind::IdleDisconnect) {
            info!("⏰ Idle disconnect canceled for guild {}", self.queue.guild_id());
        }

        // First enqueue on a fresh queue: connect and bind transport events before playback
        if self.connection.is_none() {
            self.queue.set_state(PlaybackState::Connecting);
            let connected = self
                .sink
                .connect(
                    self.queue.guild_id(),
                    self.queue.channel_id(),
                    self.transport_tx.clone(),
                )
                .await;

            match connected {
                Ok(connection) => {
                    info!("✅ Connected to voice channel {}", self.queue.channel_id());
                    self.connection = Some(connection);
                }
                Err(e) => {
                    error!("❌ Failed to connect to voice channel: {}", e);
                    self.drain("voice connection failed").await;
                    let _ = reply.send(Err(EnqueueRejected::Failed(QueueError::Connect(e))));
                    return;
                }
            }
        }

        let _ = reply.send(Ok(position));

        if position == 1
            && matches!(
                self.queue.state(),
                PlaybackState::Idle | PlaybackState::Connecting
            )
        {
            self.play_head().await;
        }
    }

    /// Opens and starts the head track. Only the controller calls this.
    async fn play_head(&mut self) {
        let Some(head) = self.queue.head().cloned() else {
            self.go_idle();
            return;
        };

        let Some(connection) = self.connection.as_ref() else {
            error!("❌ No voice connection while starting '{}'", head.title());
            self.drain("connection missing").await;
            return;
        };

        self.queue.set_state(PlaybackState::Connecting);
        let opened = self.sink.open_stream(connection, head.source_locator()).await;

        match opened {
            Ok((resource, events)) => {
                self.sink.set_gain(&resource, self.queue.volume().gain());
                self.sink.play(&resource);
                self.active = Some(ActiveResource { resource, events });
                self.queue.set_state(PlaybackState::Playing);
                info!("🎵 Now playing: '{}' ({})", head.title(), head.display_duration());
            }
            Err(e) => {
                warn!("❌ Could not play '{}': {}", head.title(), e);
                self.queue.pop_head();
                self.retry_or_idle();
            }
        }
    }

    /// After the head was dropped for a failure: back off and retry the next one, or go idle.
    fn retry_or_idle(&mut self) {
        if self.queue.is_empty() {
            info!("❌ No more tracks to try");
            self.go_idle();
            return;
        }

        info!(
            "⏭️ Trying next track in {:?} ({} remaining)",
            self.settings.retry_backoff,
            self.queue.len()
        );
        self.queue.set_state(PlaybackState::ErrorRetry);
        self.arm(TimerKind::RetryBackoff);
    }

    /// After the head was consumed normally: play the next one, or go idle.
    async fn advance(&mut self) {
        if self.queue.is_empty() {
            self.go_idle();
        } else {
            self.play_head().await;
        }
    }

    fn go_idle(&mut self) {
        self.queue.set_state(PlaybackState::Idle);
        info!(
            "📭 Queue empty, disconnecting in {:?} unless something is queued",
            self.settings.idle_timeout
        );
        self.arm(TimerKind::IdleDisconnect);
    }

    fn arm(&mut self, kind: TimerKind) {
        let delay = match kind {
            TimerKind::IdleDisconnect => self.settings.idle_timeout,
            TimerKind::RetryBackoff => self.settings.retry_backoff,
            TimerKind::DisconnectGrace => self.settings.disconnect_grace,
        };
        let mailbox = self.mailbox_tx.clone();
        self.timers.arm(kind, delay, move |fired| {
            let _ = mailbox.send(Command::Timer(fired));
        });
    }

    fn pause(&mut self) -> ControlOutcome {
        match (self.queue.state(), &self.active) {
            (PlaybackState::Playing, Some(active)) => {
                self.sink.pause(&active.resource);
                self.queue.set_state(PlaybackState::Paused);
                info!("⏸️ Playback paused");
                ControlOutcome::Paused
            }
            (PlaybackState::Paused, _) => ControlOutcome::AlreadyPaused,
            _ => ControlOutcome::NothingPlaying,
        }
    }

    fn resume(&mut self) -> ControlOutcome {
        match (self.queue.state(), &self.active) {
            (PlaybackState::Paused, Some(active)) => {
                self.sink.play(&active.resource);
                self.queue.set_state(PlaybackState::Playing);
                info!("▶️ Playback resumed");
                ControlOutcome::Resumed
            }
            (PlaybackState::Playing, _) => ControlOutcome::AlreadyPlaying,
            _ => ControlOutcome::NothingPlaying,
        }
    }

    /// Skips the head as it stands when the request is processed. A finish handled just before
    /// has already advanced, so the skip then removes the track that replaced it.
    async fn skip(&mut self) -> ControlOutcome {
        match self.queue.state() {
            PlaybackState::Playing | PlaybackState::Paused => {
                // Dropping the receiver discards the finish signal the stop will produce
                if let Some(active) = self.active.take() {
                    self.sink.stop(&active.resource);
                }
            }
            PlaybackState::ErrorRetry => {
                self.timers.cancel(TimerKind::RetryBackoff);
            }
            _ => return ControlOutcome::NothingPlaying,
        }

        let Some(skipped) = self.queue.pop_head() else {
            self.go_idle();
            return ControlOutcome::NothingPlaying;
        };
        info!("⏭️ Skipped '{}'", skipped.title());
        self.advance().await;
        ControlOutcome::Skipped(skipped)
    }

    fn set_volume(&mut self, percent: i64) -> ControlOutcome {
        let volume = self.queue.set_volume(percent);
        if let Some(active) = &self.active {
            self.sink.set_gain(&active.resource, volume.gain());
        }
        info!("🔊 Volume set to {}%", volume.percent());
        ControlOutcome::VolumeSet(volume.percent())
    }

    async fn on_resource_event(&mut self, event: ResourceEvent) {
        self.active = None;

        match event {
            ResourceEvent::Finished => {
                debug!("⏯️ Track finished, checking queue...");
                self.queue.pop_head();
                self.advance().await;
            }
            ResourceEvent::Errored(reason) => {
                warn!("❌ Playback error: {}", reason);
                self.queue.pop_head();
                self.retry_or_idle();
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Disconnected => {
                // a driver fault is authoritative even if a leave armed the grace first
                self.leave_unconfirmed = false;
                if !self.timers.is_armed(TimerKind::DisconnectGrace) {
                    warn!(
                        "🔌 Voice connection lost, tearing down in {:?} unless it reconnects",
                        self.settings.disconnect_grace
                    );
                    self.arm(TimerKind::DisconnectGrace);
                }
            }
            TransportEvent::Left => {
                if !self.timers.is_armed(TimerKind::DisconnectGrace) {
                    warn!(
                        "🔌 Gateway reports no voice channel, checking again in {:?}",
                        self.settings.disconnect_grace
                    );
                    self.leave_unconfirmed = true;
                    self.arm(TimerKind::DisconnectGrace);
                }
            }
            TransportEvent::Reconnected => {
                self.leave_unconfirmed = false;
                if self.timers.cancel(TimerKind::DisconnectGrace) {
                    info!("🔄 Voice connection restored, teardown aborted");
                }
            }
        }
    }

    async fn on_timer(&mut self, fired: TimerFired) {
        if !self.timers.take_if_current(fired) {
            debug!("Ignoring stale {:?} timer #{}", fired.kind, fired.id);
            return;
        }

        match fired.kind {
            TimerKind::IdleDisconnect => {
                if self.queue.is_empty() && self.queue.state() == PlaybackState::Idle {
                    info!("🚪 Auto-disconnecting from idle channel");
                    self.drain("idle timeout").await;
                }
            }
            TimerKind::RetryBackoff => {
                if self.queue.state() == PlaybackState::ErrorRetry {
                    self.play_head().await;
                }
            }
            TimerKind::DisconnectGrace => {
                let confirm = std::mem::take(&mut self.leave_unconfirmed);
                if confirm && self.still_connected().await {
                    info!("🔄 Still in voice, ignoring stale leave");
                    return;
                }
                self.drain("voice connection lost").await;
            }
        }
    }

    async fn still_connected(&self) -> bool {
        match self.connection.as_ref() {
            Some(connection) => self.sink.is_connected(connection).await,
            None => false,
        }
    }

    /// Terminal teardown: releases everything and unregisters this queue.
    async fn drain(&mut self, reason: &str) {
        let guild_id = self.queue.guild_id();
        info!("🧹 Cleaning up guild {} ({})", guild_id, reason);

        self.queue.clear();
        self.queue.set_state(PlaybackState::Draining);
        self.timers.cancel_all();

        if let Some(active) = self.active.take() {
            self.sink.stop(&active.resource);
        }
        if let Some(connection) = self.connection.take() {
            self.sink.disconnect(connection).await;
        }

        // Unregister before closing so new callers create a fresh queue
        let instance = self.instance;
        self.registry
            .remove_if(&guild_id, |_, handle| handle.instance() == instance);

        self.mailbox.close();
        while let Ok(command) = self.mailbox.try_recv() {
            command.reject();
        }

        info!("✅ Cleanup completed for guild {}", guild_id);
    }
}

async fn next_resource_event<R>(active: &mut Option<ActiveResource<R>>) -> ResourceEvent {
    match active {
        Some(active) => (&mut active.events)
            .await
            .unwrap_or(ResourceEvent::Finished),
        None => std::future::pending().await,
    }
}
