use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{
    controller::{Command, EnqueueRejected, PlaybackController},
    queue::QueueSnapshot,
    sink::{PlaybackSink, TransportEvent},
    track::Track,
};
use crate::{config::QueueSettings, error::QueueError};

pub use super::controller::ControlOutcome;

pub(crate) type Registry = Arc<DashMap<GuildId, GuildHandle>>;

/// Mailbox of one live guild queue.
#[derive(Debug, Clone)]
pub struct GuildHandle {
    instance: u64,
    tx: mpsc::UnboundedSender<Command>,
}

impl GuildHandle {
    pub(crate) fn new(instance: u64, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { instance, tx }
    }

    /// Distinguishes successive queues created for the same guild.
    pub fn instance(&self) -> u64 {
        self.instance
    }
}

/// Process-wide registry of guild queues and the entry point for every queue mutation.
///
/// The map is sharded ([`DashMap`]) and each queue is owned by its own controller task, so
/// operations on different guilds never contend beyond a shard lookup. Create and teardown of
/// the same guild are serialized through the controller: a retiring queue unregisters itself
/// before it stops accepting commands, and anything that reaches it late is bounced back so
/// the caller lands on a fresh queue.
pub struct QueueManager<S: PlaybackSink> {
    sink: Arc<S>,
    settings: QueueSettings,
    queues: Registry,
    next_instance: AtomicU64,
}

impl<S: PlaybackSink> QueueManager<S> {
    pub fn new(sink: Arc<S>, settings: QueueSettings) -> Self {
        Self {
            sink,
            settings,
            queues: Arc::new(DashMap::new()),
            next_instance: AtomicU64::new(1),
        }
    }

    /// Returns the guild's live queue or creates an idle one bound to `channel_id`.
    pub fn get_or_create(&self, guild_id: GuildId, channel_id: ChannelId) -> GuildHandle {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| {
                let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
                PlaybackController::spawn(
                    instance,
                    guild_id,
                    channel_id,
                    self.sink.clone(),
                    self.settings.clone(),
                    self.queues.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.queues.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Number of live guild queues.
    pub fn active_queues(&self) -> usize {
        self.queues.len()
    }

    /// Tears the guild's queue down. Absent guilds are a no-op.
    pub async fn destroy(&self, guild_id: GuildId) {
        let Some(handle) = self.get(guild_id) else {
            debug!("No queue to destroy for guild {}", guild_id);
            return;
        };

        let (reply, done) = oneshot::channel();
        if handle.tx.send(Command::Destroy { reply }).is_ok() {
            let _ = done.await;
        }
        self.forget(guild_id, &handle);
    }

    /// Appends `track` to the guild's queue, creating and connecting it if needed.
    ///
    /// Returns the track's 1-based position; 1 means it is playing now.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        track: Track,
    ) -> Result<usize, QueueError> {
        let mut track = track;

        loop {
            let handle = self.get_or_create(guild_id, channel_id);
            let (reply, answer) = oneshot::channel();

            match handle.tx.send(Command::Enqueue { track, reply }) {
                Ok(()) => {}
                Err(mpsc::error::SendError(Command::Enqueue { track: returned, .. })) => {
                    debug!("Queue for guild {} retired, retrying enqueue", guild_id);
                    self.forget(guild_id, &handle);
                    track = returned;
                    continue;
                }
                Err(_) => return Err(QueueError::Unavailable),
            }

            match answer.await {
                Ok(Ok(position)) => return Ok(position),
                Ok(Err(EnqueueRejected::Retired(returned))) => {
                    debug!("Queue for guild {} retired, retrying enqueue", guild_id);
                    self.forget(guild_id, &handle);
                    track = returned;
                }
                Ok(Err(EnqueueRejected::Failed(e))) => return Err(e),
                Err(_) => return Err(QueueError::Unavailable),
            }
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> ControlOutcome {
        self.control(guild_id, |reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self, guild_id: GuildId) -> ControlOutcome {
        self.control(guild_id, |reply| Command::Resume { reply }).await
    }

    /// Toggles between paused and playing.
    pub async fn toggle_pause(&self, guild_id: GuildId) -> ControlOutcome {
        match self.pause(guild_id).await {
            ControlOutcome::AlreadyPaused => self.resume(guild_id).await,
            outcome => outcome,
        }
    }

    pub async fn skip(&self, guild_id: GuildId) -> ControlOutcome {
        self.control(guild_id, |reply| Command::Skip { reply }).await
    }

    /// Clears the queue and tears it down immediately.
    pub async fn stop(&self, guild_id: GuildId) -> ControlOutcome {
        self.control(guild_id, |reply| Command::Stop { reply }).await
    }

    /// Sets the queue volume; out-of-range values are clamped to 0..=100.
    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> ControlOutcome {
        self.control(guild_id, |reply| Command::SetVolume { percent, reply })
            .await
    }

    /// Forwards a connection event observed outside the sink to the guild's live queue.
    /// Absent guilds are a no-op.
    pub fn report_transport(&self, guild_id: GuildId, event: TransportEvent) {
        let Some(handle) = self.get(guild_id) else {
            return;
        };
        if handle.tx.send(Command::Transport(event)).is_err() {
            self.forget(guild_id, &handle);
        }
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        let handle = self.get(guild_id)?;
        let (reply, answer) = oneshot::channel();
        handle.tx.send(Command::Snapshot { reply }).ok()?;
        answer.await.ok()
    }

    /// Destroys every live queue, releasing all voice connections.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.queues.iter().map(|entry| *entry.key()).collect();
        info!("🔄 Shutting down {} queues...", guilds.len());
        join_all(guilds.into_iter().map(|guild_id| self.destroy(guild_id))).await;
    }

    async fn control<F>(&self, guild_id: GuildId, make: F) -> ControlOutcome
    where
        F: FnOnce(oneshot::Sender<ControlOutcome>) -> Command,
    {
        let Some(handle) = self.get(guild_id) else {
            return ControlOutcome::NothingPlaying;
        };

        let (reply, answer) = oneshot::channel();
        if handle.tx.send(make(reply)).is_err() {
            self.forget(guild_id, &handle);
            return ControlOutcome::NothingPlaying;
        }
        answer.await.unwrap_or(ControlOutcome::NothingPlaying)
    }

    /// Drops the registry entry only if it still points at `handle`'s queue.
    fn forget(&self, guild_id: GuildId, handle: &GuildHandle) {
        self.queues
            .remove_if(&guild_id, |_, current| current.instance == handle.instance);
    }
}
