//! # Bot Module
//!
//! Discord front end for the guild queues.
//!
//! The bot itself keeps no playback state: every command is turned into a call on the shared
//! [`QueueManager`], and every reply is built from what the manager returns.
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use guild_jukebox::{audio::{songbird_sink::SongbirdSink, QueueManager}, bot::JukeboxBot, config::Config, sources::YtDlpResolver};
//! # fn example(sink: Arc<SongbirdSink>) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let manager = Arc::new(QueueManager::new(sink, config.queue.clone()));
//! let resolver = Arc::new(YtDlpResolver::new(config.ytdlp_path.clone()));
//! let bot = JukeboxBot::new(config, manager, resolver);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{ActivityData, Context, EventHandler, GuildId, Interaction, OnlineStatus, Ready, VoiceState},
    async_trait,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{sink::TransportEvent, songbird_sink::SongbirdSink, QueueManager},
    config::Config,
    sources::Resolver,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(3600);

/// Serenity event handler wiring slash commands to the queue manager.
pub struct JukeboxBot {
    config: Arc<Config>,
    pub manager: Arc<QueueManager<SongbirdSink>>,
    pub resolver: Arc<dyn Resolver>,
    status_started: AtomicBool,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        manager: Arc<QueueManager<SongbirdSink>>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            manager,
            resolver,
            status_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set and globally otherwise.
    ///
    /// Guild commands show up within seconds; global ones can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of guild {}, skipping registration", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Guild command registration failed: {:?}", e);
                        anyhow::anyhow!(
                            "Could not register guild commands. Check the 'applications.commands' scope."
                        )
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Global command registration failed: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register global commands. Check the 'applications.commands' scope."
                    )
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }

        ctx.set_presence(Some(ActivityData::listening("/play")), OnlineStatus::Online);

        // ready fires again after every gateway resume
        if !self.status_started.swap(true, Ordering::SeqCst) {
            let manager = self.manager.clone();
            tokio::spawn(async move {
                status_report(manager).await;
            });
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Reports the bot leaving voice to the guild's queue.
    ///
    /// Our own teardown produces the same event, and it can be handled after a new queue has
    /// already joined, so the queue confirms the leave after its grace window instead of being
    /// destroyed here.
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot left voice in guild {}", guild_id);
            self.manager.report_transport(guild_id, TransportEvent::Left);
        }
    }
}

/// Logs how many guild queues are live, once an hour.
async fn status_report(manager: Arc<QueueManager<SongbirdSink>>) {
    let mut interval = tokio::time::interval(STATUS_INTERVAL);

    loop {
        interval.tick().await;
        info!("📊 Active queues: {}", manager.active_queues());
    }
}
