use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction, ComponentInteractionDataKind},
        id::{ChannelId, GuildId, UserId},
        permissions::Permissions,
    },
    prelude::Context,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    audio::{
        manager::{ControlOutcome, QueueManager},
        queue::PlaybackState,
        sink::PlaybackSink,
        track::Track,
    },
    bot::JukeboxBot,
    error::{QueueError, ResolveError},
    sources::{QueryKind, Resolver},
    ui::{buttons, embeds},
};

/// A `/play` request that made it into the queue.
#[derive(Debug, Clone)]
pub struct Queued {
    pub track: Track,
    pub position: usize,
    pub kind: QueryKind,
}

#[derive(Error, Debug)]
pub enum PlayError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl PlayError {
    pub fn user_message(&self) -> String {
        match self {
            PlayError::Resolve(e) => embeds::resolve_error_message(e),
            PlayError::Queue(e) => embeds::queue_error_message(e),
        }
    }
}

/// Resolves `query` and enqueues the result. A failed lookup leaves the queue untouched.
pub async fn play_query<S: PlaybackSink>(
    resolver: &dyn Resolver,
    manager: &QueueManager<S>,
    guild_id: GuildId,
    channel_id: ChannelId,
    query: &str,
    requested_by: UserId,
) -> Result<Queued, PlayError> {
    let resolved = resolver.resolve(query, requested_by).await?;
    let position = manager
        .enqueue(guild_id, channel_id, resolved.track.clone())
        .await?;

    Ok(Queued {
        track: resolved.track,
        position,
        kind: resolved.kind,
    })
}

/// Handles slash commands
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply(ctx, &command, "❌ This command only works in a server", true).await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "pause" => {
            let outcome = bot.manager.pause(guild_id).await;
            reply_outcome(ctx, &command, &outcome).await?;
        }
        "resume" => {
            let outcome = bot.manager.resume(guild_id).await;
            reply_outcome(ctx, &command, &outcome).await?;
        }
        "skip" => {
            let outcome = bot.manager.skip(guild_id).await;
            reply_outcome(ctx, &command, &outcome).await?;
        }
        "stop" => {
            let outcome = bot.manager.stop(guild_id).await;
            reply_outcome(ctx, &command, &outcome).await?;
        }
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        _ => reply(ctx, &command, "❌ Unknown command", true).await?,
    }

    Ok(())
}

/// Handles button presses and select menus
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    info!(
        "🔘 {} pressed by {} in guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let message = match component.data.custom_id.as_str() {
        buttons::button_ids::PAUSE_TOGGLE => {
            let outcome = bot.manager.toggle_pause(guild_id).await;
            let paused = matches!(outcome, ControlOutcome::Paused);
            return update_message(
                ctx,
                &component,
                CreateInteractionResponseMessage::new()
                    .content(embeds::outcome_message(&outcome))
                    .components(buttons::create_player_buttons(paused)),
            )
            .await;
        }
        buttons::button_ids::SKIP => embeds::outcome_message(&bot.manager.skip(guild_id).await),
        buttons::button_ids::STOP => embeds::outcome_message(&bot.manager.stop(guild_id).await),
        buttons::button_ids::VOLUME => {
            let Some(snapshot) = bot.manager.snapshot(guild_id).await else {
                return respond_ephemeral(ctx, &component, "❌ Nothing is playing").await;
            };
            return component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(format!("🔊 Current volume: {}%", snapshot.volume))
                            .components(buttons::create_volume_menu(snapshot.volume))
                            .ephemeral(true),
                    ),
                )
                .await
                .map_err(Into::into);
        }
        buttons::button_ids::VOLUME_SELECT => {
            let choice = match &component.data.kind {
                ComponentInteractionDataKind::StringSelect { values } => {
                    values.first().and_then(|v| buttons::parse_volume_choice(v))
                }
                _ => None,
            };
            match choice {
                Some(percent) => {
                    embeds::outcome_message(&bot.manager.set_volume(guild_id, percent).await)
                }
                None => "❌ Invalid volume".to_string(),
            }
        }
        other => {
            warn!("⚠️ Unknown component id: {}", other);
            "❌ Unknown action".to_string()
        }
    };

    respond_ephemeral(ctx, &component, &message).await
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default()
        .to_string();

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "❌ You must be in a voice channel", true).await;
    };

    if let Some(permissions) = bot_permissions_in(ctx, guild_id, channel_id) {
        let missing = missing_voice_permissions(permissions);
        if !missing.is_empty() {
            warn!(
                "🔒 Missing {:?} in channel {} of guild {}",
                missing, channel_id, guild_id
            );
            let message = format!(
                "❌ Missing Permissions: I need {} in your voice channel",
                missing.join(" and ")
            );
            return reply(ctx, command, &message, true).await;
        }
    }

    // Resolution can take a few seconds
    command.defer(&ctx.http).await?;

    let edit = match play_query(
        bot.resolver.as_ref(),
        bot.manager.as_ref(),
        guild_id,
        channel_id,
        &query,
        command.user.id,
    )
    .await
    {
        Ok(queued) => {
            info!(
                "✅ '{}' queued at position {} in guild {}",
                queued.track.title(),
                queued.position,
                guild_id
            );
            let mut edit = EditInteractionResponse::new().embed(embeds::create_track_added_embed(
                &queued.track,
                queued.position,
                queued.kind,
            ));
            if queued.position == 1 {
                edit = edit.components(buttons::create_player_buttons(false));
            }
            edit
        }
        Err(e) => {
            warn!("❌ /play '{}' failed: {}", query, e);
            EditInteractionResponse::new()
                .embed(embeds::create_error_embed("Could not play", &e.user_message()))
        }
    };

    command.edit_response(&ctx.http, edit).await?;
    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1)
        .max(1) as usize;

    let snapshot = bot.manager.snapshot(guild_id).await;
    let embed = embeds::create_queue_embed(snapshot.as_ref(), page);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.manager.snapshot(guild_id).await;
    let Some((embed, paused)) = snapshot.as_ref().and_then(|s| {
        embeds::create_now_playing_embed(s).map(|embed| (embed, s.state == PlaybackState::Paused))
    }) else {
        return reply(ctx, command, "❌ Nothing is playing right now", true).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .components(buttons::create_player_buttons(paused)),
            ),
        )
        .await?;
    Ok(())
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64());

    match level {
        Some(level) => {
            let outcome = bot.manager.set_volume(guild_id, level).await;
            reply_outcome(ctx, command, &outcome).await
        }
        None => match bot.manager.snapshot(guild_id).await {
            Some(snapshot) => {
                command
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content(format!("🔊 Current volume: {}%", snapshot.volume))
                                .components(buttons::create_volume_menu(snapshot.volume)),
                        ),
                    )
                    .await?;
                Ok(())
            }
            None => reply(ctx, command, "❌ Nothing is playing", true).await,
        },
    }
}

// Helpers

/// The voice channel `user_id` is sitting in, from the gateway cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// The bot's effective permissions in `channel_id`, when the cache has what it needs.
fn bot_permissions_in(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Option<Permissions> {
    let bot_id = ctx.cache.current_user().id;
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel = guild.channels.get(&channel_id)?;
    let member = guild.members.get(&bot_id)?;
    Some(guild.user_permissions_in(channel, member))
}

/// Names of the voice permissions the bot lacks for playback.
pub fn missing_voice_permissions(permissions: Permissions) -> Vec<&'static str> {
    [(Permissions::CONNECT, "Connect"), (Permissions::SPEAK, "Speak")]
        .into_iter()
        .filter(|(required, _)| !permissions.contains(*required))
        .map(|(_, name)| name)
        .collect()
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_outcome(
    ctx: &Context,
    command: &CommandInteraction,
    outcome: &ControlOutcome,
) -> Result<()> {
    reply(ctx, command, &embeds::outcome_message(outcome), outcome.is_noop()).await
}

async fn respond_ephemeral(
    ctx: &Context,
    component: &ComponentInteraction,
    content: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn update_message(
    ctx: &Context,
    component: &ComponentInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<()> {
    component
        .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(message))
        .await?;
    Ok(())
}
