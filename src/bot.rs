//! Discord gateway wiring: the serenity client, its event handler, and the slash-command
//! lifecycle (register on ready, delete on shutdown).

use std::sync::Arc;

use serenity::all::{
    ChannelId, ChannelType, Command, CommandId, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, EventHandler, GatewayIntents, GuildChannel, GuildId,
    Interaction, Message, Ready,
};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::Channel;
use serenity::Client;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::parsing::MESSAGE_OPTION;
use crate::api::{CHAT_COMMAND_NAME, Dispatcher, InboundCommand, InboundMessage, ThreadInfo};
use crate::core::config::AppConfig;
use crate::core::models::InteractionRef;
use crate::errors::RelayError;
use crate::platform::DiscordPlatform;

/// Description shown in Discord's command picker.
#[must_use]
pub fn command_description(name: &str) -> &'static str {
    if name == CHAT_COMMAND_NAME {
        "Send a message to the AI assistant"
    } else {
        "Send a message to the AI assistant and watch the reply stream in"
    }
}

fn build_command(name: &str) -> CreateCommand {
    CreateCommand::new(name)
        .description(command_description(name))
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, MESSAGE_OPTION, "Your message to send")
                .required(true),
        )
}

/// Commands registered by this process, for cleanup on shutdown.
#[derive(Debug, Default)]
struct Registry {
    command_ids: Vec<CommandId>,
    registered: bool,
}

struct RelayHandler {
    dispatcher: Arc<Dispatcher>,
    guild_id: Option<GuildId>,
    bot_user_id: Arc<OnceCell<u64>>,
    registry: Arc<Mutex<Registry>>,
}

impl RelayHandler {
    async fn register_commands(&self, http: &Http) {
        let mut registry = self.registry.lock().await;
        // `ready` fires again on reconnect
        if registry.registered {
            return;
        }
        registry.registered = true;

        for name in self.dispatcher.command_names() {
            let builder = build_command(name);
            let created = match self.guild_id {
                Some(guild) => guild.create_command(http, builder).await,
                None => Command::create_global_command(http, builder).await,
            };
            match created {
                Ok(command) => {
                    info!(command = %name, command_id = %command.id, guild_id = ?self.guild_id, "registered command");
                    registry.command_ids.push(command.id);
                }
                Err(e) => error!(command = %name, error = %e, "failed to register command"),
            }
        }
    }
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(&bot_id) = self.bot_user_id.get() else {
            debug!("message before ready; ignoring");
            return;
        };

        let inbound = inbound_message(&ctx, &msg).await;
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.handle_message(inbound, bot_id).await;
        });
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let inbound = inbound_command(&command);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.handle_command(inbound).await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        let _ = self.bot_user_id.set(ready.user.id.get());
        info!(
            user = %ready.user.name,
            user_id = %ready.user.id,
            "Discord bot connected"
        );
        self.register_commands(&ctx.http).await;
    }
}

fn inbound_command(command: &CommandInteraction) -> InboundCommand {
    let message = command
        .data
        .options
        .iter()
        .find(|o| o.name == MESSAGE_OPTION)
        .and_then(|o| o.value.as_str())
        .map(str::to_string);

    InboundCommand {
        name: command.data.name.clone(),
        interaction: InteractionRef {
            id: command.id.get(),
            token: command.token.clone(),
        },
        channel_id: command.channel_id.get(),
        member_user_id: command.member.as_ref().map(|m| m.user.id.get()),
        user_id: Some(command.user.id.get()),
        message,
        in_thread: command
            .channel
            .as_ref()
            .is_some_and(|c| is_thread_kind(c.kind)),
    }
}

const fn is_thread_kind(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

/// What the gateway cache knows about a message's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedChannel {
    Thread(ThreadInfo),
    Plain,
    Unknown,
}

impl CachedChannel {
    /// Thread metadata when the cache settles it, `None` when a REST lookup is needed.
    fn known(self) -> Option<Option<ThreadInfo>> {
        match self {
            Self::Thread(info) => Some(Some(info)),
            Self::Plain => Some(None),
            Self::Unknown => None,
        }
    }
}

fn thread_info(channel: &GuildChannel) -> ThreadInfo {
    ThreadInfo {
        owner_id: channel.owner_id.map(|id| id.get()),
        name: channel.name.clone(),
    }
}

fn cached_channel(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> CachedChannel {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return CachedChannel::Unknown;
    };
    if let Some(thread) = guild.threads.iter().find(|t| t.id == channel_id) {
        return CachedChannel::Thread(thread_info(thread));
    }
    match guild.channels.get(&channel_id) {
        Some(channel) if is_thread_kind(channel.kind) => CachedChannel::Thread(thread_info(channel)),
        Some(_) => CachedChannel::Plain,
        None => CachedChannel::Unknown,
    }
}

async fn inbound_message(ctx: &Context, msg: &Message) -> InboundMessage {
    // Only guild channels can be threads. The cache answers for almost every channel; the
    // REST lookup covers the rest.
    let thread = match msg.guild_id {
        None => None,
        Some(guild_id) => match cached_channel(ctx, guild_id, msg.channel_id).known() {
            Some(known) => known,
            None => match msg.channel_id.to_channel(ctx).await {
                Ok(Channel::Guild(channel)) if is_thread_kind(channel.kind) => {
                    Some(thread_info(&channel))
                }
                Ok(_) => None,
                Err(e) => {
                    debug!(channel_id = %msg.channel_id, error = %e, "failed to look up channel");
                    None
                }
            },
        },
    };

    InboundMessage {
        message_id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        mentions: msg.mentions.iter().map(|u| u.id.get()).collect(),
        thread,
    }
}

async fn unregister_commands(http: &Http, guild_id: Option<GuildId>, registry: &Mutex<Registry>) {
    let ids = std::mem::take(&mut registry.lock().await.command_ids);
    for id in ids {
        let deleted = match guild_id {
            Some(guild) => guild.delete_command(http, id).await,
            None => Command::delete_global_command(http, id).await,
        };
        if let Err(e) = deleted {
            warn!(command_id = %id, error = %e, "failed to delete command");
        }
    }
    info!("cleaned up commands");
}

/// The relay bot: one serenity client plus the dispatcher behind it.
pub struct RelayBot {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl RelayBot {
    #[must_use]
    pub fn new(config: AppConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Connects to Discord and serves events until the shutdown token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the gateway connection fails.
    pub async fn run(self) -> Result<(), RelayError> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let http = Arc::new(Http::new(&self.config.discord_token));
        let platform = Arc::new(DiscordPlatform::new(Arc::clone(&http)));
        let dispatcher = Arc::new(Dispatcher::from_config(
            &self.config,
            platform,
            self.shutdown.clone(),
        )?);
        info!(commands = ?dispatcher.command_names(), "dispatcher ready");

        let guild_id = self.config.guild_id.map(GuildId::new);
        let registry = Arc::new(Mutex::new(Registry::default()));
        let handler = RelayHandler {
            dispatcher,
            guild_id,
            bot_user_id: Arc::new(OnceCell::new()),
            registry: Arc::clone(&registry),
        };

        let mut client = Client::builder(&self.config.discord_token, intents)
            .event_handler(handler)
            .await?;

        let shard_manager = client.shard_manager.clone();
        let shutdown = self.shutdown.clone();
        let unregister = self.config.unregister_commands_on_shutdown;
        let client_http = Arc::clone(&client.http);
        tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("shutting down");
            if unregister {
                unregister_commands(&client_http, guild_id, &registry).await;
            }
            shard_manager.shutdown_all().await;
        });

        client.start().await?;
        info!("Discord client stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_kinds_are_recognized() {
        assert!(is_thread_kind(ChannelType::PublicThread));
        assert!(is_thread_kind(ChannelType::PrivateThread));
        assert!(is_thread_kind(ChannelType::NewsThread));
        assert!(!is_thread_kind(ChannelType::Text));
        assert!(!is_thread_kind(ChannelType::Forum));
    }

    #[test]
    fn only_unknown_channels_need_a_lookup() {
        let info = ThreadInfo {
            owner_id: Some(42),
            name: "Full Response".to_string(),
        };
        assert_eq!(
            CachedChannel::Thread(info.clone()).known(),
            Some(Some(info))
        );
        assert_eq!(CachedChannel::Plain.known(), Some(None));
        assert_eq!(CachedChannel::Unknown.known(), None);
    }

    #[test]
    fn chat_and_stream_commands_have_distinct_descriptions() {
        assert_eq!(
            command_description(CHAT_COMMAND_NAME),
            "Send a message to the AI assistant"
        );
        assert_ne!(
            command_description("stream"),
            command_description(CHAT_COMMAND_NAME)
        );
    }
}
