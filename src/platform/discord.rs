//! `ChatPlatform` over serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    AutoArchiveDuration, ChannelId, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateThread, EditInteractionResponse,
    InteractionId, MessageId,
};
use serenity::http::Http;
use serenity::model::channel::Message;
use tracing::debug;

use super::ChatPlatform;
use crate::core::models::{InteractionRef, MessageBody, PostedMessage, ThreadHandle};
use crate::errors::RelayError;

#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl std::fmt::Debug for DiscordPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordPlatform").finish_non_exhaustive()
    }
}

impl DiscordPlatform {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn send(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        builder: CreateMessage,
    ) -> Result<PostedMessage, RelayError> {
        let channel = ChannelId::new(channel_id);
        let builder = match reply_to {
            Some(message_id) => builder.reference_message((channel, MessageId::new(message_id))),
            None => builder,
        };
        let message = channel.send_message(self.http.as_ref(), builder).await?;
        Ok(posted(&message))
    }
}

fn posted(message: &Message) -> PostedMessage {
    PostedMessage {
        channel_id: message.channel_id.get(),
        message_id: message.id.get(),
    }
}

fn embed(text: &str) -> CreateEmbed {
    CreateEmbed::new().description(text)
}

/// Nearest archive duration Discord accepts.
fn archive_duration(minutes: u16) -> AutoArchiveDuration {
    match minutes {
        0..=60 => AutoArchiveDuration::OneHour,
        61..=1440 => AutoArchiveDuration::OneDay,
        1441..=4320 => AutoArchiveDuration::ThreeDays,
        _ => AutoArchiveDuration::OneWeek,
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn send_text(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError> {
        self.send(channel_id, reply_to, CreateMessage::new().content(text))
            .await
    }

    async fn send_rich(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError> {
        self.send(channel_id, reply_to, CreateMessage::new().embed(embed(text)))
            .await
    }

    async fn edit_response(
        &self,
        interaction: &InteractionRef,
        body: MessageBody<'_>,
    ) -> Result<PostedMessage, RelayError> {
        // Each edit replaces the other representation so a preview never leaves stale content.
        let builder = match body {
            MessageBody::Text(text) => EditInteractionResponse::new()
                .content(text)
                .embeds(Vec::new()),
            MessageBody::Rich(text) => EditInteractionResponse::new()
                .content("")
                .embeds(vec![embed(text)]),
        };
        let message = self
            .http
            .edit_original_interaction_response(&interaction.token, &builder, Vec::new())
            .await?;
        Ok(posted(&message))
    }

    async fn defer_response(&self, interaction: &InteractionRef) -> Result<(), RelayError> {
        let response = CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new());
        self.http
            .create_interaction_response(
                InteractionId::new(interaction.id),
                &interaction.token,
                &response,
                Vec::new(),
            )
            .await?;
        Ok(())
    }

    async fn start_thread(
        &self,
        channel_id: u64,
        anchor_message_id: u64,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<ThreadHandle, RelayError> {
        let builder =
            CreateThread::new(name).auto_archive_duration(archive_duration(auto_archive_minutes));
        let thread = ChannelId::new(channel_id)
            .create_thread_from_message(
                self.http.as_ref(),
                MessageId::new(anchor_message_id),
                builder,
            )
            .await?;
        debug!(
            channel_id,
            anchor_message_id,
            thread_id = thread.id.get(),
            "thread created"
        );
        Ok(ThreadHandle {
            thread_id: thread.id.get(),
        })
    }

    async fn send_typing(&self, channel_id: u64) -> Result<(), RelayError> {
        ChannelId::new(channel_id)
            .broadcast_typing(self.http.as_ref())
            .await?;
        Ok(())
    }
}
