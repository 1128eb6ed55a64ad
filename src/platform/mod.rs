//! Chat-platform primitives consumed by the delivery engine.
//!
//! The engine only needs to post, edit, open threads, and show typing. `discord::DiscordPlatform`
//! provides these over serenity, and tests substitute a recording implementation.

pub mod discord;

use async_trait::async_trait;

use crate::core::models::{InteractionRef, MessageBody, PostedMessage, ThreadHandle};
use crate::errors::RelayError;

pub use discord::DiscordPlatform;

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Posts a plain message, optionally as a reply to `reply_to`.
    async fn send_text(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError>;

    /// Posts a message carrying `text` in a single embed.
    async fn send_rich(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError>;

    /// Replaces the (deferred) response of an interaction.
    async fn edit_response(
        &self,
        interaction: &InteractionRef,
        body: MessageBody<'_>,
    ) -> Result<PostedMessage, RelayError>;

    /// Acknowledges an interaction so the platform waits for a later edit.
    async fn defer_response(&self, interaction: &InteractionRef) -> Result<(), RelayError>;

    /// Opens a thread anchored on an existing message.
    async fn start_thread(
        &self,
        channel_id: u64,
        anchor_message_id: u64,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<ThreadHandle, RelayError>;

    async fn send_typing(&self, channel_id: u64) -> Result<(), RelayError>;
}
