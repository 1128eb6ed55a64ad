//! Entry points for inbound events.
//!
//! Every accepted event becomes one response cycle: acknowledge, call the remote API (blocking
//! or streaming), then hand the result to the publisher or the stream coordinator. Remote
//! failures never reach the caller; the user sees the fixed failure message instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::parsing::{InboundCommand, InboundMessage, command_request, route_message};
use crate::ai::{GenerationApi, RelayClient};
use crate::core::config::AppConfig;
use crate::core::models::{DeliveryTarget, MessageBody, PublishResult};
use crate::delivery::{
    DeliveryLimits, FAILURE_MESSAGE, StreamCoordinator, StreamOutcome, StreamReport,
    TieredPublisher,
};
use crate::errors::RelayError;
use crate::platform::ChatPlatform;

/// Slash command answered with a blocking call.
pub const CHAT_COMMAND_NAME: &str = "chat";

/// A slash command answered with a streaming call.
#[derive(Clone)]
pub struct StreamCommand {
    pub name: String,
    pub api: Arc<dyn GenerationApi>,
}

impl std::fmt::Debug for StreamCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How a recognized slash command is answered.
#[derive(Clone, Copy)]
pub enum CommandRoute<'a> {
    Blocking(&'a Arc<dyn GenerationApi>),
    Streaming(&'a Arc<dyn GenerationApi>),
}

/// What happened to one accepted event.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A blocking response was published.
    Published(PublishResult),
    /// A streaming cycle ran to its end (which may itself be a failure or cancellation).
    Streamed(StreamReport),
    /// The remote API failed; the failure message was published instead.
    ApiFailed(RelayError),
    /// The interaction could not be acknowledged, so nothing else was attempted.
    Unacknowledged(RelayError),
    /// Shutdown arrived before the remote API answered.
    Cancelled,
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Dispatcher {
    publisher: TieredPublisher,
    chat: Arc<dyn GenerationApi>,
    streams: Vec<StreamCommand>,
    update_interval: Duration,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("publisher", &self.publisher)
            .field("streams", &self.streams)
            .field("update_interval", &self.update_interval)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        publisher: TieredPublisher,
        chat: Arc<dyn GenerationApi>,
        update_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            publisher,
            chat,
            streams: Vec::new(),
            update_interval,
            shutdown,
        }
    }

    /// Adds a streaming slash command. Names equal to the chat command are ignored.
    #[must_use]
    pub fn with_stream_command(mut self, name: impl Into<String>, api: Arc<dyn GenerationApi>) -> Self {
        let name = name.into();
        if name != CHAT_COMMAND_NAME && !self.streams.iter().any(|s| s.name == name) {
            self.streams.push(StreamCommand { name, api });
        }
        self
    }

    /// Wires HTTP clients for every configured endpoint.
    ///
    /// Streaming commands are only added when their endpoint is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(
        config: &AppConfig,
        platform: Arc<dyn ChatPlatform>,
        shutdown: CancellationToken,
    ) -> Result<Self, RelayError> {
        let publisher = TieredPublisher::new(platform, DeliveryLimits::default());
        let chat = RelayClient::new(&config.api_endpoint, &config.api_key, config.api_timeout)?;
        let mut dispatcher = Self::new(
            publisher,
            Arc::new(chat),
            config.stream_update_interval,
            shutdown,
        );

        if let Some(endpoint) = &config.stream_api_endpoint {
            let client = RelayClient::new(endpoint, &config.api_key, config.api_timeout)?;
            dispatcher = dispatcher.with_stream_command(&config.stream_command_name, Arc::new(client));
        }
        if let Some(endpoint) = &config.elysia_api_endpoint {
            let client =
                RelayClient::new(endpoint, &config.elysia_api_key, config.api_timeout)?;
            dispatcher =
                dispatcher.with_stream_command(&config.elysia_command_name, Arc::new(client));
        }

        Ok(dispatcher)
    }

    /// Names of every slash command this dispatcher answers, chat first.
    #[must_use]
    pub fn command_names(&self) -> Vec<&str> {
        std::iter::once(CHAT_COMMAND_NAME)
            .chain(self.streams.iter().map(|s| s.name.as_str()))
            .collect()
    }

    #[must_use]
    pub fn route_command(&self, name: &str) -> Option<CommandRoute<'_>> {
        if name == CHAT_COMMAND_NAME {
            return Some(CommandRoute::Blocking(&self.chat));
        }
        self.streams
            .iter()
            .find(|s| s.name == name)
            .map(|s| CommandRoute::Streaming(&s.api))
    }

    /// Handles a slash command. Returns `None` when the command is not ours or is malformed.
    #[tracing::instrument(skip_all, fields(command = %command.name, channel_id = command.channel_id))]
    pub async fn handle_command(&self, command: InboundCommand) -> Option<DispatchOutcome> {
        let route = self.route_command(&command.name)?;
        let Some((text, user_key)) = command_request(&command) else {
            debug!("command without message or user; ignoring");
            return None;
        };

        let correlation_id = Uuid::new_v4().to_string();
        info!(
            correlation_id = %correlation_id,
            user_id = %user_key,
            message_len = text.chars().count(),
            "slash command received"
        );

        if let Err(e) = self.publisher.platform().defer_response(&command.interaction).await {
            error!(
                correlation_id = %correlation_id,
                user_id = %user_key,
                error = %e,
                "failed to send deferred response"
            );
            return Some(DispatchOutcome::Unacknowledged(e));
        }

        let target = command.target();
        let outcome = match route {
            CommandRoute::Blocking(api) => {
                self.respond_blocking(api.as_ref(), &text, &user_key, &target, &correlation_id)
                    .await
            }
            CommandRoute::Streaming(api) => {
                self.respond_streaming(api.as_ref(), &text, &user_key, target, &correlation_id)
                    .await
            }
        };
        Some(outcome)
    }

    /// Handles a mention or a follow-up in a response thread. Returns `None` when declined.
    #[tracing::instrument(skip_all, fields(channel_id = message.channel_id, message_id = message.message_id))]
    pub async fn handle_message(
        &self,
        message: InboundMessage,
        bot_user_id: u64,
    ) -> Option<DispatchOutcome> {
        let route = route_message(&message, bot_user_id)?;

        let correlation_id = Uuid::new_v4().to_string();
        info!(
            correlation_id = %correlation_id,
            user_id = message.author_id,
            kind = ?route.kind,
            message_len = route.text.chars().count(),
            "message received"
        );

        if let Err(e) = self
            .publisher
            .platform()
            .send_typing(route.target.channel_id())
            .await
        {
            debug!(correlation_id = %correlation_id, error = %e, "failed to send typing indicator");
        }

        let outcome = self
            .respond_blocking(
                self.chat.as_ref(),
                &route.text,
                &route.user_key,
                &route.target,
                &correlation_id,
            )
            .await;
        Some(outcome)
    }

    // ========================================================================
    // Response cycles
    // ========================================================================

    async fn respond_blocking(
        &self,
        api: &dyn GenerationApi,
        text: &str,
        user_key: &str,
        target: &DeliveryTarget,
        correlation_id: &str,
    ) -> DispatchOutcome {
        let cancel = self.shutdown.child_token();
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(correlation_id = %correlation_id, "shutdown before api response; dropping request");
                return DispatchOutcome::Cancelled;
            }
            result = api.send(text, user_key) => result,
        };
        let duration_ms = elapsed_ms(start);

        match result {
            Ok(response) => {
                info!(
                    correlation_id = %correlation_id,
                    user_id = %user_key,
                    duration_ms,
                    response_length = response.chars().count(),
                    "api response received"
                );
                let published = self.publisher.publish(target, &response, correlation_id).await;
                DispatchOutcome::Published(published)
            }
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    user_id = %user_key,
                    target = %target,
                    duration_ms,
                    error = %e,
                    "failed to get response from API"
                );
                self.publish_failure(target, correlation_id).await;
                DispatchOutcome::ApiFailed(e)
            }
        }
    }

    async fn respond_streaming(
        &self,
        api: &dyn GenerationApi,
        text: &str,
        user_key: &str,
        target: DeliveryTarget,
        correlation_id: &str,
    ) -> DispatchOutcome {
        let cancel = self.shutdown.child_token();
        let start = Instant::now();

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(correlation_id = %correlation_id, "shutdown before stream opened; dropping request");
                return DispatchOutcome::Cancelled;
            }
            opened = api.send_stream(text, user_key) => opened,
        };

        let feed = match opened {
            Ok(feed) => feed,
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    user_id = %user_key,
                    target = %target,
                    duration_ms = elapsed_ms(start),
                    error = %e,
                    "failed to open stream"
                );
                self.publish_failure(&target, correlation_id).await;
                return DispatchOutcome::ApiFailed(e);
            }
        };

        let coordinator = StreamCoordinator::new(
            self.publisher.clone(),
            target,
            self.update_interval,
            correlation_id,
        );
        let report = coordinator.run(feed, &cancel).await;

        let outcome = match &report.outcome {
            StreamOutcome::Completed(_) => "completed",
            StreamOutcome::Failed(_) => "failed",
            StreamOutcome::Cancelled => "cancelled",
        };
        info!(
            correlation_id = %correlation_id,
            user_id = %user_key,
            duration_ms = elapsed_ms(start),
            chunks = report.chunks,
            response_length = report.length,
            provisional_publishes = report.provisional_publishes,
            outcome,
            "stream finished"
        );
        DispatchOutcome::Streamed(report)
    }

    async fn publish_failure(&self, target: &DeliveryTarget, correlation_id: &str) {
        if let Err(e) = self
            .publisher
            .deliver(target, MessageBody::Text(FAILURE_MESSAGE))
            .await
        {
            error!(
                correlation_id = %correlation_id,
                target = %target,
                error = %e,
                "failed to publish failure message"
            );
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
