//! One-shot delivery of a completed response.
//!
//! The size of the response picks the tier: a plain message, a single embed, or a primary
//! embed followed by the remaining segments inside a thread anchored on it.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::segmenter::segment;
use super::strategy::{DeliveryLimits, DeliveryStrategy};
use super::{THREAD_AUTO_ARCHIVE_MINUTES, THREAD_NAME};
use crate::core::models::{DeliveryTarget, MessageBody, PostedMessage, PublishResult};
use crate::errors::RelayError;
use crate::platform::ChatPlatform;

#[derive(Clone)]
pub struct TieredPublisher {
    platform: Arc<dyn ChatPlatform>,
    limits: DeliveryLimits,
}

impl std::fmt::Debug for TieredPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredPublisher")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl TieredPublisher {
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>, limits: DeliveryLimits) -> Self {
        Self { platform, limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &DeliveryLimits {
        &self.limits
    }

    #[must_use]
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Issues a single publish to `target`.
    ///
    /// Interaction targets edit the deferred response, channel targets reply to the user's
    /// message, and thread targets post into the thread.
    ///
    /// # Errors
    ///
    /// Returns the platform error unchanged.
    pub async fn deliver(
        &self,
        target: &DeliveryTarget,
        body: MessageBody<'_>,
    ) -> Result<PostedMessage, RelayError> {
        match (target, body) {
            (DeliveryTarget::Interaction { interaction, .. }, body) => {
                self.platform.edit_response(interaction, body).await
            }
            (
                DeliveryTarget::Channel {
                    channel_id,
                    reply_to,
                    ..
                },
                MessageBody::Text(text),
            ) => self.platform.send_text(*channel_id, *reply_to, text).await,
            (
                DeliveryTarget::Channel {
                    channel_id,
                    reply_to,
                    ..
                },
                MessageBody::Rich(text),
            ) => self.platform.send_rich(*channel_id, *reply_to, text).await,
            (DeliveryTarget::Thread { thread_id }, MessageBody::Text(text)) => {
                self.platform.send_text(*thread_id, None, text).await
            }
            (DeliveryTarget::Thread { thread_id }, MessageBody::Rich(text)) => {
                self.platform.send_rich(*thread_id, None, text).await
            }
        }
    }

    /// Publishes a completed response using the tier its length calls for.
    ///
    /// Failures are logged and reported in the returned `PublishResult`; in threaded delivery
    /// a failed segment does not stop the ones after it.
    pub async fn publish(
        &self,
        target: &DeliveryTarget,
        text: &str,
        correlation_id: &str,
    ) -> PublishResult {
        let len = text.chars().count();
        let strategy = self.limits.select(len);

        match strategy {
            DeliveryStrategy::Inline | DeliveryStrategy::Embed => {
                let mut result = PublishResult::new(strategy, 1);
                let body = if strategy == DeliveryStrategy::Inline {
                    MessageBody::Text(text)
                } else {
                    MessageBody::Rich(text)
                };
                match self.deliver(target, body).await {
                    Ok(posted) => {
                        result.primary = Some(posted);
                        result.delivered_segments = 1;
                    }
                    Err(e) => {
                        error!(
                            correlation_id = %correlation_id,
                            target = %target,
                            strategy = ?strategy,
                            error = %e,
                            "failed to publish response"
                        );
                        result.failed_segments.push(0);
                    }
                }
                result
            }
            DeliveryStrategy::Threaded => self.publish_threaded(target, text, correlation_id).await,
        }
    }

    async fn publish_threaded(
        &self,
        target: &DeliveryTarget,
        text: &str,
        correlation_id: &str,
    ) -> PublishResult {
        let segments = segment(text, self.limits.rich_max());
        let mut result = PublishResult::new(DeliveryStrategy::Threaded, segments.len());

        let Some((first, rest)) = segments.split_first() else {
            warn!(correlation_id = %correlation_id, "nothing to publish after segmentation");
            return result;
        };

        let posted = match self.deliver(target, MessageBody::Rich(&first.text)).await {
            Ok(posted) => posted,
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    target = %target,
                    error = %e,
                    "failed to publish primary segment"
                );
                result.failed_segments.push(first.index);
                return result;
            }
        };
        result.primary = Some(posted);
        result.delivered_segments = 1;

        if rest.is_empty() {
            return result;
        }

        // Discord cannot nest threads; keep going in the thread we are already in.
        let thread_id = if target.is_thread() {
            target.channel_id()
        } else {
            match self
                .platform
                .start_thread(
                    posted.channel_id,
                    posted.message_id,
                    THREAD_NAME,
                    THREAD_AUTO_ARCHIVE_MINUTES,
                )
                .await
            {
                Ok(handle) => {
                    result.thread = Some(handle);
                    handle.thread_id
                }
                Err(e) => {
                    error!(
                        correlation_id = %correlation_id,
                        message_id = posted.message_id,
                        error = %e,
                        "failed to create thread"
                    );
                    return result;
                }
            }
        };

        for seg in rest {
            match self.platform.send_rich(thread_id, None, &seg.text).await {
                Ok(_) => result.delivered_segments += 1,
                Err(e) => {
                    error!(
                        correlation_id = %correlation_id,
                        thread_id,
                        chunk_index = seg.index,
                        error = %e,
                        "failed to send thread message"
                    );
                    result.failed_segments.push(seg.index);
                }
            }
        }

        info!(
            correlation_id = %correlation_id,
            thread_id,
            chunk_count = result.total_segments,
            failed = result.failed_segments.len(),
            "response sent via thread"
        );

        result
    }
}
