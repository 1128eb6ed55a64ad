//! Streaming delivery for incrementally generated responses.
//!
//! A `StreamCoordinator` owns one `StreamingSession` per response cycle. The task driving
//! `run` appends chunks from the feed while a background ticker republishes the partial text
//! at most once per interval, and only when new text has arrived. Both sides go through the
//! same session lock, and a ticked snapshot-then-publish runs entirely under it.
//!
//! Once the feed ends the ticker is stopped and joined, then the full text is published once
//! through the `TieredPublisher`, so a long answer still opens a thread even though the
//! previews never did.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::FAILURE_MESSAGE;
use super::publisher::TieredPublisher;
use super::strategy::DeliveryLimits;
use crate::core::models::{DeliveryTarget, MessageBody, PublishResult};
use crate::errors::RelayError;

/// Reference cadence for provisional updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Streaming,
    Finalizing,
    Done,
}

/// Mutable state shared by the feed consumer and the ticker.
#[derive(Debug)]
struct StreamingSession {
    accumulated: String,
    last_published_at: Instant,
    cancelled: bool,
    chunks: usize,
    provisional_publishes: usize,
    /// Length of the text last shown by a provisional update.
    published_len: usize,
}

impl StreamingSession {
    fn new() -> Self {
        Self {
            accumulated: String::new(),
            last_published_at: Instant::now(),
            cancelled: false,
            chunks: 0,
            provisional_publishes: 0,
            published_len: 0,
        }
    }
}

#[derive(Debug)]
pub enum StreamOutcome {
    /// The feed ended normally and the full text was published.
    Completed(PublishResult),
    /// The feed failed (or produced nothing); the failure message replaced any partial text.
    Failed(RelayError),
    /// Cancelled before the feed ended; nothing further was published.
    Cancelled,
}

#[derive(Debug)]
pub struct StreamReport {
    pub state: CoordinatorState,
    pub outcome: StreamOutcome,
    pub chunks: usize,
    /// Length in chars of the accumulated text.
    pub length: usize,
    pub provisional_publishes: usize,
}

enum FeedEnd {
    Finished,
    Failed(RelayError),
    Cancelled,
}

/// Truncates `text` to at most `max_chars` characters, ending in an ellipsis when cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Body of a provisional update: inline or embed only, lossy above the embed limit.
#[must_use]
pub fn preview_body(text: &str, limits: &DeliveryLimits) -> (bool, String) {
    if text.chars().count() <= limits.inline_max() {
        (false, text.to_string())
    } else {
        (true, truncate_with_ellipsis(text, limits.rich_max()))
    }
}

pub struct StreamCoordinator {
    publisher: TieredPublisher,
    target: DeliveryTarget,
    interval: Duration,
    correlation_id: String,
    state: CoordinatorState,
    session: Arc<Mutex<StreamingSession>>,
}

impl StreamCoordinator {
    #[must_use]
    pub fn new(
        publisher: TieredPublisher,
        target: DeliveryTarget,
        interval: Duration,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            target,
            interval: if interval.is_zero() {
                DEFAULT_UPDATE_INTERVAL
            } else {
                interval
            },
            correlation_id: correlation_id.into(),
            state: CoordinatorState::Idle,
            session: Arc::new(Mutex::new(StreamingSession::new())),
        }
    }

    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, next: CoordinatorState) {
        debug!(
            correlation_id = %self.correlation_id,
            from = ?self.state,
            to = ?next,
            "stream coordinator transition"
        );
        self.state = next;
    }

    /// Consumes `feed` to completion, error, or cancellation, publishing as it goes.
    ///
    /// Never returns an error: remote failures become the fixed failure message and are
    /// reported in `StreamReport::outcome`.
    pub async fn run<S>(mut self, feed: S, cancel: &CancellationToken) -> StreamReport
    where
        S: Stream<Item = Result<String, RelayError>> + Send,
    {
        self.transition(CoordinatorState::Streaming);
        {
            let mut session = self.session.lock().await;
            session.last_published_at = Instant::now();
        }

        let stop = cancel.child_token();
        // Only targets edited in place can show previews; anything else would spam new messages.
        let ticker = self
            .target
            .is_editable()
            .then(|| self.spawn_ticker(stop.clone()));

        let mut feed = std::pin::pin!(feed);
        let end = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break FeedEnd::Cancelled,
                item = feed.next() => match item {
                    Some(Ok(chunk)) => {
                        let mut session = self.session.lock().await;
                        session.accumulated.push_str(&chunk);
                        session.chunks += 1;
                    }
                    Some(Err(e)) => break FeedEnd::Failed(e),
                    None => break FeedEnd::Finished,
                },
            }
        };

        stop.cancel();
        if let Some(handle) = ticker {
            if matches!(end, FeedEnd::Cancelled) {
                handle.abort();
            }
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(
                    correlation_id = %self.correlation_id,
                    error = %e,
                    "stream ticker ended abnormally"
                ),
            }
        }

        let (text, chunks, provisional_publishes) = {
            let mut session = self.session.lock().await;
            session.cancelled = matches!(end, FeedEnd::Cancelled);
            (
                std::mem::take(&mut session.accumulated),
                session.chunks,
                session.provisional_publishes,
            )
        };
        let length = text.chars().count();

        let outcome = match end {
            FeedEnd::Cancelled => {
                info!(
                    correlation_id = %self.correlation_id,
                    partial_length = length,
                    "stream cancelled"
                );
                StreamOutcome::Cancelled
            }
            FeedEnd::Finished if !text.trim().is_empty() => {
                self.transition(CoordinatorState::Finalizing);
                let result = self
                    .publisher
                    .publish(&self.target, &text, &self.correlation_id)
                    .await;
                StreamOutcome::Completed(result)
            }
            FeedEnd::Finished => self.fail(RelayError::EmptyResponse, &text).await,
            FeedEnd::Failed(e) => self.fail(e, &text).await,
        };

        self.transition(CoordinatorState::Done);

        StreamReport {
            state: self.state,
            outcome,
            chunks,
            length,
            provisional_publishes,
        }
    }

    async fn fail(&self, error: RelayError, partial: &str) -> StreamOutcome {
        error!(
            correlation_id = %self.correlation_id,
            target = %self.target,
            error = %error,
            "stream failed; replacing partial response with failure message"
        );
        warn!(
            correlation_id = %self.correlation_id,
            partial_length = partial.chars().count(),
            "discarding partial response"
        );
        debug!(correlation_id = %self.correlation_id, partial = %partial, "discarded partial response");

        if let Err(e) = self
            .publisher
            .deliver(&self.target, MessageBody::Text(FAILURE_MESSAGE))
            .await
        {
            error!(
                correlation_id = %self.correlation_id,
                target = %self.target,
                error = %e,
                "failed to publish failure message"
            );
        }
        StreamOutcome::Failed(error)
    }

    fn spawn_ticker(&self, stop: CancellationToken) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let publisher = self.publisher.clone();
        let target = self.target.clone();
        let interval = self.interval;
        let correlation_id = self.correlation_id.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => break,
                    scheduled = ticker.tick() => {
                        let mut session = session.lock().await;
                        // the feed may have ended while we waited for the lock
                        if stop.is_cancelled() || session.cancelled {
                            break;
                        }
                        // throttle on the tick schedule, not on when the lock was acquired
                        let now = scheduled;
                        if now.saturating_duration_since(session.last_published_at) < interval
                            || session.accumulated.trim().is_empty()
                            || session.accumulated.len() == session.published_len
                        {
                            continue;
                        }

                        let (rich, content) = preview_body(&session.accumulated, publisher.limits());
                        let body = if rich {
                            MessageBody::Rich(&content)
                        } else {
                            MessageBody::Text(&content)
                        };
                        if let Err(e) = publisher.deliver(&target, body).await {
                            error!(
                                correlation_id = %correlation_id,
                                target = %target,
                                error = %e,
                                "failed to update stream response"
                            );
                        }
                        session.last_published_at = now;
                        session.published_len = session.accumulated.len();
                        session.provisional_publishes += 1;
                    }
                }
            }
        })
    }
}
