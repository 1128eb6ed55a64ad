#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use discord_relay::ai::{ChunkStream, GenerationApi};
use discord_relay::core::models::{InteractionRef, MessageBody, PostedMessage, ThreadHandle};
use discord_relay::errors::RelayError;
use discord_relay::platform::ChatPlatform;
use tokio::time::Instant;

/// Channel that interaction responses appear in.
pub const INTERACTION_CHANNEL: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText {
        channel_id: u64,
        reply_to: Option<u64>,
        text: String,
    },
    SendRich {
        channel_id: u64,
        reply_to: Option<u64>,
        text: String,
    },
    Edit {
        interaction_id: u64,
        rich: bool,
        text: String,
    },
    Defer {
        interaction_id: u64,
    },
    StartThread {
        channel_id: u64,
        anchor_message_id: u64,
        name: String,
        auto_archive_minutes: u16,
    },
    Typing {
        channel_id: u64,
    },
}

impl Call {
    /// Text carried by a publish call, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::SendText { text, .. } | Self::SendRich { text, .. } | Self::Edit { text, .. } => {
                Some(text)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub call: Call,
    pub at: Instant,
}

/// Records every platform call; failures can be injected per call kind.
#[derive(Debug, Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<Recorded>>,
    next_id: AtomicU64,
    fail_sends_containing: Mutex<Option<String>>,
    fail_edits: AtomicBool,
    fail_defer: AtomicBool,
    fail_threads: AtomicBool,
    fail_typing: AtomicBool,
    edit_delay: Mutex<Duration>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    pub fn fail_sends_containing(&self, needle: &str) {
        *self.fail_sends_containing.lock().unwrap() = Some(needle.to_string());
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn fail_defer(&self) {
        self.fail_defer.store(true, Ordering::SeqCst);
    }

    pub fn fail_threads(&self) {
        self.fail_threads.store(true, Ordering::SeqCst);
    }

    pub fn fail_typing(&self) {
        self.fail_typing.store(true, Ordering::SeqCst);
    }

    /// Makes every response edit take `delay` on the tokio clock, like a slow REST round trip.
    pub fn delay_edits(&self, delay: Duration) {
        *self.edit_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.call.clone())
            .collect()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    /// Publish calls only (no defer, typing, or thread creation).
    pub fn publishes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.text().is_some())
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(Recorded {
            call,
            at: Instant::now(),
        });
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn send_fails(&self, text: &str) -> bool {
        self.fail_sends_containing
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| text.contains(needle))
    }

    fn platform_error(what: &str) -> RelayError {
        RelayError::PlatformError(format!("injected {what} failure"))
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn send_text(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError> {
        self.record(Call::SendText {
            channel_id,
            reply_to,
            text: text.to_string(),
        });
        if self.send_fails(text) {
            return Err(Self::platform_error("send"));
        }
        Ok(PostedMessage {
            channel_id,
            message_id: self.next_id(),
        })
    }

    async fn send_rich(
        &self,
        channel_id: u64,
        reply_to: Option<u64>,
        text: &str,
    ) -> Result<PostedMessage, RelayError> {
        self.record(Call::SendRich {
            channel_id,
            reply_to,
            text: text.to_string(),
        });
        if self.send_fails(text) {
            return Err(Self::platform_error("send"));
        }
        Ok(PostedMessage {
            channel_id,
            message_id: self.next_id(),
        })
    }

    async fn edit_response(
        &self,
        interaction: &InteractionRef,
        body: MessageBody<'_>,
    ) -> Result<PostedMessage, RelayError> {
        self.record(Call::Edit {
            interaction_id: interaction.id,
            rich: matches!(body, MessageBody::Rich(_)),
            text: body.text().to_string(),
        });
        let delay = *self.edit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_edits.load(Ordering::SeqCst) || self.send_fails(body.text()) {
            return Err(Self::platform_error("edit"));
        }
        Ok(PostedMessage {
            channel_id: INTERACTION_CHANNEL,
            message_id: interaction.id,
        })
    }

    async fn defer_response(&self, interaction: &InteractionRef) -> Result<(), RelayError> {
        self.record(Call::Defer {
            interaction_id: interaction.id,
        });
        if self.fail_defer.load(Ordering::SeqCst) {
            return Err(Self::platform_error("defer"));
        }
        Ok(())
    }

    async fn start_thread(
        &self,
        channel_id: u64,
        anchor_message_id: u64,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<ThreadHandle, RelayError> {
        self.record(Call::StartThread {
            channel_id,
            anchor_message_id,
            name: name.to_string(),
            auto_archive_minutes,
        });
        if self.fail_threads.load(Ordering::SeqCst) {
            return Err(Self::platform_error("thread"));
        }
        Ok(ThreadHandle {
            thread_id: self.next_id(),
        })
    }

    async fn send_typing(&self, channel_id: u64) -> Result<(), RelayError> {
        self.record(Call::Typing { channel_id });
        if self.fail_typing.load(Ordering::SeqCst) {
            return Err(Self::platform_error("typing"));
        }
        Ok(())
    }
}

/// One scripted step of a streaming response. Delays are relative to the previous step.
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(u64, &'static str),
    Owned(u64, String),
    Error(u64, &'static str),
    /// Never yields again.
    Hang,
}

/// Scripted remote API; records every request as `(message, user_key)`.
#[derive(Debug)]
pub struct MockApi {
    reply: Result<String, String>,
    reply_delay: Duration,
    open_error: Option<String>,
    steps: Vec<Step>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockApi {
    fn base() -> Self {
        Self {
            reply: Err("no reply scripted".to_string()),
            reply_delay: Duration::ZERO,
            open_error: None,
            steps: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            ..Self::base()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            open_error: Some(message.to_string()),
            ..Self::base()
        }
    }

    pub fn streaming(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::base()
        }
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, message: &str, user_key: &str) {
        self.requests
            .lock()
            .unwrap()
            .push((message.to_string(), user_key.to_string()));
    }
}

/// Builds a chunk feed that plays `steps` on the tokio clock.
pub fn scripted_feed(steps: Vec<Step>) -> ChunkStream {
    Box::pin(futures::stream::unfold(
        VecDeque::from(steps),
        |mut steps| async move {
            let step = steps.pop_front()?;
            match step {
                Step::Chunk(delay, text) => {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Some((Ok(text.to_string()), steps))
                }
                Step::Owned(delay, text) => {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Some((Ok(text), steps))
                }
                Step::Error(delay, message) => {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Some((Err(RelayError::StreamError(message.to_string())), steps))
                }
                Step::Hang => futures::future::pending().await,
            }
        },
    ))
}

#[async_trait]
impl GenerationApi for MockApi {
    async fn send(&self, message: &str, user_key: &str) -> Result<String, RelayError> {
        self.record(message, user_key);
        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }
        self.reply.clone().map_err(RelayError::ApiError)
    }

    async fn send_stream(&self, message: &str, user_key: &str) -> Result<ChunkStream, RelayError> {
        self.record(message, user_key);
        if let Some(message) = &self.open_error {
            return Err(RelayError::ApiError(message.clone()));
        }
        Ok(scripted_feed(self.steps.clone()))
    }
}
