use std::fmt;

use crate::delivery::strategy::DeliveryStrategy;

/// One platform-legal slice of a longer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
}

/// Handle to a slash-command interaction whose response can be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: u64,
    pub token: String,
}

/// Where a response cycle publishes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// The deferred response of a slash command; publishes edit it in place.
    Interaction {
        channel_id: u64,
        interaction: InteractionRef,
        /// `channel_id` is itself a thread.
        in_thread: bool,
    },
    /// A channel, optionally replying to the user's message.
    Channel {
        channel_id: u64,
        reply_to: Option<u64>,
        /// `channel_id` is itself a thread.
        in_thread: bool,
    },
    /// An existing thread; threaded delivery continues inside it.
    Thread { thread_id: u64 },
}

impl DeliveryTarget {
    /// Channel (or thread) the target's messages land in.
    #[must_use]
    pub const fn channel_id(&self) -> u64 {
        match self {
            Self::Interaction { channel_id, .. } | Self::Channel { channel_id, .. } => *channel_id,
            Self::Thread { thread_id } => *thread_id,
        }
    }

    /// Whether repeated publishes replace the same message rather than posting new ones.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Interaction { .. })
    }

    /// Whether messages land inside a thread, where no further thread can be opened.
    #[must_use]
    pub const fn is_thread(&self) -> bool {
        match self {
            Self::Interaction { in_thread, .. } | Self::Channel { in_thread, .. } => *in_thread,
            Self::Thread { .. } => true,
        }
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interaction {
                channel_id,
                interaction,
                ..
            } => write!(f, "interaction:{}@{}", interaction.id, channel_id),
            Self::Channel {
                channel_id,
                reply_to: Some(msg),
                ..
            } => write!(f, "channel:{channel_id}>{msg}"),
            Self::Channel {
                channel_id,
                reply_to: None,
                ..
            } => write!(f, "channel:{channel_id}"),
            Self::Thread { thread_id } => write!(f, "thread:{thread_id}"),
        }
    }
}

/// Content of a single publish: plain message text or a rich embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody<'a> {
    Text(&'a str),
    Rich(&'a str),
}

impl MessageBody<'_> {
    #[must_use]
    pub const fn text(&self) -> &str {
        match self {
            Self::Text(t) | Self::Rich(t) => t,
        }
    }
}

/// A message the platform accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: u64,
    pub message_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHandle {
    pub thread_id: u64,
}

/// Outcome of one tiered publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub strategy: DeliveryStrategy,
    /// The primary message (inline, embed, or first segment). `None` when it failed.
    pub primary: Option<PostedMessage>,
    /// Thread opened for the remaining segments, if any.
    pub thread: Option<ThreadHandle>,
    pub total_segments: usize,
    pub delivered_segments: usize,
    /// Indices of segments that could not be delivered.
    pub failed_segments: Vec<usize>,
}

impl PublishResult {
    #[must_use]
    pub fn new(strategy: DeliveryStrategy, total_segments: usize) -> Self {
        Self {
            strategy,
            primary: None,
            thread: None,
            total_segments,
            delivered_segments: 0,
            failed_segments: Vec::new(),
        }
    }

    /// True when every segment reached the platform.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.primary.is_some()
            && self.failed_segments.is_empty()
            && self.delivered_segments == self.total_segments
    }
}
