//! Extraction of user text, session keys, and delivery targets from inbound events.
//!
//! The gateway layer flattens serenity events into `InboundCommand` / `InboundMessage` so
//! recognition stays plain data comparison.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::models::{DeliveryTarget, InteractionRef};
use crate::delivery::THREAD_NAME;

/// Name of the slash-command option carrying the user's text.
pub const MESSAGE_OPTION: &str = "message";

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@!?(\d+)>").expect("static regex compile"));

/// A slash-command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub name: String,
    pub interaction: InteractionRef,
    pub channel_id: u64,
    /// Set when the command was issued inside a guild.
    pub member_user_id: Option<u64>,
    pub user_id: Option<u64>,
    /// The `message` string option.
    pub message: Option<String>,
    /// The command was issued inside a thread.
    pub in_thread: bool,
}

impl InboundCommand {
    #[must_use]
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget::Interaction {
            channel_id: self.channel_id,
            interaction: self.interaction.clone(),
            in_thread: self.in_thread,
        }
    }
}

/// Metadata of the thread a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub owner_id: Option<u64>,
    pub name: String,
}

/// A plain channel or thread message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub content: String,
    /// Ids of users mentioned in the message.
    pub mentions: Vec<u64>,
    /// Present when `channel_id` is a thread.
    pub thread: Option<ThreadInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Mention,
    ThreadFollowUp,
}

/// A message the relay should answer, with everything needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRoute {
    pub kind: MessageKind,
    pub text: String,
    pub user_key: String,
    pub target: DeliveryTarget,
}

/// Removes every mention of `bot_id` (`<@id>` and `<@!id>`) and trims the result.
#[must_use]
pub fn strip_mentions(content: &str, bot_id: u64) -> String {
    let bot_id = bot_id.to_string();
    MENTION_RE
        .replace_all(content, |caps: &regex::Captures<'_>| {
            if caps[1] == *bot_id {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .trim()
        .to_string()
}

/// Session key for the remote API: the member identity when present, else the raw user.
#[must_use]
pub fn resolve_user_key(member_user_id: Option<u64>, user_id: Option<u64>) -> Option<String> {
    member_user_id.or(user_id).map(|id| id.to_string())
}

/// True when `thread` was opened by the bot for a multi-segment response.
#[must_use]
pub fn is_bot_thread(thread: &ThreadInfo, bot_id: u64) -> bool {
    thread.owner_id == Some(bot_id) && thread.name == THREAD_NAME
}

/// Extracts `(text, user_key)` from a slash command, or `None` when either is missing.
#[must_use]
pub fn command_request(command: &InboundCommand) -> Option<(String, String)> {
    let text = command
        .message
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let user_key = resolve_user_key(command.member_user_id, command.user_id)?;
    Some((text.to_string(), user_key))
}

/// Decides whether a message is addressed to the bot and how to answer it.
///
/// Messages in a bot-owned response thread continue that conversation, keyed by the thread;
/// elsewhere the bot answers only when mentioned, replying to the message.
#[must_use]
pub fn route_message(message: &InboundMessage, bot_id: u64) -> Option<MessageRoute> {
    if message.author_is_bot {
        return None;
    }

    let in_bot_thread = message
        .thread
        .as_ref()
        .is_some_and(|t| is_bot_thread(t, bot_id));

    if in_bot_thread {
        let text = strip_mentions(&message.content, bot_id);
        if text.is_empty() {
            return None;
        }
        return Some(MessageRoute {
            kind: MessageKind::ThreadFollowUp,
            text,
            user_key: message.channel_id.to_string(),
            target: DeliveryTarget::Thread {
                thread_id: message.channel_id,
            },
        });
    }

    if !message.mentions.contains(&bot_id) {
        return None;
    }
    let text = strip_mentions(&message.content, bot_id);
    if text.is_empty() {
        return None;
    }
    Some(MessageRoute {
        kind: MessageKind::Mention,
        text,
        user_key: message.author_id.to_string(),
        target: DeliveryTarget::Channel {
            channel_id: message.channel_id,
            reply_to: Some(message.message_id),
            in_thread: message.thread.is_some(),
        },
    })
}
