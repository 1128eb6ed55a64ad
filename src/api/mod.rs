//! Inbound event handling: recognition, extraction, and dispatch

pub mod dispatcher;
pub mod parsing;

// Re-export main types for convenience
pub use dispatcher::{CHAT_COMMAND_NAME, CommandRoute, DispatchOutcome, Dispatcher, StreamCommand};
pub use parsing::{InboundCommand, InboundMessage, MessageKind, MessageRoute, ThreadInfo};
