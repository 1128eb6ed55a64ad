//! Discord relay - a Discord bot that forwards user messages to a remote AI endpoint and
//! delivers the answers back, sized for Discord.
//!
//! # Architecture
//!
//! - `api` recognizes slash commands, mentions and thread follow-ups, and runs one response
//!   cycle per event
//! - `ai` talks to the remote endpoint, blocking or as a server-sent-event stream
//! - `delivery` picks a tier (plain message, embed, or thread) for completed responses and
//!   drives periodic in-place updates for streaming ones
//! - `platform` is the seam to Discord; `bot` wires serenity around it
//!
//! # Example
//!
//! ```no_run
//! use discord_relay::core::config::AppConfig;
//! use discord_relay::RelayBot;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     discord_relay::setup_logging();
//!
//!     let config = AppConfig::from_env()?;
//!     let shutdown = CancellationToken::new();
//!     RelayBot::new(config, shutdown).run().await?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod ai;
pub mod api;
pub mod bot;
pub mod core;
pub mod delivery;
pub mod errors;
pub mod platform;

pub use bot::RelayBot;
pub use errors::RelayError;

/// Configure structured JSON logging.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling it twice is harmless; the
/// second call leaves the first subscriber in place.
///
/// # Example
///
/// ```
/// discord_relay::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
