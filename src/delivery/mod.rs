//! Response delivery: segmentation, tier selection, one-shot publishing and streaming updates

pub mod publisher;
pub mod segmenter;
pub mod strategy;
pub mod streaming;

// Re-export main types for convenience
pub use publisher::TieredPublisher;
pub use segmenter::segment;
pub use strategy::{DeliveryLimits, DeliveryStrategy, select};
pub use streaming::{CoordinatorState, StreamCoordinator, StreamOutcome, StreamReport};

/// Discord's cap on plain message content.
pub const INLINE_LIMIT: usize = 2000;

/// Discord's cap on an embed description.
pub const RICH_LIMIT: usize = 4096;

/// Headroom left below each cap for platform-added formatting.
pub const SAFETY_MARGIN: usize = 10;

/// Canonical failure message shown to users when the remote API fails.
pub const FAILURE_MESSAGE: &str = "Failed to get response. Please try again later.";

/// Name of threads opened for multi-segment responses.
pub const THREAD_NAME: &str = "Full Response";

pub const THREAD_AUTO_ARCHIVE_MINUTES: u16 = 60;
