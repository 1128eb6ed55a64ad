//! Remote generation API: the collaborator trait and its HTTP implementation

pub mod client;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::errors::RelayError;

// Re-export main types for convenience
pub use client::{FragmentReader, RelayClient};

/// Text fragments of a streaming response, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Sends `message` on behalf of `user_key` and waits for the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, malformed body, or an
    /// empty response.
    async fn send(&self, message: &str, user_key: &str) -> Result<String, RelayError>;

    /// Opens a streaming response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or is rejected; later failures arrive
    /// as `Err` items on the stream.
    async fn send_stream(&self, message: &str, user_key: &str) -> Result<ChunkStream, RelayError>;
}

/// Drives a streaming response to completion, handing each fragment to `on_chunk`.
///
/// Returns the number of fragments delivered.
///
/// # Errors
///
/// Returns the first error raised while opening or reading the stream.
pub async fn send_stream_with<F>(
    api: &dyn GenerationApi,
    message: &str,
    user_key: &str,
    mut on_chunk: F,
) -> Result<usize, RelayError>
where
    F: FnMut(&str) + Send,
{
    let mut stream = api.send_stream(message, user_key).await?;
    let mut count = 0;
    while let Some(fragment) = stream.next().await {
        on_chunk(&fragment?);
        count += 1;
    }
    Ok(count)
}
