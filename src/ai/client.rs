//! HTTP client for the remote generation API.
//!
//! Both endpoints take `{"message", "user"}` with an `X-API-Key` header. The blocking endpoint
//! answers `{"response"}`; the streaming endpoint answers with an SSE body (see `super::sse`).

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::sse::{ParseResult, SseParser, StreamEvent};
use super::{ChunkStream, GenerationApi};
use crate::errors::RelayError;

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    message: &'a str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    response: String,
}

/// Client for one remote endpoint (blocking or streaming).
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl RelayClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::HttpError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    async fn post(
        &self,
        message: &str,
        user_key: &str,
        accept: &str,
    ) -> Result<reqwest::Response, RelayError> {
        let body = ApiRequest {
            message,
            user: user_key,
        };
        #[cfg(feature = "debug-logs")]
        debug!(endpoint = %self.endpoint, user = %user_key, message = %message, "sending api request");

        #[cfg(not(feature = "debug-logs"))]
        debug!(
            endpoint = %self.endpoint,
            user = %user_key,
            message_len = message.len(),
            "sending api request"
        );

        self.http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, accept)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::HttpError(format!("Request to {} failed: {e}", self.endpoint)))
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        user_key: &str,
    ) -> Result<reqwest::Response, RelayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
        error!(
            endpoint = %self.endpoint,
            user = %user_key,
            status_code = status.as_u16(),
            response_body = %body,
            "api returned non-success status"
        );
        Err(RelayError::ApiError(format!(
            "unexpected status {status}: {body}"
        )))
    }
}

#[async_trait]
impl GenerationApi for RelayClient {
    async fn send(&self, message: &str, user_key: &str) -> Result<String, RelayError> {
        let start = Instant::now();
        let response = match self.post(message, user_key, "application/json").await {
            Ok(r) => r,
            Err(e) => {
                error!(
                    endpoint = %self.endpoint,
                    user = %user_key,
                    duration_ms = elapsed_ms(start),
                    error = %e,
                    "api request failed"
                );
                return Err(e);
            }
        };
        let response = self.ensure_success(response, user_key).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::HttpError(format!("Failed to read response body: {e}")))?;
        let parsed: ApiResponse = serde_json::from_slice(&bytes).map_err(|e| {
            error!(
                endpoint = %self.endpoint,
                user = %user_key,
                response_body = %String::from_utf8_lossy(&bytes),
                error = %e,
                "failed to decode response"
            );
            RelayError::from(e)
        })?;

        info!(
            endpoint = %self.endpoint,
            user = %user_key,
            duration_ms = elapsed_ms(start),
            response_len = parsed.response.chars().count(),
            "api response received"
        );

        if parsed.response.trim().is_empty() {
            warn!(endpoint = %self.endpoint, user = %user_key, "api returned empty response");
            return Err(RelayError::EmptyResponse);
        }
        Ok(parsed.response)
    }

    async fn send_stream(&self, message: &str, user_key: &str) -> Result<ChunkStream, RelayError> {
        let start = Instant::now();
        let response = match self.post(message, user_key, "text/event-stream").await {
            Ok(r) => r,
            Err(e) => {
                error!(
                    endpoint = %self.endpoint,
                    user = %user_key,
                    duration_ms = elapsed_ms(start),
                    error = %e,
                    "stream request failed"
                );
                return Err(e);
            }
        };
        let response = self.ensure_success(response, user_key).await?;
        debug!(
            endpoint = %self.endpoint,
            user = %user_key,
            duration_ms = elapsed_ms(start),
            "stream opened"
        );

        let reader = FragmentReader::new(Box::pin(response.bytes_stream()));
        Ok(reader.into_stream())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// Turns an SSE byte body into text fragments.
pub struct FragmentReader {
    byte_stream: ByteStream,
    parser: SseParser,
    pending: VecDeque<ParseResult>,
    utf8_buffer: Vec<u8>,
    fragments: usize,
    body_ended: bool,
    completed: bool,
}

impl std::fmt::Debug for FragmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentReader")
            .field("completed", &self.completed)
            .field("fragments", &self.fragments)
            .field("pending_len", &self.pending.len())
            .field("utf8_buffer_len", &self.utf8_buffer.len())
            .field("parser_buffer_len", &self.parser.remaining_buffer().len())
            .finish_non_exhaustive()
    }
}

impl FragmentReader {
    #[must_use]
    pub fn new(byte_stream: ByteStream) -> Self {
        Self {
            byte_stream,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            utf8_buffer: Vec::new(),
            fragments: 0,
            body_ended: false,
            completed: false,
        }
    }

    /// Adapts the reader into a fragment stream that ends after the first error.
    #[must_use]
    pub fn into_stream(self) -> ChunkStream {
        Box::pin(futures::stream::unfold(self, |mut reader| async move {
            match reader.next_fragment().await {
                Ok(Some(fragment)) => Some((Ok(fragment), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        }))
    }

    fn drain_pending(&mut self) -> Result<Option<String>, RelayError> {
        while let Some(result) = self.pending.pop_front() {
            match result {
                ParseResult::Event(StreamEvent::Fragment(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    self.fragments += 1;
                    return Ok(Some(fragment));
                }
                ParseResult::Event(StreamEvent::Error(message)) => {
                    self.completed = true;
                    error!(error = %message, "stream error event");
                    return Err(RelayError::StreamError(message));
                }
                ParseResult::Done => {
                    self.completed = true;
                    self.pending.clear();
                    debug!(fragments = self.fragments, "stream completed");
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// Returns the next non-empty fragment, or `None` once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns an error for an `event: error` frame, invalid UTF-8, or a failed read.
    pub async fn next_fragment(&mut self) -> Result<Option<String>, RelayError> {
        loop {
            if self.completed {
                return Ok(None);
            }
            if let Some(fragment) = self.drain_pending()? {
                return Ok(Some(fragment));
            }
            if self.completed {
                return Ok(None);
            }
            if self.body_ended {
                self.completed = true;
                return Ok(None);
            }

            match self.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    // Multi-byte characters may straddle chunk boundaries.
                    self.utf8_buffer.extend_from_slice(&bytes);
                    match std::str::from_utf8(&self.utf8_buffer) {
                        Ok(valid) => {
                            self.pending.extend(self.parser.feed(valid));
                            self.utf8_buffer.clear();
                        }
                        Err(e) => {
                            let valid_up_to = e.valid_up_to();
                            if valid_up_to > 0 {
                                let prefix =
                                    String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to])
                                        .into_owned();
                                self.pending.extend(self.parser.feed(&prefix));
                                self.utf8_buffer.drain(..valid_up_to);
                            }
                            if e.error_len().is_some() {
                                self.completed = true;
                                return Err(RelayError::StreamError(
                                    "Invalid UTF-8 in streaming response".to_string(),
                                ));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    self.completed = true;
                    return Err(RelayError::StreamError(format!(
                        "Error reading streaming response: {e}"
                    )));
                }
                None => {
                    // A body that closes without [DONE] still counts as finished.
                    self.body_ended = true;
                    if let Some(last) = self.parser.finish() {
                        self.pending.push_back(last);
                    }
                    if !self.utf8_buffer.is_empty() {
                        warn!(
                            dangling_bytes = self.utf8_buffer.len(),
                            "stream ended inside a UTF-8 sequence"
                        );
                        self.utf8_buffer.clear();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(chunks: Vec<&'static str>) -> FragmentReader {
        let items: Vec<Result<bytes::Bytes, reqwest::Error>> = chunks
            .into_iter()
            .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes())))
            .collect();
        FragmentReader::new(Box::pin(futures::stream::iter(items)))
    }

    #[tokio::test]
    async fn test_next_fragment_does_not_drop_multiple_lines_in_single_chunk() {
        let mut reader = reader_over(vec!["data: Hel\ndata: lo\ndata: [DONE]\n"]);

        assert_eq!(reader.next_fragment().await.unwrap(), Some("Hel".to_string()));
        assert_eq!(reader.next_fragment().await.unwrap(), Some("lo".to_string()));
        assert_eq!(reader.next_fragment().await.unwrap(), None);
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_fragment_handles_utf8_split_across_byte_chunks() {
        let line = "data: Hello 世界\n".as_bytes();
        let split_at = line
            .iter()
            .position(|b| *b == 0xE4)
            .expect("expected UTF-8 multi-byte sequence in test input");

        let items = vec![
            Ok(bytes::Bytes::copy_from_slice(&line[..=split_at])),
            Ok(bytes::Bytes::copy_from_slice(&line[split_at + 1..])),
        ];
        let mut reader = FragmentReader::new(Box::pin(futures::stream::iter(items)));

        assert_eq!(
            reader.next_fragment().await.unwrap(),
            Some("Hello 世界".to_string())
        );
    }

    #[tokio::test]
    async fn test_error_event_becomes_stream_error() {
        let mut reader = reader_over(vec!["data: partial\nevent: error\ndata: boom\n"]);

        assert_eq!(
            reader.next_fragment().await.unwrap(),
            Some("partial".to_string())
        );
        let err = reader.next_fragment().await.unwrap_err();
        assert!(matches!(err, RelayError::StreamError(ref m) if m == "boom"));
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ignores_lines_after_done() {
        let mut reader = reader_over(vec!["data: a\ndata: [DONE]\ndata: late\n"]);

        assert_eq!(reader.next_fragment().await.unwrap(), Some("a".to_string()));
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_body_closing_without_done_flushes_last_line() {
        let mut reader = reader_over(vec!["data: one\n", "data: two"]);

        assert_eq!(reader.next_fragment().await.unwrap(), Some("one".to_string()));
        assert_eq!(reader.next_fragment().await.unwrap(), Some("two".to_string()));
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_fragment_errors_on_network_error() {
        // Build a reqwest::Error without doing any network I/O.
        let req_err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let stream = futures::stream::iter(vec![Err(req_err)]);
        let mut reader = FragmentReader::new(Box::pin(stream));

        let err = reader.next_fragment().await.unwrap_err();
        assert!(err.to_string().contains("Error reading streaming response"));
    }

    #[tokio::test]
    async fn test_into_stream_collects_fragments() {
        let reader = reader_over(vec!["data: Hel", "lo, \ndata: world!\n", "data: [DONE]\n"]);
        let fragments: Vec<String> = reader
            .into_stream()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hello, ", "world!"]);
    }
}
