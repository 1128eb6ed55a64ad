//! Line-oriented Server-Sent Events parser for the relay's streaming endpoint.
//!
//! The endpoint writes one fragment per `data:` line, ends with `data: [DONE]`, and signals
//! failure with an `event: error` line whose following `data:` line carries the message.
//! The parser buffers partial lines across network chunks; anything else is ignored.

/// Events emitted by the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One text fragment, in arrival order.
    Fragment(String),
    /// The endpoint reported an error.
    Error(String),
}

/// Result of parsing a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Event(StreamEvent),
    /// End of stream signal (`[DONE]`).
    Done,
}

/// Stateful SSE parser that buffers incomplete lines across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    /// Set after `event: error`; the next data line is the error message.
    awaiting_error_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of data to the parser and returns the results of every complete line.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseResult> {
        self.buffer.push_str(chunk);
        let mut results = Vec::new();

        while let Some(nl) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=nl).collect();
            if let Some(result) = self.parse_line(&line) {
                results.push(result);
            }
        }

        results
    }

    /// Parses whatever is left in the buffer as a final, unterminated line.
    pub fn finish(&mut self) -> Option<ParseResult> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line)
    }

    fn parse_line(&mut self, raw: &str) -> Option<ParseResult> {
        let line = raw.trim_end_matches(['\n', '\r']);

        if self.awaiting_error_data {
            self.awaiting_error_data = false;
            let message = strip_data_prefix(line).unwrap_or(line);
            return Some(ParseResult::Event(StreamEvent::Error(message.to_string())));
        }

        if line.starts_with("event: error") {
            self.awaiting_error_data = true;
            return None;
        }

        let data = strip_data_prefix(line)?;
        if data == "[DONE]" {
            return Some(ParseResult::Done);
        }
        Some(ParseResult::Event(StreamEvent::Fragment(data.to_string())))
    }

    /// Returns any remaining buffered data (for debugging/testing).
    #[must_use]
    pub fn remaining_buffer(&self) -> &str {
        &self.buffer
    }
}

fn strip_data_prefix(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(s: &str) -> ParseResult {
        ParseResult::Event(StreamEvent::Fragment(s.to_string()))
    }

    #[test]
    fn test_parse_fragment_line() {
        let mut parser = SseParser::new();
        let results = parser.feed("data: Hello\n");
        assert_eq!(results, vec![fragment("Hello")]);
    }

    #[test]
    fn test_parse_done_signal() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed("data: [DONE]\n"), vec![ParseResult::Done]);
    }

    #[test]
    fn test_error_event_uses_following_data_line() {
        let mut parser = SseParser::new();
        let results = parser.feed("event: error\ndata: upstream timeout\n");
        assert_eq!(
            results,
            vec![ParseResult::Event(StreamEvent::Error(
                "upstream timeout".to_string()
            ))]
        );
    }

    #[test]
    fn test_error_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: error\n").is_empty());
        assert_eq!(
            parser.feed("data: boom\n"),
            vec![ParseResult::Event(StreamEvent::Error("boom".to_string()))]
        );
    }

    #[test]
    fn test_multiple_lines_in_single_chunk() {
        let mut parser = SseParser::new();
        let results = parser.feed("data: Hel\n\ndata: lo\ndata: [DONE]\n");
        assert_eq!(results, vec![fragment("Hel"), fragment("lo"), ParseResult::Done]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: Hel").is_empty());
        assert_eq!(parser.remaining_buffer(), "data: Hel");
        assert_eq!(parser.feed("lo\n"), vec![fragment("Hello")]);
        assert!(parser.remaining_buffer().is_empty());
    }

    #[test]
    fn test_keeps_leading_whitespace_after_single_space() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed("data:  world\n"), vec![fragment(" world")]);
        assert_eq!(parser.feed("data:x\n"), vec![fragment("x")]);
    }

    #[test]
    fn test_ignores_other_lines() {
        let mut parser = SseParser::new();
        let results = parser.feed(": keepalive\nevent: message\nid: 7\nretry: 100\n\n");
        assert!(results.is_empty());
    }

    #[test]
    fn test_handles_windows_line_endings() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed("data: Win\r\n"), vec![fragment("Win")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: tail").is_empty());
        assert_eq!(parser.finish(), Some(fragment("tail")));
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_unicode_fragment() {
        let mut parser = SseParser::new();
        assert_eq!(
            parser.feed("data: Hello 世界 🌍\n"),
            vec![fragment("Hello 世界 🌍")]
        );
    }
}
