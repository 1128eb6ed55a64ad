//! Splits long responses into platform-legal segments.
//!
//! Lengths are counted in `char`s, and a cut never lands inside a code point. Within each
//! window the cut prefers the last newline, then the last sentence end (`". "`), but only
//! when that boundary sits past the middle of the window; otherwise it is a hard cut.

use crate::core::models::Segment;

/// Byte offset just past the first `max_chars` characters of `s` (or `s.len()`).
#[must_use]
fn slice_end_for_max_chars(s: &str, max_chars: usize) -> usize {
    if max_chars == 0 {
        return 0;
    }

    for (count, (idx, _)) in s.char_indices().enumerate() {
        if count == max_chars {
            return idx;
        }
    }
    s.len()
}

/// Picks `(segment_end, rest_start)` byte offsets inside `window`.
fn choose_cut(window: &str, max_chars: usize) -> (usize, usize) {
    let half = max_chars / 2;
    let char_pos = |byte_idx: usize| window[..byte_idx].chars().count();

    if let Some(nl) = window.rfind('\n').filter(|&p| char_pos(p) > half) {
        return (nl, nl + 1);
    }

    if let Some(dot) = window.rfind(". ").filter(|&p| char_pos(p) > half) {
        // keep the period, drop the space
        return (dot + 1, dot + 2);
    }

    (window.len(), window.len())
}

/// Splits `text` into ordered, trimmed segments of at most `max_len` characters each.
///
/// Whitespace-only input yields no segments. A `max_len` of zero is treated as one.
#[must_use]
pub fn segment(text: &str, max_len: usize) -> Vec<Segment> {
    let max_len = max_len.max(1);
    let mut segments = Vec::new();
    let mut remaining = text.trim_start();

    while !remaining.is_empty() {
        let window_end = slice_end_for_max_chars(remaining, max_len);

        let (seg_end, rest_start) = if window_end == remaining.len() {
            (remaining.len(), remaining.len())
        } else {
            choose_cut(&remaining[..window_end], max_len)
        };

        let piece = remaining[..seg_end].trim();
        if !piece.is_empty() {
            segments.push(Segment {
                index: segments.len(),
                text: piece.to_string(),
            });
        }

        remaining = remaining[rest_start..].trim_start();
    }

    segments
}
