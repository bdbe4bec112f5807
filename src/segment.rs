//! Token / word / grapheme segmentation.
//!
//! Pure functions over a string: concatenating the returned pieces always
//! reproduces the input exactly. Streaming statefulness (partial-word holds)
//! lives in the parser, not here.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::EmitUnit;

/// Split `s` into pieces at the requested granularity.
pub fn segment(s: &str, unit: EmitUnit) -> Vec<&str> {
    match unit {
        EmitUnit::Token => split_runs(s),
        EmitUnit::Word => split_words(s),
        EmitUnit::Grapheme => s.graphemes(true).collect(),
    }
}

/// Whether the last character of a piece could be the prefix of a longer
/// word (Unicode letter, number, or underscore).
pub fn ends_in_word_char(piece: &str) -> bool {
    piece
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Maximal runs of whitespace and non-whitespace.
fn split_runs(s: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_whitespace = None;
    for (offset, ch) in s.char_indices() {
        let ws = ch.is_whitespace();
        if let Some(prev) = in_whitespace {
            if prev != ws {
                pieces.push(&s[start..offset]);
                start = offset;
            }
        }
        in_whitespace = Some(ws);
    }
    if start < s.len() {
        pieces.push(&s[start..]);
    }
    pieces
}

/// Unicode word boundaries, then merge adjacent pieces forming the comment
/// operators `//`, `/*`, and `*/` so downstream highlighters see them whole.
fn split_words(s: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut pos = 0;
    for piece in s.split_word_bounds() {
        let start = pos;
        let end = pos + piece.len();
        pos = end;
        if let Some(&(prev_start, prev_end)) = spans.last() {
            let prev = &s[prev_start..prev_end];
            if matches!((prev, piece), ("/", "/") | ("/", "*") | ("*", "/")) {
                spans.pop();
                spans.push((prev_start, end));
                continue;
            }
        }
        spans.push((start, end));
    }
    spans.into_iter().map(|(a, b)| &s[a..b]).collect()
}
