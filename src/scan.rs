//! Buffer and boundary scanning.
//!
//! Byte-level scanners for the recognition rules: tag opens, tag close
//! markers, fence delimiter lines, quoted attributes, and the earliest
//! position at which any of them could begin. Every scanner distinguishes
//! "definitely not" from "not enough input yet" so the caller can wait for
//! more data without committing early.
//!
//! All delimiters are ASCII, so byte offsets returned here always fall on
//! UTF-8 character boundaries.

use memchr::{memchr, memchr_iter};

use crate::event::FenceKind;
use crate::limits::{MAX_FENCE_INDENT, MIN_FENCE_RUN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpecialKind {
    Tag,
    Fence,
}

/// A position where a special construct starts or could still start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub pos: usize,
    pub kind: SpecialKind,
}

/// Earliest candidate in `buf` at or after `from`. `at_line_start` tells
/// whether `buf[0]` begins a line; fence candidates only exist at line
/// starts, tag candidates at any `<`.
pub(crate) fn next_candidate(buf: &str, at_line_start: bool, from: usize) -> Option<Candidate> {
    let bytes = buf.as_bytes();
    let tag = memchr_iter(b'<', bytes)
        .find(|&i| i >= from)
        .map(|pos| Candidate {
            pos,
            kind: SpecialKind::Tag,
        });
    let fence = next_fence_candidate(bytes, at_line_start, from);
    match (tag, fence) {
        (Some(t), Some(f)) => Some(if f.pos <= t.pos { f } else { t }),
        (t, f) => t.or(f),
    }
}

fn next_fence_candidate(bytes: &[u8], at_line_start: bool, from: usize) -> Option<Candidate> {
    let mut start = if at_line_start {
        0
    } else {
        memchr(b'\n', bytes)? + 1
    };
    loop {
        if start >= bytes.len() {
            return None;
        }
        if start >= from && is_fence_line_prefix(&bytes[start..]) {
            return Some(Candidate {
                pos: start,
                kind: SpecialKind::Fence,
            });
        }
        start = match memchr(b'\n', &bytes[start..]) {
            Some(i) => start + i + 1,
            None => return None,
        };
    }
}

/// Whether a line beginning here is, or could still become, a fence
/// delimiter line: up to three spaces, then a backtick or tilde. A line
/// that is all spaces up to the buffer end is still undecided.
fn is_fence_line_prefix(line: &[u8]) -> bool {
    let mut i = 0;
    while i < line.len() && line[i] == b' ' {
        i += 1;
        if i > MAX_FENCE_INDENT {
            return false;
        }
    }
    match line.get(i) {
        None => true,
        Some(&b) => b == b'`' || b == b'~',
    }
}

/// Result of scanning a tag open at the start of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagScan {
    /// Definitely not a tag open.
    No,
    /// Could still become one with more input.
    Partial,
    /// A complete open: the name occupies bytes `1..name_end`, and `end`
    /// bytes are consumed through the closing `>`.
    Open { name_end: usize, end: usize },
}

/// Scan a tag open at the start of `buf`, which must begin with `<`.
///
/// The name is `[A-Za-z][A-Za-z0-9_-]*`; anything except `>` may follow it
/// in the attribute section.
pub(crate) fn scan_tag_open(buf: &str) -> TagScan {
    let bytes = buf.as_bytes();
    debug_assert_eq!(bytes.first(), Some(&b'<'));
    let Some(&first) = bytes.get(1) else {
        return TagScan::Partial;
    };
    if !first.is_ascii_alphabetic() {
        return TagScan::No;
    }
    let mut name_end = 2;
    while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
        name_end += 1;
    }
    match memchr(b'>', &bytes[name_end..]) {
        Some(offset) => TagScan::Open {
            name_end,
            end: name_end + offset + 1,
        },
        None => TagScan::Partial,
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Extract `key="value"` / `key='value'` pairs from a tag's attribute
/// section, in order. Unquoted values are ignored; a duplicate key keeps
/// its first position and takes the last value written. Quoted values do
/// not span lines.
pub(crate) fn parse_attrs(section: &str) -> Vec<(String, String)> {
    let bytes = section.as_bytes();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !is_word_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < bytes.len() && is_word_byte(bytes[i]) {
            i += 1;
        }
        let key_end = i;
        if i + 1 >= bytes.len() || bytes[i] != b'=' || (bytes[i + 1] != b'"' && bytes[i + 1] != b'\'')
        {
            continue;
        }
        let quote = bytes[i + 1];
        let value_start = i + 2;
        let mut j = value_start;
        while j < bytes.len() && bytes[j] != quote && bytes[j] != b'\n' {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] == b'\n' {
            // unterminated value; rescan from just after the opening quote
            i = value_start;
            continue;
        }
        let key = &section[key_start..key_end];
        let value = section[value_start..j].to_string();
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => attrs.push((key.to_string(), value)),
        }
        i = j + 1;
    }
    attrs
}

/// Result of scanning a fence opener at the start of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FenceOpenScan {
    /// Definitely not a fence opener.
    No,
    /// Could still become one (short run at the buffer end, or no newline
    /// buffered yet).
    Partial,
    /// A complete opening line; `end` bytes are consumed through its
    /// newline.
    Open {
        kind: FenceKind,
        fence_len: usize,
        lang: Option<String>,
        end: usize,
    },
}

/// Scan a fence opening line at the start of `buf`, which must begin a
/// line: up to three spaces, a homogeneous run of ≥ 3 backticks or tildes,
/// an info string, and a newline.
pub(crate) fn scan_fence_open(buf: &str) -> FenceOpenScan {
    let bytes = buf.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
        if i > MAX_FENCE_INDENT {
            return FenceOpenScan::No;
        }
    }
    if i >= bytes.len() {
        return FenceOpenScan::Partial;
    }
    let kind = match bytes[i] {
        b'`' => FenceKind::Backtick,
        b'~' => FenceKind::Tilde,
        _ => return FenceOpenScan::No,
    };
    let delimiter = bytes[i];
    let run_start = i;
    while i < bytes.len() && bytes[i] == delimiter {
        i += 1;
    }
    let run = i - run_start;
    if run < MIN_FENCE_RUN {
        return if i >= bytes.len() {
            FenceOpenScan::Partial
        } else {
            FenceOpenScan::No
        };
    }
    let Some(newline) = memchr(b'\n', &bytes[i..]) else {
        return FenceOpenScan::Partial;
    };
    let info = buf[i..i + newline].trim();
    let lang = if info.is_empty() {
        None
    } else {
        Some(info.to_string())
    };
    FenceOpenScan::Open {
        kind,
        fence_len: run,
        lang,
        end: i + newline + 1,
    }
}

/// A located closing delimiter line: content ends at `content_end`, and the
/// delimiter line is consumed through `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FenceClose {
    pub content_end: usize,
    pub end: usize,
}

/// Find a closing delimiter line: at a line start, up to three spaces, a
/// run of the opening character of exactly `fence_len`, then only
/// whitespace to the line end. With `at_end` (no more input is coming) the
/// end of the buffer also terminates the close line; mid-stream it does
/// not, since the next chunk could extend the run.
pub(crate) fn find_fence_close(
    buf: &str,
    kind: FenceKind,
    fence_len: usize,
    at_line_start: bool,
    at_end: bool,
) -> Option<FenceClose> {
    let bytes = buf.as_bytes();
    let delimiter = kind.delimiter_byte();
    let mut start = if at_line_start {
        0
    } else {
        memchr(b'\n', bytes)? + 1
    };
    loop {
        if start >= bytes.len() {
            return None;
        }
        if let Some(close) = close_line_at(bytes, start, delimiter, fence_len, at_end) {
            return Some(close);
        }
        start = match memchr(b'\n', &bytes[start..]) {
            Some(i) => start + i + 1,
            None => return None,
        };
    }
}

fn close_line_at(
    bytes: &[u8],
    start: usize,
    delimiter: u8,
    fence_len: usize,
    at_end: bool,
) -> Option<FenceClose> {
    let mut i = start;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
        if i - start > MAX_FENCE_INDENT {
            return None;
        }
    }
    let run_start = i;
    while i < bytes.len() && bytes[i] == delimiter {
        i += 1;
    }
    if i - run_start != fence_len {
        return None;
    }
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r') {
        i += 1;
    }
    if i >= bytes.len() {
        return at_end.then_some(FenceClose {
            content_end: start,
            end: i,
        });
    }
    if bytes[i] == b'\n' {
        return Some(FenceClose {
            content_end: start,
            end: i + 1,
        });
    }
    None
}

/// Result of searching for a tag's close marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagCloseScan {
    /// `</name␣*>` found: content ends at `start`, `end` bytes consumed.
    Found { start: usize, end: usize },
    /// A possible close marker begins at `start` and runs to the buffer
    /// end; more input is needed to decide.
    Partial { start: usize },
    /// No close marker, not even a partial one.
    Absent,
}

/// Search `buf` for the close marker of `name`.
pub(crate) fn find_tag_close(buf: &str, name: &str) -> TagCloseScan {
    let bytes = buf.as_bytes();
    for pos in memchr_iter(b'<', bytes) {
        match close_marker_at(bytes, pos, name.as_bytes()) {
            MarkerMatch::Full(end) => return TagCloseScan::Found { start: pos, end },
            MarkerMatch::NeedsInput => return TagCloseScan::Partial { start: pos },
            MarkerMatch::No => {}
        }
    }
    TagCloseScan::Absent
}

enum MarkerMatch {
    Full(usize),
    NeedsInput,
    No,
}

fn close_marker_at(bytes: &[u8], start: usize, name: &[u8]) -> MarkerMatch {
    let mut i = start + 1;
    if i >= bytes.len() {
        return MarkerMatch::NeedsInput;
    }
    if bytes[i] != b'/' {
        return MarkerMatch::No;
    }
    i += 1;
    for &name_byte in name {
        if i >= bytes.len() {
            return MarkerMatch::NeedsInput;
        }
        if bytes[i] != name_byte {
            return MarkerMatch::No;
        }
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return MarkerMatch::NeedsInput;
    }
    if bytes[i] == b'>' {
        MarkerMatch::Full(i + 1)
    } else {
        MarkerMatch::No
    }
}
