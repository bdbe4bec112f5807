//! Default buffer bounds and recognition limits.
//!
//! These bounds keep the parser's memory use flat under adversarial
//! fragmentation: held text, ambiguous lookahead, and retained tails are
//! all capped.

/// High-water mark for held plain text before it is force-segmented.
pub const DEFAULT_BUFFER_LEN: usize = 2048;

/// Minimum buffered characters before special-sequence parsing is attempted
/// in text or fence mode. Avoids re-deciding the same prefix on every
/// one-character chunk.
pub const DEFAULT_MIN_PARSE_LEN: usize = 10;

/// Leading spaces allowed before a fence delimiter line.
pub const MAX_FENCE_INDENT: usize = 3;

/// Minimum delimiter run length for a fence.
pub const MIN_FENCE_RUN: usize = 3;
