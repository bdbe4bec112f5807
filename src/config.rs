//! Parser configuration.

use std::time::Duration;

use crate::limits::{DEFAULT_BUFFER_LEN, DEFAULT_MIN_PARSE_LEN};

/// Granularity of emitted text pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitUnit {
    /// Maximal runs of whitespace and non-whitespace.
    #[default]
    Token,
    /// Unicode word boundaries, with `//`, `/*`, `*/` kept whole.
    Word,
    /// Extended grapheme clusters.
    Grapheme,
}

/// Construction-time options for a [`StreamParser`](crate::StreamParser).
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Segmentation granularity for text and fence-chunk events.
    pub emit_unit: EmitUnit,
    /// High-water mark for held plain text before it is force-emitted.
    pub buffer_len: usize,
    /// Maximum characters an ambiguous `<…` or fence lookahead may grow
    /// before it is demoted to plain text.
    pub lookahead_limit: usize,
    /// Minimum buffered characters before special-sequence parsing is
    /// attempted in text or fence mode.
    pub min_parse_len: usize,
    /// Recognized tag names. A `<name …>` whose name is not listed here is
    /// literal text.
    pub tags: Vec<String>,
    /// Delay between successive deliveries when pacing through a bus.
    pub emit_delay: Duration,
    /// Silently drop transformation-stage failures instead of surfacing
    /// them as error events.
    pub suppress_transform_errors: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            emit_unit: EmitUnit::Token,
            buffer_len: DEFAULT_BUFFER_LEN,
            lookahead_limit: DEFAULT_BUFFER_LEN,
            min_parse_len: DEFAULT_MIN_PARSE_LEN,
            tags: Vec::new(),
            emit_delay: Duration::ZERO,
            suppress_transform_errors: false,
        }
    }
}

impl ParserOptions {
    /// Default options with the given set of recognized tag names.
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Same options with a different segmentation granularity.
    pub fn emit_unit(mut self, unit: EmitUnit) -> Self {
        self.emit_unit = unit;
        self
    }

    pub(crate) fn recognizes(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t == name)
    }
}
