//! Event types emitted by the streaming parser.

/// Fence delimiter family: backticks or tildes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Backtick,
    Tilde,
}

impl FenceKind {
    /// The delimiter character for this kind.
    pub fn delimiter_char(self) -> char {
        match self {
            Self::Backtick => '`',
            Self::Tilde => '~',
        }
    }

    pub(crate) fn delimiter_byte(self) -> u8 {
        match self {
            Self::Backtick => b'`',
            Self::Tilde => b'~',
        }
    }

    /// The three-character marker reported on fence-start events.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Backtick => "```",
            Self::Tilde => "~~~",
        }
    }
}

/// The tag scope an event was emitted inside, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagScope {
    pub name: String,
    /// Attributes in source order. Duplicate keys keep their first position
    /// with the last value written.
    pub attrs: Vec<(String, String)>,
}

impl TagScope {
    /// Look up an attribute value by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The fence scope an event was emitted inside, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceScope {
    pub kind: FenceKind,
    /// Length of the run that opened the fence. The close line must match
    /// this exactly.
    pub fence_len: usize,
    /// Trimmed info string from the opening line, if non-empty.
    pub lang: Option<String>,
}

impl FenceScope {
    /// The exact delimiter string that opened this fence.
    pub fn delimiter(&self) -> String {
        std::iter::repeat(self.kind.delimiter_char())
            .take(self.fence_len)
            .collect()
    }
}

/// Payload of a parser event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A segmented piece of plain text.
    Text { text: String },
    /// A recognized tag opened.
    TagOpen {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// The matching close marker for an open tag.
    TagClose { name: String },
    /// A fenced code block opened.
    FenceStart {
        kind: FenceKind,
        lang: Option<String>,
    },
    /// A segmented piece of fence content.
    FenceChunk { text: String },
    /// The closing delimiter line of a fence (or a flush-forced close).
    FenceEnd,
    /// The caller flushed the stream.
    Flush,
    /// Terminal marker, emitted exactly once after a flush drains.
    End,
    /// A transformation-stage failure, surfaced as data.
    Error { reason: String, recoverable: bool },
    /// The paced delivery queue drained.
    BufferReleased,
}

impl EventKind {
    /// Wire name of this event type, used as the subscription topic.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::TagOpen { .. } => "tag-open",
            Self::TagClose { .. } => "tag-close",
            Self::FenceStart { .. } => "code-fence-start",
            Self::FenceChunk { .. } => "code-fence-chunk",
            Self::FenceEnd => "code-fence-end",
            Self::Flush => "flush",
            Self::End => "end",
            Self::Error { .. } => "error",
            Self::BufferReleased => "buffer-released",
        }
    }
}

/// A parser event plus the structural scope it was emitted inside.
///
/// At most one of `in_tag` / `in_code_fence` is set (tags and fences do not
/// nest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub in_tag: Option<TagScope>,
    pub in_code_fence: Option<FenceScope>,
    /// Free-form key/value pairs attached by sinks along the pipeline.
    pub meta: Vec<(String, String)>,
}

impl Event {
    /// An event with no structural scope and no metadata.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            in_tag: None,
            in_code_fence: None,
            meta: Vec::new(),
        }
    }

    /// Look up sink-attached metadata by key.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The text payload of a text or fence-chunk event.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text { text } | EventKind::FenceChunk { text } => Some(text),
            _ => None,
        }
    }

    /// Literal form of this event for reassembling the input: payload text
    /// for text and chunk events, canonical markup for tag events. Fence
    /// delimiter lines are consumed by the parser and yield nothing here.
    pub fn reconstruct(&self) -> Option<String> {
        match &self.kind {
            EventKind::Text { text } | EventKind::FenceChunk { text } => Some(text.clone()),
            EventKind::TagOpen { name, attrs } => {
                let mut s = format!("<{name}");
                for (key, value) in attrs {
                    s.push_str(&format!(" {key}=\"{value}\""));
                }
                s.push('>');
                Some(s)
            }
            EventKind::TagClose { name } => Some(format!("</{name}>")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names() {
        assert_eq!(EventKind::Flush.name(), "flush");
        assert_eq!(EventKind::FenceEnd.name(), "code-fence-end");
        assert_eq!(
            EventKind::Text {
                text: "x".to_string()
            }
            .name(),
            "text"
        );
    }

    #[test]
    fn tag_scope_attr_lookup() {
        let scope = TagScope {
            name: "think".to_string(),
            attrs: vec![("depth".to_string(), "3".to_string())],
        };
        assert_eq!(scope.attr("depth"), Some("3"));
        assert_eq!(scope.attr("missing"), None);
    }

    #[test]
    fn fence_delimiter_string() {
        let scope = FenceScope {
            kind: FenceKind::Tilde,
            fence_len: 4,
            lang: None,
        };
        assert_eq!(scope.delimiter(), "~~~~");
        assert_eq!(scope.kind.marker(), "~~~");
    }

    #[test]
    fn reconstruct_tag_open_with_attrs() {
        let event = Event::new(EventKind::TagOpen {
            name: "tool".to_string(),
            attrs: vec![("id".to_string(), "7".to_string())],
        });
        assert_eq!(event.reconstruct().as_deref(), Some("<tool id=\"7\">"));
    }

    #[test]
    fn reconstruct_skips_structural_markers() {
        assert_eq!(Event::new(EventKind::FenceEnd).reconstruct(), None);
        assert_eq!(Event::new(EventKind::Flush).reconstruct(), None);
    }
}
