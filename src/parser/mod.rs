//! Streaming parser core.
//!
//! The parser owns an input buffer, a mode, and three hold buffers, and
//! dispatches to a per-mode step function until no further progress can be
//! made without more input. Held text respects segmentation boundaries: a
//! partial word is never emitted as finished, and nothing is emitted while
//! it could still become a tag or fence.

mod fence;
mod tag;
mod text;

use crate::config::{EmitUnit, ParserOptions};
use crate::event::{Event, EventKind, FenceScope, TagScope};
use crate::segment::{ends_in_word_char, segment};

/// What the parser is currently inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    InTag,
    InFence,
}

/// Outcome of one handler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Consumed input or changed mode; run again.
    Progress,
    /// Nothing more can be decided without another chunk.
    NeedInput,
}

/// Incremental parser: feed chunks, collect events.
///
/// # Example
/// ```
/// use tagflow::{EventKind, ParserOptions, StreamParser};
///
/// let mut parser = StreamParser::new(ParserOptions::with_tags(["think"]));
/// let mut events = parser.feed("Hello <thi");
/// events.extend(parser.feed("nk>hm</think>"));
/// events.extend(parser.flush());
/// assert!(events
///     .iter()
///     .any(|e| matches!(&e.kind, EventKind::TagOpen { name, .. } if name == "think")));
/// ```
pub struct StreamParser {
    opts: ParserOptions,
    mode: Mode,
    /// Unprocessed input.
    buffer: String,
    /// Plain text accumulated but not yet emitted.
    held_text: String,
    /// Word-mode hold for text and tag content: the last piece when it
    /// could be the prefix of a longer word.
    held_word: String,
    /// Word-mode hold for fence content.
    held_code: String,
    current_tag: Option<TagScope>,
    current_fence: Option<FenceScope>,
    /// Whether the buffer currently begins at a line start.
    at_line_start: bool,
    /// A flush is in progress: no more input is coming, so the
    /// minimum-parse gates are off.
    finishing: bool,
    /// The terminal end event has been emitted.
    ended: bool,
}

impl StreamParser {
    pub fn new(opts: ParserOptions) -> Self {
        Self {
            opts,
            mode: Mode::Text,
            buffer: String::new(),
            held_text: String::new(),
            held_word: String::new(),
            held_code: String::new(),
            current_tag: None,
            current_fence: None,
            at_line_start: true,
            finishing: false,
            ended: false,
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.opts
    }

    /// The tag scope currently open, if any.
    pub fn in_tag(&self) -> Option<&TagScope> {
        self.current_tag.as_ref()
    }

    /// The fence scope currently open, if any.
    pub fn in_code_fence(&self) -> Option<&FenceScope> {
        self.current_fence.as_ref()
    }

    /// Append a chunk and parse as far as possible, returning the events
    /// produced in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<Event> {
        let mut out = Vec::new();
        self.buffer.push_str(chunk);
        self.run(&mut out);
        out
    }

    /// Resolve all pending state: parse once more with the minimum-parse
    /// gates off (no further input is coming), demote unresolved lookahead
    /// to text, close any open fence, abandon any open tag, emit held
    /// text, then a flush marker and (once per stream) the terminal end
    /// marker.
    ///
    /// Idempotent on empty state.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.finishing = true;
        self.run(&mut out);
        self.finishing = false;
        match self.mode {
            Mode::Text => {
                let rest = std::mem::take(&mut self.buffer);
                self.held_text.push_str(&rest);
            }
            Mode::InTag => {
                let rest = std::mem::take(&mut self.buffer);
                self.held_text.push_str(&rest);
                self.flush_text(&mut out);
                self.current_tag = None;
                self.mode = Mode::Text;
            }
            Mode::InFence => {
                let rest = std::mem::take(&mut self.buffer);
                self.emit_fence_chunks(&rest, true, &mut out);
                out.push(self.event(EventKind::FenceEnd));
                self.current_fence = None;
                self.mode = Mode::Text;
            }
        }
        self.flush_text(&mut out);
        self.at_line_start = true;
        if out.is_empty() && self.ended {
            return out;
        }
        out.push(Event::new(EventKind::Flush));
        if !self.ended {
            self.ended = true;
            out.push(Event::new(EventKind::End));
        }
        out
    }

    /// Drop all pending state without emitting anything.
    pub fn dispose(&mut self) {
        self.buffer.clear();
        self.held_text.clear();
        self.held_word.clear();
        self.held_code.clear();
        self.current_tag = None;
        self.current_fence = None;
        self.mode = Mode::Text;
        self.at_line_start = true;
        self.ended = true;
    }

    fn run(&mut self, out: &mut Vec<Event>) {
        while !self.buffer.is_empty() {
            let step = match self.mode {
                Mode::Text => text::step(self, out),
                Mode::InTag => tag::step(self, out),
                Mode::InFence => fence::step(self, out),
            };
            if self.held_text.len() >= self.opts.buffer_len {
                self.emit_held_text(out);
            }
            if step == Step::NeedInput {
                break;
            }
        }
        if self.buffer.is_empty() && self.mode != Mode::InFence {
            self.emit_held_text(out);
        }
    }

    /// Stamp the current scope onto an event.
    fn event(&self, kind: EventKind) -> Event {
        Event {
            kind,
            in_tag: self.current_tag.clone(),
            in_code_fence: self.current_fence.clone(),
            meta: Vec::new(),
        }
    }

    /// Drop `n` bytes from the front of the buffer, tracking whether the
    /// new front begins a line.
    fn consume(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        debug_assert!(self.buffer.is_char_boundary(n));
        self.at_line_start = self.buffer.as_bytes()[n - 1] == b'\n';
        self.buffer.drain(..n);
    }

    /// Move the first `n` bytes of the buffer into the held text.
    fn hold_prefix(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.held_text.push_str(&self.buffer[..n]);
        self.consume(n);
    }

    /// Emit held text as segmented events, retaining a trailing partial
    /// word for the next round.
    fn emit_held_text(&mut self, out: &mut Vec<Event>) {
        if self.held_text.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.held_text);
        self.emit_text(&content, false, out);
    }

    /// Emit held text and the word hold: used at structural boundaries,
    /// where a word cannot continue.
    fn flush_text(&mut self, out: &mut Vec<Event>) {
        let content = std::mem::take(&mut self.held_text);
        self.emit_text(&content, true, out);
    }

    /// Segment `content` (with the word hold prepended) and emit text
    /// events. Unless `complete`, the final piece is held back when it
    /// could be the prefix of a longer word.
    fn emit_text(&mut self, content: &str, complete: bool, out: &mut Vec<Event>) {
        let source = self.prepend_hold(false, content);
        if source.is_empty() {
            return;
        }
        let mut pieces = segment(&source, self.opts.emit_unit);
        if !complete && self.opts.emit_unit == EmitUnit::Word {
            if let Some(last) = pieces.last() {
                if ends_in_word_char(last) {
                    self.held_word = last.to_string();
                    pieces.pop();
                }
            }
        }
        for piece in pieces {
            let event = self.event(EventKind::Text {
                text: piece.to_string(),
            });
            out.push(event);
        }
    }

    /// Segment fence content (with the fence hold prepended) and emit
    /// chunk events, with the same partial-word retention as text.
    fn emit_fence_chunks(&mut self, content: &str, complete: bool, out: &mut Vec<Event>) {
        let source = self.prepend_hold(true, content);
        if source.is_empty() {
            return;
        }
        let mut pieces = segment(&source, self.opts.emit_unit);
        if !complete && self.opts.emit_unit == EmitUnit::Word {
            if let Some(last) = pieces.last() {
                if ends_in_word_char(last) {
                    self.held_code = last.to_string();
                    pieces.pop();
                }
            }
        }
        for piece in pieces {
            let event = self.event(EventKind::FenceChunk {
                text: piece.to_string(),
            });
            out.push(event);
        }
    }

    fn prepend_hold(&mut self, fence: bool, content: &str) -> String {
        let hold = if fence {
            &mut self.held_code
        } else {
            &mut self.held_word
        };
        if hold.is_empty() {
            content.to_string()
        } else {
            let mut source = std::mem::take(hold);
            source.push_str(content);
            source
        }
    }
}
