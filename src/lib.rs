//! tagflow: incremental, fragmentation-tolerant parsing of streamed text.
//!
//! Streamed model output arrives in arbitrarily chopped chunks. tagflow
//! recognizes a caller-declared set of custom tags (`<name …>…</name>`),
//! fenced code blocks (three or more backticks or tildes), and the plain
//! text between them, and reports everything as an ordered sequence of
//! events. It never stalls, never buffers unboundedly, and never splits a
//! word or a marker across a chunk boundary.
//!
//! # Design principles
//! - No AST: streaming events only
//! - Byte-level scanning, no regex engine
//! - Ambiguity is never an error: undecidable lookahead demotes to text
//! - Bounded holds: every buffer has a configured high-water mark
//!
//! # Architecture
//!
//! - **event.rs** - Event enum plus the tag/fence scope stamped on events
//! - **segment.rs** - Token / word / grapheme segmentation
//! - **scan.rs** - Byte-level boundary scanners
//! - **parser/** - The mode state machine (`feed` / `flush` / `dispose`)
//! - **bus.rs** - Sinks, transformation stages, subscribers, pacing
//!
//! # Example
//! ```
//! use tagflow::{parse_events, EventKind, ParserOptions};
//!
//! let events = parse_events(
//!     "Hello <think>reasoning</think> world",
//!     ParserOptions::with_tags(["think"]),
//! );
//! let kinds: Vec<_> = events.iter().map(|e| e.kind.name()).collect();
//! assert_eq!(kinds[2], "tag-open");
//! assert_eq!(*kinds.last().unwrap(), "end");
//! ```

pub mod bus;
pub mod config;
pub mod event;
pub mod limits;
pub mod parser;
mod scan;
pub mod segment;

pub use bus::{ContextValue, EventBus, SharedContext, Sink, SinkError, Transformed};
pub use config::{EmitUnit, ParserOptions};
pub use event::{Event, EventKind, FenceKind, FenceScope, TagScope};
pub use parser::StreamParser;

/// Parse a complete input in one call: feed it as a single chunk, then
/// flush.
pub fn parse_events(input: &str, opts: ParserOptions) -> Vec<Event> {
    let mut parser = StreamParser::new(opts);
    let mut events = parser.feed(input);
    events.extend(parser.flush());
    events
}

/// A parser wired to an event bus: chunks in, transformed deliveries out.
///
/// Events produced by each `feed` run the sink pipeline and are delivered
/// to subscribers and the pull queue, immediately or on the flush drain
/// when an emit delay is configured.
pub struct StreamSession {
    parser: StreamParser,
    bus: EventBus,
}

impl StreamSession {
    pub fn new(opts: ParserOptions) -> Self {
        let bus = EventBus::new(opts.emit_delay, opts.suppress_transform_errors);
        Self {
            parser: StreamParser::new(opts),
            bus,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.bus.add_sink(sink);
    }

    pub fn subscribe<F>(&mut self, topic: &str, callback: F)
    where
        F: FnMut(&Event, &mut SharedContext) + 'static,
    {
        self.bus.subscribe(topic, callback);
    }

    /// Feed one chunk through the parser and publish its events.
    pub fn feed(&mut self, chunk: &str) {
        for event in self.parser.feed(chunk) {
            self.bus.publish(event);
        }
    }

    /// Close any open scope, publish the flush and end markers, and drain
    /// paced deliveries.
    pub fn flush(&mut self) {
        for event in self.parser.flush() {
            self.bus.publish(event);
        }
        self.bus.drain();
    }

    /// Pull the next delivered event, if any.
    pub fn next_event(&mut self) -> Option<Event> {
        self.bus.next_event()
    }

    /// Drain all currently delivered events.
    pub fn events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(event) = self.bus.next_event() {
            out.push(event);
        }
        out
    }

    pub fn context(&self) -> &SharedContext {
        self.bus.context()
    }

    pub fn context_mut(&mut self) -> &mut SharedContext {
        self.bus.context_mut()
    }

    /// Cancel the session: clear parser state, discard pending deliveries,
    /// and run sink dispose hooks.
    pub fn dispose(&mut self) {
        self.parser.dispose();
        self.bus.dispose();
    }
}
