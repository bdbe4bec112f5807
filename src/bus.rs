//! Event delivery.
//!
//! Sinks register zero or more of three transformation stages that run in
//! order (pre, main, post) over every event, sinks within a stage in
//! registration order. Surviving events fan out to per-type topic
//! subscribers, a wildcard topic, and a pull-style queue. When pacing is
//! configured, deliveries drain through a timed single-consumer queue.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::thread;
use std::time::Duration;

use rustc_hash::FxBuildHasher as FastHashBuilder;

use crate::event::{Event, EventKind};

/// Topic name that receives every event type.
pub const WILDCARD_TOPIC: &str = "*";

/// Instance-scoped mutable state shared between transformation stages and
/// subscribers. All access happens on the parser's thread, so no
/// synchronization is involved.
pub type SharedContext = HashMap<String, ContextValue, FastHashBuilder>;

/// A value stored in the shared context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Failure raised by a transformation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    pub reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for SinkError {}

/// Outcome of one transformation stage for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// Pass the event through unchanged.
    Keep,
    /// Remove the event from the stream.
    Drop,
    /// Replace the event with zero or more events, spliced in place.
    Replace(Vec<Event>),
}

/// A registered observer. Every method has a pass-through default, so a
/// sink implements only the stages it cares about.
pub trait Sink {
    fn pre_transform(
        &mut self,
        _event: &Event,
        _ctx: &mut SharedContext,
    ) -> Result<Transformed, SinkError> {
        Ok(Transformed::Keep)
    }

    fn transform(
        &mut self,
        _event: &Event,
        _ctx: &mut SharedContext,
    ) -> Result<Transformed, SinkError> {
        Ok(Transformed::Keep)
    }

    fn post_transform(
        &mut self,
        _event: &Event,
        _ctx: &mut SharedContext,
    ) -> Result<Transformed, SinkError> {
        Ok(Transformed::Keep)
    }

    /// Called with every delivered event, after transformation.
    fn on_event(&mut self, _event: &Event, _ctx: &mut SharedContext) {}

    /// Called once when the bus is disposed.
    fn on_dispose(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pre,
    Main,
    Post,
}

const STAGES: [Stage; 3] = [Stage::Pre, Stage::Main, Stage::Post];

type Subscriber = Box<dyn FnMut(&Event, &mut SharedContext)>;

/// Ordered sink registry plus delivery fan-out.
pub struct EventBus {
    sinks: Vec<Box<dyn Sink>>,
    subscribers: HashMap<String, Vec<Subscriber>, FastHashBuilder>,
    /// Pull-style queue of delivered events.
    queue: VecDeque<Event>,
    /// Events awaiting a paced drain.
    pending: VecDeque<Event>,
    context: SharedContext,
    emit_delay: Duration,
    suppress_errors: bool,
    disposed: bool,
}

impl EventBus {
    pub fn new(emit_delay: Duration, suppress_errors: bool) -> Self {
        Self {
            sinks: Vec::new(),
            subscribers: HashMap::default(),
            queue: VecDeque::new(),
            pending: VecDeque::new(),
            context: SharedContext::default(),
            emit_delay,
            suppress_errors,
            disposed: false,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// Subscribe to one event type by its wire name, or to
    /// [`WILDCARD_TOPIC`] for all of them.
    pub fn subscribe<F>(&mut self, topic: &str, callback: F)
    where
        F: FnMut(&Event, &mut SharedContext) + 'static,
    {
        self.subscribers
            .entry(topic.to_string())
            .or_default()
            .push(Box::new(callback));
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SharedContext {
        &mut self.context
    }

    /// Run one event through the transformation pipeline and deliver the
    /// survivors, immediately or via the paced queue.
    pub fn publish(&mut self, event: Event) {
        if self.disposed {
            return;
        }
        let (events, errors) = self.run_pipeline(event);
        if self.emit_delay.is_zero() {
            for event in events {
                self.dispatch(event);
            }
        } else {
            self.pending.extend(events);
        }
        for error in errors {
            self.dispatch(error);
        }
    }

    fn run_pipeline(&mut self, event: Event) -> (Vec<Event>, Vec<Event>) {
        let mut events = vec![event];
        let mut errors = Vec::new();
        for stage in STAGES {
            for index in 0..self.sinks.len() {
                let mut next = Vec::with_capacity(events.len());
                let mut failure = None;
                for event in &events {
                    let sink = &mut self.sinks[index];
                    let result = match stage {
                        Stage::Pre => sink.pre_transform(event, &mut self.context),
                        Stage::Main => sink.transform(event, &mut self.context),
                        Stage::Post => sink.post_transform(event, &mut self.context),
                    };
                    match result {
                        Ok(Transformed::Keep) => next.push(event.clone()),
                        Ok(Transformed::Drop) => {}
                        Ok(Transformed::Replace(list)) => next.extend(list),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                match failure {
                    // A failing sink sees its input list preserved.
                    Some(err) => {
                        if !self.suppress_errors {
                            errors.push(Event::new(EventKind::Error {
                                reason: err.reason,
                                recoverable: true,
                            }));
                        }
                    }
                    None => events = next,
                }
                if events.is_empty() {
                    return (events, errors);
                }
            }
        }
        (events, errors)
    }

    fn dispatch(&mut self, event: Event) {
        for sink in &mut self.sinks {
            sink.on_event(&event, &mut self.context);
        }
        let topic = event.kind.name();
        if let Some(subs) = self.subscribers.get_mut(topic) {
            for sub in subs {
                sub(&event, &mut self.context);
            }
        }
        if let Some(subs) = self.subscribers.get_mut(WILDCARD_TOPIC) {
            for sub in subs {
                sub(&event, &mut self.context);
            }
        }
        self.queue.push_back(event);
    }

    /// Deliver all paced events in order, sleeping `emit_delay` between
    /// successive deliveries, then signal the drained queue. No-op when
    /// nothing is pending.
    pub fn drain(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut first = true;
        while let Some(event) = self.pending.pop_front() {
            if !first && !self.emit_delay.is_zero() {
                thread::sleep(self.emit_delay);
            }
            first = false;
            self.dispatch(event);
        }
        self.dispatch(Event::new(EventKind::BufferReleased));
    }

    /// Number of events waiting for a paced drain.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pull the next delivered event, if any.
    pub fn next_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    /// Discard pending deliveries, empty the pull queue, and notify sinks.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pending.clear();
        self.queue.clear();
        for sink in &mut self.sinks {
            sink.on_dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_event(s: &str) -> Event {
        Event::new(EventKind::Text {
            text: s.to_string(),
        })
    }

    struct Upcase;

    impl Sink for Upcase {
        fn transform(
            &mut self,
            event: &Event,
            _ctx: &mut SharedContext,
        ) -> Result<Transformed, SinkError> {
            match &event.kind {
                EventKind::Text { text } => Ok(Transformed::Replace(vec![text_event(
                    &text.to_uppercase(),
                )])),
                _ => Ok(Transformed::Keep),
            }
        }
    }

    struct DropAll;

    impl Sink for DropAll {
        fn transform(
            &mut self,
            _event: &Event,
            _ctx: &mut SharedContext,
        ) -> Result<Transformed, SinkError> {
            Ok(Transformed::Drop)
        }
    }

    struct Failing;

    impl Sink for Failing {
        fn transform(
            &mut self,
            _event: &Event,
            _ctx: &mut SharedContext,
        ) -> Result<Transformed, SinkError> {
            Err(SinkError::new("boom"))
        }
    }

    #[test]
    fn transform_rewrites_events() {
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Upcase));
        bus.publish(text_event("hi"));
        let delivered = bus.next_event().unwrap();
        assert_eq!(delivered.text(), Some("HI"));
    }

    #[test]
    fn drop_removes_event_from_stream() {
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(DropAll));
        bus.publish(text_event("gone"));
        assert!(bus.next_event().is_none());
    }

    #[test]
    fn failing_sink_preserves_event_and_surfaces_error() {
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Failing));
        bus.publish(text_event("kept"));
        let first = bus.next_event().unwrap();
        assert_eq!(first.text(), Some("kept"));
        let second = bus.next_event().unwrap();
        assert!(
            matches!(&second.kind, EventKind::Error { reason, recoverable } if reason == "boom" && *recoverable)
        );
    }

    #[test]
    fn failing_sink_suppressed() {
        let mut bus = EventBus::new(Duration::ZERO, true);
        bus.add_sink(Box::new(Failing));
        bus.publish(text_event("kept"));
        assert_eq!(bus.next_event().unwrap().text(), Some("kept"));
        assert!(bus.next_event().is_none());
    }

    #[test]
    fn subscribers_by_topic_and_wildcard() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut bus = EventBus::new(Duration::ZERO, false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let by_topic = Rc::clone(&seen);
        bus.subscribe("text", move |e, _| {
            by_topic.borrow_mut().push(format!("text:{}", e.text().unwrap()));
        });
        let by_wildcard = Rc::clone(&seen);
        bus.subscribe(WILDCARD_TOPIC, move |e, _| {
            by_wildcard.borrow_mut().push(format!("*:{}", e.kind.name()));
        });
        bus.publish(text_event("a"));
        bus.publish(Event::new(EventKind::Flush));
        assert_eq!(
            *seen.borrow(),
            vec!["text:a".to_string(), "*:text".to_string(), "*:flush".to_string()]
        );
    }

    #[test]
    fn context_threads_through_stages() {
        struct Counter;
        impl Sink for Counter {
            fn transform(
                &mut self,
                _event: &Event,
                ctx: &mut SharedContext,
            ) -> Result<Transformed, SinkError> {
                let n = match ctx.get("count") {
                    Some(ContextValue::Int(n)) => *n,
                    _ => 0,
                };
                ctx.insert("count".to_string(), ContextValue::Int(n + 1));
                Ok(Transformed::Keep)
            }
        }
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Counter));
        bus.publish(text_event("a"));
        bus.publish(text_event("b"));
        assert_eq!(bus.context().get("count"), Some(&ContextValue::Int(2)));
    }

    #[test]
    fn paced_events_wait_for_drain() {
        let mut bus = EventBus::new(Duration::from_millis(1), false);
        bus.publish(text_event("a"));
        bus.publish(text_event("b"));
        assert_eq!(bus.pending_len(), 2);
        assert!(bus.next_event().is_none());
        bus.drain();
        assert_eq!(bus.next_event().unwrap().text(), Some("a"));
        assert_eq!(bus.next_event().unwrap().text(), Some("b"));
        let released = bus.next_event().unwrap();
        assert!(matches!(released.kind, EventKind::BufferReleased));
    }

    #[test]
    fn dispose_discards_pending_and_notifies() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Hooked(Rc<RefCell<bool>>);
        impl Sink for Hooked {
            fn on_dispose(&mut self) {
                *self.0.borrow_mut() = true;
            }
        }

        let disposed = Rc::new(RefCell::new(false));
        let mut bus = EventBus::new(Duration::from_millis(1), false);
        bus.add_sink(Box::new(Hooked(Rc::clone(&disposed))));
        bus.publish(text_event("lost"));
        bus.dispose();
        assert!(*disposed.borrow());
        assert!(bus.next_event().is_none());
        bus.publish(text_event("ignored"));
        assert!(bus.next_event().is_none());
    }

    #[test]
    fn sinks_can_attach_metadata() {
        struct Annotator;
        impl Sink for Annotator {
            fn pre_transform(
                &mut self,
                event: &Event,
                _ctx: &mut SharedContext,
            ) -> Result<Transformed, SinkError> {
                let mut annotated = event.clone();
                annotated
                    .meta
                    .push(("seen-by".to_string(), "annotator".to_string()));
                Ok(Transformed::Replace(vec![annotated]))
            }
        }
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Annotator));
        bus.publish(text_event("x"));
        let delivered = bus.next_event().unwrap();
        assert_eq!(delivered.meta_value("seen-by"), Some("annotator"));
    }

    #[test]
    fn passive_observer_collects_text() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Collector(Rc<RefCell<String>>);
        impl Sink for Collector {
            fn on_event(&mut self, event: &Event, _ctx: &mut SharedContext) {
                if let Some(text) = event.text() {
                    self.0.borrow_mut().push_str(text);
                }
            }
        }

        let collected = Rc::new(RefCell::new(String::new()));
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Collector(Rc::clone(&collected))));
        bus.publish(text_event("a"));
        bus.publish(text_event("b"));
        assert_eq!(&*collected.borrow(), "ab");
    }

    #[test]
    fn stages_run_pre_main_post_in_registration_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Tracer(&'static str, Rc<RefCell<Vec<String>>>);
        impl Sink for Tracer {
            fn pre_transform(
                &mut self,
                _e: &Event,
                _c: &mut SharedContext,
            ) -> Result<Transformed, SinkError> {
                self.1.borrow_mut().push(format!("{}:pre", self.0));
                Ok(Transformed::Keep)
            }
            fn transform(
                &mut self,
                _e: &Event,
                _c: &mut SharedContext,
            ) -> Result<Transformed, SinkError> {
                self.1.borrow_mut().push(format!("{}:main", self.0));
                Ok(Transformed::Keep)
            }
            fn post_transform(
                &mut self,
                _e: &Event,
                _c: &mut SharedContext,
            ) -> Result<Transformed, SinkError> {
                self.1.borrow_mut().push(format!("{}:post", self.0));
                Ok(Transformed::Keep)
            }
        }

        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new(Duration::ZERO, false);
        bus.add_sink(Box::new(Tracer("a", Rc::clone(&trace))));
        bus.add_sink(Box::new(Tracer("b", Rc::clone(&trace))));
        bus.publish(text_event("x"));
        assert_eq!(
            *trace.borrow(),
            vec!["a:pre", "b:pre", "a:main", "b:main", "a:post", "b:post"]
        );
    }
}
