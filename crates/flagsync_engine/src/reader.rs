//! Stream reader: adapts named raw events from a transport into protocol events.

use crate::error::{DataSourceError, ErrorHandler};
use crate::processor::{Dispatch, EventSink, ListenerId, PayloadProcessor, ProcessorStats};
use crate::processors::ObjectProcessors;
use crate::protocol::ProtocolState;
use flagsync_protocol::{EventKind, Payload, ProtocolEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A raw event as delivered by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    /// JSON-encoded event data.
    pub data: Option<String>,
}

impl RawEvent {
    /// Creates a raw event carrying data.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    /// Creates a raw event with no data.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Callback registered with an [`EventSource`] for one event name.
pub type EventHandler = Box<dyn FnMut(&RawEvent) + Send>;

/// A source of named raw events, such as a server-sent-events connection.
///
/// The source must deliver events for one connection in order and one at a time.
pub trait EventSource {
    /// Registers a handler for events with the given name.
    fn add_event_listener(&mut self, event_name: &str, handler: EventHandler);
}

/// Reads FDv2 events from an [`EventSource`] and assembles them into payloads.
///
/// Decoding failures are reported to the error handler and never reach the
/// state machine. Payload listeners and the error handler run after the
/// reader is unlocked, so they may call back into it (for example to
/// `reset` after a malformed message).
#[derive(Clone)]
pub struct PayloadStreamReader {
    inner: Arc<Mutex<ReaderInner>>,
}

struct ReaderInner {
    processor: PayloadProcessor,
}

impl PayloadStreamReader {
    /// Creates a reader and registers it with the event source.
    pub fn new<S>(
        source: &mut S,
        processors: ObjectProcessors,
        error_handler: Option<ErrorHandler>,
    ) -> Self
    where
        S: EventSource + ?Sized,
    {
        let reader = Self::detached(processors, error_handler);
        reader.attach(source);
        reader
    }

    /// Creates a reader that is not registered with any source.
    ///
    /// Feed it with [`PayloadStreamReader::handle_event`] or attach it later.
    pub fn detached(processors: ObjectProcessors, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ReaderInner {
                processor: PayloadProcessor::new(processors, error_handler),
            })),
        }
    }

    /// Registers a handler for every FDv2 event name with the source.
    pub fn attach<S>(&self, source: &mut S)
    where
        S: EventSource + ?Sized,
    {
        for kind in EventKind::ALL {
            let inner = Arc::clone(&self.inner);
            let event_name = kind.as_str();
            source.add_event_listener(
                event_name,
                Box::new(move |event: &RawEvent| {
                    let dispatch = inner.lock().handle(event_name, event);
                    dispatch.deliver();
                }),
            );
        }
    }

    /// Handles a raw event as if the source had delivered it.
    pub fn handle_event(&self, event_name: &str, event: &RawEvent) {
        let dispatch = self.inner.lock().handle(event_name, event);
        dispatch.deliver();
    }

    /// Registers a payload listener.
    pub fn add_payload_listener(
        &self,
        listener: impl FnMut(&Payload) + Send + 'static,
    ) -> ListenerId {
        self.inner.lock().processor.add_payload_listener(listener)
    }

    /// Removes a payload listener. Returns false if it was not registered.
    pub fn remove_payload_listener(&self, id: ListenerId) -> bool {
        self.inner.lock().processor.remove_payload_listener(id)
    }

    /// Resets the state machine for a new connection.
    pub fn reset(&self) {
        self.inner.lock().processor.reset();
    }

    /// Gets the current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.inner.lock().processor.state()
    }

    /// Gets the processor stats.
    pub fn stats(&self) -> ProcessorStats {
        self.inner.lock().processor.stats()
    }
}

impl EventSink for PayloadStreamReader {
    fn process_events(&mut self, events: &[ProtocolEvent]) {
        let dispatch = self.inner.lock().processor.step(events);
        dispatch.deliver();
    }
}

impl fmt::Debug for PayloadStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadStreamReader")
            .field("state", &self.state())
            .finish()
    }
}

impl ReaderInner {
    fn handle(&mut self, event_name: &str, event: &RawEvent) -> Dispatch {
        let Some(data) = event.data.as_deref() else {
            let mut dispatch = self.processor.dispatch();
            dispatch.report(DataSourceError::unknown(format!(
                "Event from EventStream missing data for \"{event_name}\"."
            )));
            return dispatch;
        };

        match ProtocolEvent::decode(event_name, data) {
            Ok(event) => self.processor.step(std::slice::from_ref(&event)),
            Err(err) => {
                debug!(
                    event = event_name,
                    payload = data,
                    error = %err,
                    "Stream received data that was unable to be parsed"
                );
                let mut dispatch = self.processor.dispatch();
                dispatch.report(DataSourceError::invalid_data(format!(
                    "Malformed data in EventStream for \"{event_name}\"."
                )));
                dispatch
            }
        }
    }
}

/// An in-memory event source for testing.
///
/// Stores registered handlers and dispatches events passed to
/// [`MockEventSource::emit`].
#[derive(Default)]
pub struct MockEventSource {
    handlers: HashMap<String, Vec<EventHandler>>,
}

impl MockEventSource {
    /// Creates a new mock event source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to every handler registered for its name.
    ///
    /// Returns false if no handler was registered for the name.
    pub fn emit(&mut self, event_name: &str, event: &RawEvent) -> bool {
        match self.handlers.get_mut(event_name) {
            Some(handlers) if !handlers.is_empty() => {
                for handler in handlers.iter_mut() {
                    handler(event);
                }
                true
            }
            _ => false,
        }
    }

    /// Delivers an event carrying JSON data.
    pub fn emit_data(&mut self, event_name: &str, data: &str) -> bool {
        self.emit(event_name, &RawEvent::new(data))
    }

    /// Returns the event names that have handlers, sorted.
    pub fn registered_events(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl EventSource for MockEventSource {
    fn add_event_listener(&mut self, event_name: &str, handler: EventHandler) {
        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push(handler);
    }
}

impl fmt::Debug for MockEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEventSource")
            .field("events", &self.registered_events())
            .finish()
    }
}
