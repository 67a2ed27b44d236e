//! Payload processor: runs events through the state machine and dispatches results.

use crate::error::{DataSourceError, ErrorHandler};
use crate::processors::ObjectProcessors;
use crate::protocol::{ProtocolAction, ProtocolHandler, ProtocolState};
use flagsync_protocol::{Payload, ProtocolEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback receiving completed payloads.
pub type PayloadListener = Box<dyn FnMut(&Payload) + Send>;

type SharedListener = Arc<Mutex<PayloadListener>>;

/// Handle returned when registering a payload listener, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Anything that accepts batches of structured protocol events.
pub trait EventSink {
    /// Processes a batch of events in order.
    fn process_events(&mut self, events: &[ProtocolEvent]);
}

/// Counters describing what a processor has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Total number of events processed.
    pub events_processed: u64,
    /// Total number of payloads delivered to listeners.
    pub payloads_delivered: u64,
    /// Total number of protocol errors reported.
    pub protocol_errors: u64,
    /// Total number of server errors received.
    pub server_errors: u64,
    /// Total number of goodbyes received.
    pub goodbyes: u64,
}

/// Wraps a [`ProtocolHandler`] and broadcasts its payloads to listeners.
///
/// Listeners are invoked synchronously in registration order.
pub struct PayloadProcessor {
    handler: ProtocolHandler,
    listeners: Vec<(ListenerId, SharedListener)>,
    next_listener_id: u64,
    error_handler: Option<ErrorHandler>,
    stats: ProcessorStats,
}

impl PayloadProcessor {
    /// Creates a new processor.
    pub fn new(processors: ObjectProcessors, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            handler: ProtocolHandler::new(processors),
            listeners: Vec::new(),
            next_listener_id: 0,
            error_handler,
            stats: ProcessorStats::default(),
        }
    }

    /// Registers a payload listener.
    pub fn add_payload_listener(
        &mut self,
        listener: impl FnMut(&Payload) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        let listener: PayloadListener = Box::new(listener);
        self.listeners.push((id, Arc::new(Mutex::new(listener))));
        id
    }

    /// Removes a payload listener. Returns false if it was not registered.
    pub fn remove_payload_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Gets the current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.handler.state()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> ProcessorStats {
        self.stats.clone()
    }

    /// Resets the state machine for a new connection.
    pub fn reset(&mut self) {
        self.handler.reset();
    }

    /// Processes a batch of events in order.
    pub fn process_events(&mut self, events: &[ProtocolEvent]) {
        self.step(events).deliver();
    }

    /// Runs events through the state machine and returns what must be
    /// delivered, without invoking any callback.
    pub(crate) fn step(&mut self, events: &[ProtocolEvent]) -> Dispatch {
        let mut dispatch = self.dispatch();
        for event in events {
            self.stats.events_processed += 1;
            let action = self.handler.process_event(event);
            self.record(action, &mut dispatch);
        }
        if dispatch.has_payloads() {
            dispatch.listeners = self
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
        }
        dispatch
    }

    /// An empty dispatch bound to this processor's error handler.
    pub(crate) fn dispatch(&self) -> Dispatch {
        Dispatch {
            outcomes: Vec::new(),
            listeners: Vec::new(),
            error_handler: self.error_handler.clone(),
        }
    }

    fn record(&mut self, action: ProtocolAction, dispatch: &mut Dispatch) {
        match action {
            ProtocolAction::None => {}
            ProtocolAction::Payload(payload) => {
                self.stats.payloads_delivered += 1;
                dispatch.outcomes.push(Outcome::Payload(payload));
            }
            ProtocolAction::Error { kind, message } => {
                self.stats.protocol_errors += 1;
                if self.error_handler.is_some() {
                    dispatch.report(DataSourceError::invalid_data(message));
                } else {
                    warn!(%kind, %message, "Unhandled protocol error");
                }
            }
            ProtocolAction::Goodbye { .. } => {
                self.stats.goodbyes += 1;
            }
            ProtocolAction::ServerError { .. } => {
                self.stats.server_errors += 1;
            }
        }
    }
}

/// Payloads and errors produced by a batch, awaiting delivery.
///
/// Delivery happens after the producer has released any lock it holds, so
/// callbacks may call back into the reader that produced them.
#[must_use = "a dispatch does nothing until delivered"]
pub(crate) struct Dispatch {
    outcomes: Vec<Outcome>,
    listeners: Vec<SharedListener>,
    error_handler: Option<ErrorHandler>,
}

enum Outcome {
    Payload(Payload),
    Error(DataSourceError),
}

impl Dispatch {
    /// Queues an error for the error handler, or logs it when there is none.
    pub(crate) fn report(&mut self, error: DataSourceError) {
        if self.error_handler.is_some() {
            self.outcomes.push(Outcome::Error(error));
        } else {
            debug!(%error, "Dropping error without a handler");
        }
    }

    fn has_payloads(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome, Outcome::Payload(_)))
    }

    /// Invokes listeners and the error handler in the order outcomes arose.
    pub(crate) fn deliver(self) {
        for outcome in self.outcomes {
            match outcome {
                Outcome::Payload(payload) => {
                    for listener in &self.listeners {
                        let mut listener = listener.lock();
                        (*listener)(&payload);
                    }
                }
                Outcome::Error(error) => {
                    if let Some(handler) = &self.error_handler {
                        handler(error);
                    }
                }
            }
        }
    }
}

impl EventSink for PayloadProcessor {
    fn process_events(&mut self, events: &[ProtocolEvent]) {
        PayloadProcessor::process_events(self, events);
    }
}

impl fmt::Debug for PayloadProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadProcessor")
            .field("handler", &self.handler)
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats)
            .finish()
    }
}
