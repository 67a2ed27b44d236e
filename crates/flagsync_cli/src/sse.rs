//! Recorded `text/event-stream` transcripts.

use flagsync_engine::{EventHandler, EventSource, RawEvent};
use std::collections::HashMap;

/// Event name used when a frame has no `event:` field.
const DEFAULT_EVENT: &str = "message";

/// One dispatched frame of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name.
    pub event: String,
    /// Data lines joined with `\n`, if any were present.
    pub data: Option<String>,
}

/// Parses a transcript into frames.
///
/// Frames are separated by blank lines. Comment lines (leading `:`) and
/// fields other than `event` and `data` are skipped.
pub fn parse(text: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut event: Option<String> = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() {
            if event.is_some() || data.is_some() {
                frames.push(Frame {
                    event: event.take().unwrap_or_else(|| DEFAULT_EVENT.to_string()),
                    data: data.take(),
                });
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    if event.is_some() || data.is_some() {
        frames.push(Frame {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        });
    }
    frames
}

/// An [`EventSource`] that plays back a parsed transcript.
#[derive(Default)]
pub struct TranscriptSource {
    frames: Vec<Frame>,
    handlers: HashMap<String, Vec<EventHandler>>,
}

/// Outcome of playing a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayStats {
    /// Frames delivered to at least one handler.
    pub delivered: usize,
    /// Frames nobody listened for.
    pub unhandled: usize,
}

impl TranscriptSource {
    /// Creates a source for the given transcript text.
    pub fn new(text: &str) -> Self {
        Self {
            frames: parse(text),
            handlers: HashMap::new(),
        }
    }

    /// Delivers every frame, in order, to its handlers.
    pub fn play(&mut self) -> PlayStats {
        let mut stats = PlayStats::default();
        for frame in &self.frames {
            let event = RawEvent {
                data: frame.data.clone(),
            };
            match self.handlers.get_mut(&frame.event) {
                Some(handlers) if !handlers.is_empty() => {
                    for handler in handlers.iter_mut() {
                        handler(&event);
                    }
                    stats.delivered += 1;
                }
                _ => {
                    tracing::debug!(event = %frame.event, "No listener for event");
                    stats.unhandled += 1;
                }
            }
        }
        stats
    }
}

impl EventSource for TranscriptSource {
    fn add_event_listener(&mut self, event_name: &str, handler: EventHandler) {
        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push(handler);
    }
}
