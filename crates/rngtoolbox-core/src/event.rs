//! Event stream adapter between an acquisition backend and the controller.
//!
//! Backends push wire payloads (JSON objects of the form
//! `{"event": "<tag>", "data": {...}}`) through an [`EventSink`]. The
//! controller pulls them from the paired [`EventStream`], which classifies
//! each payload into an [`AcquisitionEvent`] with [`on_event`]. Classification
//! is pure: no buffering beyond the channel, no state.
//!
//! ```text
//! backend ──WireEvent/JSON──▶ EventSink ─▶ channel ─▶ EventStream ──on_event──▶ AcquisitionEvent
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Payloads buffered between a backend and the controller before the backend
/// has to wait.
pub const EVENT_BUFFER: usize = 1024;

/// Wire representation emitted by backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum WireEvent {
    Sample { line: String, percent: f64 },
    Finished,
    Error { message: String },
}

/// A classified backend event, as folded into session state.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// One sample line and the backend's progress, verbatim.
    Sample { line: String, percent: f64 },
    /// The backend completed the request.
    Finished,
    /// A non-fatal problem with one sample.
    Error { message: String },
    /// Anything that did not match a known tag and shape.
    Unknown { tag: Option<String> },
}

impl From<WireEvent> for AcquisitionEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Sample { line, percent } => Self::Sample { line, percent },
            WireEvent::Finished => Self::Finished,
            WireEvent::Error { message } => Self::Error { message },
        }
    }
}

/// Classify a raw wire payload by its `event` discriminant.
///
/// Unrecognized tags, and known tags with a malformed payload, map to
/// [`AcquisitionEvent::Unknown`].
pub fn on_event(raw: Value) -> AcquisitionEvent {
    let tag = raw.get("event").and_then(Value::as_str).map(str::to_owned);
    match serde_json::from_value::<WireEvent>(raw) {
        Ok(event) => event.into(),
        Err(e) => {
            log::debug!("unclassified backend event (tag {tag:?}): {e}");
            AcquisitionEvent::Unknown { tag }
        }
    }
}

/// Create a connected sink/stream pair for one session, buffering at most
/// [`EVENT_BUFFER`] payloads.
pub fn channel() -> (EventSink, EventStream) {
    with_capacity(EVENT_BUFFER)
}

pub fn with_capacity(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventStream { rx })
}

/// Backend-side handle for emitting events. Cheap to clone.
///
/// When the buffer is full a send blocks the calling thread until the
/// controller catches up, so a backend that can outrun the controller must
/// emit from a blocking thread (`spawn_blocking`), never from async code.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Value>,
}

impl EventSink {
    /// Send a raw payload. Returns `false` once the controller has closed the
    /// stream; backends should stop producing at that point.
    pub fn send_raw(&self, payload: Value) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            Err(TrySendError::Full(payload)) => self.tx.blocking_send(payload).is_ok(),
        }
    }

    pub fn send(&self, event: &WireEvent) -> bool {
        match serde_json::to_value(event) {
            Ok(payload) => self.send_raw(payload),
            Err(e) => {
                log::warn!("failed to encode {event:?}: {e}");
                !self.is_closed()
            }
        }
    }

    pub fn sample(&self, line: &str, percent: f64) -> bool {
        self.send(&WireEvent::Sample {
            line: line.to_string(),
            percent,
        })
    }

    pub fn error(&self, message: &str) -> bool {
        self.send(&WireEvent::Error {
            message: message.to_string(),
        })
    }

    pub fn finished(&self) -> bool {
        self.send(&WireEvent::Finished)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Controller-side end of the channel.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Value>,
}

impl EventStream {
    /// Next classified event, or `None` once every sink is dropped (or the
    /// stream was closed) and the buffer is empty.
    pub async fn next(&mut self) -> Option<AcquisitionEvent> {
        self.rx.recv().await.map(on_event)
    }

    /// Stop accepting new events. Already-buffered events remain readable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
