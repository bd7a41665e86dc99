//! In-memory session state and the event fold.
//!
//! [`SessionState`] is what a display reads. Every change goes through
//! [`SessionState::apply`] (backend events) or one of the terminal
//! transitions, so the invariants hold at all times:
//!
//! - `output_lines.len() <= capacity`; when full, the oldest line is evicted
//!   first and the remaining lines keep emission order.
//! - `percent` is exactly the last value a backend reported.
//! - once the phase is terminal, events are ignored.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::error::TransportError;
use crate::event::AcquisitionEvent;

/// Default visible line capacity.
pub const MAX_VISIBLE_LINES: usize = 500;

/// Line shown for payloads the adapter could not classify.
pub const UNKNOWN_EVENT_LINE: &str = "[Unknown Event]";

/// Line appended when a session is cancelled.
pub const CANCELLED_LINE: &str = "Collection cancelled";

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Collecting,
    Finished,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }

    /// Whether a new collection may be started from this phase.
    pub fn can_start(self) -> bool {
        self != Self::Collecting
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Collecting => write!(f, "collecting"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Observable state of the current (or last) session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session_id: Option<Uuid>,
    pub phase: Phase,
    /// Most-recent-last, bounded by `capacity`.
    pub output_lines: VecDeque<String>,
    pub percent: f64,
    pub last_error: Option<String>,
    /// Total lines ever appended this session, including evicted ones.
    pub lines_appended: u64,
    capacity: usize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::idle(MAX_VISIBLE_LINES)
    }
}

impl SessionState {
    /// `{Idle, [], 0, None}` with the given line capacity.
    pub fn idle(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            session_id: None,
            phase: Phase::Idle,
            output_lines: VecDeque::with_capacity(capacity.min(MAX_VISIBLE_LINES)),
            percent: 0.0,
            last_error: None,
            lines_appended: 0,
            capacity,
        }
    }

    /// Fresh state for a session that is about to collect.
    pub fn collecting(session_id: Uuid, capacity: usize) -> Self {
        Self {
            session_id: Some(session_id),
            phase: Phase::Collecting,
            ..Self::idle(capacity)
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fold one backend event. Returns whether the state changed.
    pub fn apply(&mut self, event: AcquisitionEvent) -> bool {
        if self.phase != Phase::Collecting {
            log::trace!("ignoring {event:?} in phase {}", self.phase);
            return false;
        }
        match event {
            AcquisitionEvent::Sample { line, percent } => {
                self.push_line(line);
                self.percent = percent;
            }
            AcquisitionEvent::Error { message } => {
                self.push_line(format!("Error: {message}"));
                self.last_error = Some(message);
            }
            AcquisitionEvent::Finished => {
                self.phase = Phase::Finished;
            }
            AcquisitionEvent::Unknown { .. } => {
                self.push_line(UNKNOWN_EVENT_LINE.to_string());
            }
        }
        true
    }

    /// Terminal transition for a rejected request.
    pub fn fail(&mut self, error: &TransportError) -> bool {
        if self.phase != Phase::Collecting {
            return false;
        }
        self.push_line(format!("Collection failed: {error}"));
        self.last_error = Some(error.message().to_string());
        self.phase = Phase::Failed;
        true
    }

    /// Terminal transition for a user cancellation.
    pub fn cancel(&mut self) -> bool {
        if self.phase != Phase::Collecting {
            return false;
        }
        self.push_line(CANCELLED_LINE.to_string());
        self.phase = Phase::Cancelled;
        true
    }

    /// Terminal transition when the request resolved without a `Finished`
    /// event.
    pub fn complete(&mut self) -> bool {
        if self.phase != Phase::Collecting {
            return false;
        }
        self.phase = Phase::Finished;
        true
    }

    fn push_line(&mut self, line: String) {
        while self.output_lines.len() >= self.capacity {
            self.output_lines.pop_front();
        }
        self.output_lines.push_back(line);
        self.lines_appended += 1;
    }

    /// The lines appended since a reader last saw `seen` total appends, as far
    /// as they are still retained.
    pub fn lines_since(&self, seen: u64) -> impl Iterator<Item = &str> {
        let new = self.lines_appended.saturating_sub(seen);
        let retained = (new as usize).min(self.output_lines.len());
        self.output_lines
            .iter()
            .skip(self.output_lines.len() - retained)
            .map(String::as_str)
    }
}
