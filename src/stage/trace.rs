// src/stage/trace.rs

//! Observable start/finish events emitted by every simulated stage.
//!
//! The wording of [`TraceEvent`]'s `Display` impl is decorative; what callers
//! can rely on is the ordering of events and their `stage` / `value` fields.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use super::StageSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    Started,
    Finished,
}

/// One trace line of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub phase: TracePhase,
    /// Unique stage name (e.g. `dough.rise`).
    pub stage: String,
    /// Human-facing label (e.g. `letting rise`).
    pub label: String,
    /// Stage input for `Started`, stage output for `Finished`.
    pub value: String,
}

impl TraceEvent {
    pub fn started(spec: &StageSpec, input: String) -> Self {
        Self {
            phase: TracePhase::Started,
            stage: spec.name.clone(),
            label: spec.label.clone(),
            value: input,
        }
    }

    pub fn finished(spec: &StageSpec, output: String) -> Self {
        Self {
            phase: TracePhase::Finished,
            stage: spec.name.clone(),
            label: spec.label.clone(),
            value: output,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            TracePhase::Started => "Started",
            TracePhase::Finished => "Finished",
        };
        write!(f, "{phase} {}: {}", self.label, self.value)
    }
}

/// Destination for stage trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// Default sink: emits each event as an `info` level tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, event: TraceEvent) {
        info!(stage = %event.stage, phase = ?event.phase, value = %event.value, "{event}");
    }
}

/// Sink that keeps every event in arrival order (and still logs it).
///
/// Cloning shares the underlying buffer, so a test can keep one clone and
/// hand another to an orchestrator.
#[derive(Debug, Default, Clone)]
pub struct TraceLog {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered trace lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    /// Index of the first event for `stage` in the given phase.
    pub fn position(&self, phase: TracePhase, stage: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| e.phase == phase && e.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceSink for TraceLog {
    fn record(&self, event: TraceEvent) {
        TracingSink.record(event.clone());
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
