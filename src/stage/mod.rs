// src/stage/mod.rs

//! Simulated stages.
//!
//! A stage is one named unit of work: it traces its input, sleeps for its
//! configured cost as a stand-in for real asynchronous latency, applies its
//! transform and traces the output. Stages only ever run as jobs on a
//! [`WorkerPool`](crate::pool::WorkerPool) worker.
//!
//! - [`trace`] holds the trace event type and the sinks events go to.

pub mod trace;

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::StageError;
use crate::pool::PoolHandle;

pub use trace::{TraceEvent, TraceLog, TracePhase, TraceSink, TracingSink};

/// Static description of a stage: who it is and what it costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Unique name, used in faults and trace events (e.g. `dough.combine`).
    pub name: String,
    /// Trace label (e.g. `combining`).
    pub label: String,
    /// Simulated duration of the stage's work.
    pub cost: Duration,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>, cost: Duration) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            cost,
        }
    }
}

/// Everything a stage needs besides its own spec: where to run and where to
/// trace.
#[derive(Clone)]
pub struct StageContext {
    pool: PoolHandle,
    sink: Arc<dyn TraceSink>,
}

impl StageContext {
    pub fn new(pool: PoolHandle, sink: Arc<dyn TraceSink>) -> Self {
        Self { pool, sink }
    }

    /// Context that traces through [`TracingSink`].
    pub fn with_tracing(pool: PoolHandle) -> Self {
        Self::new(pool, Arc::new(TracingSink))
    }

    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    pub fn sink(&self) -> &Arc<dyn TraceSink> {
        &self.sink
    }
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Run one simulated stage on the current worker.
///
/// Emits `Started <label>: <input>`, sleeps for `spec.cost`, computes
/// `transform(input)` and emits `Finished <label>: <output>`. A transform
/// error is recorded as [`StageError::Transform`] and no finish event is
/// emitted for it.
pub async fn run_stage<T, U, F>(
    spec: &StageSpec,
    input: T,
    transform: F,
    sink: &dyn TraceSink,
) -> Result<U, StageError>
where
    T: Display,
    U: Display,
    F: FnOnce(T) -> anyhow::Result<U>,
{
    sink.record(TraceEvent::started(spec, input.to_string()));

    tokio::time::sleep(spec.cost).await;

    let output = transform(input).map_err(|err| {
        warn!(stage = %spec.name, error = %err, "stage transform failed");
        StageError::Transform {
            stage: spec.name.clone(),
            reason: format!("{err:#}"),
        }
    })?;

    sink.record(TraceEvent::finished(spec, output.to_string()));
    debug!(stage = %spec.name, "stage finished");
    Ok(output)
}
