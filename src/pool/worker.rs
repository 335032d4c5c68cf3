// src/pool/worker.rs

//! Dispatch loop run by each pool worker.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, warn};

use super::Job;

/// Pull jobs from the shared queue until it is closed and drained.
///
/// Each job runs in its own spawned task and the worker waits for it before
/// taking the next one, so a worker never runs two jobs at once and a panic
/// inside a job is contained to that job.
pub(crate) async fn worker_loop(id: usize, queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>) {
    debug!(worker = id, "worker started");
    let mut executed = 0usize;

    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(job) = next else {
            break;
        };

        executed += 1;
        if let Err(err) = tokio::spawn(job).await {
            if err.is_panic() {
                error!(worker = id, "submitted work panicked");
            } else {
                warn!(worker = id, error = %err, "submitted work was cancelled");
            }
        }
    }

    debug!(worker = id, executed, "worker finished (queue closed)");
}
