// src/pool/mod.rs

//! Bounded worker pool.
//!
//! The pool owns a multi-threaded Tokio runtime and a fixed number of worker
//! loops that pull jobs from one shared FIFO dispatch queue. Submitting a job
//! only pushes it onto the queue, so `submit` returns immediately; at most
//! `size` job bodies execute at the same time.
//!
//! - [`WorkerPool`] is the owning side: it is created by the caller and must
//!   be shut down by the caller once the artifact has been retrieved.
//! - [`PoolHandle`] is a cheap clonable submit/`block_on` handle that
//!   orchestrators and continuations carry around.
//! - [`worker`] contains the dispatch loop each worker runs.

pub mod worker;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BakedagError, Result, StageError};

/// A unit of work accepted by the pool.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed-size pool executing submitted jobs on background workers.
pub struct WorkerPool {
    runtime: Runtime,
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Clonable handle used to submit work to a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// `None` once the pool stopped accepting work.
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    runtime: Handle,
    size: usize,
}

impl WorkerPool {
    /// Start a pool with `workers` concurrent workers.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(BakedagError::ConfigError(
                "worker pool needs at least one worker (got 0)".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("bakedag-worker")
            .enable_all()
            .build()?;

        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers_handles = (0..workers)
            .map(|id| runtime.spawn(worker::worker_loop(id, Arc::clone(&rx))))
            .collect();

        let handle = PoolHandle {
            inner: Arc::new(PoolInner {
                queue: Mutex::new(Some(tx)),
                runtime: runtime.handle().clone(),
                size: workers,
            }),
        };

        info!(workers, "worker pool started");

        Ok(Self {
            runtime,
            handle,
            workers: workers_handles,
        })
    }

    /// Handle for submitting work to this pool.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    pub fn size(&self) -> usize {
        self.handle.size()
    }

    /// Schedule `work` on one of the workers. See [`PoolHandle::submit`].
    pub fn submit<F>(&self, work: F) -> std::result::Result<(), StageError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.submit(work)
    }

    /// Stop accepting work, let the workers drain everything already queued,
    /// and release the runtime.
    ///
    /// # Panics
    /// If called from within an asynchronous execution context.
    pub fn shutdown(self) {
        let WorkerPool {
            runtime,
            handle,
            workers,
        } = self;

        handle.close();

        runtime.block_on(async move {
            for (id, worker) in workers.into_iter().enumerate() {
                if let Err(err) = worker.await {
                    warn!(worker = id, error = %err, "worker loop ended abnormally");
                }
            }
        });

        drop(runtime);
        info!("worker pool shut down");
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .field("open", &self.handle.is_open())
            .finish()
    }
}

impl PoolHandle {
    /// Schedule `work` for execution and return immediately.
    ///
    /// Jobs are dispatched in submission order, but independent jobs may
    /// finish in any order. If the pool is shut down the job is dropped,
    /// which is how pending stages learn they were interrupted.
    pub fn submit<F>(&self, work: F) -> std::result::Result<(), StageError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = self
            .inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(tx) = queue.as_ref() else {
            debug!("submit rejected: pool is shut down");
            return Err(StageError::PoolShutDown);
        };

        let sent = tx.send(Box::pin(work));
        // A rejected job is dropped after the lock is released: dropping it may
        // resolve handles whose continuations submit again.
        drop(queue);
        sent.map_err(|_| StageError::PoolShutDown)
    }

    /// Block the calling thread until `future` completes, driving it on the
    /// pool's runtime.
    ///
    /// # Panics
    /// If called from within an asynchronous execution context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.runtime.block_on(future)
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether the pool still accepts work.
    pub fn is_open(&self) -> bool {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn close(&self) {
        let closed = self
            .inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            debug!("dispatch queue closed; draining queued work");
        }
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("size", &self.size())
            .field("open", &self.is_open())
            .finish()
    }
}
