// src/sync/handle.rs

//! One-shot result handles.
//!
//! A [`StageHandle`] is the read side of a write-once cell holding a stage's
//! eventual outcome; the matching [`Resolver`] is the write side and is
//! consumed by resolving, so a handle goes from pending to resolved exactly
//! once. Dropping a `Resolver` without resolving records
//! [`StageError::Interrupted`], so readers never wait on a stage that is gone.
//!
//! Handles are composed with [`StageHandle::and_then`] (sequential
//! continuation) and [`StageHandle::combine`] (pairwise join). Both register
//! continuations on their inputs instead of parking a worker, and submit the
//! follow-up work to the pool only once the inputs are resolved.

use std::fmt::{self, Display};
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::errors::StageError;
use crate::stage::{StageContext, StageSpec, run_stage};

/// Result carried by a resolved handle.
pub type Outcome<T> = Result<T, StageError>;

type Continuation<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

enum State<T> {
    /// Not yet resolved; continuations waiting to be notified.
    Pending(Vec<Continuation<T>>),
    Resolved(Outcome<T>),
}

struct Shared<T> {
    stage: String,
    state: Mutex<State<T>>,
    notify: Notify,
}

impl<T: Clone> Shared<T> {
    fn complete(&self, outcome: Outcome<T>) -> Result<(), StageError> {
        let continuations = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::replace(&mut *state, State::Resolved(outcome.clone())) {
                State::Pending(continuations) => continuations,
                State::Resolved(first) => {
                    *state = State::Resolved(first);
                    error!(stage = %self.stage, "handle resolved twice");
                    return Err(StageError::AlreadyResolved {
                        stage: self.stage.clone(),
                    });
                }
            }
        };

        self.notify.notify_waiters();
        for continuation in continuations {
            continuation(&outcome);
        }
        Ok(())
    }

    fn peek(&self) -> Option<Outcome<T>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            State::Pending(_) => None,
            State::Resolved(outcome) => Some(outcome.clone()),
        }
    }
}

/// Read side of a one-shot cell. Cloning shares the same cell.
pub struct StageHandle<T> {
    shared: Arc<Shared<T>>,
}

/// Write side of a one-shot cell.
pub struct Resolver<T: Clone> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Clone + Send + 'static> StageHandle<T> {
    /// A fresh unresolved handle and the resolver that completes it.
    pub fn pending(stage: impl Into<String>) -> (Resolver<T>, StageHandle<T>) {
        let shared = Arc::new(Shared {
            stage: stage.into(),
            state: Mutex::new(State::Pending(Vec::new())),
            notify: Notify::new(),
        });
        (
            Resolver {
                shared: Some(Arc::clone(&shared)),
            },
            StageHandle { shared },
        )
    }

    /// Name of the stage this handle represents.
    pub fn stage(&self) -> &str {
        &self.shared.stage
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.peek().is_some()
    }

    /// The outcome, if the handle is already resolved.
    pub fn try_get(&self) -> Option<Outcome<T>> {
        self.shared.peek()
    }

    /// Wait until the handle is resolved and return its outcome.
    pub async fn wait(&self) -> Outcome<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a resolution in between is not missed.
            notified.as_mut().enable();

            if let Some(outcome) = self.shared.peek() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Run `f` with the outcome once the handle resolves. Runs immediately
    /// on the calling thread if it already has.
    pub fn on_resolve<F>(&self, f: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let ready = {
            let mut state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            match &mut *state {
                State::Pending(continuations) => {
                    continuations.push(Box::new(f));
                    return;
                }
                State::Resolved(outcome) => outcome.clone(),
            }
        };
        f(&ready);
    }

    /// Chain a stage onto this handle.
    ///
    /// Once this handle resolves with a value, that value becomes the input
    /// of a new stage submitted to the pool; the returned handle holds the
    /// new stage's output. A fault in this handle is forwarded without
    /// submitting anything.
    pub fn and_then<U, F>(&self, ctx: &StageContext, spec: StageSpec, transform: F) -> StageHandle<U>
    where
        T: Display,
        U: Display + Clone + Send + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        let (resolver, handle) = StageHandle::pending(spec.name.clone());
        let ctx = ctx.clone();
        let source = self.shared.stage.clone();

        self.on_resolve(move |outcome| match outcome {
            Ok(value) => spawn_stage(&ctx, spec, value.clone(), transform, resolver),
            Err(err) => {
                debug!(stage = %spec.name, upstream = %source, "skipping stage after upstream fault");
                resolver.resolve_or_log(Err(err.clone()));
            }
        });

        handle
    }

    /// Join this handle with `other`.
    ///
    /// Resolves only after both inputs resolved (in either order), by
    /// running `combiner(self, other)` as a pool job. Faults wait for the
    /// other side too: a fault in this handle wins, otherwise a fault in
    /// `other` is forwarded.
    pub fn combine<B, C, F>(
        &self,
        ctx: &StageContext,
        other: &StageHandle<B>,
        name: impl Into<String>,
        combiner: F,
    ) -> StageHandle<C>
    where
        B: Clone + Send + 'static,
        C: Clone + Send + 'static,
        F: FnOnce(T, B) -> anyhow::Result<C> + Send + 'static,
    {
        let name = name.into();
        let (resolver, handle) = StageHandle::pending(name.clone());
        let ctx = ctx.clone();
        let other = other.clone();

        self.on_resolve(move |left| {
            let left = left.clone();

            other.on_resolve(move |right| {
                let (left, right) = match (left, right) {
                    (Ok(left), Ok(right)) => (left, right.clone()),
                    (Err(err), _) => {
                        resolver.resolve_or_log(Err(err));
                        return;
                    }
                    (Ok(_), Err(err)) => {
                        resolver.resolve_or_log(Err(err.clone()));
                        return;
                    }
                };

                let stage = name.clone();
                let job = async move {
                    let outcome = combiner(left, right).map_err(|err| {
                        warn!(stage = %name, error = %err, "combiner failed");
                        StageError::Transform {
                            stage: name.clone(),
                            reason: format!("{err:#}"),
                        }
                    });
                    debug!(stage = %name, ok = outcome.is_ok(), "combined");
                    resolver.resolve_or_log(outcome);
                };

                if let Err(err) = ctx.pool().submit(job) {
                    warn!(%stage, error = %err, "could not submit combiner");
                }
            });
        });

        handle
    }
}

impl<T> Clone for StageHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for StageHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("stage", &self.shared.stage)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Resolver<T> {
    /// Resolve the handle. Consumes the resolver, so it can only be called once.
    pub fn resolve(mut self, outcome: Outcome<T>) -> Result<(), StageError> {
        match self.shared.take() {
            Some(shared) => shared.complete(outcome),
            None => Ok(()),
        }
    }

    pub(crate) fn resolve_or_log(self, outcome: Outcome<T>) {
        if let Err(err) = self.resolve(outcome) {
            error!(error = %err, "failed to resolve stage handle");
        }
    }
}

impl<T: Clone> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            warn!(stage = %shared.stage, "stage dropped before resolving; recording interruption");
            let stage = shared.stage.clone();
            // Only fails if already resolved, which `resolve` rules out.
            let _ = shared.complete(Err(StageError::Interrupted { stage }));
        }
    }
}

/// Submit a simulated stage to the pool and return a handle for its output.
///
/// Returns immediately; the stage runs on a pool worker.
pub fn submit_task<T, U, F>(ctx: &StageContext, spec: StageSpec, input: T, transform: F) -> StageHandle<U>
where
    T: Display + Send + 'static,
    U: Display + Clone + Send + 'static,
    F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
{
    let (resolver, handle) = StageHandle::pending(spec.name.clone());
    spawn_stage(ctx, spec, input, transform, resolver);
    handle
}

fn spawn_stage<T, U, F>(ctx: &StageContext, spec: StageSpec, input: T, transform: F, resolver: Resolver<U>)
where
    T: Display + Send + 'static,
    U: Display + Clone + Send + 'static,
    F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
{
    let sink = Arc::clone(ctx.sink());
    let name = spec.name.clone();

    let job = async move {
        let outcome = run_stage(&spec, input, transform, sink.as_ref()).await;
        resolver.resolve_or_log(outcome);
    };

    if let Err(err) = ctx.pool().submit(job) {
        warn!(stage = %name, error = %err, "could not submit stage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use crate::stage::{TraceLog, TracePhase};
    use anyhow::anyhow;
    use std::time::Duration;

    fn ctx(pool: &WorkerPool, log: &TraceLog) -> StageContext {
        StageContext::new(pool.handle(), Arc::new(log.clone()))
    }

    fn spec(name: &str, cost_ms: u64) -> StageSpec {
        StageSpec::new(name, name, Duration::from_millis(cost_ms))
    }

    #[tokio::test]
    async fn wait_returns_value_resolved_later() {
        let (resolver, handle) = StageHandle::<String>::pending("x");
        let reader = handle.clone();
        let waiter = tokio::spawn(async move { reader.wait().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!handle.is_resolved());
        resolver.resolve(Ok("done".into())).unwrap();

        assert_eq!(waiter.await.unwrap(), Ok("done".to_string()));
        assert_eq!(handle.wait().await, Ok("done".to_string()));
    }

    #[test]
    fn second_resolution_is_a_contract_violation() {
        let (resolver, handle) = StageHandle::<u32>::pending("x");
        resolver.resolve(Ok(1)).unwrap();

        let err = handle.shared.complete(Ok(2)).unwrap_err();
        assert_eq!(err, StageError::AlreadyResolved { stage: "x".into() });
        assert_eq!(handle.try_get(), Some(Ok(1)));
    }

    #[test]
    fn dropped_resolver_records_interruption() {
        let (resolver, handle) = StageHandle::<u32>::pending("x");
        drop(resolver);
        assert_eq!(
            handle.try_get(),
            Some(Err(StageError::Interrupted { stage: "x".into() }))
        );
    }

    #[test]
    fn continuation_registered_after_resolution_runs_immediately() {
        let (resolver, handle) = StageHandle::<u32>::pending("x");
        resolver.resolve(Ok(7)).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        handle.on_resolve(move |o| *sink.lock().unwrap() = Some(o.clone()));
        assert_eq!(*seen.lock().unwrap(), Some(Ok(7)));
    }

    #[test]
    fn chained_stage_is_not_submitted_before_source_resolves() {
        let pool = WorkerPool::new(2).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let (resolver, source) = StageHandle::<String>::pending("source");
        let chained = source.and_then(&ctx, spec("rise", 1), |t| Ok(format!("risen {t}")));

        std::thread::sleep(Duration::from_millis(20));
        assert!(log.is_empty());
        assert!(!chained.is_resolved());

        resolver.resolve(Ok("dough".into())).unwrap();
        let out = pool.handle().block_on(chained.wait());
        assert_eq!(out, Ok("risen dough".to_string()));
        assert_eq!(log.position(TracePhase::Started, "rise"), Some(0));

        pool.shutdown();
    }

    #[test]
    fn combine_waits_for_both_inputs_in_either_order() {
        let pool = WorkerPool::new(2).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let slow = submit_task(&ctx, spec("slow", 40), "a".to_string(), Ok);
        let fast = submit_task(&ctx, spec("fast", 1), "b".to_string(), Ok);
        let joined = slow.combine(&ctx, &fast, "join", |a, b| Ok(format!("{b} on {a}")));
        let flipped = fast.combine(&ctx, &slow, "flip", |b, a| Ok(format!("{b} on {a}")));

        let handle = pool.handle();
        assert_eq!(handle.block_on(joined.wait()), Ok("b on a".to_string()));
        assert_eq!(handle.block_on(flipped.wait()), Ok("b on a".to_string()));

        pool.shutdown();
    }

    #[test]
    fn transform_fault_reaches_every_downstream_consumer() {
        let pool = WorkerPool::new(2).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let bad = submit_task(&ctx, spec("bad", 1), 1u32, |_| -> anyhow::Result<u32> {
            Err(anyhow!("burnt"))
        });
        let next = bad.and_then(&ctx, spec("next", 1), |n| Ok(n + 1));
        let good = submit_task(&ctx, spec("good", 1), 2u32, Ok);
        let joined = good.combine(&ctx, &next, "join", |a, b| Ok(a + b));

        let expected = StageError::Transform {
            stage: "bad".into(),
            reason: "burnt".into(),
        };
        assert_eq!(pool.handle().block_on(joined.wait()), Err(expected));
        assert_eq!(log.position(TracePhase::Started, "next"), None);

        pool.shutdown();
    }

    #[test]
    fn left_fault_still_waits_for_the_right_input() {
        let pool = WorkerPool::new(2).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let bad = submit_task(&ctx, spec("bad", 1), 1u32, |_| -> anyhow::Result<u32> {
            Err(anyhow!("burnt"))
        });
        let slow = submit_task(&ctx, spec("slow", 40), 2u32, Ok);
        let joined = bad.combine(&ctx, &slow, "join", |a, b| Ok(a + b));

        let out = pool.handle().block_on(joined.wait());
        assert_eq!(
            out,
            Err(StageError::Transform {
                stage: "bad".into(),
                reason: "burnt".into()
            })
        );
        assert!(slow.is_resolved());
        assert!(log.position(TracePhase::Finished, "slow").is_some());

        pool.shutdown();
    }

    #[test]
    fn left_fault_wins_when_both_inputs_fault() {
        let pool = WorkerPool::new(2).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let left = submit_task(&ctx, spec("left", 30), 1u32, |_| -> anyhow::Result<u32> {
            Err(anyhow!("late"))
        });
        let right = submit_task(&ctx, spec("right", 1), 2u32, |_| -> anyhow::Result<u32> {
            Err(anyhow!("early"))
        });
        let joined = left.combine(&ctx, &right, "join", |a, b| Ok(a + b));

        let err = pool.handle().block_on(joined.wait()).unwrap_err();
        assert_eq!(err.stage(), Some("left"));

        pool.shutdown();
    }

    #[test]
    fn panicking_transform_surfaces_as_interruption() {
        let pool = WorkerPool::new(1).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);

        let handle = submit_task(&ctx, spec("panicky", 0), 1u32, |_| -> anyhow::Result<u32> {
            panic!("oven on fire")
        });

        assert_eq!(
            pool.handle().block_on(handle.wait()),
            Err(StageError::Interrupted {
                stage: "panicky".into()
            })
        );
        pool.shutdown();
    }

    #[test]
    fn stage_submitted_after_shutdown_is_interrupted() {
        let pool = WorkerPool::new(1).unwrap();
        let log = TraceLog::new();
        let ctx = ctx(&pool, &log);
        pool.shutdown();

        let handle = submit_task(&ctx, spec("late", 0), 1u32, Ok);
        assert_eq!(
            handle.try_get(),
            Some(Err(StageError::Interrupted { stage: "late".into() }))
        );
    }
}
