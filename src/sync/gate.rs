// src/sync/gate.rs

//! Completion gates and the write-once slots they guard.
//!
//! A [`CompletionGate`] is created with a fixed count `N`; every producer
//! signals it exactly once and waiters are released when the count reaches
//! zero. A [`GatedSlot`] is a branch-owned output cell tied to a gate: its
//! producer writes it once through a [`Publisher`] and then signals, and
//! readers can only get at the value through [`GatedSlot::read`], which waits
//! on the gate first.
//!
//! Visibility follows the usual release/acquire pairing: the slot write
//! happens before the producer's `AcqRel` decrement, and a reader that
//! observes the count at zero with `Acquire` sees every write published
//! before any of the signals.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use crate::errors::StageError;
use crate::sync::handle::Outcome;

/// Counting barrier released once `required` signals have arrived.
pub struct CompletionGate {
    name: String,
    required: usize,
    remaining: AtomicUsize,
    notify: Notify,
}

impl CompletionGate {
    pub fn new(name: impl Into<String>, required: usize) -> Self {
        Self {
            name: name.into(),
            required,
            remaining: AtomicUsize::new(required),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    /// Count one producer as done.
    ///
    /// Each producer must signal exactly once; a signal arriving after the
    /// count already reached zero is rejected with
    /// [`StageError::GateOverSignaled`] and leaves the gate unchanged.
    pub fn signal(&self) -> Result<(), StageError> {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                debug!(gate = %self.name, "gate released");
                self.notify.notify_waiters();
                Ok(())
            }
            Ok(previous) => {
                trace!(gate = %self.name, remaining = previous - 1, "gate signaled");
                Ok(())
            }
            Err(_) => {
                error!(gate = %self.name, "gate signaled after release");
                Err(StageError::GateOverSignaled {
                    gate: self.name.clone(),
                })
            }
        }
    }

    /// Wait until every producer has signaled. Any number of waiters may
    /// wait on the same gate.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CompletionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionGate")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Lifecycle of a gated stage. `Published` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Submitted, waiting on its prerequisite gate.
    Pending,
    /// Prerequisite satisfied, doing its timed work.
    Running,
    /// Output (or fault) written and gate signaled.
    Published,
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const PUBLISHED: u8 = 2;

/// Write-once output cell of one stage, readable only after its gate opens.
pub struct GatedSlot<T> {
    stage: String,
    gate: Arc<CompletionGate>,
    state: AtomicU8,
    value: OnceLock<Outcome<T>>,
}

impl<T: Clone> GatedSlot<T> {
    pub fn new(stage: impl Into<String>, gate: Arc<CompletionGate>) -> Arc<Self> {
        Arc::new(Self {
            stage: stage.into(),
            gate,
            state: AtomicU8::new(PENDING),
            value: OnceLock::new(),
        })
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn gate(&self) -> &Arc<CompletionGate> {
        &self.gate
    }

    pub fn state(&self) -> StageState {
        match self.state.load(Ordering::Acquire) {
            PENDING => StageState::Pending,
            RUNNING => StageState::Running,
            _ => StageState::Published,
        }
    }

    /// Write side for this slot's producer.
    pub fn publisher(self: &Arc<Self>) -> Publisher<T> {
        Publisher {
            slot: Some(Arc::clone(self)),
        }
    }

    /// Wait for the gate, then return the published outcome.
    pub async fn read(&self) -> Outcome<T> {
        self.gate.wait().await;
        self.published()
    }

    /// The outcome if the gate is already open.
    pub fn try_read(&self) -> Option<Outcome<T>> {
        self.gate.is_released().then(|| self.published())
    }

    fn published(&self) -> Outcome<T> {
        match self.value.get() {
            Some(outcome) => outcome.clone(),
            // Gate opened without this slot being written: some other
            // producer over-signaled.
            None => Err(StageError::Interrupted {
                stage: self.stage.clone(),
            }),
        }
    }

    fn begin(&self) -> Result<(), StageError> {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                error!(stage = %self.stage, "stage tried to run twice");
                StageError::StageReentered {
                    stage: self.stage.clone(),
                }
            })
    }

    fn publish(&self, outcome: Outcome<T>) -> Result<(), StageError> {
        self.value.set(outcome).map_err(|_| StageError::AlreadyResolved {
            stage: self.stage.clone(),
        })?;
        self.state.store(PUBLISHED, Ordering::Release);
        self.gate.signal()
    }
}

impl<T> fmt::Debug for GatedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedSlot")
            .field("stage", &self.stage)
            .field("gate", &self.gate.name())
            .finish_non_exhaustive()
    }
}

/// Producer side of a [`GatedSlot`].
///
/// Publishing consumes the publisher. If it is dropped unpublished (the
/// stage panicked or its job never ran) it publishes
/// [`StageError::Interrupted`] and still signals, so the gate always opens.
pub struct Publisher<T: Clone> {
    slot: Option<Arc<GatedSlot<T>>>,
}

impl<T: Clone> Publisher<T> {
    /// Move the stage from `Pending` to `Running`.
    pub fn begin(&self) -> Result<(), StageError> {
        match &self.slot {
            Some(slot) => slot.begin(),
            None => Ok(()),
        }
    }

    /// Write the stage's outcome and signal the gate.
    pub fn publish(mut self, outcome: Outcome<T>) -> Result<(), StageError> {
        match self.slot.take() {
            Some(slot) => slot.publish(outcome),
            None => Ok(()),
        }
    }
}

impl<T: Clone> Drop for Publisher<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            warn!(stage = %slot.stage, "stage dropped before publishing; recording interruption");
            let stage = slot.stage.clone();
            if let Err(err) = slot.publish(Err(StageError::Interrupted { stage })) {
                error!(error = %err, "failed to publish interruption");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn three_count_gate_holds_until_third_signal() {
        let gate = Arc::new(CompletionGate::new("layers", 3));
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait().await })
        };

        gate.signal().unwrap();
        gate.signal().unwrap();
        assert_eq!(gate.remaining(), 1);
        assert!(timeout(SHORT, gate.wait()).await.is_err());
        assert!(!waiter.is_finished());

        gate.signal().unwrap();
        timeout(SHORT, waiter).await.unwrap().unwrap();
        assert!(gate.is_released());
    }

    #[tokio::test]
    async fn extra_signal_is_rejected() {
        let gate = CompletionGate::new("dough-combined", 1);
        gate.signal().unwrap();

        assert_eq!(
            gate.signal(),
            Err(StageError::GateOverSignaled {
                gate: "dough-combined".into()
            })
        );
        assert_eq!(gate.remaining(), 0);
    }

    #[tokio::test]
    async fn every_waiter_is_released() {
        let gate = Arc::new(CompletionGate::new("g", 1));
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        gate.signal().unwrap();

        for w in waiters {
            timeout(SHORT, w).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn slot_is_read_only_after_publish_and_signal() {
        let gate = Arc::new(CompletionGate::new("risen", 1));
        let slot = GatedSlot::<String>::new("dough.rise", Arc::clone(&gate));
        let publisher = slot.publisher();

        assert_eq!(slot.state(), StageState::Pending);
        assert_eq!(slot.try_read(), None);
        assert!(timeout(SHORT, slot.read()).await.is_err());

        publisher.begin().unwrap();
        assert_eq!(slot.state(), StageState::Running);
        publisher.publish(Ok("risen dough".into())).unwrap();

        assert_eq!(slot.state(), StageState::Published);
        assert_eq!(slot.read().await, Ok("risen dough".to_string()));
        assert_eq!(slot.try_read(), Some(Ok("risen dough".to_string())));
    }

    #[tokio::test]
    async fn running_twice_is_rejected() {
        let slot = GatedSlot::<u32>::new("s", Arc::new(CompletionGate::new("g", 1)));
        let publisher = slot.publisher();

        publisher.begin().unwrap();
        assert_eq!(
            publisher.begin(),
            Err(StageError::StageReentered { stage: "s".into() })
        );
        publisher.publish(Ok(1)).unwrap();
    }

    #[tokio::test]
    async fn dropped_publisher_still_opens_the_gate() {
        let gate = Arc::new(CompletionGate::new("layers", 2));
        let crust = GatedSlot::<String>::new("dough.roll", Arc::clone(&gate));
        let sauce = GatedSlot::<String>::new("sauce.combine", Arc::clone(&gate));

        sauce.publisher().publish(Ok("sauce".into())).unwrap();
        drop(crust.publisher());

        assert_eq!(
            timeout(SHORT, crust.read()).await.unwrap(),
            Err(StageError::Interrupted {
                stage: "dough.roll".into()
            })
        );
        assert_eq!(sauce.read().await, Ok("sauce".to_string()));
    }

    #[tokio::test]
    async fn second_publish_does_not_signal_again() {
        let gate = Arc::new(CompletionGate::new("layers", 2));
        let slot = GatedSlot::<u32>::new("s", Arc::clone(&gate));

        slot.publisher().publish(Ok(1)).unwrap();
        assert_eq!(
            slot.publisher().publish(Ok(2)),
            Err(StageError::AlreadyResolved { stage: "s".into() })
        );
        assert_eq!(gate.remaining(), 1);
    }
}
