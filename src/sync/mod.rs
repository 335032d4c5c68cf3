// src/sync/mod.rs

//! Synchronization primitives the orchestrators are built from.
//!
//! - [`handle`]: one-shot result handles with `and_then` / `combine`.
//! - [`gate`]: counting completion gates and the write-once slots they guard.

pub mod gate;
pub mod handle;

pub use gate::{CompletionGate, GatedSlot, Publisher, StageState};
pub use handle::{Outcome, Resolver, StageHandle, submit_task};
