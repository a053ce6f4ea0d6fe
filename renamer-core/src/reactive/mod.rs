//! Reactive Primitives
//!
//! This module implements the reactive engine that keeps the rename preview
//! live: signals, effects and computed values.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a subscriber.
//! When a write changes the value, every subscriber is queued.
//!
//! ## Effects
//!
//! An Effect is a computation that runs once on creation and then again
//! whenever a signal it read has changed. Effects synchronize reactive state
//! with the outside world, such as preview cells and status badges.
//!
//! ## Computeds
//!
//! A Computed is a signal whose value is kept current by an internal effect.
//!
//! ## Flushing
//!
//! Queued effects run at the next flush, once each, no matter how many of
//! their dependencies changed. A flush keeps draining until nothing is
//! queued, so effects woken by other effects run in the same flush.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local context stack to detect dependencies and a
//! thread-local runtime to hold subscriber sets and the pending queue. The
//! whole engine is single-threaded by construction.

mod computed;
mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use computed::{computed, Computed};
pub use context::{untracked, Dependencies, ReactiveContext};
pub use effect::{create_effect, Effect};
pub use runtime::{batch, flush, Reactive, ReactiveHandle, Runtime};
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
pub use subscriber::SubscriberId;
