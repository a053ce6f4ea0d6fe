//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a write changes the value, every subscriber is queued with the
//!    runtime. Writing a value equal to the current one does nothing.
//!
//! 3. Queued subscribers re-run at the next flush.
//!
//! # Copy-on-write
//!
//! Collections held in signals are replaced, never mutated in place: build
//! the new value and `set` it (or use [`Signal::update`]). That is what
//! makes the equality gate meaningful.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::Runtime;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Shared storage behind every handle of one signal.
struct SignalCell<T> {
    id: u64,
    value: RwLock<T>,
}

impl<T> Drop for SignalCell<T> {
    fn drop(&mut self) {
        Runtime::forget_signal(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones are handles to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let value = count.get();
///
/// // Queues subscribers; they run at the next flush.
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: Arc<SignalCell<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(SignalCell {
                id: next_signal_id(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.cell.id
    }

    /// Get the current value.
    ///
    /// If called while an effect runs, this also subscribes that effect.
    pub fn get(&self) -> T {
        ReactiveContext::track_dependency(self.cell.id);
        self.cell.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.cell.value.read().clone()
    }

    /// Borrow the current value for the duration of `f`, with tracking.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track_dependency(self.cell.id);
        f(&self.cell.value.read())
    }

    /// Borrow the current value for the duration of `f`, without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.read())
    }

    /// Number of effects currently subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.cell.id)
    }

    /// Whether two handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Set a new value and queue subscribers.
    ///
    /// Returns `false` without notifying anyone if `value` equals the
    /// current value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.cell.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }

        Runtime::notify_signal_change(self.cell.id);
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.cell.value.read();
            f(&guard)
        };
        self.set(new_value)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.cell.id)
            .field("value", &*self.cell.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Read half of a signal created with [`create_signal`].
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.signal.id()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// Write half of a signal created with [`create_signal`].
pub struct WriteSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    signal: Signal<T>,
}

impl<T> WriteSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Set a new value. See [`Signal::set`].
    pub fn set(&self, value: T) -> bool {
        self.signal.set(value)
    }

    /// Update the value. See [`Signal::update`].
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.signal.update(f)
    }
}

impl<T> Clone for WriteSignal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// Create a signal and split it into a read half and a write half.
pub fn create_signal<T>(initial: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    let signal = Signal::new(initial);
    (
        ReadSignal {
            signal: signal.clone(),
        },
        WriteSignal { signal },
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
