//! Computed Implementation
//!
//! A Computed is a derived, read-only value kept current by an internal
//! effect.
//!
//! # How Computeds Work
//!
//! 1. On creation, the computation runs once, synchronously, under the
//!    subscriber ID of the backing effect. Its result seeds a signal.
//!
//! 2. When a dependency changes, the backing effect re-runs at the next
//!    flush and writes the new result into the signal.
//!
//! 3. The write goes through the signal's equality gate, so readers of the
//!    computed only re-run when the derived value actually changed.
//!
//! Unlike a lazy memo, a computed is always up to date after a flush and
//! always has a value.

use std::fmt::Debug;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::signal::Signal;
use super::subscriber::SubscriberId;

/// A derived value recomputed whenever its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
/// let reader = count.clone();
/// let doubled = Computed::new(move || reader.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// flush();
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    value: Signal<T>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a computed value. The computation runs immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let (initial, dependencies) = ReactiveContext::track(subscriber_id, &compute);

        let value = Signal::new(initial);
        let target = value.clone();
        let effect = Effect::from_parts(subscriber_id, dependencies, move || {
            target.set(compute());
        });

        Self { value, effect }
    }

    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Get the current value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.value.get_untracked()
    }

    /// Borrow the current value for the duration of `f`, with tracking.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.value.with(f)
    }

    /// Number of times the computation re-ran after creation.
    pub fn recompute_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.value.get_untracked())
            .field("recompute_count", &self.recompute_count())
            .finish()
    }
}

/// Create a computed value. See [`Computed::new`].
pub fn computed<T, F>(compute: F) -> Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
