//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately and
//!    synchronously to establish its initial subscriptions.
//!
//! 2. When any signal it read changes, the effect is queued with the
//!    runtime and re-runs at the next flush.
//!
//! 3. Before re-running, the effect drops its old subscriptions; the reads
//!    made during the new run subscribe it again. An effect that stops
//!    reading a signal (say, after a branch flips) stops hearing about it.
//!
//! # Cycles
//!
//! An effect must not write a signal it reads in the same run. The runtime
//! has no cycle detection; such an effect re-queues itself forever.
//!
//! # Lifetime
//!
//! An effect stays registered while any clone of it is alive. Dropping the
//! last clone unregisters it; [`Effect::dispose`] stops it early.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{Dependencies, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;

type EffectFn = dyn Fn() + Send + Sync;

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    /// The effect function.
    run: Box<EffectFn>,

    /// Signals read during the last run.
    dependencies: Mutex<Dependencies>,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,

    /// Keeps the effect registered with the runtime while alive.
    handle: Mutex<Option<ReactiveHandle>>,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let previous = std::mem::take(&mut *self.dependencies.lock());
        Runtime::unsubscribe(self.subscriber_id, &previous);

        let ((), dependencies) = ReactiveContext::track(self.subscriber_id, || (self.run)());

        *self.dependencies.lock() = dependencies;
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn run(&self) {
        self.execute();
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        let dependencies = std::mem::take(self.dependencies.get_mut());
        Runtime::unsubscribe(self.subscriber_id, &dependencies);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let reader = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", reader.get());
/// });
///
/// count.set(5);
/// flush(); // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It subscribes to nothing until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_parts(SubscriberId::new(), Dependencies::new(), run)
    }

    /// Build an effect whose first run already happened under
    /// `subscriber_id` and read `dependencies`.
    pub(crate) fn from_parts<F>(
        subscriber_id: SubscriberId,
        dependencies: Dependencies,
        run: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id,
            run: Box::new(run),
            dependencies: Mutex::new(dependencies),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            handle: Mutex::new(None),
        });

        let reactive: Arc<dyn Reactive> = inner.clone();
        *inner.handle.lock() = Some(Runtime::register(&reactive));

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function now.
    ///
    /// This runs the function within a reactive context to track
    /// dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Queue the effect for the next flush.
    pub fn schedule(&self) {
        if !self.is_disposed() {
            Runtime::schedule(self.inner.subscriber_id);
        }
    }

    /// Dispose of the effect.
    ///
    /// After disposal the effect never runs again and holds no
    /// subscriptions.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dependencies = std::mem::take(&mut *self.inner.dependencies.lock());
        Runtime::unsubscribe(self.inner.subscriber_id, &dependencies);
        self.inner.handle.lock().take();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. See [`Effect::new`].
pub fn create_effect<F>(run: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
