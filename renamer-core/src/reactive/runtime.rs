//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! effects. It owns the subscriber sets and the pending-effect queue.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime.
//!
//! 2. When an effect reads a signal, the runtime records the subscription.
//!
//! 3. When a signal's value changes, the runtime queues every subscriber of
//!    that signal. The queue is an insertion-ordered set, so an effect
//!    queued twice before the next flush runs once.
//!
//! 4. `flush` drains the queue. Effects queued by effects that run during
//!    the flush join the same queue and run before `flush` returns.
//!
//! # Turns
//!
//! Writes never run effects synchronously. The host decides where a turn
//! ends: either by wrapping an event handler in [`batch`] or by calling
//! [`flush`] from its event loop.
//!
//! # Threading
//!
//! All runtime state is thread-local. Signals, effects and computeds must be
//! read, written and flushed on the thread that created them.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;

use super::subscriber::SubscriberId;

/// A computation the runtime can schedule and run.
pub trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Run the computation now, re-establishing its subscriptions.
    fn run(&self);
}

/// Handle to a registered reactive computation.
///
/// Dropping this handle unregisters the computation from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The subscriber this handle keeps registered.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

impl std::fmt::Debug for ReactiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveHandle")
            .field("subscriber_id", &self.subscriber_id)
            .finish()
    }
}

/// FIFO of effects waiting for a flush. Each id is queued at most once.
#[derive(Default)]
struct PendingQueue {
    order: VecDeque<SubscriberId>,
    queued: HashSet<SubscriberId>,
}

impl PendingQueue {
    /// Returns false if `id` was already waiting.
    fn push(&mut self, id: SubscriberId) -> bool {
        if !self.queued.insert(id) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    fn pop(&mut self) -> Option<SubscriberId> {
        // Ids removed while waiting are left in `order` and skipped here.
        while let Some(id) = self.order.pop_front() {
            if self.queued.remove(&id) {
                return Some(id);
            }
        }
        None
    }

    fn remove(&mut self, id: &SubscriberId) {
        self.queued.remove(id);
    }

    fn len(&self) -> usize {
        self.queued.len()
    }
}

#[derive(Default)]
struct RuntimeState {
    /// Registered computations. Weak so the runtime never keeps one alive.
    registry: HashMap<SubscriberId, Weak<dyn Reactive>>,
    /// Subscriber set of every signal that has been read in a tracked scope.
    subscribers: HashMap<u64, IndexSet<SubscriberId>>,
    /// Effects waiting for the next flush, in scheduling order.
    pending: PendingQueue,
}

thread_local! {
    static STATE: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// The reactive runtime of the current thread.
pub struct Runtime;

impl Runtime {
    /// Register a reactive computation with the runtime.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(reactive: &Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();

        STATE.with(|state| {
            state
                .borrow_mut()
                .registry
                .insert(id, Arc::downgrade(reactive));
        });

        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a computation and drop every subscription it holds.
    fn unregister(id: SubscriberId) {
        let _ = STATE.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.registry.remove(&id);
                state.pending.remove(&id);
                for subs in state.subscribers.values_mut() {
                    subs.shift_remove(&id);
                }
            }
        });
    }

    /// Record that `subscriber` depends on the signal `signal_id`.
    ///
    /// Called automatically when a signal is read within a reactive context.
    pub fn subscribe(signal_id: u64, subscriber: SubscriberId) {
        STATE.with(|state| {
            state
                .borrow_mut()
                .subscribers
                .entry(signal_id)
                .or_default()
                .insert(subscriber);
        });
    }

    /// Remove `subscriber` from the subscriber sets of the given signals.
    ///
    /// Called before re-running a computation so reads that no longer
    /// happen stop triggering it.
    pub fn unsubscribe(subscriber: SubscriberId, signal_ids: &[u64]) {
        let _ = STATE.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                for signal_id in signal_ids {
                    if let Some(subs) = state.subscribers.get_mut(signal_id) {
                        subs.shift_remove(&subscriber);
                        if subs.is_empty() {
                            state.subscribers.remove(signal_id);
                        }
                    }
                }
            }
        });
    }

    /// Drop the subscriber set of a signal that no longer exists.
    pub fn forget_signal(signal_id: u64) {
        let _ = STATE.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.subscribers.remove(&signal_id);
            }
        });
    }

    /// Number of computations currently subscribed to a signal.
    pub fn subscriber_count(signal_id: u64) -> usize {
        STATE.with(|state| {
            state
                .borrow()
                .subscribers
                .get(&signal_id)
                .map_or(0, IndexSet::len)
        })
    }

    /// Queue every subscriber of a signal whose value changed.
    pub fn notify_signal_change(signal_id: u64) {
        STATE.with(|state| {
            let mut state = state.borrow_mut();
            let RuntimeState {
                subscribers,
                pending,
                ..
            } = &mut *state;

            if let Some(subs) = subscribers.get(&signal_id) {
                for id in subs {
                    if pending.push(*id) {
                        tracing::trace!(signal = signal_id, subscriber = %id, "scheduled effect");
                    }
                }
            }
        });
    }

    /// Queue a single computation for the next flush.
    pub fn schedule(id: SubscriberId) {
        STATE.with(|state| {
            state.borrow_mut().pending.push(id);
        });
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_count() -> usize {
        STATE.with(|state| state.borrow().pending.len())
    }

    /// Whether a flush is running on this thread.
    pub fn is_flushing() -> bool {
        FLUSHING.with(Cell::get)
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH_DEPTH.with(Cell::get) > 0
    }

    /// Run every pending effect, including effects scheduled while
    /// flushing, until the queue is empty.
    ///
    /// Returns the number of effect runs. Calling `flush` from inside a
    /// running flush returns 0 immediately; the outer flush drains the work.
    ///
    /// A panic inside an effect propagates to the caller. Effects that were
    /// still queued stay queued for the next flush.
    pub fn flush() -> usize {
        if Self::is_flushing() {
            return 0;
        }

        let _guard = FlushGuard::enter();
        let mut runs = 0;

        while let Some(reactive) = Self::next_pending() {
            tracing::trace!(subscriber = %reactive.subscriber_id(), "running effect");
            reactive.run();
            runs += 1;
        }

        if runs > 0 {
            tracing::debug!(runs, "flushed effects");
        }

        runs
    }

    /// Run `f` as one turn: effects scheduled by its writes run once, when
    /// the outermost batch exits.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let value = {
            let _guard = BatchGuard::enter();
            f()
        };

        if !Self::is_batching() {
            Self::flush();
        }

        value
    }

    /// Pop the next live computation off the queue.
    ///
    /// The state borrow is released before the computation runs.
    fn next_pending() -> Option<Arc<dyn Reactive>> {
        STATE.with(|state| {
            let mut state = state.borrow_mut();
            while let Some(id) = state.pending.pop() {
                if let Some(reactive) = state.registry.get(&id).and_then(Weak::upgrade) {
                    return Some(reactive);
                }
            }
            None
        })
    }
}

/// Run every pending effect. See [`Runtime::flush`].
pub fn flush() -> usize {
    Runtime::flush()
}

/// Run `f` as one batched turn. See [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

struct FlushGuard;

impl FlushGuard {
    fn enter() -> Self {
        FLUSHING.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = FLUSHING.try_with(|flag| flag.set(false));
    }
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = BATCH_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct MockReactive {
        id: SubscriberId,
        runs: AtomicI32,
    }

    impl MockReactive {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                runs: AtomicI32::new(0),
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn register(mock: &Arc<MockReactive>) -> ReactiveHandle {
        let reactive: Arc<dyn Reactive> = mock.clone();
        Runtime::register(&reactive)
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new();
        let id = reactive.id;

        let handle = register(&reactive);
        assert!(STATE.with(|s| s.borrow().registry.contains_key(&id)));

        drop(handle);
        assert!(!STATE.with(|s| s.borrow().registry.contains_key(&id)));
    }

    #[test]
    fn notify_queues_subscribers_until_flush() {
        let effect = MockReactive::new();
        let _handle = register(&effect);

        Runtime::subscribe(42_000, effect.id);
        Runtime::notify_signal_change(42_000);

        assert_eq!(effect.runs.load(Ordering::SeqCst), 0);
        assert_eq!(Runtime::pending_count(), 1);

        assert_eq!(Runtime::flush(), 1);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
        assert_eq!(Runtime::pending_count(), 0);
    }

    #[test]
    fn queue_deduplicates() {
        let effect = MockReactive::new();
        let _handle = register(&effect);

        Runtime::subscribe(100_001, effect.id);
        Runtime::subscribe(100_002, effect.id);
        Runtime::notify_signal_change(100_001);
        Runtime::notify_signal_change(100_002);
        Runtime::notify_signal_change(100_001);

        assert_eq!(Runtime::flush(), 1);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_subscription() {
        let reactive = MockReactive::new();
        let _handle = register(&reactive);

        Runtime::subscribe(100, reactive.id);
        assert_eq!(Runtime::subscriber_count(100), 1);

        Runtime::unsubscribe(reactive.id, &[100]);
        assert_eq!(Runtime::subscriber_count(100), 0);
    }

    #[test]
    fn dropped_effects_are_skipped() {
        let reactive = MockReactive::new();
        let handle = register(&reactive);

        Runtime::schedule(reactive.id);
        drop(handle);

        assert_eq!(Runtime::pending_count(), 0);
        assert_eq!(Runtime::flush(), 0);
    }

    #[test]
    fn batch_flushes_on_outermost_exit() {
        let effect = MockReactive::new();
        let _handle = register(&effect);

        Runtime::batch(|| {
            Runtime::batch(|| Runtime::schedule(effect.id));
            assert_eq!(effect.runs.load(Ordering::SeqCst), 0);
            assert!(Runtime::is_batching());
        });

        assert!(!Runtime::is_batching());
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_keeps_scheduling_order() {
        let mut queue = PendingQueue::default();
        let ids: Vec<_> = (0..1_000).map(|_| SubscriberId::new()).collect();

        for id in &ids {
            assert!(queue.push(*id));
        }
        for id in ids.iter().rev() {
            assert!(!queue.push(*id));
        }
        queue.remove(&ids[1]);
        assert_eq!(queue.len(), 999);

        let mut drained = Vec::new();
        while let Some(id) = queue.pop() {
            drained.push(id);
        }
        let expected: Vec<_> = ids.iter().copied().filter(|id| *id != ids[1]).collect();
        assert_eq!(drained, expected);
        assert_eq!(queue.len(), 0);

        // A popped id can be queued again.
        assert!(queue.push(ids[0]));
        assert_eq!(queue.pop(), Some(ids[0]));
    }

    #[test]
    fn many_effects_run_once_each() {
        let effects: Vec<_> = (0..500).map(|_| MockReactive::new()).collect();
        let _handles: Vec<_> = effects.iter().map(register).collect();

        for effect in &effects {
            Runtime::subscribe(200_000, effect.id);
        }
        Runtime::notify_signal_change(200_000);
        for effect in effects.iter().rev() {
            Runtime::schedule(effect.id);
        }
        assert_eq!(Runtime::pending_count(), 500);

        assert_eq!(Runtime::flush(), 500);
        assert!(effects
            .iter()
            .all(|effect| effect.runs.load(Ordering::SeqCst) == 1));
        assert_eq!(Runtime::pending_count(), 0);
    }
}
