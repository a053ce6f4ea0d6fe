//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as one of its subscribers.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When an effect runs, its subscriber is pushed onto the stack; when the
//! run completes (or unwinds), it is popped again.
//!
//! Nesting is supported: an effect created while another effect runs pushes
//! its own entry, so each one records only the reads made in its own scope.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::runtime::Runtime;
use super::SubscriberId;

/// Signal IDs read during one run of a computation.
///
/// Most effects read a handful of signals, so these stay inline.
pub type Dependencies = SmallVec<[u64; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The subscriber ID of the running computation, or `None` for an
    /// untracked scope.
    subscriber_id: Option<SubscriberId>,
    /// Signals read so far during this run, without duplicates.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any signal that is read registers the
    /// subscriber as a dependent. The context exits when the guard drops.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a scope in which signal reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Dependencies::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Run `f` as `subscriber_id`, returning its result together with the
    /// signals it read.
    pub fn track<R>(subscriber_id: SubscriberId, f: impl FnOnce() -> R) -> (R, Dependencies) {
        let ctx = Self::enter(subscriber_id);
        let value = f();
        let dependencies = Self::get_dependencies();
        drop(ctx);
        (value, dependencies)
    }

    /// Check if a tracking computation is currently running.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber_id)
        })
    }

    /// Record a dependency on the given signal.
    ///
    /// Called by signals when they are read. Reading the same signal twice
    /// in one run subscribes once.
    pub fn track_dependency(signal_id: u64) {
        let subscriber = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let subscriber = entry.subscriber_id?;
            if entry.dependencies.contains(&signal_id) {
                return None;
            }
            entry.dependencies.push(signal_id);
            Some(subscriber)
        });

        if let Some(subscriber) = subscriber {
            Runtime::subscribe(signal_id, subscriber);
        }
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without tracking any signal it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
