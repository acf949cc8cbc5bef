//! Cancellable task group with first-error propagation.
//!
//! A [`Bundle`] owns a [`CancellationToken`], a [`TaskTracker`] counting
//! in-flight tasks, and a single slot for the first error. Every task
//! receives a clone of the token and is expected to watch it at each
//! suspension point; cancellation is cooperative.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::TRACING_TARGET;

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Lifecycle of a [`Bundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    /// Constructed, no task registered yet.
    Idle,
    /// At least one task registered and not yet joined.
    Running,
    /// Joined; no further tasks may be added.
    Joined,
}

struct Inner<E> {
    tracker: TaskTracker,
    token: CancellationToken,
    state: Mutex<BundleState>,
    first_error: Mutex<Option<E>>,
    panic: Mutex<Option<PanicPayload>>,
}

impl<E: fmt::Display> Inner<E> {
    fn record_error(&self, err: E) {
        let mut slot = lock(&self.first_error);
        if slot.is_none() {
            tracing::debug!(
                target: TRACING_TARGET,
                error = %err,
                "Task failed, cancelling bundle"
            );
            *slot = Some(err);
        } else {
            tracing::trace!(
                target: TRACING_TARGET,
                error = %err,
                "Task failed after bundle was already failing"
            );
        }
        drop(slot);
        self.token.cancel();
    }

    fn record_panic(&self, payload: PanicPayload) {
        tracing::error!(target: TRACING_TARGET, "Task panicked, cancelling bundle");
        let mut slot = lock(&self.panic);
        if slot.is_none() {
            *slot = Some(payload);
        }
        drop(slot);
        self.token.cancel();
    }
}

/// A set of concurrent tasks sharing one cancellation token and one outcome.
///
/// `Bundle` is a cheap handle: clone it into a running task to let that task
/// register more work. [`join`](Self::join) waits for every task registered
/// before the last one finished, including those added after `join` began.
///
/// # Examples
///
/// ```rust,ignore
/// let bundle = Bundle::<Error>::new(&root);
/// let spawner = bundle.clone();
/// bundle.add(move |token| async move {
///     for chunk in work {
///         spawner.add(move |token| process(chunk, token));
///     }
///     Ok(())
/// });
/// bundle.join().await?;
/// ```
pub struct Bundle<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for Bundle<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for Bundle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("state", &*lock(&self.inner.state))
            .field("in_flight", &self.inner.tracker.len())
            .field("cancelled", &self.inner.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<E> Bundle<E>
where
    E: fmt::Display + Send + 'static,
{
    /// Creates an idle bundle whose token is a child of `parent`.
    ///
    /// Cancelling `parent` cancels every task in the bundle; failures inside
    /// the bundle never cancel `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        let inner = Inner {
            tracker: TaskTracker::new(),
            token: parent.child_token(),
            state: Mutex::new(BundleState::Idle),
            first_error: Mutex::new(None),
            panic: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the token shared by every task in the bundle.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Whether the bundle has been cancelled, by a failure or from outside.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BundleState {
        *lock(&self.inner.state)
    }

    /// Number of tasks that have not yet returned.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Schedules `task` to run concurrently with every other task.
    ///
    /// The closure is called immediately with the bundle's token and the
    /// returned future is spawned onto the current tokio runtime. An `Err`
    /// from the future cancels the bundle.
    ///
    /// # Panics
    ///
    /// Panics if the bundle has already been joined, or if called outside a
    /// tokio runtime.
    pub fn add<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        drop(self.assert_not_joined());
        let future = task(self.inner.token.clone());
        let inner = Arc::clone(&self.inner);

        // The closure may itself have registered tasks, so the lock is only
        // taken once it has returned.
        let mut state = self.assert_not_joined();
        *state = BundleState::Running;
        self.inner.tracker.spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => inner.record_error(err),
                Err(payload) => inner.record_panic(payload),
            }
        });
    }

    fn assert_not_joined(&self) -> MutexGuard<'_, BundleState> {
        let state = lock(&self.inner.state);
        assert!(
            *state != BundleState::Joined,
            "task added to a bundle that has already been joined"
        );
        state
    }

    /// Waits for every registered task and returns the first error, if any.
    ///
    /// The token is cancelled before this returns, whatever the outcome, so
    /// anything derived from it is released. If a task panicked, the panic is
    /// resumed here once all other tasks have finished.
    pub async fn join(self) -> Result<(), E> {
        self.inner.tracker.close();

        loop {
            self.inner.tracker.wait().await;

            // A handle held outside the bundle may race one last `add` in
            // between `wait` returning and the state flipping.
            let mut state = lock(&self.inner.state);
            if self.inner.tracker.is_empty() {
                *state = BundleState::Joined;
                break;
            }
        }

        self.inner.token.cancel();

        let payload = lock(&self.inner.panic).take();
        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }

        let first_error = lock(&self.inner.first_error).take();
        match first_error {
            Some(err) => Err(err),
            None => {
                tracing::trace!(target: TRACING_TARGET, "Bundle joined without errors");
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
