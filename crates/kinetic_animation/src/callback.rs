//! Completion callbacks and cooperative cancellation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A callback that runs every time a sequence reaches it
pub type Callback = Box<dyn FnMut() + Send>;

/// A completion callback that can fire at most once.
///
/// The closure is consumed on the first [`Completion::fire`]; later calls are
/// no-ops, so no exit path can invoke it twice.
#[derive(Default)]
pub struct Completion(Option<Box<dyn FnOnce() + Send>>);

impl Completion {
    /// A completion with nothing to run
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Run the callback if it has not run yet. Returns whether it ran.
    pub fn fire(&mut self) -> bool {
        match self.0.take() {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// Whether a callback is still waiting to fire
    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion")
            .field(&if self.is_pending() { "pending" } else { "empty" })
            .finish()
    }
}

impl<F: FnOnce() + Send + 'static> From<F> for Completion {
    fn from(f: F) -> Self {
        Completion::new(f)
    }
}

/// Shared cancellation flag checked at every suspension point
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Whether both tokens share the same flag
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
