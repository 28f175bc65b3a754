//! Cancellation scopes.
//!
//! A [`Context`] is a single-fire broadcast signal. Every blocking operation in
//! the runtime takes one and selects on [`Context::done`], so ending a context
//! wakes up everything waiting under it. Contexts form a tree: ending a parent
//! ends all of its children, ending a child leaves the parent alone.

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;

use crate::ContextError;

/// Name of the threads enforcing [`Context::with_timeout`] deadlines.
const WATCHER_THREAD_NAME: &str = "context-deadline";

/// A cancellation scope shared between the thread that owns some work and the
/// threads performing it.
///
/// Cloning a `Context` yields another handle to the same scope.
///
/// # Examples
///
/// ```
/// use core_types::{Context, ContextError};
///
/// let parent = Context::new();
/// let child = parent.child();
///
/// parent.cancel();
/// assert_eq!(child.err(), Some(ContextError::Canceled));
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    /// Disconnects once the scope ends; never carries a message.
    done: Receiver<()>,
    /// Scope this one was derived from; used to detach once finished.
    parent: Option<Weak<Inner>>,
    state: Mutex<State>,
}

struct State {
    /// The only sender of `done`. Dropping it is the broadcast.
    trigger: Option<Sender<()>>,
    err: Option<ContextError>,
    /// Held strongly so cancellation reaches scopes whose handles were all
    /// dropped, including grandchildren of a dropped intermediate scope.
    children: Vec<Arc<Inner>>,
}

impl Context {
    /// Creates a new root scope that stays live until cancelled.
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Weak<Inner>>) -> Self {
        let (trigger, done) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                done,
                parent,
                state: Mutex::new(State {
                    trigger: Some(trigger),
                    err: None,
                    children: Vec::new(),
                }),
            }),
        }
    }

    /// Derives a scope that ends together with `self`.
    ///
    /// If `self` has already ended the child is returned already ended, with
    /// the same error.
    pub fn child(&self) -> Self {
        let child = Self::with_parent(Some(Arc::downgrade(&self.inner)));
        let inherited = {
            let mut state = self.inner.state.lock();
            match state.err {
                Some(err) => Some(err),
                None => {
                    state.children.push(Arc::clone(&child.inner));
                    None
                }
            }
        };
        if let Some(err) = inherited {
            child.inner.finish(err);
        }
        child
    }

    /// Derives a scope that ends with [`ContextError::DeadlineExceeded`] once
    /// `timeout` has elapsed, unless it ended earlier.
    ///
    /// If no watcher thread can be started the scope is returned already
    /// ended with `DeadlineExceeded`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        if child.is_done() {
            return child;
        }
        let deadline = channel::after(timeout);
        let watched = Arc::downgrade(&child.inner);
        let done = child.inner.done.clone();
        // The watcher only holds the scope weakly and exits as soon as it ends.
        let spawned = thread::Builder::new()
            .name(WATCHER_THREAD_NAME.to_string())
            .spawn(move || {
                select! {
                    recv(done) -> _ => {}
                    recv(deadline) -> _ => {
                        if let Some(inner) = watched.upgrade() {
                            inner.finish(ContextError::DeadlineExceeded);
                        }
                    }
                }
            });
        if spawned.is_err() {
            // without a watcher the deadline cannot be enforced later
            child.inner.finish(ContextError::DeadlineExceeded);
        }
        child
    }

    /// Ends the scope with [`ContextError::Canceled`].
    ///
    /// Cancelling an ended scope does nothing; the first error recorded wins.
    pub fn cancel(&self) {
        self.inner.finish(ContextError::Canceled);
    }

    /// Returns why the scope ended, or `None` while it is live.
    pub fn err(&self) -> Option<ContextError> {
        self.inner.state.lock().err
    }

    /// Returns true once the scope has ended.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// A receiver that becomes ready (disconnected) when the scope ends.
    ///
    /// Meant for `crossbeam::select!`; it never yields a value.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Blocks until the scope ends and returns the reason.
    pub fn wait(&self) -> ContextError {
        // recv only returns once the trigger is dropped
        let _ = self.inner.done.recv();
        self.err().unwrap_or(ContextError::Canceled)
    }

    /// Returns true if both handles refer to the same scope.
    pub fn same_scope(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Inner {
    fn finish(&self, err: ContextError) {
        let (trigger, children) = {
            let mut state = self.state.lock();
            if state.err.is_some() {
                return;
            }
            state.err = Some(err);
            (state.trigger.take(), std::mem::take(&mut state.children))
        };
        // detach before waking waiters so they never observe a stale parent
        self.detach();
        drop(trigger);
        for child in &children {
            child.finish(err);
        }
    }

    /// Removes this finished scope from its parent's children.
    fn detach(&self) {
        let parent = match self.parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => parent,
            None => return,
        };
        let me: *const Inner = self;
        parent
            .state
            .lock()
            .children
            .retain(|c| !std::ptr::eq(Arc::as_ptr(c), me));
    }

    #[cfg(test)]
    fn child_count(&self) -> usize {
        self.state.lock().children.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("err", &self.err()).finish()
    }
}
