//! Reentrant multi-subscriber observable.
//!
//! All mutation and notification for one instance run under a single reentrant
//! lock, so notifications are strictly serial across threads while a callback
//! may still call back into the same observable on its own thread. The registry
//! borrow is never held across a callback.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;

use super::observer::{Observer, ObserverBuilder};
use super::registry::{Registry, SubscriberId};
use super::subscription::Subscription;
use crate::runtime::catch_panic;
use crate::types::{AggregateError, BoxError, Error, Result};

type SharedObserver<T> = Arc<dyn Observer<T>>;
type RegistryCell<T> = RefCell<Registry<SharedObserver<T>>>;

struct Inner<T> {
    label: String,
    registry: ReentrantMutex<RegistryCell<T>>,
    unsubscribe_on_error: bool,
    disposed: AtomicBool,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn remove(&self, id: SubscriberId) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let guard = self.registry.lock();
        guard.borrow_mut().remove(id);
        tracing::debug!("observer_unsubscribed: observable={}, subscriber={}", self.label, id);
    }

    /// Visit every active observer once. Caller holds the lock and must call `exit`.
    fn pass<F>(&self, cell: &RegistryCell<T>, operation: &str, mut notify: F) -> AggregateError
    where
        F: FnMut(&dyn Observer<T>) -> std::result::Result<(), BoxError>,
    {
        cell.borrow_mut().enter();

        let mut failures = AggregateError::default();
        let mut index = 0;
        loop {
            let next = cell.borrow().get(index);
            let Some((id, observer)) = next else {
                break;
            };
            index += 1;

            match catch_panic(|| notify(observer.as_ref()), operation) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(id, err.to_string()),
                Err(panic_msg) => failures.push(id, format!("panicked: {}", panic_msg)),
            }
        }
        failures
    }

    fn report(&self, operation: &str, failures: AggregateError) -> Result<()> {
        if !failures.is_empty() {
            tracing::warn!(
                "observer_failures: observable={}, operation={}, count={}",
                self.label,
                operation,
                failures.len()
            );
        }
        failures.into_result()
    }

    fn disposed_error() -> Error {
        Error::Disposed("observable")
    }
}

/// Broadcasts values, a terminal error, or completion to its observers.
///
/// Clones share the same subscriber set.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T: 'static> Observable<T> {
    /// Observable that drops its observers after [`send_fault`](Self::send_fault).
    pub fn new() -> Self {
        Self::with_options("observable", true)
    }

    pub fn with_options(label: impl Into<String>, unsubscribe_on_error: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                registry: ReentrantMutex::new(RefCell::new(Registry::new())),
                unsubscribe_on_error,
                disposed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn unsubscribe_on_error(&self) -> bool {
        self.inner.unsubscribe_on_error
    }

    /// Register an observer.
    ///
    /// An observer added during a notification pass becomes active when the
    /// outermost pass ends and never sees the in-progress notification.
    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription>
    where
        O: Observer<T> + 'static,
    {
        self.subscribe_shared(Arc::new(observer))
    }

    pub fn subscribe_shared(&self, observer: Arc<dyn Observer<T>>) -> Result<Subscription> {
        let id = {
            let guard = self.inner.registry.lock();
            if self.is_disposed() {
                return Err(Inner::<T>::disposed_error());
            }
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            guard.borrow_mut().add(id, observer);
            id
        };
        tracing::debug!("observer_subscribed: observable={}, subscriber={}", self.inner.label, id);

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        }))
    }

    /// Subscribe a closure that receives values only.
    pub fn subscribe_fn<F>(&self, on_next: F) -> Result<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(
            ObserverBuilder::new()
                .on_next(move |value: &T| {
                    on_next(value);
                    Ok(())
                })
                .build(),
        )
    }

    /// Notify every active observer, in subscription order.
    pub fn send(&self, value: &T) -> Result<()> {
        let guard = self.inner.registry.lock();
        if self.is_disposed() {
            return Err(Inner::<T>::disposed_error());
        }
        let failures = self
            .inner
            .pass(&guard, "observer.on_next", |observer| observer.on_next(value));
        guard.borrow_mut().exit();
        drop(guard);
        self.inner.report("send", failures)
    }

    /// Notify every active observer of a terminal error.
    ///
    /// Observers are dropped after the pass when the observable unsubscribes on error.
    pub fn send_fault(&self, error: &Error) -> Result<()> {
        let guard = self.inner.registry.lock();
        if self.is_disposed() {
            return Err(Inner::<T>::disposed_error());
        }
        let failures = self
            .inner
            .pass(&guard, "observer.on_error", |observer| observer.on_error(error));
        {
            let mut registry = guard.borrow_mut();
            if self.inner.unsubscribe_on_error {
                registry.clear_active();
            }
            registry.exit();
        }
        drop(guard);
        self.inner.report("send_fault", failures)
    }

    /// Notify normal termination and drop every observer.
    pub fn complete(&self) -> Result<()> {
        let guard = self.inner.registry.lock();
        if self.is_disposed() {
            return Err(Inner::<T>::disposed_error());
        }
        let failures = self.complete_locked(&guard);
        drop(guard);
        self.inner.report("complete", failures)
    }

    /// Complete, then reject every later `subscribe`/`send`/`send_fault`/`complete`.
    ///
    /// Idempotent.
    pub fn dispose(&self) -> Result<()> {
        let guard = self.inner.registry.lock();
        if self.is_disposed() {
            return Ok(());
        }
        let failures = self.complete_locked(&guard);
        self.inner.disposed.store(true, Ordering::Release);
        guard.borrow_mut().close();
        drop(guard);
        tracing::debug!("observable_disposed: observable={}", self.inner.label);
        self.inner.report("dispose", failures)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self.inner.registry.lock();
        let count = guard.borrow().len();
        count
    }

    /// Run `f` inside this observable's mutual-exclusion domain.
    ///
    /// Notifications issued from `f` are serialized with every other
    /// notification of this observable.
    pub fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.registry.lock();
        f()
    }

    fn complete_locked(&self, cell: &RegistryCell<T>) -> AggregateError {
        let failures = self
            .inner
            .pass(cell, "observer.on_completed", |observer| observer.on_completed());
        let mut registry = cell.borrow_mut();
        registry.clear_active();
        registry.exit();
        failures
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("label", &self.inner.label)
            .field("unsubscribe_on_error", &self.inner.unsubscribe_on_error)
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}
