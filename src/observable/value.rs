//! Observable holding a current value, notifying only on change.

use std::fmt;

use parking_lot::RwLock;

use super::observer::Observer;
use super::subject::Observable;
use super::subscription::Subscription;
use crate::types::{Error, Result};

type EqFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A pollable value whose changes are broadcast.
///
/// Subscribing does not replay the current value; observers only see later
/// changes. Use [`get`](Self::get) for the current value.
pub struct ObservableValue<T> {
    value: RwLock<T>,
    equals: EqFn<T>,
    observable: Observable<T>,
}

impl<T> ObservableValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self::with_equality(initial, |a, b| a == b, true)
    }
}

impl<T> ObservableValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Value with a custom equality contract.
    pub fn with_equality<F>(initial: T, equals: F, unsubscribe_on_error: bool) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            value: RwLock::new(initial),
            equals: Box::new(equals),
            observable: Observable::with_options("observable_value", unsubscribe_on_error),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Replace the value and notify observers, unless it equals the current one.
    ///
    /// Returns whether a notification was sent.
    pub fn set(&self, new_value: T) -> Result<bool> {
        self.observable.serialized(|| {
            if self.observable.is_disposed() {
                return Err(Error::Disposed("observable value"));
            }
            {
                let mut current = self.value.write();
                if (self.equals)(&new_value, &current) {
                    return Ok(false);
                }
                *current = new_value.clone();
            }
            self.observable.send(&new_value)?;
            Ok(true)
        })
    }

    /// Re-send the current value to every observer.
    pub fn notify_current(&self) -> Result<()> {
        self.observable.serialized(|| {
            let current = self.get();
            self.observable.send(&current)
        })
    }

    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription>
    where
        O: Observer<T> + 'static,
    {
        self.observable.subscribe(observer)
    }

    pub fn subscribe_fn<F>(&self, on_next: F) -> Result<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observable.subscribe_fn(on_next)
    }

    /// The underlying observable, e.g. for [`into_stream`](Observable::into_stream).
    pub fn observable(&self) -> &Observable<T> {
        &self.observable
    }

    pub fn dispose(&self) -> Result<()> {
        self.observable.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.observable.is_disposed()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("value", &*self.value.read())
            .field("observable", &self.observable)
            .finish()
    }
}
