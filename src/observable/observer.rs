//! Observer trait and closure-backed observers.

use std::fmt;

use crate::types::{BoxError, Error};

/// Receiver of an observable's notifications.
///
/// Callbacks run synchronously on the notifying thread while the observable's
/// lock is held; they may re-enter the same observable. A returned `Err` (or a
/// panic) is collected and reported to the sender after the pass; delivery to
/// the remaining observers continues.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: &T) -> Result<(), BoxError>;

    fn on_error(&self, error: &Error) -> Result<(), BoxError> {
        tracing::debug!("observer_received_error: {}", error);
        Ok(())
    }

    fn on_completed(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

type NextFn<T> = Box<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;
type ErrorFn = Box<dyn Fn(&Error) -> Result<(), BoxError> + Send + Sync>;
type CompletedFn = Box<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Observer assembled from closures. Built with [`ObserverBuilder`].
pub struct FnObserver<T> {
    on_next: NextFn<T>,
    on_error: Option<ErrorFn>,
    on_completed: Option<CompletedFn>,
}

impl<T> Observer<T> for FnObserver<T> {
    fn on_next(&self, value: &T) -> Result<(), BoxError> {
        (self.on_next)(value)
    }

    fn on_error(&self, error: &Error) -> Result<(), BoxError> {
        match &self.on_error {
            Some(f) => f(error),
            None => {
                tracing::debug!("observer_received_error: {}", error);
                Ok(())
            }
        }
    }

    fn on_completed(&self) -> Result<(), BoxError> {
        match &self.on_completed {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl<T> fmt::Debug for FnObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver")
            .field("on_error", &self.on_error.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .finish()
    }
}

/// Builder for [`FnObserver`].
///
/// ```
/// use endpoint_bridge::observable::{Observable, ObserverBuilder};
///
/// let observable = Observable::<u32>::new();
/// let _subscription = observable
///     .subscribe(
///         ObserverBuilder::new()
///             .on_next(|v: &u32| {
///                 assert!(*v > 0);
///                 Ok(())
///             })
///             .on_completed(|| Ok(()))
///             .build(),
///     )
///     .unwrap();
/// observable.send(&7).unwrap();
/// ```
pub struct ObserverBuilder<T> {
    on_next: Option<NextFn<T>>,
    on_error: Option<ErrorFn>,
    on_completed: Option<CompletedFn>,
}

impl<T> ObserverBuilder<T> {
    pub fn new() -> Self {
        Self {
            on_next: None,
            on_error: None,
            on_completed: None,
        }
    }

    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_next = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Error) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_completed = Some(Box::new(f));
        self
    }

    /// Finish the observer. Values are ignored when no `on_next` was given.
    pub fn build(self) -> FnObserver<T> {
        FnObserver {
            on_next: self.on_next.unwrap_or_else(|| Box::new(|_| Ok(()))),
            on_error: self.on_error,
            on_completed: self.on_completed,
        }
    }
}

impl<T> Default for ObserverBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObserverBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBuilder")
            .field("on_next", &self.on_next.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .finish()
    }
}
