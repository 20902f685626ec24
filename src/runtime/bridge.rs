//! Cancellable bridge over blocking native calls.
//!
//! A call runs on the worker's blocking pool while the caller awaits its join
//! handle. Cancellation is cooperative: firing the signal raises the call's
//! interruption flag (visible through [`interruption_requested`]) and runs the
//! optional interrupt hook once, if the call is still in flight.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use super::cancel::CancelSignal;
use super::recovery::with_recovery;
use super::worker::WorkerContext;
use crate::native::NativeResult;
use crate::types::{Error, Result};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const SKIPPED: u8 = 3;

struct CallState {
    phase: AtomicU8,
    requested: AtomicBool,
    delivered: AtomicBool,
}

impl CallState {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(PENDING),
            requested: AtomicBool::new(false),
            delivered: AtomicBool::new(false),
        }
    }

    /// Returns true when the call is in flight and should be interrupted.
    ///
    /// A pending call is moved to `SKIPPED` instead, so exactly one of
    /// `request` and `begin` wins the transition out of `PENDING`.
    fn request(&self) -> bool {
        self.requested.store(true, Ordering::SeqCst);
        match self
            .phase
            .compare_exchange(PENDING, SKIPPED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => false,
            Err(RUNNING) => {
                self.delivered.store(true, Ordering::SeqCst);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns false when cancellation arrived before the call started.
    fn begin(&self) -> bool {
        self.phase
            .compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self) {
        self.phase.store(DONE, Ordering::SeqCst);
    }
}

thread_local! {
    static CURRENT_CALL: RefCell<Option<Arc<CallState>>> = const { RefCell::new(None) };
}

struct CallScope {
    previous: Option<Arc<CallState>>,
}

impl CallScope {
    fn enter(state: Arc<CallState>) -> Self {
        let previous = CURRENT_CALL.with(|current| current.replace(Some(state)));
        Self { previous }
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_CALL.with(|current| *current.borrow_mut() = previous);
    }
}

/// True when the bridge call running on this thread has been asked to stop.
///
/// Always false outside a bridge call.
pub fn interruption_requested() -> bool {
    CURRENT_CALL.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|state| state.requested.load(Ordering::SeqCst))
    })
}

enum Outcome<T> {
    Skipped,
    Finished(Result<T>),
}

impl WorkerContext {
    /// Run a blocking call without an interrupt hook.
    pub async fn run_blocking<T, F>(
        &self,
        operation: &str,
        call: F,
        cancel: Option<&CancelSignal>,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> NativeResult<T> + Send + 'static,
    {
        self.run_interruptible(operation, call, cancel, || {}).await
    }

    /// Run a blocking call; `interrupt` runs at most once if `cancel` fires mid-call.
    ///
    /// A result produced despite cancellation is delivered. A fault produced after
    /// the interrupt reached the call becomes [`Error::Cancelled`] with the fault
    /// text as the interruption point.
    pub async fn run_interruptible<T, F, I>(
        &self,
        operation: &str,
        call: F,
        cancel: Option<&CancelSignal>,
        interrupt: I,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> NativeResult<T> + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        if cancel.is_some_and(CancelSignal::is_fired) {
            tracing::debug!("bridge_call_skipped: operation={}, reason=cancelled", operation);
            return Err(Error::cancelled(operation));
        }

        let state = Arc::new(CallState::new());
        let _registration = cancel.map(|signal| {
            let state = state.clone();
            let name = operation.to_string();
            signal.register(move || {
                if state.request() {
                    tracing::debug!("bridge_call_interrupting: operation={}", name);
                    interrupt();
                }
            })
        });

        let worker_state = state.clone();
        let name = operation.to_string();
        let joined = self
            .spawn_blocking(move || {
                if !worker_state.begin() {
                    return Outcome::Skipped;
                }
                let _scope = CallScope::enter(worker_state.clone());
                let result = with_recovery(|| call().map_err(Error::from), &name);
                worker_state.finish();
                Outcome::Finished(result)
            })
            .await;

        match joined {
            Err(join_err) => Err(Error::internal(format!(
                "blocking call {} did not complete: {}",
                operation, join_err
            ))),
            Ok(Outcome::Skipped) => {
                tracing::debug!("bridge_call_skipped: operation={}, reason=cancelled", operation);
                Err(Error::cancelled(operation))
            }
            Ok(Outcome::Finished(Err(Error::Fault(fault))))
                if state.delivered.load(Ordering::SeqCst) =>
            {
                tracing::debug!("bridge_call_interrupted: operation={}, fault={}", operation, fault);
                Err(Error::Cancelled {
                    operation: operation.to_string(),
                    point: Some(fault.to_string()),
                })
            }
            Ok(Outcome::Finished(result)) => result,
        }
    }
}
