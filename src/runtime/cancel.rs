//! One-shot cancellation signal with synchronous callbacks.
//!
//! `CancellationToken` gives us the awaitable half. Native interruption needs
//! more: a hook that runs on the firing thread, exactly once, and that runs
//! immediately when registered against a signal that already fired.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::recovery::catch_panic;
use super::worker::WorkerContext;

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct SignalState {
    fired: bool,
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

struct SignalInner {
    token: CancellationToken,
    state: Mutex<SignalState>,
    // Registrations a linked signal holds on its sources.
    links: Mutex<Vec<Registration>>,
}

/// A fire-once cancellation flag.
///
/// Clones share state. Firing runs every registered callback exactly once, on the
/// firing thread, in registration order.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<SignalInner>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                token: CancellationToken::new(),
                state: Mutex::new(SignalState::default()),
                links: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_fired(&self) -> bool {
        self.inner.state.lock().fired
    }

    /// Fire the signal. Later calls are no-ops.
    pub fn fire(&self) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };
        self.inner.token.cancel();

        for (_, callback) in callbacks {
            let _ = catch_panic(callback, "cancel_signal.callback");
        }
    }

    /// Run `callback` once when the signal fires.
    ///
    /// If the signal already fired the callback runs now, before this returns.
    /// Dropping the returned [`Registration`] before the signal fires removes it.
    pub fn register(&self, callback: impl FnOnce() + Send + 'static) -> Registration {
        let mut state = self.inner.state.lock();
        if state.fired {
            drop(state);
            let _ = catch_panic(callback, "cancel_signal.callback");
            return Registration::empty();
        }

        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.push((id, Box::new(callback)));
        Registration {
            signal: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Token view of this signal for `select!`-style code.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Derived signal that fires when either source fires.
    ///
    /// The derived signal's hold on its sources ends when it is dropped.
    pub fn link(a: &CancelSignal, b: &CancelSignal) -> CancelSignal {
        let derived = CancelSignal::new();
        let regs = [a, b].map(|source| {
            let target = Arc::downgrade(&derived.inner);
            source.register(move || fire_weak(&target))
        });
        derived.inner.links.lock().extend(regs);
        derived
    }

    /// Combine two optional signals without allocating when one side is absent.
    pub fn link_if_needed(a: Option<&CancelSignal>, b: Option<&CancelSignal>) -> Option<CancelSignal> {
        match (a, b) {
            (None, None) => None,
            (Some(s), None) | (None, Some(s)) => Some(s.clone()),
            (Some(a), Some(b)) => Some(CancelSignal::link(a, b)),
        }
    }

    /// Fire after `delay` unless the signal fires first.
    pub fn fire_after(&self, ctx: &WorkerContext, delay: Duration) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        ctx.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => signal.fire(),
                _ = signal.cancelled() => {}
            }
        })
    }

    #[cfg(test)]
    fn pending_callbacks(&self) -> usize {
        self.inner.state.lock().callbacks.len()
    }
}

fn fire_weak(target: &Weak<SignalInner>) {
    if let Some(inner) = target.upgrade() {
        CancelSignal { inner }.fire();
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CancelSignal")
            .field("fired", &state.fired)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

/// Handle of a callback registered on a [`CancelSignal`].
#[must_use = "dropping a Registration removes the callback"]
pub struct Registration {
    signal: Weak<SignalInner>,
    id: u64,
}

impl Registration {
    fn empty() -> Self {
        Self {
            signal: Weak::new(),
            id: 0,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.signal.upgrade() {
            let removed = {
                let mut state = inner.state.lock();
                state
                    .callbacks
                    .iter()
                    .position(|(id, _)| *id == self.id)
                    .map(|pos| state.callbacks.remove(pos))
            };
            // Dropped outside the lock: the callback may own other registrations.
            drop(removed);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}
