use std::fmt;

use parking_lot::Mutex;

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Handle of an active subscription.
///
/// Disposing (explicitly or by drop) unsubscribes. Disposal is idempotent.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub(crate) fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    pub fn dispose(&self) {
        // Taken before running so a re-entrant dispose sees an empty slot.
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
