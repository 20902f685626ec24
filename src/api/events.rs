//! Async access to the native serial event queue.

use std::sync::Arc;

use crate::native::{EventQueue, NativeEvent};
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::Result;

/// Event queue calls routed through the blocking bridge.
#[derive(Clone)]
pub struct EventQueueClient {
    queue: Arc<dyn EventQueue>,
    worker: WorkerContext,
}

impl EventQueueClient {
    pub fn new(queue: Arc<dyn EventQueue>, worker: WorkerContext) -> Self {
        Self { queue, worker }
    }

    /// Wait for the next event.
    ///
    /// Firing `cancel` while waiting injects a break event, which is then
    /// returned like any other event. A signal fired before the call starts
    /// yields [`Error::Cancelled`](crate::Error::Cancelled).
    pub async fn wait_event(&self, cancel: Option<&CancelSignal>) -> Result<NativeEvent> {
        let queue = self.queue.clone();
        let breaker = self.queue.clone();
        self.worker
            .run_interruptible(
                "events.wait",
                move || queue.wait_event(),
                cancel,
                move || {
                    if let Err(e) = breaker.emit_break_event() {
                        tracing::warn!("event_queue_break_failed: {}", e);
                    }
                },
            )
            .await
    }

    pub async fn emit_break_event(&self, cancel: Option<&CancelSignal>) -> Result<()> {
        let queue = self.queue.clone();
        self.worker
            .run_blocking("events.emit_break", move || queue.emit_break_event(), cancel)
            .await
    }
}

impl std::fmt::Debug for EventQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueueClient").finish_non_exhaustive()
    }
}
