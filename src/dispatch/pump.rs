//! Event pump: pulls events off the native serial queue one at a time.
//!
//! Each retrieval is an [`EventQueueClient::wait_event`] bound to the pump's
//! signal, so firing it unblocks a pending wait with a break event and the loop
//! exits after at most one in-flight retrieval.

use std::fmt;
use std::sync::Arc;

use crate::api::EventQueueClient;
use crate::native::{EventQueue, NativeEvent};
use crate::observable::ObservableValue;
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::{Error, Result};

/// Lifecycle of the pump as observed by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpStatus {
    /// Not started yet.
    Idle,
    Running,
    /// Exited after shutdown.
    Stopped,
    /// Exited because retrieving an event failed.
    Faulted(String),
}

impl PumpStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, PumpStatus::Stopped | PumpStatus::Faulted(_))
    }
}

pub(crate) struct EventPump {
    events: EventQueueClient,
    cancel: CancelSignal,
    status: Arc<ObservableValue<PumpStatus>>,
}

impl EventPump {
    pub(crate) fn new(
        queue: Arc<dyn EventQueue>,
        worker: WorkerContext,
        cancel: CancelSignal,
        status: Arc<ObservableValue<PumpStatus>>,
    ) -> Self {
        Self {
            events: EventQueueClient::new(queue, worker),
            cancel,
            status,
        }
    }

    /// Run until cancelled or until retrieval faults, handing each event to `handle`.
    pub(crate) async fn run<F>(self, mut handle: F) -> Result<()>
    where
        F: FnMut(NativeEvent) + Send,
    {
        tracing::info!("event_pump_started");
        self.set_status(PumpStatus::Running);

        let mut handled: u64 = 0;
        let outcome = loop {
            let next = self.events.wait_event(Some(&self.cancel)).await;

            match next {
                Ok(event) => {
                    if self.cancel.is_fired() {
                        if event.is_break() {
                            tracing::debug!("event_pump_break_received");
                        } else {
                            handle(event);
                            handled += 1;
                        }
                        break Ok(());
                    }
                    handle(event);
                    handled += 1;
                }
                Err(Error::Cancelled { .. }) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        match &outcome {
            Ok(()) => {
                tracing::info!("event_pump_finished: events={}", handled);
                self.set_status(PumpStatus::Stopped);
            }
            Err(e) => {
                tracing::error!("event_pump_finished_exceptionally: events={}, error={}", handled, e);
                self.set_status(PumpStatus::Faulted(e.to_string()));
            }
        }
        outcome
    }

    fn set_status(&self, status: PumpStatus) {
        if let Err(e) = self.status.set(status) {
            tracing::warn!("pump_status_observers_failed: {}", e);
        }
    }
}

impl fmt::Debug for EventPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPump")
            .field("cancelled", &self.cancel.is_fired())
            .finish_non_exhaustive()
    }
}
