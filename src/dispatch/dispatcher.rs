//! Event dispatcher: channel table, event pump and connection state.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::channel::{Channel, ChannelSlot};
use super::handlers::{
    files_channel, messages_channel, ChannelHandler, FileChannel, MessageChannel, StoreChannel,
    ThreadChannel, STORES_CHANNEL, THREADS_CHANNEL,
};
use super::pump::{EventPump, PumpStatus};
use crate::native::{EventQueue, NativeConnection, NativeEvent};
use crate::observable::{Observable, ObservableValue};
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::{DispatcherConfig, Error, Result, StoreId, ThreadId};

struct ChannelEntry {
    slot: Arc<dyn ChannelSlot>,
    typed: Box<dyn Any + Send + Sync>,
}

struct DispatcherInner {
    connection: Arc<dyn NativeConnection>,
    worker: WorkerContext,
    config: DispatcherConfig,
    channels: RwLock<HashMap<String, ChannelEntry>>,
    raw_events: Observable<NativeEvent>,
    connected: ObservableValue<bool>,
    pump_status: Arc<ObservableValue<PumpStatus>>,
    cancel: CancelSignal,
    pump: Mutex<Option<JoinHandle<Result<()>>>>,
    shut_down: AtomicBool,
}

impl DispatcherInner {
    fn route(&self, event: NativeEvent) {
        if let Some(connected) = event.payload.connection_state() {
            tracing::info!("connection_state_changed: connected={}", connected);
            if let Err(e) = self.connected.set(connected) {
                tracing::warn!("connection_state_observers_failed: {}", e);
            }
        }

        // Clone the slot out so observers may register channels while we send.
        let slot = self
            .channels
            .read()
            .get(&event.channel)
            .map(|entry| entry.slot.clone());
        match slot {
            Some(slot) => {
                if let Err(e) = slot.dispatch(&event.payload) {
                    tracing::warn!(
                        "event_dispatch_failed: channel={}, kind={}, error={}",
                        event.channel,
                        event.payload.kind(),
                        e
                    );
                }
            }
            None => tracing::debug!(
                "event_channel_unregistered: channel={}, kind={}",
                event.channel,
                event.payload.kind()
            ),
        }

        if let Err(e) = self.raw_events.send(&event) {
            tracing::warn!("raw_event_observers_failed: kind={}, error={}", event.payload.kind(), e);
        }
    }
}

/// Multiplexes the serial native event queue onto typed, ref-counted channels.
///
/// Construction spawns the event pump on the worker context. Call
/// [`shutdown`](Self::shutdown) to stop it and settle every channel; dropping the
/// dispatcher only signals the pump.
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl EventDispatcher {
    pub fn start(
        connection: Arc<dyn NativeConnection>,
        queue: Arc<dyn EventQueue>,
        worker: WorkerContext,
        config: DispatcherConfig,
    ) -> Self {
        let cancel = CancelSignal::new();
        let pump_status = Arc::new(ObservableValue::new(PumpStatus::Idle));
        let inner = Arc::new(DispatcherInner {
            connection,
            worker: worker.clone(),
            config,
            channels: RwLock::new(HashMap::new()),
            raw_events: Observable::with_options("raw_events", true),
            connected: ObservableValue::new(false),
            pump_status: pump_status.clone(),
            cancel: cancel.clone(),
            pump: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        let pump = EventPump::new(queue, worker.clone(), cancel, pump_status);
        let router = inner.clone();
        let handle = worker.spawn(pump.run(move |event| router.route(event)));
        *inner.pump.lock() = Some(handle);

        tracing::info!("event_dispatcher_started");
        Self { inner }
    }

    /// Get or create the channel registered under `key`.
    ///
    /// `factory` runs only when the key is new. A key already registered with a
    /// different handler type is an [`Error::ChannelTypeMismatch`].
    pub fn channel<H, F>(&self, key: &str, factory: F) -> Result<Channel<H>>
    where
        H: ChannelHandler,
        F: FnOnce() -> H,
    {
        if self.is_shut_down() {
            return Err(Error::Disposed("event dispatcher"));
        }
        if let Some(entry) = self.inner.channels.read().get(key) {
            return Self::downcast(key, entry);
        }

        let mut channels = self.inner.channels.write();
        if let Some(entry) = channels.get(key) {
            return Self::downcast(key, entry);
        }
        if self.is_shut_down() {
            return Err(Error::Disposed("event dispatcher"));
        }
        let channel = Channel::new(
            key,
            factory(),
            self.inner.connection.clone(),
            self.inner.worker.clone(),
        );
        channels.insert(
            key.to_string(),
            ChannelEntry {
                slot: Arc::new(channel.clone()),
                typed: Box::new(channel.clone()),
            },
        );
        tracing::debug!("channel_registered: channel={}, handler={}", key, type_name::<H>());
        Ok(channel)
    }

    fn downcast<H: ChannelHandler>(key: &str, entry: &ChannelEntry) -> Result<Channel<H>> {
        entry
            .typed
            .downcast_ref::<Channel<H>>()
            .cloned()
            .ok_or_else(|| Error::ChannelTypeMismatch {
                key: key.to_string(),
                expected: type_name::<H>(),
                found: entry.slot.handler_type(),
            })
    }

    pub fn thread_events(&self) -> Result<Channel<ThreadChannel>> {
        self.channel(THREADS_CHANNEL, || ThreadChannel)
    }

    pub fn message_events(&self, thread_id: &ThreadId) -> Result<Channel<MessageChannel>> {
        self.channel(&messages_channel(thread_id), || {
            MessageChannel::new(thread_id.clone())
        })
    }

    pub fn store_events(&self) -> Result<Channel<StoreChannel>> {
        self.channel(STORES_CHANNEL, || StoreChannel)
    }

    pub fn file_events(&self, store_id: &StoreId) -> Result<Channel<FileChannel>> {
        self.channel(&files_channel(store_id), || FileChannel::new(store_id.clone()))
    }

    /// Every event the pump retrieves, after channel dispatch.
    pub fn raw_events(&self) -> &Observable<NativeEvent> {
        &self.inner.raw_events
    }

    /// Connection state as reported by library lifecycle events.
    pub fn connected(&self) -> &ObservableValue<bool> {
        &self.inner.connected
    }

    pub fn pump_status(&self) -> &ObservableValue<PumpStatus> {
        &self.inner.pump_status
    }

    pub fn channel_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.channels.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Stop the pump, complete every channel and close open upstream subscriptions.
    ///
    /// Returns the pump's result: `Ok` if it stopped on request, the retrieval
    /// fault if it had already terminated on one. Later calls return `Ok`.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(
            "event_dispatcher_shutting_down: channels={}",
            self.inner.channels.read().len()
        );

        self.inner.cancel.fire();
        let pump = self.inner.pump.lock().take();
        let pump_result = match pump {
            Some(handle) => {
                match tokio::time::timeout(self.inner.config.shutdown_timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => {
                        Err(Error::internal(format!("event pump task failed: {}", join_error)))
                    }
                    Err(_) => {
                        tracing::warn!(
                            "event_pump_shutdown_timeout: timeout={:?}",
                            self.inner.config.shutdown_timeout
                        );
                        Err(Error::internal("event pump did not stop before the shutdown timeout"))
                    }
                }
            }
            None => Ok(()),
        };

        let slots: Vec<Arc<dyn ChannelSlot>> = self
            .inner
            .channels
            .write()
            .drain()
            .map(|(_, entry)| entry.slot)
            .collect();
        for slot in slots {
            slot.shutdown(self.inner.config.close_channels_on_shutdown).await;
        }

        if let Err(e) = self.inner.raw_events.dispose() {
            tracing::warn!("raw_events_dispose_failed: {}", e);
        }
        tracing::info!("event_dispatcher_stopped");
        pump_result
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.inner.cancel.fire();
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("channels", &self.channel_keys())
            .field("connected", &self.inner.connected.get())
            .field("pump_status", &self.inner.pump_status.get())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
