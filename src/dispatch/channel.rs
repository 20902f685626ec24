//! Reference-counted channel with a lazily opened upstream subscription.
//!
//! The first subscriber schedules the native subscribe call and the last one to
//! leave schedules the unsubscribe call; neither is awaited by the subscriber.
//! Effects for one channel run one at a time under the channel's effect lock and
//! reconcile toward the live subscriber count, so the final upstream state
//! always matches whether anyone is still listening.

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::handlers::ChannelHandler;
use crate::native::{EventPayload, NativeConnection};
use crate::observable::{Observable, ObservableStream, Observer, ObserverBuilder, Subscription};
use crate::runtime::WorkerContext;
use crate::types::{Error, Result};

/// Upstream subscription state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl ChannelState {
    pub fn is_settled(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Open)
    }
}

struct ChannelInner<H: ChannelHandler> {
    key: String,
    handler: Arc<H>,
    connection: Arc<dyn NativeConnection>,
    worker: WorkerContext,
    observable: Observable<H::Item>,
    subscribers: AtomicUsize,
    state: Mutex<ChannelState>,
    effect_lock: tokio::sync::Mutex<()>,
    in_flight: AtomicUsize,
    settled: Notify,
    shut_down: AtomicBool,
}

impl<H: ChannelHandler> ChannelInner<H> {
    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    fn schedule_reconcile(self: &Arc<Self>) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let inner = self.clone();
        self.worker.spawn(async move {
            inner.reconcile().await;
            if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.settled.notify_waiters();
            }
        });
    }

    /// Drive the upstream subscription toward the current subscriber count.
    async fn reconcile(&self) {
        let _effect = self.effect_lock.lock().await;
        loop {
            let wanted = self.subscribers.load(Ordering::SeqCst) > 0
                && !self.shut_down.load(Ordering::SeqCst);
            let current = *self.state.lock();
            match (current, wanted) {
                (ChannelState::Closed, true) => {
                    if !self.open_upstream().await {
                        break;
                    }
                }
                (ChannelState::Open, false) => {
                    if !self.close_upstream().await {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Caller holds the effect lock. Returns whether the channel is now open.
    async fn open_upstream(&self) -> bool {
        self.set_state(ChannelState::Opening);
        tracing::info!("channel_opening: channel={}", self.key);

        let handler = self.handler.clone();
        let connection = self.connection.clone();
        let result = self
            .worker
            .run_blocking("channels.open", move || handler.open(connection.as_ref()), None)
            .await;

        match result {
            Ok(()) => {
                self.set_state(ChannelState::Open);
                tracing::info!("channel_opened: channel={}", self.key);
                true
            }
            Err(e) => {
                self.set_state(ChannelState::Closed);
                tracing::error!("channel_open_failed: channel={}, error={}", self.key, e);
                false
            }
        }
    }

    /// Caller holds the effect lock. Returns whether the channel is now closed.
    async fn close_upstream(&self) -> bool {
        self.set_state(ChannelState::Closing);
        tracing::info!("channel_closing: channel={}", self.key);

        let handler = self.handler.clone();
        let connection = self.connection.clone();
        let result = self
            .worker
            .run_blocking("channels.close", move || handler.close(connection.as_ref()), None)
            .await;

        match result {
            Ok(()) => {
                self.set_state(ChannelState::Closed);
                tracing::info!("channel_closed: channel={}", self.key);
                true
            }
            Err(e) => {
                self.set_state(ChannelState::Open);
                tracing::error!("channel_close_failed: channel={}, error={}", self.key, e);
                false
            }
        }
    }

    fn release(self: &Arc<Self>) {
        let previous = self.subscribers.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && !self.shut_down.load(Ordering::SeqCst) {
            self.schedule_reconcile();
        }
    }
}

/// A typed event channel.
///
/// Cheap to clone; clones share subscribers and upstream state.
pub struct Channel<H: ChannelHandler> {
    inner: Arc<ChannelInner<H>>,
}

impl<H: ChannelHandler> Channel<H> {
    pub(crate) fn new(
        key: impl Into<String>,
        handler: H,
        connection: Arc<dyn NativeConnection>,
        worker: WorkerContext,
    ) -> Self {
        let key = key.into();
        Self {
            inner: Arc::new(ChannelInner {
                observable: Observable::with_options(key.clone(), true),
                key,
                handler: Arc::new(handler),
                connection,
                worker,
                subscribers: AtomicUsize::new(0),
                state: Mutex::new(ChannelState::Closed),
                effect_lock: tokio::sync::Mutex::new(()),
                in_flight: AtomicUsize::new(0),
                settled: Notify::new(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    /// Attach an observer; the first one opens the upstream subscription.
    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription>
    where
        O: Observer<H::Item> + 'static,
    {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(Error::Disposed("channel"));
        }
        let inner_subscription = self.inner.observable.subscribe(observer)?;

        if self.inner.subscribers.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.schedule_reconcile();
        }

        let weak: Weak<ChannelInner<H>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            inner_subscription.dispose();
            if let Some(inner) = weak.upgrade() {
                inner.release();
            }
        }))
    }

    pub fn subscribe_fn<F>(&self, on_next: F) -> Result<Subscription>
    where
        F: Fn(&H::Item) + Send + Sync + 'static,
    {
        self.subscribe(
            ObserverBuilder::new()
                .on_next(move |item: &H::Item| {
                    on_next(item);
                    Ok(())
                })
                .build(),
        )
    }

    /// Subscribe and receive items as a stream. Dropping the stream unsubscribes.
    pub fn stream(&self) -> Result<ObservableStream<H::Item>> {
        ObservableStream::subscribe_with(|observer| self.subscribe(observer))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.lock()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Wait until no open/close effect is scheduled or running.
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl<H: ChannelHandler> Clone for Channel<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: ChannelHandler> fmt::Debug for Channel<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("key", &self.inner.key)
            .field("subscribers", &self.subscriber_count())
            .field("state", &self.state())
            .finish()
    }
}

/// Type-erased view of a channel, as stored by the dispatcher.
pub(crate) trait ChannelSlot: Send + Sync {
    fn key(&self) -> &str;

    fn handler_type(&self) -> &'static str;

    fn state(&self) -> ChannelState;

    /// Route a payload to this channel's observers.
    fn dispatch(&self, payload: &EventPayload) -> Result<()>;

    /// Complete subscribers, then settle upstream state under the effect lock.
    fn shutdown(&self, close_upstream: bool) -> BoxFuture<'static, ()>;
}

impl<H: ChannelHandler> ChannelSlot for Channel<H> {
    fn key(&self) -> &str {
        &self.inner.key
    }

    fn handler_type(&self) -> &'static str {
        type_name::<H>()
    }

    fn state(&self) -> ChannelState {
        Channel::state(self)
    }

    fn dispatch(&self, payload: &EventPayload) -> Result<()> {
        match self.inner.handler.route(payload) {
            Some(item) => self.inner.observable.send(&item),
            None => {
                tracing::warn!(
                    "channel_event_unrecognized: channel={}, kind={}",
                    self.inner.key,
                    payload.kind()
                );
                Ok(())
            }
        }
    }

    fn shutdown(&self, close_upstream: bool) -> BoxFuture<'static, ()> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.shut_down.store(true, Ordering::SeqCst);
            if let Err(e) = inner.observable.dispose() {
                tracing::warn!("channel_dispose_failed: channel={}, error={}", inner.key, e);
            }

            let _effect = inner.effect_lock.lock().await;
            if close_upstream && *inner.state.lock() == ChannelState::Open {
                inner.close_upstream().await;
            }
            tracing::debug!("channel_shut_down: channel={}, state={:?}", inner.key, *inner.state.lock());
        })
    }
}
