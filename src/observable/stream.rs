//! `futures::Stream` adapter over an observable.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};

use super::observer::Observer;
use super::subject::Observable;
use super::subscription::Subscription;
use crate::types::{BoxError, Error, Result};

pub(crate) struct ForwardingObserver<T> {
    tx: UnboundedSender<T>,
}

impl<T: Clone + Send + Sync> Observer<T> for ForwardingObserver<T> {
    fn on_next(&self, value: &T) -> std::result::Result<(), BoxError> {
        // A dropped receiver unsubscribes through its own Subscription.
        let _ = self.tx.unbounded_send(value.clone());
        Ok(())
    }

    fn on_error(&self, error: &Error) -> std::result::Result<(), BoxError> {
        tracing::debug!("observable_stream_ended: error={}", error);
        self.tx.close_channel();
        Ok(())
    }

    fn on_completed(&self) -> std::result::Result<(), BoxError> {
        self.tx.close_channel();
        Ok(())
    }
}

/// Values of an observable as an unbounded stream.
///
/// The stream ends on completion or on a terminal error. Dropping it
/// unsubscribes.
pub struct ObservableStream<T> {
    rx: UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T> Stream for ObservableStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for ObservableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStream").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableStream<T> {
    /// Hand a forwarding observer to `subscribe` and wrap the resulting subscription.
    pub(crate) fn subscribe_with<F>(subscribe: F) -> Result<Self>
    where
        F: FnOnce(ForwardingObserver<T>) -> Result<Subscription>,
    {
        let (tx, rx) = mpsc::unbounded();
        let subscription = subscribe(ForwardingObserver { tx })?;
        Ok(Self {
            rx,
            _subscription: subscription,
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Subscribe and receive later values as a stream.
    pub fn into_stream(self) -> Result<ObservableStream<T>> {
        ObservableStream::subscribe_with(|observer| self.subscribe(observer))
    }
}
