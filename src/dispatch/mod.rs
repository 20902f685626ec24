//! Channel multiplexer over the native serial event queue.
//!
//! The [`EventDispatcher`] owns one event pump and a table of ref-counted
//! channels keyed by string. Subscribing to a channel opens its upstream native
//! subscription on the first subscriber and closes it after the last one leaves.

mod channel;
mod dispatcher;
mod handlers;
mod pump;

pub use channel::{Channel, ChannelState};
pub use dispatcher::EventDispatcher;
pub use handlers::{
    files_channel, messages_channel, ChannelHandler, FileChannel, FileEvent, MessageChannel,
    MessageEvent, StoreChannel, StoreEvent, ThreadChannel, ThreadEvent, STORES_CHANNEL,
    THREADS_CHANNEL,
};
pub use pump::PumpStatus;
