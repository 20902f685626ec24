//! Tagged events produced by the native serial event queue.
//!
//! Every event names the channel it belongs to. The payload is a closed set of
//! shapes; `Unknown` carries shapes the native layer reports but this crate does
//! not model, so they can still reach raw-event observers.

use serde::{Deserialize, Serialize};

use super::models::{File, Message, Store, Thread};
use crate::types::{FileId, MessageId, StoreId, ThreadId};

/// Channel key of the lifecycle events emitted by the library itself.
pub const LIB_CHANNEL: &str = "channel/lib";

/// One event pulled from the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    /// Channel key the event was published on.
    pub channel: String,
    /// Connection that produced the event; `-1` for library-level events.
    pub connection_id: i64,
    pub payload: EventPayload,
}

impl NativeEvent {
    pub fn new(channel: impl Into<String>, connection_id: i64, payload: EventPayload) -> Self {
        Self {
            channel: channel.into(),
            connection_id,
            payload,
        }
    }

    /// Synthetic event injected to unblock a pending `wait_event`.
    pub fn lib_break() -> Self {
        Self::new(LIB_CHANNEL, -1, EventPayload::LibBreak)
    }

    pub fn is_break(&self) -> bool {
        matches!(self.payload, EventPayload::LibBreak)
    }
}

/// Thread container counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub thread_id: ThreadId,
    pub last_msg_date: i64,
    pub messages_count: i64,
}

/// Store container counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub store_id: StoreId,
    pub last_file_date: i64,
    pub files_count: i64,
}

/// Payload shapes of [`NativeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EventPayload {
    ThreadCreated(Thread),
    ThreadUpdated(Thread),
    ThreadDeleted { thread_id: ThreadId },
    ThreadStats(ThreadStats),
    ThreadNewMessage(Message),
    ThreadMessageUpdated(Message),
    ThreadMessageDeleted { thread_id: ThreadId, message_id: MessageId },
    StoreCreated(Store),
    StoreUpdated(Store),
    StoreDeleted { store_id: StoreId },
    StoreStats(StoreStats),
    StoreFileCreated(File),
    StoreFileUpdated(File),
    StoreFileDeleted { store_id: StoreId, file_id: FileId },
    LibConnected,
    LibDisconnected,
    LibPlatformDisconnected,
    LibBreak,
    /// A shape outside the modelled set.
    Unknown { kind: String, raw: serde_json::Value },
}

impl EventPayload {
    /// Stable name of the payload shape, used in logs.
    pub fn kind(&self) -> &str {
        match self {
            EventPayload::ThreadCreated(_) => "threadCreated",
            EventPayload::ThreadUpdated(_) => "threadUpdated",
            EventPayload::ThreadDeleted { .. } => "threadDeleted",
            EventPayload::ThreadStats(_) => "threadStats",
            EventPayload::ThreadNewMessage(_) => "threadNewMessage",
            EventPayload::ThreadMessageUpdated(_) => "threadMessageUpdated",
            EventPayload::ThreadMessageDeleted { .. } => "threadMessageDeleted",
            EventPayload::StoreCreated(_) => "storeCreated",
            EventPayload::StoreUpdated(_) => "storeUpdated",
            EventPayload::StoreDeleted { .. } => "storeDeleted",
            EventPayload::StoreStats(_) => "storeStats",
            EventPayload::StoreFileCreated(_) => "storeFileCreated",
            EventPayload::StoreFileUpdated(_) => "storeFileUpdated",
            EventPayload::StoreFileDeleted { .. } => "storeFileDeleted",
            EventPayload::LibConnected => "libConnected",
            EventPayload::LibDisconnected => "libDisconnected",
            EventPayload::LibPlatformDisconnected => "libPlatformDisconnected",
            EventPayload::LibBreak => "libBreak",
            EventPayload::Unknown { kind, .. } => kind,
        }
    }

    /// Connection state implied by this payload, if it is a connection lifecycle event.
    pub fn connection_state(&self) -> Option<bool> {
        match self {
            EventPayload::LibConnected => Some(true),
            EventPayload::LibDisconnected | EventPayload::LibPlatformDisconnected => Some(false),
            _ => None,
        }
    }
}
