//! Channel kinds: how each opens its upstream subscription and which payloads it carries.

use std::fmt::Debug;

use crate::native::{
    EventPayload, File, Message, NativeConnection, NativeResult, Store, StoreStats, Thread,
    ThreadStats,
};
use crate::types::{FileId, MessageId, StoreId, ThreadId};

/// Behaviour of one channel kind.
///
/// `open`/`close` issue the native subscribe/unsubscribe calls and block; they run
/// on the worker's blocking pool. `route` maps a payload to the channel's item
/// type and returns `None` for shapes this channel does not carry.
pub trait ChannelHandler: Send + Sync + 'static {
    type Item: Clone + Debug + Send + Sync + 'static;

    fn open(&self, connection: &dyn NativeConnection) -> NativeResult<()>;

    fn close(&self, connection: &dyn NativeConnection) -> NativeResult<()>;

    fn route(&self, payload: &EventPayload) -> Option<Self::Item>;
}

/// Key of the thread lifecycle channel.
pub const THREADS_CHANNEL: &str = "threads";
/// Key of the store lifecycle channel.
pub const STORES_CHANNEL: &str = "stores";

pub fn messages_channel(thread_id: &ThreadId) -> String {
    format!("{}/messages", thread_id)
}

pub fn files_channel(store_id: &StoreId) -> String {
    format!("{}/files", store_id)
}

// =============================================================================
// Threads
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    Created(Thread),
    Updated(Thread),
    Deleted { thread_id: ThreadId },
    Stats(ThreadStats),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadChannel;

impl ChannelHandler for ThreadChannel {
    type Item = ThreadEvent;

    fn open(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.subscribe_for_thread_events()
    }

    fn close(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.unsubscribe_from_thread_events()
    }

    fn route(&self, payload: &EventPayload) -> Option<ThreadEvent> {
        match payload {
            EventPayload::ThreadCreated(thread) => Some(ThreadEvent::Created(thread.clone())),
            EventPayload::ThreadUpdated(thread) => Some(ThreadEvent::Updated(thread.clone())),
            EventPayload::ThreadDeleted { thread_id } => Some(ThreadEvent::Deleted {
                thread_id: thread_id.clone(),
            }),
            EventPayload::ThreadStats(stats) => Some(ThreadEvent::Stats(stats.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Messages of one thread
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Created(Message),
    Updated(Message),
    Deleted {
        thread_id: ThreadId,
        message_id: MessageId,
    },
}

#[derive(Debug, Clone)]
pub struct MessageChannel {
    thread_id: ThreadId,
}

impl MessageChannel {
    pub fn new(thread_id: ThreadId) -> Self {
        Self { thread_id }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }
}

impl ChannelHandler for MessageChannel {
    type Item = MessageEvent;

    fn open(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.subscribe_for_message_events(&self.thread_id)
    }

    fn close(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.unsubscribe_from_message_events(&self.thread_id)
    }

    fn route(&self, payload: &EventPayload) -> Option<MessageEvent> {
        match payload {
            EventPayload::ThreadNewMessage(message) => Some(MessageEvent::Created(message.clone())),
            EventPayload::ThreadMessageUpdated(message) => {
                Some(MessageEvent::Updated(message.clone()))
            }
            EventPayload::ThreadMessageDeleted {
                thread_id,
                message_id,
            } => Some(MessageEvent::Deleted {
                thread_id: thread_id.clone(),
                message_id: message_id.clone(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Stores
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Created(Store),
    Updated(Store),
    Deleted { store_id: StoreId },
    Stats(StoreStats),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreChannel;

impl ChannelHandler for StoreChannel {
    type Item = StoreEvent;

    fn open(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.subscribe_for_store_events()
    }

    fn close(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.unsubscribe_from_store_events()
    }

    fn route(&self, payload: &EventPayload) -> Option<StoreEvent> {
        match payload {
            EventPayload::StoreCreated(store) => Some(StoreEvent::Created(store.clone())),
            EventPayload::StoreUpdated(store) => Some(StoreEvent::Updated(store.clone())),
            EventPayload::StoreDeleted { store_id } => Some(StoreEvent::Deleted {
                store_id: store_id.clone(),
            }),
            EventPayload::StoreStats(stats) => Some(StoreEvent::Stats(stats.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Files of one store
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    Created(File),
    Updated(File),
    Deleted { store_id: StoreId, file_id: FileId },
}

#[derive(Debug, Clone)]
pub struct FileChannel {
    store_id: StoreId,
}

impl FileChannel {
    pub fn new(store_id: StoreId) -> Self {
        Self { store_id }
    }

    pub fn store_id(&self) -> &StoreId {
        &self.store_id
    }
}

impl ChannelHandler for FileChannel {
    type Item = FileEvent;

    fn open(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.subscribe_for_file_events(&self.store_id)
    }

    fn close(&self, connection: &dyn NativeConnection) -> NativeResult<()> {
        connection.unsubscribe_from_file_events(&self.store_id)
    }

    fn route(&self, payload: &EventPayload) -> Option<FileEvent> {
        match payload {
            EventPayload::StoreFileCreated(file) => Some(FileEvent::Created(file.clone())),
            EventPayload::StoreFileUpdated(file) => Some(FileEvent::Updated(file.clone())),
            EventPayload::StoreFileDeleted { store_id, file_id } => Some(FileEvent::Deleted {
                store_id: store_id.clone(),
                file_id: file_id.clone(),
            }),
            _ => None,
        }
    }
}
