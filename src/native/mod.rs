//! Boundary with the native blocking layer.
//!
//! The native endpoint is a set of synchronous calls that may block for network
//! round trips, plus one serial event queue. This crate never implements them; it
//! consumes them through the traits below and runs every call through the bridge in
//! [`crate::runtime`].
//!
//! All methods block the calling thread. Faults are returned as [`NativeFault`].

pub mod events;
pub mod fault;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use std::sync::Arc;

pub use events::{EventPayload, NativeEvent, StoreStats, ThreadStats, LIB_CHANNEL};
pub use fault::NativeFault;
pub use models::{
    ContainerPolicy, ContainerSpec, ContainerUpdate, Context, File, FileHandle, FileMeta, Message,
    MessageContent, PagingList, PagingQuery, SortOrder, Store, Thread, UserWithPubKey,
};

use crate::types::{ContextId, FileId, MessageId, StoreId, ThreadId};

/// Result of a native call.
pub type NativeResult<T> = std::result::Result<T, NativeFault>;

/// Connection-level operations.
pub trait ConnectionApi: Send + Sync {
    fn connection_id(&self) -> NativeResult<i64>;
    fn list_contexts(&self, query: &PagingQuery) -> NativeResult<PagingList<Context>>;
    fn disconnect(&self) -> NativeResult<()>;
}

/// Thread and message operations.
pub trait ThreadApi: Send + Sync {
    fn create_thread(&self, context_id: &ContextId, spec: &ContainerSpec) -> NativeResult<ThreadId>;
    fn update_thread(&self, thread_id: &ThreadId, update: &ContainerUpdate) -> NativeResult<()>;
    fn delete_thread(&self, thread_id: &ThreadId) -> NativeResult<()>;
    fn get_thread(&self, thread_id: &ThreadId) -> NativeResult<Thread>;
    fn list_threads(&self, context_id: &ContextId, query: &PagingQuery) -> NativeResult<PagingList<Thread>>;

    fn get_message(&self, message_id: &MessageId) -> NativeResult<Message>;
    fn list_messages(&self, thread_id: &ThreadId, query: &PagingQuery) -> NativeResult<PagingList<Message>>;
    fn send_message(&self, thread_id: &ThreadId, content: &MessageContent) -> NativeResult<MessageId>;
    fn update_message(&self, message_id: &MessageId, content: &MessageContent) -> NativeResult<()>;
    fn delete_message(&self, message_id: &MessageId) -> NativeResult<()>;

    fn subscribe_for_thread_events(&self) -> NativeResult<()>;
    fn unsubscribe_from_thread_events(&self) -> NativeResult<()>;
    fn subscribe_for_message_events(&self, thread_id: &ThreadId) -> NativeResult<()>;
    fn unsubscribe_from_message_events(&self, thread_id: &ThreadId) -> NativeResult<()>;
}

/// Store and file operations.
pub trait StoreApi: Send + Sync {
    fn create_store(&self, context_id: &ContextId, spec: &ContainerSpec) -> NativeResult<StoreId>;
    fn update_store(&self, store_id: &StoreId, update: &ContainerUpdate) -> NativeResult<()>;
    fn delete_store(&self, store_id: &StoreId) -> NativeResult<()>;
    fn get_store(&self, store_id: &StoreId) -> NativeResult<Store>;
    fn list_stores(&self, context_id: &ContextId, query: &PagingQuery) -> NativeResult<PagingList<Store>>;

    fn create_file(&self, store_id: &StoreId, meta: &FileMeta, size: i64) -> NativeResult<FileHandle>;
    fn update_file(&self, file_id: &FileId, meta: &FileMeta, size: i64) -> NativeResult<FileHandle>;
    fn update_file_meta(&self, file_id: &FileId, meta: &FileMeta) -> NativeResult<()>;
    fn write_to_file(&self, handle: FileHandle, chunk: &[u8]) -> NativeResult<()>;
    fn delete_file(&self, file_id: &FileId) -> NativeResult<()>;
    fn get_file(&self, file_id: &FileId) -> NativeResult<File>;
    fn list_files(&self, store_id: &StoreId, query: &PagingQuery) -> NativeResult<PagingList<File>>;
    fn open_file(&self, file_id: &FileId) -> NativeResult<FileHandle>;
    fn read_from_file(&self, handle: FileHandle, length: i64) -> NativeResult<Vec<u8>>;
    fn seek_in_file(&self, handle: FileHandle, position: i64) -> NativeResult<()>;
    /// Closes the handle and returns the id of the file it referred to.
    fn close_file(&self, handle: FileHandle) -> NativeResult<FileId>;

    fn subscribe_for_store_events(&self) -> NativeResult<()>;
    fn unsubscribe_from_store_events(&self) -> NativeResult<()>;
    fn subscribe_for_file_events(&self, store_id: &StoreId) -> NativeResult<()>;
    fn unsubscribe_from_file_events(&self, store_id: &StoreId) -> NativeResult<()>;
}

/// A live connection exposing every remote operation.
pub trait NativeConnection: ConnectionApi + ThreadApi + StoreApi {}

impl<T: ConnectionApi + ThreadApi + StoreApi> NativeConnection for T {}

/// The single serial event source.
#[cfg_attr(test, mockall::automock)]
pub trait EventQueue: Send + Sync {
    /// Block until the next event (or an injected break) is available.
    fn wait_event(&self) -> NativeResult<NativeEvent>;
    /// Inject a [`EventPayload::LibBreak`] to unblock a pending `wait_event`.
    fn emit_break_event(&self) -> NativeResult<()>;
}

/// Key derivation and signing. Implemented natively.
#[cfg_attr(test, mockall::automock)]
pub trait CryptoApi: Send + Sync {
    fn sign_data(&self, data: &[u8], private_key: &str) -> NativeResult<Vec<u8>>;
    fn derive_private_key(&self, password: &str, salt: &str) -> NativeResult<String>;
    fn derive_public_key(&self, private_key: &str) -> NativeResult<String>;
}

/// Entry point of the native library.
pub trait Backend: Send + Sync {
    /// Point the native TLS layer at the provisioned trust anchor.
    fn set_certs_path(&self, path: &Path) -> NativeResult<()>;

    fn platform_connect(
        &self,
        private_key: &str,
        solution_id: &str,
        platform_url: &str,
    ) -> NativeResult<Arc<dyn NativeConnection>>;

    fn platform_connect_public(
        &self,
        solution_id: &str,
        platform_url: &str,
    ) -> NativeResult<Arc<dyn NativeConnection>>;

    /// The process-wide event queue.
    fn event_queue(&self) -> Arc<dyn EventQueue>;

    fn crypto(&self) -> Arc<dyn CryptoApi>;
}
