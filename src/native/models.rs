//! Data shapes exchanged with the native layer.

use serde::{Deserialize, Serialize};

use crate::types::{ContextId, FileId, MessageId, StoreId, ThreadId};

/// A user identity paired with its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithPubKey {
    pub user_id: String,
    pub pub_key: String,
}

impl UserWithPubKey {
    pub fn new(user_id: impl Into<String>, pub_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            pub_key: pub_key.into(),
        }
    }
}

/// Access policy attached to a container (thread or store).
///
/// Values are policy expressions interpreted by the backend; `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<String>,
}

/// Membership and metadata of a new container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub users: Vec<UserWithPubKey>,
    pub managers: Vec<UserWithPubKey>,
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    #[serde(default)]
    pub policy: Option<ContainerPolicy>,
}

/// Replacement membership and metadata for an existing container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUpdate {
    pub spec: ContainerSpec,
    /// Version the update is based on; rejected by the backend when stale unless `force`.
    pub version: i64,
    pub force: bool,
    pub force_generate_new_key: bool,
}

/// Body of a thread message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    pub data: Vec<u8>,
}

/// Metadata of a store file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
}

/// Opaque handle of a file opened for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(pub i64);

/// Sort direction of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Listing window.
///
/// The default query reads the first 100 items in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingQuery {
    pub skip: i64,
    pub limit: i64,
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
}

impl Default for PagingQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            sort_order: SortOrder::Ascending,
            last_id: None,
        }
    }
}

impl PagingQuery {
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }

    /// Query for the page following one that returned `received` items.
    pub fn next_page(&self, received: usize) -> Self {
        Self {
            skip: self.skip + received as i64,
            ..self.clone()
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingList<T> {
    pub total_available: i64,
    pub read_items: Vec<T>,
}

impl<T> PagingList<T> {
    /// True when items beyond this page exist.
    pub fn has_more(&self, query: &PagingQuery) -> bool {
        query.skip + (self.read_items.len() as i64) < self.total_available
    }
}

/// A context (tenant scope) visible to the connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub user_id: String,
    pub context_id: ContextId,
}

/// A thread container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub context_id: ContextId,
    pub thread_id: ThreadId,
    pub create_date: i64,
    pub creator: String,
    pub last_modification_date: i64,
    pub last_modifier: String,
    pub users: Vec<String>,
    pub managers: Vec<String>,
    pub version: i64,
    pub last_msg_date: i64,
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    pub messages_count: i64,
    pub status_code: i64,
}

/// A message inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub thread_id: ThreadId,
    pub message_id: MessageId,
    pub create_date: i64,
    pub author: String,
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    pub data: Vec<u8>,
    pub status_code: i64,
}

/// A store container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: StoreId,
    pub context_id: ContextId,
    pub create_date: i64,
    pub creator: String,
    pub last_modification_date: i64,
    pub last_file_date: i64,
    pub last_modifier: String,
    pub users: Vec<String>,
    pub managers: Vec<String>,
    pub version: i64,
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    pub files_count: i64,
    pub status_code: i64,
}

/// A file inside a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub store_id: StoreId,
    pub file_id: FileId,
    pub create_date: i64,
    pub author: String,
    pub public_meta: Vec<u8>,
    pub private_meta: Vec<u8>,
    pub size: i64,
    pub status_code: i64,
}
