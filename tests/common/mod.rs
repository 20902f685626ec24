//! In-memory endpoint used by the integration tests.
//!
//! `FakeConnection` keeps threads, messages, stores and files in memory and
//! publishes the matching events on `FakeQueue` for every channel that has an
//! active native subscription.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use endpoint_bridge::native::{
    Backend, ConnectionApi, ContainerSpec, ContainerUpdate, Context, CryptoApi, EventPayload,
    EventQueue, File, FileHandle, FileMeta, Message, MessageContent, NativeConnection, NativeEvent,
    NativeFault, NativeResult, PagingList, PagingQuery, SortOrder, Store, StoreApi, Thread,
    ThreadApi,
};
use endpoint_bridge::types::{ContextId, FileId, MessageId, StoreId, ThreadId};
use parking_lot::Mutex;

pub const CONNECTION_ID: i64 = 7;

fn not_found(what: &str, id: &str) -> NativeFault {
    NativeFault::new(0x00F0_0001, 2, format!("{what} {id} not found")).with_scope("fake")
}

// =============================================================================
// Event queue
// =============================================================================

pub struct FakeQueue {
    tx: Mutex<Sender<NativeEvent>>,
    rx: Mutex<Receiver<NativeEvent>>,
    pub breaks: AtomicUsize,
}

impl FakeQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
            breaks: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, event: NativeEvent) {
        let _ = self.tx.lock().send(event);
    }
}

impl EventQueue for FakeQueue {
    fn wait_event(&self) -> NativeResult<NativeEvent> {
        self.rx
            .lock()
            .recv()
            .map_err(|_| NativeFault::new(0x0001_0000, 1, "event queue closed"))
    }

    fn emit_break_event(&self) -> NativeResult<()> {
        self.breaks.fetch_add(1, Ordering::SeqCst);
        self.push(NativeEvent::lib_break());
        Ok(())
    }
}

// =============================================================================
// Connection
// =============================================================================

struct OpenFile {
    file_id: FileId,
    buffer: Vec<u8>,
    position: usize,
    writing: bool,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    threads: BTreeMap<ThreadId, Thread>,
    messages: BTreeMap<MessageId, Message>,
    stores: BTreeMap<StoreId, Store>,
    files: BTreeMap<FileId, File>,
    contents: HashMap<FileId, Vec<u8>>,
    handles: HashMap<i64, OpenFile>,
    subscriptions: HashSet<String>,
    calls: Vec<String>,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

fn page<T: Clone>(items: Vec<T>, query: &PagingQuery) -> PagingList<T> {
    let total = items.len() as i64;
    let mut items = items;
    if query.sort_order == SortOrder::Descending {
        items.reverse();
    }
    let read_items = items
        .into_iter()
        .skip(query.skip as usize)
        .take(query.limit as usize)
        .collect();
    PagingList {
        total_available: total,
        read_items,
    }
}

pub struct FakeConnection {
    state: Mutex<FakeState>,
    queue: Arc<FakeQueue>,
    pub subscribe_delay: Mutex<Option<Duration>>,
    /// Reject every `write_to_file` after this many have succeeded.
    pub fail_writes_after: Mutex<Option<usize>>,
}

impl FakeConnection {
    pub fn new(queue: Arc<FakeQueue>) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            queue,
            subscribe_delay: Mutex::new(None),
            fail_writes_after: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state.lock().subscriptions.contains(channel)
    }

    fn publish(&self, state: &FakeState, channel: String, payload: EventPayload) {
        if state.subscriptions.contains(&channel) {
            self.queue.push(NativeEvent::new(channel, CONNECTION_ID, payload));
        }
    }

    fn subscribe(&self, channel: String) -> NativeResult<()> {
        let delay = *self.subscribe_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.calls.push(format!("subscribe:{channel}"));
        if !state.subscriptions.insert(channel.clone()) {
            return Err(NativeFault::new(0x00A0_0001, 3, format!("already subscribed to {channel}")));
        }
        Ok(())
    }

    fn unsubscribe(&self, channel: String) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("unsubscribe:{channel}"));
        if !state.subscriptions.remove(&channel) {
            return Err(NativeFault::new(0x00A0_0002, 3, format!("not subscribed to {channel}")));
        }
        Ok(())
    }
}

impl ConnectionApi for FakeConnection {
    fn connection_id(&self) -> NativeResult<i64> {
        Ok(CONNECTION_ID)
    }

    fn list_contexts(&self, query: &PagingQuery) -> NativeResult<PagingList<Context>> {
        let contexts = vec![Context {
            user_id: "alice".to_string(),
            context_id: ContextId::from("ctx-1"),
        }];
        Ok(page(contexts, query))
    }

    fn disconnect(&self) -> NativeResult<()> {
        self.state.lock().calls.push("disconnect".to_string());
        Ok(())
    }
}

impl ThreadApi for FakeConnection {
    fn create_thread(&self, context_id: &ContextId, spec: &ContainerSpec) -> NativeResult<ThreadId> {
        let mut state = self.state.lock();
        let thread_id = ThreadId::from(state.next("thread").as_str());
        let thread = Thread {
            context_id: context_id.clone(),
            thread_id: thread_id.clone(),
            create_date: 1,
            creator: "alice".to_string(),
            last_modification_date: 1,
            last_modifier: "alice".to_string(),
            users: spec.users.iter().map(|u| u.user_id.clone()).collect(),
            managers: spec.managers.iter().map(|u| u.user_id.clone()).collect(),
            version: 1,
            last_msg_date: 0,
            public_meta: spec.public_meta.clone(),
            private_meta: spec.private_meta.clone(),
            messages_count: 0,
            status_code: 0,
        };
        state.threads.insert(thread_id.clone(), thread.clone());
        self.publish(&state, "threads".to_string(), EventPayload::ThreadCreated(thread));
        Ok(thread_id)
    }

    fn update_thread(&self, thread_id: &ThreadId, update: &ContainerUpdate) -> NativeResult<()> {
        let mut state = self.state.lock();
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| not_found("thread", thread_id.as_str()))?;
        if thread.version != update.version && !update.force {
            return Err(NativeFault::new(0x00F0_0002, 2, "stale version"));
        }
        thread.version += 1;
        thread.public_meta = update.spec.public_meta.clone();
        thread.private_meta = update.spec.private_meta.clone();
        let updated = thread.clone();
        self.publish(&state, "threads".to_string(), EventPayload::ThreadUpdated(updated));
        Ok(())
    }

    fn delete_thread(&self, thread_id: &ThreadId) -> NativeResult<()> {
        let mut state = self.state.lock();
        state
            .threads
            .remove(thread_id)
            .ok_or_else(|| not_found("thread", thread_id.as_str()))?;
        self.publish(
            &state,
            "threads".to_string(),
            EventPayload::ThreadDeleted {
                thread_id: thread_id.clone(),
            },
        );
        Ok(())
    }

    fn get_thread(&self, thread_id: &ThreadId) -> NativeResult<Thread> {
        self.state
            .lock()
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| not_found("thread", thread_id.as_str()))
    }

    fn list_threads(&self, context_id: &ContextId, query: &PagingQuery) -> NativeResult<PagingList<Thread>> {
        let state = self.state.lock();
        let threads = state
            .threads
            .values()
            .filter(|t| &t.context_id == context_id)
            .cloned()
            .collect();
        Ok(page(threads, query))
    }

    fn get_message(&self, message_id: &MessageId) -> NativeResult<Message> {
        self.state
            .lock()
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| not_found("message", message_id.as_str()))
    }

    fn list_messages(&self, thread_id: &ThreadId, query: &PagingQuery) -> NativeResult<PagingList<Message>> {
        let state = self.state.lock();
        let messages = state
            .messages
            .values()
            .filter(|m| &m.thread_id == thread_id)
            .cloned()
            .collect();
        Ok(page(messages, query))
    }

    fn send_message(&self, thread_id: &ThreadId, content: &MessageContent) -> NativeResult<MessageId> {
        let mut state = self.state.lock();
        if !state.threads.contains_key(thread_id) {
            return Err(not_found("thread", thread_id.as_str()));
        }
        let message_id = MessageId::from(state.next("message").as_str());
        let message = Message {
            thread_id: thread_id.clone(),
            message_id: message_id.clone(),
            create_date: 2,
            author: "alice".to_string(),
            public_meta: content.public_meta.clone(),
            private_meta: content.private_meta.clone(),
            data: content.data.clone(),
            status_code: 0,
        };
        state.messages.insert(message_id.clone(), message.clone());
        if let Some(thread) = state.threads.get_mut(thread_id) {
            thread.messages_count += 1;
        }
        self.publish(
            &state,
            format!("{thread_id}/messages"),
            EventPayload::ThreadNewMessage(message),
        );
        Ok(message_id)
    }

    fn update_message(&self, message_id: &MessageId, content: &MessageContent) -> NativeResult<()> {
        let mut state = self.state.lock();
        let message = state
            .messages
            .get_mut(message_id)
            .ok_or_else(|| not_found("message", message_id.as_str()))?;
        message.data = content.data.clone();
        message.public_meta = content.public_meta.clone();
        message.private_meta = content.private_meta.clone();
        let updated = message.clone();
        self.publish(
            &state,
            format!("{}/messages", updated.thread_id),
            EventPayload::ThreadMessageUpdated(updated),
        );
        Ok(())
    }

    fn delete_message(&self, message_id: &MessageId) -> NativeResult<()> {
        let mut state = self.state.lock();
        let message = state
            .messages
            .remove(message_id)
            .ok_or_else(|| not_found("message", message_id.as_str()))?;
        self.publish(
            &state,
            format!("{}/messages", message.thread_id),
            EventPayload::ThreadMessageDeleted {
                thread_id: message.thread_id.clone(),
                message_id: message_id.clone(),
            },
        );
        Ok(())
    }

    fn subscribe_for_thread_events(&self) -> NativeResult<()> {
        self.subscribe("threads".to_string())
    }

    fn unsubscribe_from_thread_events(&self) -> NativeResult<()> {
        self.unsubscribe("threads".to_string())
    }

    fn subscribe_for_message_events(&self, thread_id: &ThreadId) -> NativeResult<()> {
        self.subscribe(format!("{thread_id}/messages"))
    }

    fn unsubscribe_from_message_events(&self, thread_id: &ThreadId) -> NativeResult<()> {
        self.unsubscribe(format!("{thread_id}/messages"))
    }
}

impl StoreApi for FakeConnection {
    fn create_store(&self, context_id: &ContextId, spec: &ContainerSpec) -> NativeResult<StoreId> {
        let mut state = self.state.lock();
        let store_id = StoreId::from(state.next("store").as_str());
        let store = Store {
            store_id: store_id.clone(),
            context_id: context_id.clone(),
            create_date: 1,
            creator: "alice".to_string(),
            last_modification_date: 1,
            last_file_date: 0,
            last_modifier: "alice".to_string(),
            users: spec.users.iter().map(|u| u.user_id.clone()).collect(),
            managers: spec.managers.iter().map(|u| u.user_id.clone()).collect(),
            version: 1,
            public_meta: spec.public_meta.clone(),
            private_meta: spec.private_meta.clone(),
            files_count: 0,
            status_code: 0,
        };
        state.stores.insert(store_id.clone(), store.clone());
        self.publish(&state, "stores".to_string(), EventPayload::StoreCreated(store));
        Ok(store_id)
    }

    fn update_store(&self, store_id: &StoreId, update: &ContainerUpdate) -> NativeResult<()> {
        let mut state = self.state.lock();
        let store = state
            .stores
            .get_mut(store_id)
            .ok_or_else(|| not_found("store", store_id.as_str()))?;
        store.version += 1;
        store.public_meta = update.spec.public_meta.clone();
        let updated = store.clone();
        self.publish(&state, "stores".to_string(), EventPayload::StoreUpdated(updated));
        Ok(())
    }

    fn delete_store(&self, store_id: &StoreId) -> NativeResult<()> {
        let mut state = self.state.lock();
        state
            .stores
            .remove(store_id)
            .ok_or_else(|| not_found("store", store_id.as_str()))?;
        self.publish(
            &state,
            "stores".to_string(),
            EventPayload::StoreDeleted {
                store_id: store_id.clone(),
            },
        );
        Ok(())
    }

    fn get_store(&self, store_id: &StoreId) -> NativeResult<Store> {
        self.state
            .lock()
            .stores
            .get(store_id)
            .cloned()
            .ok_or_else(|| not_found("store", store_id.as_str()))
    }

    fn list_stores(&self, context_id: &ContextId, query: &PagingQuery) -> NativeResult<PagingList<Store>> {
        let state = self.state.lock();
        let stores = state
            .stores
            .values()
            .filter(|s| &s.context_id == context_id)
            .cloned()
            .collect();
        Ok(page(stores, query))
    }

    fn create_file(&self, store_id: &StoreId, meta: &FileMeta, size: i64) -> NativeResult<FileHandle> {
        let mut state = self.state.lock();
        if !state.stores.contains_key(store_id) {
            return Err(not_found("store", store_id.as_str()));
        }
        let file_id = FileId::from(state.next("file").as_str());
        state.files.insert(
            file_id.clone(),
            File {
                store_id: store_id.clone(),
                file_id: file_id.clone(),
                create_date: 3,
                author: "alice".to_string(),
                public_meta: meta.public_meta.clone(),
                private_meta: meta.private_meta.clone(),
                size,
                status_code: 0,
            },
        );
        state.next_id += 1;
        let handle = state.next_id as i64;
        state.handles.insert(
            handle,
            OpenFile {
                file_id,
                buffer: Vec::with_capacity(size as usize),
                position: 0,
                writing: true,
            },
        );
        Ok(FileHandle(handle))
    }

    fn update_file(&self, file_id: &FileId, meta: &FileMeta, size: i64) -> NativeResult<FileHandle> {
        let mut state = self.state.lock();
        let file = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| not_found("file", file_id.as_str()))?;
        file.public_meta = meta.public_meta.clone();
        file.private_meta = meta.private_meta.clone();
        file.size = size;
        state.next_id += 1;
        let handle = state.next_id as i64;
        state.handles.insert(
            handle,
            OpenFile {
                file_id: file_id.clone(),
                buffer: Vec::new(),
                position: 0,
                writing: true,
            },
        );
        Ok(FileHandle(handle))
    }

    fn update_file_meta(&self, file_id: &FileId, meta: &FileMeta) -> NativeResult<()> {
        let mut state = self.state.lock();
        let file = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| not_found("file", file_id.as_str()))?;
        file.public_meta = meta.public_meta.clone();
        file.private_meta = meta.private_meta.clone();
        Ok(())
    }

    fn write_to_file(&self, handle: FileHandle, chunk: &[u8]) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.calls.push("write_to_file".to_string());
        let writes = state.calls.iter().filter(|c| c.as_str() == "write_to_file").count();
        let limit = *self.fail_writes_after.lock();
        if limit.is_some_and(|limit| writes > limit) {
            return Err(NativeFault::new(0x00F0_0003, 2, "write rejected").with_scope("fake"));
        }
        let open = state
            .handles
            .get_mut(&handle.0)
            .filter(|open| open.writing)
            .ok_or_else(|| not_found("write handle", &handle.0.to_string()))?;
        open.buffer.extend_from_slice(chunk);
        Ok(())
    }

    fn delete_file(&self, file_id: &FileId) -> NativeResult<()> {
        let mut state = self.state.lock();
        let file = state
            .files
            .remove(file_id)
            .ok_or_else(|| not_found("file", file_id.as_str()))?;
        state.contents.remove(file_id);
        self.publish(
            &state,
            format!("{}/files", file.store_id),
            EventPayload::StoreFileDeleted {
                store_id: file.store_id.clone(),
                file_id: file_id.clone(),
            },
        );
        Ok(())
    }

    fn get_file(&self, file_id: &FileId) -> NativeResult<File> {
        self.state
            .lock()
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found("file", file_id.as_str()))
    }

    fn list_files(&self, store_id: &StoreId, query: &PagingQuery) -> NativeResult<PagingList<File>> {
        let state = self.state.lock();
        let files = state
            .files
            .values()
            .filter(|f| &f.store_id == store_id)
            .cloned()
            .collect();
        Ok(page(files, query))
    }

    fn open_file(&self, file_id: &FileId) -> NativeResult<FileHandle> {
        let mut state = self.state.lock();
        let buffer = state
            .contents
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found("file", file_id.as_str()))?;
        state.next_id += 1;
        let handle = state.next_id as i64;
        state.handles.insert(
            handle,
            OpenFile {
                file_id: file_id.clone(),
                buffer,
                position: 0,
                writing: false,
            },
        );
        Ok(FileHandle(handle))
    }

    fn read_from_file(&self, handle: FileHandle, length: i64) -> NativeResult<Vec<u8>> {
        let mut state = self.state.lock();
        let open = state
            .handles
            .get_mut(&handle.0)
            .ok_or_else(|| not_found("read handle", &handle.0.to_string()))?;
        let end = (open.position + length as usize).min(open.buffer.len());
        let chunk = open.buffer[open.position..end].to_vec();
        open.position = end;
        Ok(chunk)
    }

    fn seek_in_file(&self, handle: FileHandle, position: i64) -> NativeResult<()> {
        let mut state = self.state.lock();
        let open = state
            .handles
            .get_mut(&handle.0)
            .ok_or_else(|| not_found("read handle", &handle.0.to_string()))?;
        open.position = (position as usize).min(open.buffer.len());
        Ok(())
    }

    fn close_file(&self, handle: FileHandle) -> NativeResult<FileId> {
        let mut state = self.state.lock();
        state.calls.push("close_file".to_string());
        let open = state
            .handles
            .remove(&handle.0)
            .ok_or_else(|| not_found("handle", &handle.0.to_string()))?;
        if open.writing {
            state.contents.insert(open.file_id.clone(), open.buffer);
            if let Some(file) = state.files.get(&open.file_id).cloned() {
                self.publish(
                    &state,
                    format!("{}/files", file.store_id),
                    EventPayload::StoreFileCreated(file),
                );
            }
        }
        Ok(open.file_id)
    }

    fn subscribe_for_store_events(&self) -> NativeResult<()> {
        self.subscribe("stores".to_string())
    }

    fn unsubscribe_from_store_events(&self) -> NativeResult<()> {
        self.unsubscribe("stores".to_string())
    }

    fn subscribe_for_file_events(&self, store_id: &StoreId) -> NativeResult<()> {
        self.subscribe(format!("{store_id}/files"))
    }

    fn unsubscribe_from_file_events(&self, store_id: &StoreId) -> NativeResult<()> {
        self.unsubscribe(format!("{store_id}/files"))
    }
}

// =============================================================================
// Backend
// =============================================================================

pub struct FakeCrypto;

impl CryptoApi for FakeCrypto {
    fn sign_data(&self, data: &[u8], private_key: &str) -> NativeResult<Vec<u8>> {
        Ok([private_key.as_bytes(), data].concat())
    }

    fn derive_private_key(&self, password: &str, salt: &str) -> NativeResult<String> {
        Ok(format!("L{}{}", salt.len(), password))
    }

    fn derive_public_key(&self, private_key: &str) -> NativeResult<String> {
        if private_key.starts_with('L') {
            Ok(format!("pub{}", &private_key[1..]))
        } else {
            Err(NativeFault::new(0x0070_0002, 7, "malformed private key"))
        }
    }
}

pub struct FakeBackend {
    pub queue: Arc<FakeQueue>,
    pub connection: Arc<FakeConnection>,
    pub certs_path: Mutex<Option<PathBuf>>,
    pub connects: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let queue = Arc::new(FakeQueue::new());
        Arc::new(Self {
            connection: Arc::new(FakeConnection::new(queue.clone())),
            queue,
            certs_path: Mutex::new(None),
            connects: AtomicUsize::new(0),
        })
    }
}

impl Backend for FakeBackend {
    fn set_certs_path(&self, path: &Path) -> NativeResult<()> {
        *self.certs_path.lock() = Some(path.to_path_buf());
        Ok(())
    }

    fn platform_connect(
        &self,
        private_key: &str,
        _solution_id: &str,
        platform_url: &str,
    ) -> NativeResult<Arc<dyn NativeConnection>> {
        if !platform_url.starts_with("https://") {
            return Err(NativeFault::new(0x0002_0001, 2, "platform unreachable"));
        }
        self.derive_check(private_key)?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }

    fn platform_connect_public(
        &self,
        _solution_id: &str,
        platform_url: &str,
    ) -> NativeResult<Arc<dyn NativeConnection>> {
        if !platform_url.starts_with("https://") {
            return Err(NativeFault::new(0x0002_0001, 2, "platform unreachable"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }

    fn event_queue(&self) -> Arc<dyn EventQueue> {
        self.queue.clone()
    }

    fn crypto(&self) -> Arc<dyn CryptoApi> {
        Arc::new(FakeCrypto)
    }
}

impl FakeBackend {
    fn derive_check(&self, private_key: &str) -> NativeResult<()> {
        FakeCrypto.derive_public_key(private_key).map(|_| ())
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
