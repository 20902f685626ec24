//! In-memory native doubles for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use parking_lot::Mutex;

use super::*;

fn unsupported(op: &str) -> NativeFault {
    NativeFault::new(0x0000_FFFF, 0, format!("{op} is not supported by the test connection"))
}

/// Connection that records subscribe/unsubscribe calls and fails everything else.
#[derive(Default)]
pub(crate) struct RecordingConnection {
    calls: Mutex<Vec<String>>,
    in_effect: AtomicUsize,
    overlapped: AtomicBool,
    pub(crate) fail_subscribe: AtomicBool,
    pub(crate) fail_unsubscribe: AtomicBool,
    pub(crate) effect_delay: Mutex<Option<Duration>>,
}

impl RecordingConnection {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// True if two subscription effects ever ran at the same time.
    pub(crate) fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn effect(&self, call: String, fail: &AtomicBool) -> NativeResult<()> {
        if self.in_effect.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let delay = *self.effect_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.calls.lock().push(call.clone());
        self.in_effect.fetch_sub(1, Ordering::SeqCst);
        if fail.load(Ordering::SeqCst) {
            Err(NativeFault::new(0x0007_0001, 7, format!("{call} rejected")))
        } else {
            Ok(())
        }
    }
}

impl ConnectionApi for RecordingConnection {
    fn connection_id(&self) -> NativeResult<i64> {
        Ok(1)
    }
    fn list_contexts(&self, _query: &PagingQuery) -> NativeResult<PagingList<Context>> {
        Err(unsupported("list_contexts"))
    }
    fn disconnect(&self) -> NativeResult<()> {
        self.calls.lock().push("disconnect".to_string());
        Ok(())
    }
}

impl ThreadApi for RecordingConnection {
    fn create_thread(&self, _c: &ContextId, _s: &ContainerSpec) -> NativeResult<ThreadId> {
        Err(unsupported("create_thread"))
    }
    fn update_thread(&self, _t: &ThreadId, _u: &ContainerUpdate) -> NativeResult<()> {
        Err(unsupported("update_thread"))
    }
    fn delete_thread(&self, _t: &ThreadId) -> NativeResult<()> {
        Err(unsupported("delete_thread"))
    }
    fn get_thread(&self, _t: &ThreadId) -> NativeResult<Thread> {
        Err(unsupported("get_thread"))
    }
    fn list_threads(&self, _c: &ContextId, _q: &PagingQuery) -> NativeResult<PagingList<Thread>> {
        Err(unsupported("list_threads"))
    }
    fn get_message(&self, _m: &MessageId) -> NativeResult<Message> {
        Err(unsupported("get_message"))
    }
    fn list_messages(&self, _t: &ThreadId, _q: &PagingQuery) -> NativeResult<PagingList<Message>> {
        Err(unsupported("list_messages"))
    }
    fn send_message(&self, _t: &ThreadId, _c: &MessageContent) -> NativeResult<MessageId> {
        Err(unsupported("send_message"))
    }
    fn update_message(&self, _m: &MessageId, _c: &MessageContent) -> NativeResult<()> {
        Err(unsupported("update_message"))
    }
    fn delete_message(&self, _m: &MessageId) -> NativeResult<()> {
        Err(unsupported("delete_message"))
    }
    fn subscribe_for_thread_events(&self) -> NativeResult<()> {
        self.effect("subscribe:threads".to_string(), &self.fail_subscribe)
    }
    fn unsubscribe_from_thread_events(&self) -> NativeResult<()> {
        self.effect("unsubscribe:threads".to_string(), &self.fail_unsubscribe)
    }
    fn subscribe_for_message_events(&self, thread_id: &ThreadId) -> NativeResult<()> {
        self.effect(format!("subscribe:{thread_id}/messages"), &self.fail_subscribe)
    }
    fn unsubscribe_from_message_events(&self, thread_id: &ThreadId) -> NativeResult<()> {
        self.effect(format!("unsubscribe:{thread_id}/messages"), &self.fail_unsubscribe)
    }
}

impl StoreApi for RecordingConnection {
    fn create_store(&self, _c: &ContextId, _s: &ContainerSpec) -> NativeResult<StoreId> {
        Err(unsupported("create_store"))
    }
    fn update_store(&self, _s: &StoreId, _u: &ContainerUpdate) -> NativeResult<()> {
        Err(unsupported("update_store"))
    }
    fn delete_store(&self, _s: &StoreId) -> NativeResult<()> {
        Err(unsupported("delete_store"))
    }
    fn get_store(&self, _s: &StoreId) -> NativeResult<Store> {
        Err(unsupported("get_store"))
    }
    fn list_stores(&self, _c: &ContextId, _q: &PagingQuery) -> NativeResult<PagingList<Store>> {
        Err(unsupported("list_stores"))
    }
    fn create_file(&self, _s: &StoreId, _m: &FileMeta, _size: i64) -> NativeResult<FileHandle> {
        Err(unsupported("create_file"))
    }
    fn update_file(&self, _f: &FileId, _m: &FileMeta, _size: i64) -> NativeResult<FileHandle> {
        Err(unsupported("update_file"))
    }
    fn update_file_meta(&self, _f: &FileId, _m: &FileMeta) -> NativeResult<()> {
        Err(unsupported("update_file_meta"))
    }
    fn write_to_file(&self, _h: FileHandle, _chunk: &[u8]) -> NativeResult<()> {
        Err(unsupported("write_to_file"))
    }
    fn delete_file(&self, _f: &FileId) -> NativeResult<()> {
        Err(unsupported("delete_file"))
    }
    fn get_file(&self, _f: &FileId) -> NativeResult<File> {
        Err(unsupported("get_file"))
    }
    fn list_files(&self, _s: &StoreId, _q: &PagingQuery) -> NativeResult<PagingList<File>> {
        Err(unsupported("list_files"))
    }
    fn open_file(&self, _f: &FileId) -> NativeResult<FileHandle> {
        Err(unsupported("open_file"))
    }
    fn read_from_file(&self, _h: FileHandle, _length: i64) -> NativeResult<Vec<u8>> {
        Err(unsupported("read_from_file"))
    }
    fn seek_in_file(&self, _h: FileHandle, _position: i64) -> NativeResult<()> {
        Err(unsupported("seek_in_file"))
    }
    fn close_file(&self, _h: FileHandle) -> NativeResult<FileId> {
        Err(unsupported("close_file"))
    }
    fn subscribe_for_store_events(&self) -> NativeResult<()> {
        self.effect("subscribe:stores".to_string(), &self.fail_subscribe)
    }
    fn unsubscribe_from_store_events(&self) -> NativeResult<()> {
        self.effect("unsubscribe:stores".to_string(), &self.fail_unsubscribe)
    }
    fn subscribe_for_file_events(&self, store_id: &StoreId) -> NativeResult<()> {
        self.effect(format!("subscribe:{store_id}/files"), &self.fail_subscribe)
    }
    fn unsubscribe_from_file_events(&self, store_id: &StoreId) -> NativeResult<()> {
        self.effect(format!("unsubscribe:{store_id}/files"), &self.fail_unsubscribe)
    }
}

/// Serial queue fed from the test through [`ChannelQueue::push`].
pub(crate) struct ChannelQueue {
    tx: Mutex<Sender<NativeEvent>>,
    rx: Mutex<Receiver<NativeEvent>>,
    pub(crate) breaks: AtomicUsize,
}

impl ChannelQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
            breaks: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(&self, event: NativeEvent) {
        let _ = self.tx.lock().send(event);
    }
}

impl EventQueue for ChannelQueue {
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

/// Crypto double: the public key of `k` is `pub:k`; an empty key is a fault.
pub(crate) struct EchoCrypto;

impl CryptoApi for EchoCrypto {
    fn sign_data(&self, data: &[u8], private_key: &str) -> NativeResult<Vec<u8>> {
        let mut signed = private_key.as_bytes().to_vec();
        signed.extend_from_slice(data);
        Ok(signed)
    }
    fn derive_private_key(&self, password: &str, salt: &str) -> NativeResult<String> {
        Ok(format!("{salt}:{password}"))
    }
    fn derive_public_key(&self, private_key: &str) -> NativeResult<String> {
        if private_key.starts_with("invalid") {
            return Err(NativeFault::new(0x0070_0002, 7, "malformed private key"));
        }
        Ok(format!("pub:{private_key}"))
    }
}

/// Backend handing out one shared [`RecordingConnection`] and [`ChannelQueue`].
pub(crate) struct TestBackend {
    pub(crate) connection: Arc<RecordingConnection>,
    pub(crate) queue: Arc<ChannelQueue>,
    pub(crate) fail_connect: AtomicBool,
    pub(crate) connect_delay: Mutex<Option<Duration>>,
    pub(crate) connects: AtomicUsize,
    pub(crate) certs_path: Mutex<Option<std::path::PathBuf>>,
}

impl TestBackend {
    pub(crate) fn new() -> Self {
        Self {
            connection: Arc::new(RecordingConnection::default()),
            queue: Arc::new(ChannelQueue::new()),
            fail_connect: AtomicBool::new(false),
            connect_delay: Mutex::new(None),
            connects: AtomicUsize::new(0),
            certs_path: Mutex::new(None),
        }
    }

    fn connect(&self) -> NativeResult<Arc<dyn NativeConnection>> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(NativeFault::new(0x0002_0001, 2, "platform unreachable"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

impl Backend for TestBackend {
    fn set_certs_path(&self, path: &Path) -> NativeResult<()> {
        *self.certs_path.lock() = Some(path.to_path_buf());
        Ok(())
    }
    fn platform_connect(&self, _key: &str, _solution: &str, _url: &str) -> NativeResult<Arc<dyn NativeConnection>> {
        self.connect()
    }
    fn platform_connect_public(&self, _solution: &str, _url: &str) -> NativeResult<Arc<dyn NativeConnection>> {
        self.connect()
    }
    fn event_queue(&self) -> Arc<dyn EventQueue> {
        self.queue.clone()
    }
    fn crypto(&self) -> Arc<dyn CryptoApi> {
        Arc::new(EchoCrypto)
    }
}
