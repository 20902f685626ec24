//! Store and file operations.
//!
//! Files are written and read through handles: `create_file`/`update_file`
//! and `open_file` return a [`FileHandle`] that stays valid until
//! `close_file`.

use super::connection::ConnectionSession;
use crate::native::{
    ContainerSpec, ContainerUpdate, File, FileHandle, FileMeta, PagingList, PagingQuery, Store,
};
use crate::runtime::CancelSignal;
use crate::types::{ContextId, FileId, Result, StoreId};

impl ConnectionSession {
    pub async fn create_store(
        &self,
        context_id: &ContextId,
        spec: &ContainerSpec,
        cancel: Option<&CancelSignal>,
    ) -> Result<StoreId> {
        let context_id = context_id.clone();
        let spec = spec.clone();
        self.call("stores.create", cancel, move |c| c.create_store(&context_id, &spec))
            .await
    }

    pub async fn update_store(
        &self,
        store_id: &StoreId,
        update: &ContainerUpdate,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        let store_id = store_id.clone();
        let update = update.clone();
        self.call("stores.update", cancel, move |c| c.update_store(&store_id, &update))
            .await
    }

    pub async fn delete_store(&self, store_id: &StoreId, cancel: Option<&CancelSignal>) -> Result<()> {
        let store_id = store_id.clone();
        self.call("stores.delete", cancel, move |c| c.delete_store(&store_id)).await
    }

    pub async fn get_store(&self, store_id: &StoreId, cancel: Option<&CancelSignal>) -> Result<Store> {
        let store_id = store_id.clone();
        self.call("stores.get", cancel, move |c| c.get_store(&store_id)).await
    }

    pub async fn list_stores(
        &self,
        context_id: &ContextId,
        query: &PagingQuery,
        cancel: Option<&CancelSignal>,
    ) -> Result<PagingList<Store>> {
        let context_id = context_id.clone();
        let query = query.clone();
        self.call("stores.list", cancel, move |c| c.list_stores(&context_id, &query))
            .await
    }

    /// Start writing a new file of `size` bytes.
    pub async fn create_file(
        &self,
        store_id: &StoreId,
        meta: &FileMeta,
        size: i64,
        cancel: Option<&CancelSignal>,
    ) -> Result<FileHandle> {
        let store_id = store_id.clone();
        let meta = meta.clone();
        self.call("stores.create_file", cancel, move |c| {
            c.create_file(&store_id, &meta, size)
        })
        .await
    }

    /// Start overwriting an existing file with `size` bytes of new content.
    pub async fn update_file(
        &self,
        file_id: &FileId,
        meta: &FileMeta,
        size: i64,
        cancel: Option<&CancelSignal>,
    ) -> Result<FileHandle> {
        let file_id = file_id.clone();
        let meta = meta.clone();
        self.call("stores.update_file", cancel, move |c| {
            c.update_file(&file_id, &meta, size)
        })
        .await
    }

    pub async fn update_file_meta(
        &self,
        file_id: &FileId,
        meta: &FileMeta,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        let file_id = file_id.clone();
        let meta = meta.clone();
        self.call("stores.update_file_meta", cancel, move |c| {
            c.update_file_meta(&file_id, &meta)
        })
        .await
    }

    pub async fn write_to_file(
        &self,
        handle: FileHandle,
        chunk: &[u8],
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        let chunk = chunk.to_vec();
        self.call("stores.write_to_file", cancel, move |c| c.write_to_file(handle, &chunk))
            .await
    }

    pub async fn delete_file(&self, file_id: &FileId, cancel: Option<&CancelSignal>) -> Result<()> {
        let file_id = file_id.clone();
        self.call("stores.delete_file", cancel, move |c| c.delete_file(&file_id)).await
    }

    pub async fn get_file(&self, file_id: &FileId, cancel: Option<&CancelSignal>) -> Result<File> {
        let file_id = file_id.clone();
        self.call("stores.get_file", cancel, move |c| c.get_file(&file_id)).await
    }

    pub async fn list_files(
        &self,
        store_id: &StoreId,
        query: &PagingQuery,
        cancel: Option<&CancelSignal>,
    ) -> Result<PagingList<File>> {
        let store_id = store_id.clone();
        let query = query.clone();
        self.call("stores.list_files", cancel, move |c| c.list_files(&store_id, &query))
            .await
    }

    pub async fn open_file(&self, file_id: &FileId, cancel: Option<&CancelSignal>) -> Result<FileHandle> {
        let file_id = file_id.clone();
        self.call("stores.open_file", cancel, move |c| c.open_file(&file_id)).await
    }

    pub async fn read_from_file(
        &self,
        handle: FileHandle,
        length: i64,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<u8>> {
        self.call("stores.read_from_file", cancel, move |c| c.read_from_file(handle, length))
            .await
    }

    pub async fn seek_in_file(
        &self,
        handle: FileHandle,
        position: i64,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        self.call("stores.seek_in_file", cancel, move |c| c.seek_in_file(handle, position))
            .await
    }

    pub async fn close_file(&self, handle: FileHandle, cancel: Option<&CancelSignal>) -> Result<FileId> {
        self.call("stores.close_file", cancel, move |c| c.close_file(handle)).await
    }

    /// Write `data` into a new file in chunks of at most `chunk_size` bytes.
    ///
    /// The handle is closed even when a chunk fails; the first error wins.
    pub async fn upload_file(
        &self,
        store_id: &StoreId,
        meta: &FileMeta,
        data: &[u8],
        chunk_size: usize,
        cancel: Option<&CancelSignal>,
    ) -> Result<FileId> {
        if chunk_size == 0 {
            return Err(crate::types::Error::validation("chunk_size must be positive"));
        }
        let handle = self
            .create_file(store_id, meta, data.len() as i64, cancel)
            .await?;

        let mut written = Ok(());
        for chunk in data.chunks(chunk_size) {
            written = self.write_to_file(handle, chunk, cancel).await;
            if written.is_err() {
                break;
            }
        }

        let closed = self.close_file(handle, None).await;
        written?;
        closed
    }
}
