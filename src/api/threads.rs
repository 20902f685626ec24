//! Thread and message operations.

use super::connection::ConnectionSession;
use crate::native::{
    ContainerSpec, ContainerUpdate, Message, MessageContent, PagingList, PagingQuery, Thread,
};
use crate::runtime::CancelSignal;
use crate::types::{ContextId, MessageId, Result, ThreadId};

impl ConnectionSession {
    pub async fn create_thread(
        &self,
        context_id: &ContextId,
        spec: &ContainerSpec,
        cancel: Option<&CancelSignal>,
    ) -> Result<ThreadId> {
        let context_id = context_id.clone();
        let spec = spec.clone();
        self.call("threads.create", cancel, move |c| c.create_thread(&context_id, &spec))
            .await
    }

    pub async fn update_thread(
        &self,
        thread_id: &ThreadId,
        update: &ContainerUpdate,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        let thread_id = thread_id.clone();
        let update = update.clone();
        self.call("threads.update", cancel, move |c| c.update_thread(&thread_id, &update))
            .await
    }

    pub async fn delete_thread(&self, thread_id: &ThreadId, cancel: Option<&CancelSignal>) -> Result<()> {
        let thread_id = thread_id.clone();
        self.call("threads.delete", cancel, move |c| c.delete_thread(&thread_id))
            .await
    }

    pub async fn get_thread(&self, thread_id: &ThreadId, cancel: Option<&CancelSignal>) -> Result<Thread> {
        let thread_id = thread_id.clone();
        self.call("threads.get", cancel, move |c| c.get_thread(&thread_id)).await
    }

    pub async fn list_threads(
        &self,
        context_id: &ContextId,
        query: &PagingQuery,
        cancel: Option<&CancelSignal>,
    ) -> Result<PagingList<Thread>> {
        let context_id = context_id.clone();
        let query = query.clone();
        self.call("threads.list", cancel, move |c| c.list_threads(&context_id, &query))
            .await
    }

    pub async fn get_message(&self, message_id: &MessageId, cancel: Option<&CancelSignal>) -> Result<Message> {
        let message_id = message_id.clone();
        self.call("threads.get_message", cancel, move |c| c.get_message(&message_id))
            .await
    }

    pub async fn list_messages(
        &self,
        thread_id: &ThreadId,
        query: &PagingQuery,
        cancel: Option<&CancelSignal>,
    ) -> Result<PagingList<Message>> {
        let thread_id = thread_id.clone();
        let query = query.clone();
        self.call("threads.list_messages", cancel, move |c| {
            c.list_messages(&thread_id, &query)
        })
        .await
    }

    pub async fn send_message(
        &self,
        thread_id: &ThreadId,
        content: &MessageContent,
        cancel: Option<&CancelSignal>,
    ) -> Result<MessageId> {
        let thread_id = thread_id.clone();
        let content = content.clone();
        self.call("threads.send_message", cancel, move |c| {
            c.send_message(&thread_id, &content)
        })
        .await
    }

    pub async fn update_message(
        &self,
        message_id: &MessageId,
        content: &MessageContent,
        cancel: Option<&CancelSignal>,
    ) -> Result<()> {
        let message_id = message_id.clone();
        let content = content.clone();
        self.call("threads.update_message", cancel, move |c| {
            c.update_message(&message_id, &content)
        })
        .await
    }

    pub async fn delete_message(&self, message_id: &MessageId, cancel: Option<&CancelSignal>) -> Result<()> {
        let message_id = message_id.clone();
        self.call("threads.delete_message", cancel, move |c| c.delete_message(&message_id))
            .await
    }
}
