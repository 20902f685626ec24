//! Connection-scoped async API.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dispatch::EventDispatcher;
use crate::native::{Backend, Context, EventQueue, NativeConnection, NativeResult, PagingList, PagingQuery};
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::{DispatcherConfig, Error, Result, SessionId, SolutionId};

/// Credentials of a user connecting to a platform solution.
#[derive(Clone)]
pub struct PlatformCredentials {
    pub platform_url: String,
    pub solution_id: SolutionId,
    pub private_key: String,
}

impl PlatformCredentials {
    pub fn new(
        platform_url: impl Into<String>,
        solution_id: SolutionId,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            platform_url: platform_url.into(),
            solution_id,
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("platform_url", &self.platform_url)
            .field("solution_id", &self.solution_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// One live connection together with its event dispatcher.
///
/// Every native operation is exposed as an async method taking an optional
/// [`CancelSignal`]; the blocking call runs on the worker's blocking pool.
/// Operations fail with [`Error::Disposed`] after [`close`](Self::close).
pub struct ConnectionSession {
    id: SessionId,
    connection: Arc<dyn NativeConnection>,
    worker: WorkerContext,
    dispatcher: EventDispatcher,
    public: bool,
    connected_at: DateTime<Utc>,
    closed: AtomicBool,
}

impl ConnectionSession {
    /// Connect as the user identified by `credentials`.
    pub async fn connect(
        backend: Arc<dyn Backend>,
        worker: WorkerContext,
        config: DispatcherConfig,
        credentials: &PlatformCredentials,
        cancel: Option<&CancelSignal>,
    ) -> Result<Self> {
        let connector = backend.clone();
        let private_key = credentials.private_key.clone();
        let solution_id = credentials.solution_id.clone();
        let platform_url = credentials.platform_url.clone();
        let connection = worker
            .run_blocking(
                "connection.connect",
                move || connector.platform_connect(&private_key, solution_id.as_str(), &platform_url),
                cancel,
            )
            .await?;

        let session = Self::attach(connection, backend.event_queue(), worker, config, false);
        tracing::info!(
            "connection_established: session_id={}, solution_id={}",
            session.id,
            credentials.solution_id
        );
        Ok(session)
    }

    /// Connect as a guest.
    pub async fn connect_public(
        backend: Arc<dyn Backend>,
        worker: WorkerContext,
        config: DispatcherConfig,
        platform_url: &str,
        solution_id: &SolutionId,
        cancel: Option<&CancelSignal>,
    ) -> Result<Self> {
        let connector = backend.clone();
        let url = platform_url.to_string();
        let solution = solution_id.clone();
        let connection = worker
            .run_blocking(
                "connection.connect_public",
                move || connector.platform_connect_public(solution.as_str(), &url),
                cancel,
            )
            .await?;

        let session = Self::attach(connection, backend.event_queue(), worker, config, true);
        tracing::info!(
            "connection_established: session_id={}, solution_id={}, public=true",
            session.id,
            solution_id
        );
        Ok(session)
    }

    /// Wrap an established connection and start its dispatcher.
    pub fn attach(
        connection: Arc<dyn NativeConnection>,
        queue: Arc<dyn EventQueue>,
        worker: WorkerContext,
        config: DispatcherConfig,
        public: bool,
    ) -> Self {
        let dispatcher = EventDispatcher::start(connection.clone(), queue, worker.clone(), config);
        Self {
            id: SessionId::new(),
            connection,
            worker,
            dispatcher,
            public,
            connected_at: Utc::now(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// When the connection was attached.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn worker(&self) -> &WorkerContext {
        &self.worker
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<T, F>(
        &self,
        operation: &str,
        cancel: Option<&CancelSignal>,
        f: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn NativeConnection) -> NativeResult<T> + Send + 'static,
    {
        if self.is_closed() {
            return Err(Error::Disposed("connection session"));
        }
        let connection = self.connection.clone();
        self.worker
            .run_blocking(operation, move || f(connection.as_ref()), cancel)
            .await
    }

    pub async fn connection_id(&self, cancel: Option<&CancelSignal>) -> Result<i64> {
        self.call("connection.id", cancel, |c| c.connection_id()).await
    }

    pub async fn list_contexts(
        &self,
        query: &PagingQuery,
        cancel: Option<&CancelSignal>,
    ) -> Result<PagingList<Context>> {
        let query = query.clone();
        self.call("connection.list_contexts", cancel, move |c| c.list_contexts(&query))
            .await
    }

    /// Issue the native disconnect without tearing down the dispatcher.
    pub async fn disconnect(&self, cancel: Option<&CancelSignal>) -> Result<()> {
        self.call("connection.disconnect", cancel, |c| c.disconnect()).await
    }

    /// Shut down the dispatcher, then disconnect.
    ///
    /// A disconnect fault is logged, not returned. The result is the event
    /// pump's. Later calls return `Ok`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let pump_result = self.dispatcher.shutdown().await;

        let connection = self.connection.clone();
        if let Err(e) = self
            .worker
            .run_blocking("connection.disconnect", move || connection.disconnect(), None)
            .await
        {
            tracing::warn!("connection_disconnect_failed: session_id={}, error={}", self.id, e);
        }
        tracing::info!(
            "connection_closed: session_id={}, connected_for={}s",
            self.id,
            (Utc::now() - self.connected_at).num_seconds()
        );
        pump_result
    }
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("public", &self.public)
            .field("connected_at", &self.connected_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}
