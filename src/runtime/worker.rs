//! Execution context shared by bridge calls, channel effects and the event pump.
//!
//! A context either borrows the ambient tokio runtime or owns a dedicated
//! multi-thread runtime built from [`WorkerConfig`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::types::{Error, Result, WorkerConfig};

// Dropping a runtime from inside one of its own tasks panics; the owned
// runtime is released with `shutdown_background` unless shut down explicitly.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Cloneable handle to the runtime that runs background work.
#[derive(Clone)]
pub struct WorkerContext {
    handle: Handle,
    owned: Option<Arc<OwnedRuntime>>,
}

impl WorkerContext {
    /// Borrow the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::internal(format!("no tokio runtime in scope: {}", e)))?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Build and own a dedicated multi-thread runtime.
    pub fn start(config: &WorkerConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(Error::validation("worker_threads must be at least 1"));
        }
        if config.max_blocking_threads == 0 {
            return Err(Error::validation("max_blocking_threads must be at least 1"));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;

        tracing::info!(
            "worker_context_started: worker_threads={}, max_blocking_threads={}, thread_name={}",
            config.worker_threads,
            config.max_blocking_threads,
            config.thread_name
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn owns_runtime(&self) -> bool {
        self.owned.is_some()
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run a blocking closure on the runtime's blocking pool.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(f)
    }

    /// Drive a future to completion from synchronous code.
    ///
    /// Panics if called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Tear down an owned runtime, waiting up to `timeout` for blocking work.
    ///
    /// Borrowed contexts are left untouched. When other clones of an owned
    /// context are still alive the runtime stays up until the last one drops.
    /// Must be called from outside async context.
    pub fn shutdown(self, timeout: Duration) {
        let Some(owned) = self.owned else {
            return;
        };
        match Arc::try_unwrap(owned) {
            Ok(mut owned) => {
                if let Some(runtime) = owned.0.take() {
                    runtime.shutdown_timeout(timeout);
                    tracing::info!("worker_context_stopped");
                }
            }
            Err(_) => {
                tracing::debug!("worker_context_shutdown_deferred: context still shared");
            }
        }
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("owned", &self.owned.is_some())
            .finish()
    }
}
