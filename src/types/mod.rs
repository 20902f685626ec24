//! Core types for the bridge.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (ThreadId, StoreId, etc.)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the worker, dispatcher and logging

mod config;
mod errors;
mod ids;

pub use config::{
    Config, DispatcherConfig, ObservabilityConfig, PathsConfig, WorkerConfig, ENV_CERTS_PATH,
    ENV_LOG_LEVEL, ENV_WORKER_THREADS,
};
pub use errors::{AggregateError, BoxError, Error, Result, SubscriberFailure};
pub use ids::{ContextId, FileId, MessageId, SessionId, SolutionId, StoreId, ThreadId};
