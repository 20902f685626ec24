//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use std::fmt;

use thiserror::Error;

use crate::native::NativeFault;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by subscriber callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error enum for the bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// A native operation failed. Code, category and message are kept verbatim.
    #[error("native fault: {0}")]
    Fault(#[from] NativeFault),

    /// The caller requested cancellation.
    #[error("operation cancelled: {operation}{}", fmt_point(.point))]
    Cancelled {
        operation: String,
        /// Where the interruption took effect, when known.
        point: Option<String>,
    },

    /// Operation attempted on a torn-down object.
    #[error("{0} is disposed")]
    Disposed(&'static str),

    /// One or more subscriber callbacks failed during a notification pass.
    #[error("{0}")]
    Subscribers(AggregateError),

    /// A channel key is already registered with a different handler type.
    #[error("channel {key} is registered as {found}, requested {expected}")]
    ChannelTypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Session-level operation attempted without an authenticated connection.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// Validation errors.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid state transition.
    #[error("state transition error: {0}")]
    StateTransition(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_point(point: &Option<String>) -> String {
    point
        .as_deref()
        .map(|p| format!(" (at {p})"))
        .unwrap_or_default()
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            point: None,
        }
    }

    /// True for caller-requested cancellation, which callers usually treat as expected.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// The native fault carried by this error, if any.
    pub fn as_fault(&self) -> Option<&NativeFault> {
        match self {
            Error::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

/// One failed subscriber callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    pub subscriber: u64,
    pub message: String,
}

/// Failures collected over one notification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateError {
    failures: Vec<SubscriberFailure>,
}

impl AggregateError {
    pub(crate) fn push(&mut self, subscriber: u64, message: impl Into<String>) {
        self.failures.push(SubscriberFailure {
            subscriber,
            message: message.into(),
        });
    }

    pub(crate) fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Subscribers(self))
        }
    }

    pub fn failures(&self) -> &[SubscriberFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} subscriber(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; #{}: {}", failure.subscriber, failure.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
