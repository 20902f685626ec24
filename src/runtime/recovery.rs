//! Panic recovery utilities.
//!
//! Subscriber callbacks and native calls run foreign code. A panic there must
//! not unwind through an observable's notification pass or kill a worker
//! thread silently; it is captured, logged, and turned into an error.

use crate::types::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `operation`, returning the panic message instead of unwinding.
pub fn catch_panic<F, T>(operation: F, operation_name: &str) -> std::result::Result<T, String>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(operation)).map_err(|panic_payload| {
        let panic_msg = panic_message(&panic_payload);
        tracing::error!(
            "panic_recovered: operation={}, panic={}",
            operation_name,
            panic_msg
        );
        panic_msg
    })
}

/// Execute a function with panic recovery.
///
/// If the function panics, the panic is captured, logged, and converted
/// to [`Error::Internal`].
///
/// # Example
/// ```
/// use endpoint_bridge::runtime::with_recovery;
///
/// let result = with_recovery(|| Ok(7), "my_operation");
/// assert_eq!(result.unwrap(), 7);
/// ```
pub fn with_recovery<F, T>(operation: F, operation_name: &str) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_panic(operation, operation_name) {
        Ok(result) => result,
        Err(panic_msg) => Err(Error::internal(format!(
            "Panic in {}: {}",
            operation_name, panic_msg
        ))),
    }
}

/// Extract panic message from panic payload.
pub fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic (no message)".to_string()
    }
}
