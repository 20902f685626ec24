//! Fault raised by the native blocking layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error payload reported by a native operation.
///
/// Carried through the bridge untouched: callers see the same code, category and
/// message the native layer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFault {
    /// Numeric error code.
    pub code: i64,
    /// Numeric category (error type).
    pub category: i64,
    /// Human-readable message.
    pub message: String,
    /// Subsystem that raised the fault, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Longer description, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NativeFault {
    pub fn new(code: i64, category: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            category,
            message: message.into(),
            scope: None,
            description: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for NativeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code 0x{:08X}, type {})",
            self.message, self.code, self.category
        )?;
        if let Some(scope) = &self.scope {
            write!(f, " [{}]", scope)?;
        }
        Ok(())
    }
}

impl std::error::Error for NativeFault {}
