//! # Endpoint Bridge - async surface over a blocking native endpoint
//!
//! Rust bridge between an async application and a native endpoint library whose
//! calls block and whose events arrive on one serial queue:
//! - Cancellable bridge running blocking calls on a worker pool
//! - Reentrant observables that tolerate subscribe/unsubscribe during notification
//! - Observable values that notify only on change
//! - Channel multiplexer with ref-counted upstream subscriptions
//! - Event pump feeding channels from the serial queue
//! - Session state machine over one authenticated connection
//!
//! ## Architecture
//!
//! ```text
//!                  ┌─────────────────────────────────────┐
//!  async callers → │          ConnectionSession          │
//!                  │  ┌──────────┐   ┌────────────────┐  │
//!                  │  │  Bridge  │   │   Dispatcher   │  │
//!                  │  │ (worker) │   │   Channels ▲   │  │
//!                  │  └────┬─────┘   │   Pump ────┘   │  │
//!                  │       │         └───────▲────────┘  │
//!                  └───────┼─────────────────┼───────────┘
//!                          ▼                 │
//!                  native blocking calls   serial event queue
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod dispatch;
pub mod native;
pub mod observable;
pub mod runtime;
pub mod session;
pub mod types;

// Internal utilities
pub mod observability;

pub use session::{Session, SessionState};
pub use types::{Config, Error, Result};
