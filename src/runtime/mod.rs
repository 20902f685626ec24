//! Background execution: worker context, cancellation and the blocking bridge.

mod bridge;
mod cancel;
pub mod recovery;
mod worker;

pub use bridge::interruption_requested;
pub use cancel::{CancelSignal, Registration};
pub use recovery::{catch_panic, panic_message, with_recovery};
pub use worker::WorkerContext;
