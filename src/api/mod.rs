//! Async surface over the native endpoint.
//!
//! Every method wraps one blocking native call in the bridge and takes an
//! optional [`CancelSignal`](crate::runtime::CancelSignal).

mod connection;
mod crypto;
mod events;
mod stores;
mod threads;

pub use connection::{ConnectionSession, PlatformCredentials};
pub use crypto::Crypto;
pub use events::EventQueueClient;
