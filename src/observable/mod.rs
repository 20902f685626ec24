//! Reentrant observables.
//!
//! - [`Observable`]: broadcast of values, a terminal error, or completion to many
//!   observers; safe to mutate from inside its own callbacks.
//! - [`ObservableValue`]: a current value that notifies only when it changes.
//! - [`ObservableStream`]: `futures::Stream` view of an observable.

mod observer;
mod registry;
mod stream;
mod subject;
mod subscription;
mod value;

pub use observer::{FnObserver, Observer, ObserverBuilder};
pub use stream::ObservableStream;
pub use subject::Observable;
pub use subscription::Subscription;
pub use value::ObservableValue;
