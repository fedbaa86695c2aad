//! TCP listener for the command channel.
//!
//! The listener binds the configured address and accepts connections on a
//! background thread, handing each one to a [`ConnectionHandler`] on its own
//! worker thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{AcceptedConnection, ConnectionHandler};
pub use self::listener::{CommandListener, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
