//! Local channel between the server and the agent's command executor.
//!
//! The channel is a single bidirectional stream shared by every connection
//! worker. [`SharedChannel`] serialises access so that one request and its
//! reply form an uninterrupted exchange.

mod connector;
mod errors;
mod socket;

use std::sync::{Arc, Mutex, MutexGuard};

pub use self::connector::{ChannelConnector, SystemChannelConnector};
pub use self::errors::ChannelError;
pub use self::socket::{MAX_MESSAGE_BYTES, SocketChannel, read_message, write_message};

const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Message-oriented connection to the agent.
pub trait LocalChannel: Send {
    /// Whether the channel can still carry messages.
    fn is_open(&self) -> bool;

    /// Writes one complete message.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the channel is closed or the write fails.
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError>;

    /// Blocks until one complete message arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the channel is closed, the read fails or
    /// times out, or the agent hangs up.
    fn receive(&mut self) -> Result<Vec<u8>, ChannelError>;
}

/// Exclusive access to the underlying channel for the duration of an exchange.
pub type ChannelGuard<'a> = MutexGuard<'a, Box<dyn LocalChannel>>;

/// Cloneable handle to the one local channel of the process.
#[derive(Clone)]
pub struct SharedChannel {
    inner: Arc<Mutex<Box<dyn LocalChannel>>>,
}

impl SharedChannel {
    /// Wraps a connected channel.
    #[must_use]
    pub fn new(channel: Box<dyn LocalChannel>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(channel)),
        }
    }

    /// Locks the channel. Hold the guard across a request and its reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Poisoned`] if a previous holder panicked.
    pub fn lock(&self) -> Result<ChannelGuard<'_>, ChannelError> {
        self.inner.lock().map_err(|_| ChannelError::Poisoned)
    }

    /// Sends a single message outside of a request exchange.
    ///
    /// # Errors
    ///
    /// Propagates the [`ChannelError`] from the lock or the write.
    pub fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        self.lock()?.send(message)
    }

    /// Receives a single message outside of a request exchange.
    ///
    /// # Errors
    ///
    /// Propagates the [`ChannelError`] from the lock or the read.
    pub fn receive(&self) -> Result<Vec<u8>, ChannelError> {
        self.lock()?.receive()
    }
}

impl std::fmt::Debug for SharedChannel {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("SharedChannel").finish_non_exhaustive()
    }
}
