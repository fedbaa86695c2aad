//! Connection handling abstraction for the listener.

use std::net::{SocketAddr, TcpStream};

/// A freshly accepted connection in blocking mode.
#[derive(Debug)]
pub struct AcceptedConnection {
    /// Connected socket.
    pub stream: TcpStream,
    /// Remote address.
    pub peer: SocketAddr,
}

/// Handles accepted connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection. Runs on a dedicated worker thread and
    /// should not panic.
    fn handle(&self, connection: AcceptedConnection);
}
