//! TLS stage: drives the server handshake before any frame is decoded.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use rustls::{CipherSuite, ProtocolVersion, ServerConfig, ServerConnection, StreamOwned};
use thiserror::Error;

use super::Transport;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Details of a completed TLS handshake, delivered once per connection.
#[derive(Debug)]
pub struct HandshakeNotice {
    peer: SocketAddr,
    protocol: Option<ProtocolVersion>,
    cipher_suite: Option<CipherSuite>,
}

impl HandshakeNotice {
    /// Remote address of the connection.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Negotiated protocol version.
    #[must_use]
    pub const fn protocol(&self) -> Option<ProtocolVersion> {
        self.protocol
    }

    /// Negotiated cipher suite.
    #[must_use]
    pub const fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }
}

/// Receives handshake completion notices.
pub trait HandshakeObserver: Send + Sync {
    /// Called exactly once after a connection's handshake succeeds.
    fn handshake_completed(&self, notice: HandshakeNotice);
}

#[derive(Debug, Error)]
pub(crate) enum HandshakeError {
    #[error("failed to create TLS session: {source}")]
    Session {
        #[source]
        source: rustls::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

/// Completes the server handshake on `stream`.
pub(crate) fn accept(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    peer: SocketAddr,
    observer: &dyn HandshakeObserver,
) -> Result<Transport, HandshakeError> {
    let mut connection =
        ServerConnection::new(config).map_err(|source| HandshakeError::Session { source })?;
    let mut socket = stream;
    let io_error = |source| HandshakeError::Io { source };

    socket
        .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
        .map_err(io_error)?;
    while connection.is_handshaking() {
        connection.complete_io(&mut socket).map_err(io_error)?;
    }
    socket.set_read_timeout(None).map_err(io_error)?;

    observer.handshake_completed(HandshakeNotice {
        peer,
        protocol: connection.protocol_version(),
        cipher_suite: connection
            .negotiated_cipher_suite()
            .map(|suite| suite.suite()),
    });
    Ok(Transport::Tls(Box::new(StreamOwned::new(connection, socket))))
}
