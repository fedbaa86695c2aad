//! Per-connection processing.
//!
//! Every accepted connection runs the same statically composed stages on its
//! own worker thread: an optional TLS stage, then decode, dispatch and
//! encode. Requests are handled strictly in the order they were decoded and
//! each reply is flushed before the next request is dispatched.

mod handshake;
mod stream;

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use bytes::BytesMut;
use cmdchan_protocol::{FrameError, Request, RequestDecoder, Response, encode_response};
use rustls::ServerConfig;
use tracing::{debug, warn};

use crate::transport::{AcceptedConnection, ConnectionHandler};

pub use self::handshake::{HandshakeNotice, HandshakeObserver};
pub(crate) use self::stream::Transport;

const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Produces exactly one response for each decoded request.
pub trait RequestHandler: Send + Sync {
    /// Handles `request`, whose target is already set to the peer address.
    fn handle(&self, request: &Request) -> Response;
}

enum SecurityStage {
    Plain,
    Tls(Arc<ServerConfig>),
}

/// Stage list applied to every connection of one listener.
pub struct ConnectionPipeline {
    security: SecurityStage,
    handler: Arc<dyn RequestHandler>,
    observer: Arc<dyn HandshakeObserver>,
}

impl ConnectionPipeline {
    /// Builds the pipeline. With `tls` set every connection must complete a
    /// TLS handshake before its first frame is decoded.
    #[must_use]
    pub fn new(
        tls: Option<Arc<ServerConfig>>,
        handler: Arc<dyn RequestHandler>,
        observer: Arc<dyn HandshakeObserver>,
    ) -> Self {
        let security = tls.map_or(SecurityStage::Plain, SecurityStage::Tls);
        Self {
            security,
            handler,
            observer,
        }
    }

    /// Whether connections go through the TLS stage.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.security, SecurityStage::Tls(_))
    }

    /// Serves one connection until the peer disconnects or a write fails.
    pub fn run(&self, stream: TcpStream, peer: SocketAddr) {
        let transport = match &self.security {
            SecurityStage::Plain => Transport::Plain(stream),
            SecurityStage::Tls(config) => {
                match handshake::accept(stream, Arc::clone(config), peer, self.observer.as_ref()) {
                    Ok(transport) => transport,
                    Err(error) => {
                        warn!(
                            target: PIPELINE_TARGET,
                            %peer,
                            error = %error,
                            "closing connection after failed handshake"
                        );
                        return;
                    }
                }
            }
        };
        let mut session = Session {
            transport,
            peer,
            decoder: RequestDecoder::new(),
            handler: self.handler.as_ref(),
        };
        session.serve();
    }
}

impl ConnectionHandler for ConnectionPipeline {
    fn handle(&self, connection: AcceptedConnection) {
        let AcceptedConnection { stream, peer } = connection;
        self.run(stream, peer);
    }
}

struct Session<'a> {
    transport: Transport,
    peer: SocketAddr,
    decoder: RequestDecoder,
    handler: &'a dyn RequestHandler,
}

impl Session<'_> {
    fn serve(&mut self) {
        debug!(target: PIPELINE_TARGET, peer = %self.peer, "connection opened");
        let outcome = self.pump();
        if let Err(error) = &outcome {
            warn!(
                target: PIPELINE_TARGET,
                peer = %self.peer,
                error = %error,
                "closing connection"
            );
        }
        self.transport.close();
        debug!(target: PIPELINE_TARGET, peer = %self.peer, "connection closed");
    }

    fn pump(&mut self) -> io::Result<()> {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            let read = match self.transport.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                // A TLS peer that drops the socket without close_notify.
                Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(error) => return Err(error),
            };
            let received = chunk.get(..read).unwrap_or_default();
            if let Err(error) = self.decoder.extend(received) {
                self.drop_frame(&error)?;
                continue;
            }
            self.drain(false)?;
        }
        self.drain(true)
    }

    fn drain(&mut self, at_eof: bool) -> io::Result<()> {
        loop {
            let decoded = if at_eof {
                self.decoder.decode_eof()
            } else {
                self.decoder.decode()
            };
            match decoded {
                Ok(Some(request)) => {
                    let targeted = request.with_target(self.peer);
                    self.reply(&targeted)?;
                }
                Ok(None) => return Ok(()),
                Err(error) => self.drop_frame(&error)?,
            }
        }
    }

    fn reply(&mut self, request: &Request) -> io::Result<()> {
        let response = self.handler.handle(request);
        let mut frame = BytesMut::new();
        encode_response(&response, &mut frame);
        self.transport.write_all(&frame)?;
        self.transport.flush()
    }

    /// Logs a rejected frame. Fails once the decoder can no longer find a
    /// frame boundary, which ends the connection.
    fn drop_frame(&self, error: &FrameError) -> io::Result<()> {
        warn!(
            target: PIPELINE_TARGET,
            peer = %self.peer,
            error = %error,
            "discarding malformed request frame"
        );
        if self.decoder.is_desynchronised() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request stream cannot be resynchronised",
            ));
        }
        Ok(())
    }
}
