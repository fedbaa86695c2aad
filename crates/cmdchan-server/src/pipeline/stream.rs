//! Byte stream seen by the decode and encode stages.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use rustls::{ServerConnection, StreamOwned};

/// Connection stream after the optional TLS stage.
pub(crate) enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Transport {
    /// Ends the session, sending `close_notify` first when TLS is active.
    pub(crate) fn close(&mut self) {
        let socket = match self {
            Self::Plain(stream) => &*stream,
            Self::Tls(stream) => {
                stream.conn.send_close_notify();
                // Best effort: the peer may already be gone.
                drop(stream.flush());
                &stream.sock
            }
        };
        drop(socket.shutdown(Shutdown::Both));
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}
