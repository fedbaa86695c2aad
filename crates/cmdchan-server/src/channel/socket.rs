//! Length-framed socket transport for the local channel.
//!
//! Each message is a big-endian `u32` byte count followed by the payload.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tracing::{debug, warn};

use super::{CHANNEL_TARGET, ChannelError, LocalChannel};

/// Largest message accepted in either direction.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Stream types the channel can run over.
#[derive(Debug)]
pub(crate) enum ChannelStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ChannelStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Writes one framed message and flushes.
///
/// # Errors
///
/// Returns [`ChannelError::MessageTooLarge`] without writing anything when
/// the payload exceeds [`MAX_MESSAGE_BYTES`], or [`ChannelError::Send`].
pub fn write_message<W: Write>(writer: &mut W, message: &[u8]) -> Result<(), ChannelError> {
    let too_large = || ChannelError::MessageTooLarge {
        length: message.len(),
        max: MAX_MESSAGE_BYTES,
    };
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(too_large());
    }
    let length = u32::try_from(message.len()).map_err(|_| too_large())?;
    writer
        .write_all(&length.to_be_bytes())
        .and_then(|()| writer.write_all(message))
        .and_then(|()| writer.flush())
        .map_err(|source| ChannelError::Send { source })
}

/// Reads one framed message.
///
/// `timeout` is only used to describe a timed-out read.
///
/// # Errors
///
/// Returns [`ChannelError::Eof`] when the stream ends,
/// [`ChannelError::Timeout`] when the read times out,
/// [`ChannelError::MessageTooLarge`] for an oversized length prefix, or
/// [`ChannelError::Receive`].
pub fn read_message<R: Read>(
    reader: &mut R,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, ChannelError> {
    let classify = |source: io::Error| match source.kind() {
        io::ErrorKind::UnexpectedEof => ChannelError::Eof,
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ChannelError::Timeout {
            timeout: timeout.unwrap_or_default(),
        },
        _ => ChannelError::Receive { source },
    };

    let mut prefix = [0_u8; 4];
    reader.read_exact(&mut prefix).map_err(classify)?;
    let length = usize::try_from(u32::from_be_bytes(prefix)).unwrap_or(usize::MAX);
    if length > MAX_MESSAGE_BYTES {
        return Err(ChannelError::MessageTooLarge {
            length,
            max: MAX_MESSAGE_BYTES,
        });
    }

    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).map_err(classify)?;
    Ok(payload)
}

/// [`LocalChannel`] over a connected socket.
///
/// Any failure closes the channel for good: after a failed or timed-out read
/// the stream position is unknown, so later messages cannot be trusted.
#[derive(Debug)]
pub struct SocketChannel {
    stream: ChannelStream,
    endpoint: String,
    read_timeout: Duration,
    open: bool,
}

impl SocketChannel {
    pub(crate) fn new(
        stream: ChannelStream,
        endpoint: String,
        read_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        stream
            .set_read_timeout(Some(read_timeout))
            .map_err(|source| ChannelError::Configure { source })?;
        Ok(Self {
            stream,
            endpoint,
            read_timeout,
            open: true,
        })
    }

    /// Wraps a connected TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Configure`] if the read timeout cannot be set.
    pub fn from_tcp(stream: TcpStream, read_timeout: Duration) -> Result<Self, ChannelError> {
        let endpoint = stream
            .peer_addr()
            .map_or_else(|_| String::from("tcp://<unknown>"), |addr| format!("tcp://{addr}"));
        Self::new(ChannelStream::Tcp(stream), endpoint, read_timeout)
    }

    fn close(&mut self, error: &ChannelError) {
        if self.open {
            warn!(
                target: CHANNEL_TARGET,
                endpoint = %self.endpoint,
                error = %error,
                "closing local channel"
            );
        }
        self.open = false;
    }
}

impl LocalChannel for SocketChannel {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }
        match write_message(&mut self.stream, message) {
            Ok(()) => {
                debug!(target: CHANNEL_TARGET, bytes = message.len(), "sent channel message");
                Ok(())
            }
            // Nothing reached the stream, so it is still in sync.
            Err(error @ ChannelError::MessageTooLarge { .. }) => Err(error),
            Err(error) => {
                self.close(&error);
                Err(error)
            }
        }
    }

    fn receive(&mut self) -> Result<Vec<u8>, ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }
        match read_message(&mut self.stream, Some(self.read_timeout)) {
            Ok(message) => {
                debug!(
                    target: CHANNEL_TARGET,
                    bytes = message.len(),
                    "received channel message"
                );
                Ok(message)
            }
            Err(error) => {
                self.close(&error);
                Err(error)
            }
        }
    }
}
