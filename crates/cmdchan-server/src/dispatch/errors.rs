//! Reasons a dispatch ends in an ERROR response.

use cmdchan_protocol::{RelayError, RequestType};
use thiserror::Error;

use crate::channel::ChannelError;

/// Failure of a single relay exchange. Never fatal to the connection.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pipeline did not attach the peer address.
    #[error("request has no target address")]
    MissingTarget,
    /// The request does not name a receiver.
    #[error("request has no receiver")]
    MissingReceiver,
    /// Only requests expecting a response are relayed.
    #[error("unsupported request type {request_type}")]
    Unsupported {
        /// Type carried by the request.
        request_type: RequestType,
    },
    /// The local channel has been closed.
    #[error("local channel is closed")]
    ChannelClosed,
    /// The relay message could not be built.
    #[error("failed to encode relay request: {source}")]
    Encode {
        /// Encoder error.
        #[source]
        source: RelayError,
    },
    /// The local channel failed during the exchange.
    #[error("local channel exchange failed: {source}")]
    Channel {
        /// Channel error.
        #[source]
        source: ChannelError,
    },
    /// The executor's reply was not a response message.
    #[error("failed to parse executor reply: {source}")]
    Parse {
        /// Parser error.
        #[source]
        source: RelayError,
    },
}

impl From<ChannelError> for DispatchError {
    fn from(source: ChannelError) -> Self {
        Self::Channel { source }
    }
}
