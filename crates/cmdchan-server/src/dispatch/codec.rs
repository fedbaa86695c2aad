//! Relay message collaborators used by the dispatcher.

use cmdchan_protocol::relay::{encode_relay_request, parse_relay_response};
use cmdchan_protocol::{RelayError, Request, Response};

/// Serialises a validated request into one local-channel message.
pub trait RequestEncoder: Send + Sync {
    /// Encodes `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] when the request cannot be serialised.
    fn encode(&self, request: &Request) -> Result<Vec<u8>, RelayError>;
}

/// Parses the executor's reply message.
pub trait ResponseParser: Send + Sync {
    /// Parses one local-channel message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] when the message is not a response.
    fn parse(&self, message: &[u8]) -> Result<Response, RelayError>;
}

/// JSON relay request encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRequestEncoder;

impl RequestEncoder for JsonRequestEncoder {
    fn encode(&self, request: &Request) -> Result<Vec<u8>, RelayError> {
        encode_relay_request(request)
    }
}

/// JSON relay response parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
    fn parse(&self, message: &[u8]) -> Result<Response, RelayError> {
        parse_relay_response(message)
    }
}
