//! Binary frame codec for the network side of the command channel.
//!
//! All integers are big-endian `i32`. A request frame is:
//!
//! ```text
//! i32 typeLength
//! u8[typeLength] typeName            e.g. "RESPONSE_EXPECTED"
//! i32 paramPairCount
//! paramPairCount times:
//!     i32 nameLength
//!     i32 valueLength
//!     u8[nameLength] name
//!     u8[valueLength] value
//! ```
//!
//! A response frame is `i32 length` followed by the UTF-8 response type name.
//!
//! Decoders are resumable: bytes may arrive in any fragmentation and a frame
//! is only produced once it is complete. A malformed frame is reported as a
//! [`FrameError`] and the rest of that frame is skipped as it arrives, using
//! the lengths its headers announce; decoding restarts at the next frame
//! boundary. A negative length or an overflowing backlog leaves no boundary
//! to return to, and the decoder then discards all further input (see
//! [`RequestDecoder::is_desynchronised`]).

mod decode;
mod encode;

use thiserror::Error;

pub use self::decode::{RequestDecoder, ResponseDecoder};
pub use self::encode::{encode_request, encode_response};

/// Size of every length prefix and count on the wire.
pub(crate) const LENGTH_BYTES: usize = 4;

/// Largest accepted length for a single string field.
pub const MAX_FIELD_BYTES: usize = 64 * 1024;

/// Largest accepted number of parameters in one request.
pub const MAX_PARAMETERS: usize = 1024;

/// Largest accepted request frame, headers included.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Largest amount of undecoded input a decoder holds before giving up.
///
/// Room for one complete frame of [`MAX_FRAME_BYTES`] plus whatever followed
/// it in the same read.
pub const MAX_BUFFERED_BYTES: usize = 2 * MAX_FRAME_BYTES;

/// Reasons a frame cannot be decoded or encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A length prefix or count was negative.
    #[error("negative {field} length {value}")]
    NegativeLength {
        /// Field the prefix belongs to.
        field: &'static str,
        /// Raw value read from the wire.
        value: i32,
    },
    /// A length prefix exceeded [`MAX_FIELD_BYTES`].
    #[error("{field} length {length} exceeds the {max} byte limit")]
    FieldTooLarge {
        /// Field the prefix belongs to.
        field: &'static str,
        /// Announced length.
        length: usize,
        /// Configured limit.
        max: usize,
    },
    /// A request frame announced more than [`MAX_FRAME_BYTES`] in total.
    #[error("frame of at least {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Frame length known when the limit was crossed.
        length: usize,
        /// Configured limit.
        max: usize,
    },
    /// The parameter count exceeded [`MAX_PARAMETERS`].
    #[error("parameter count {count} exceeds the limit of {max}")]
    TooManyParameters {
        /// Announced count.
        count: usize,
        /// Configured limit.
        max: usize,
    },
    /// The type name did not match any [`RequestType`](crate::RequestType).
    #[error("unknown request type '{name}'")]
    UnknownRequestType {
        /// Name read from the wire.
        name: String,
    },
    /// The type name did not match any [`ResponseType`](crate::ResponseType).
    #[error("unknown response type '{name}'")]
    UnknownResponseType {
        /// Name read from the wire.
        name: String,
    },
    /// A string field was not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field holding the invalid bytes.
        field: &'static str,
    },
    /// The stream ended part-way through a frame.
    #[error("stream ended with {buffered} bytes of an incomplete frame")]
    Truncated {
        /// Bytes discarded.
        buffered: usize,
    },
    /// More undecoded input accumulated than [`MAX_BUFFERED_BYTES`].
    #[error("{buffered} undecoded bytes exceed the {max} byte buffer limit")]
    BufferOverflow {
        /// Bytes discarded.
        buffered: usize,
        /// Configured limit.
        max: usize,
    },
}
