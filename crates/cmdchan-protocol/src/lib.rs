//! Wire types shared by the command-channel server and its peers.
//!
//! Two formats live here. The network format is the binary, length-prefixed
//! frame exchanged with the remote management process (see [`codec`]). The
//! relay format is the JSON message exchanged with the agent's command
//! executor over the local channel (see [`relay`]).
//!
//! Both formats carry the same data model: a [`Request`] naming a receiver
//! and a set of string parameters, answered by exactly one [`Response`].

pub mod codec;
pub mod relay;
mod request;
mod response;

pub use codec::{
    FrameError, MAX_BUFFERED_BYTES, MAX_FIELD_BYTES, MAX_FRAME_BYTES, MAX_PARAMETERS,
    RequestDecoder, ResponseDecoder, encode_request, encode_response,
};
pub use relay::{LifecycleNotice, RelayError};
pub use request::{RECEIVER_PARAMETER, Request, RequestType};
pub use response::{Response, ResponseType};
