//! Frame encoders.

use bytes::{BufMut, BytesMut};

use crate::{Request, Response};

use super::{FrameError, LENGTH_BYTES, MAX_FIELD_BYTES, MAX_FRAME_BYTES, MAX_PARAMETERS};

fn wire_length(text: &str, field: &'static str) -> Result<i32, FrameError> {
    let too_large = || FrameError::FieldTooLarge {
        field,
        length: text.len(),
        max: MAX_FIELD_BYTES,
    };
    if text.len() > MAX_FIELD_BYTES {
        return Err(too_large());
    }
    i32::try_from(text.len()).map_err(|_| too_large())
}

/// Appends a request frame for `request` to `dst`.
///
/// The request target is not part of the frame; the receiving side attaches
/// the peer address itself.
///
/// # Errors
///
/// Returns [`FrameError::FieldTooLarge`], [`FrameError::TooManyParameters`]
/// or [`FrameError::FrameTooLarge`] when the request cannot be represented
/// within the decoder limits. `dst` is left unchanged in that case.
pub fn encode_request(request: &Request, dst: &mut BytesMut) -> Result<(), FrameError> {
    let type_name = request.request_type().wire_name();
    let type_length = wire_length(type_name, "request type")?;
    let too_many = || FrameError::TooManyParameters {
        count: request.parameters().len(),
        max: MAX_PARAMETERS,
    };
    if request.parameters().len() > MAX_PARAMETERS {
        return Err(too_many());
    }
    let count = i32::try_from(request.parameters().len()).map_err(|_| too_many())?;

    let mut frame = BytesMut::with_capacity(LENGTH_BYTES * 2 + type_name.len());
    frame.put_i32(type_length);
    frame.put_slice(type_name.as_bytes());
    frame.put_i32(count);
    for (name, value) in request.parameters() {
        let name_length = wire_length(name, "parameter name")?;
        let value_length = wire_length(value, "parameter value")?;
        let length = frame.len() + LENGTH_BYTES * 2 + name.len() + value.len();
        if length > MAX_FRAME_BYTES {
            return Err(FrameError::FrameTooLarge {
                length,
                max: MAX_FRAME_BYTES,
            });
        }
        frame.put_i32(name_length);
        frame.put_i32(value_length);
        frame.put_slice(name.as_bytes());
        frame.put_slice(value.as_bytes());
    }
    dst.unsplit(frame);
    Ok(())
}

/// Appends a response frame for `response` to `dst`.
pub fn encode_response(response: &Response, dst: &mut BytesMut) {
    let name = response.response_type().wire_name();
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "response type names are short ASCII identifiers"
    )]
    let length = name.len() as i32;
    dst.reserve(LENGTH_BYTES + name.len());
    dst.put_i32(length);
    dst.put_slice(name.as_bytes());
}
