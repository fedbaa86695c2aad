//! Resumable decoders for request and response frames.

use std::collections::BTreeMap;

use bytes::{Buf, BytesMut};

use crate::{Request, RequestType, Response, ResponseType};

use super::{
    FrameError, LENGTH_BYTES, MAX_BUFFERED_BYTES, MAX_FIELD_BYTES, MAX_FRAME_BYTES,
    MAX_PARAMETERS,
};

/// Part of a rejected frame that has not been examined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Remainder {
    /// Field bytes still to come before the next header.
    bytes: usize,
    /// Whether the parameter count is still to come.
    count_pending: bool,
    /// Parameter entries, headers included, still to come.
    parameters: usize,
}

impl Remainder {
    const NONE: Self = Self {
        bytes: 0,
        count_pending: false,
        parameters: 0,
    };
}

/// A malformed frame and what is known about its extent.
#[derive(Debug)]
struct Rejection {
    error: FrameError,
    /// Bytes of the frame examined before it was rejected.
    consumed: usize,
    /// `None` when the frame boundary cannot be recovered.
    remainder: Option<Remainder>,
}

type Parsed<T> = Result<Option<(T, usize)>, Rejection>;

/// Reads fields from a borrowed view of the buffer without consuming it.
///
/// Every read returns `Ok(None)` when the view ends before the field does,
/// which the callers translate into "wait for more input".
struct FrameCursor<'a> {
    frame: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> FrameCursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self {
            frame: bytes,
            remaining: bytes,
        }
    }

    const fn position(&self) -> usize {
        self.frame.len() - self.remaining.len()
    }

    const fn reject(&self, error: FrameError, remainder: Option<Remainder>) -> Rejection {
        Rejection {
            error,
            consumed: self.position(),
            remainder,
        }
    }

    fn raw_i32(&mut self) -> Option<i32> {
        if self.remaining.remaining() < LENGTH_BYTES {
            return None;
        }
        Some(self.remaining.get_i32())
    }

    /// Reads a length prefix. A negative length loses the frame boundary.
    fn length(&mut self, field: &'static str) -> Result<Option<usize>, Rejection> {
        let Some(raw) = self.raw_i32() else {
            return Ok(None);
        };
        usize::try_from(raw).map(Some).map_err(|_| {
            self.reject(FrameError::NegativeLength { field, value: raw }, None)
        })
    }

    fn take(&mut self, length: usize) -> Option<&'a [u8]> {
        if self.remaining.len() < length {
            return None;
        }
        let (head, tail) = self.remaining.split_at(length);
        self.remaining = tail;
        Some(head)
    }

    /// Reads a type name. `after` is what follows the name in the frame.
    fn type_name(
        &mut self,
        field: &'static str,
        after: Remainder,
    ) -> Result<Option<String>, Rejection> {
        let Some(length) = self.length(field)? else {
            return Ok(None);
        };
        if length > MAX_FIELD_BYTES {
            let error = FrameError::FieldTooLarge {
                field,
                length,
                max: MAX_FIELD_BYTES,
            };
            return Err(self.reject(error, Some(Remainder { bytes: length, ..after })));
        }
        let Some(raw) = self.take(length) else {
            return Ok(None);
        };
        utf8(raw, field)
            .map(Some)
            .map_err(|error| self.reject(error, Some(after)))
    }

    fn parameter_count(&mut self) -> Result<Option<usize>, Rejection> {
        let Some(count) = self.length("parameter count")? else {
            return Ok(None);
        };
        if count > MAX_PARAMETERS {
            let error = FrameError::TooManyParameters {
                count,
                max: MAX_PARAMETERS,
            };
            let remainder = Remainder {
                parameters: count,
                ..Remainder::NONE
            };
            return Err(self.reject(error, Some(remainder)));
        }
        Ok(Some(count))
    }

    /// Reads one parameter entry; `left` entries follow it.
    fn parameter(&mut self, left: usize) -> Result<Option<(String, String)>, Rejection> {
        let Some(name_length) = self.length("parameter name")? else {
            return Ok(None);
        };
        let Some(value_length) = self.length("parameter value")? else {
            return Ok(None);
        };
        let entry = Remainder {
            bytes: name_length.saturating_add(value_length),
            count_pending: false,
            parameters: left,
        };
        for (field, length) in [
            ("parameter name", name_length),
            ("parameter value", value_length),
        ] {
            if length > MAX_FIELD_BYTES {
                let error = FrameError::FieldTooLarge {
                    field,
                    length,
                    max: MAX_FIELD_BYTES,
                };
                return Err(self.reject(error, Some(entry)));
            }
        }
        let announced = self.position().saturating_add(entry.bytes);
        if announced > MAX_FRAME_BYTES {
            let error = FrameError::FrameTooLarge {
                length: announced,
                max: MAX_FRAME_BYTES,
            };
            return Err(self.reject(error, Some(entry)));
        }

        let Some(raw_name) = self.take(name_length) else {
            return Ok(None);
        };
        let Some(raw_value) = self.take(value_length) else {
            return Ok(None);
        };
        let after = Remainder {
            parameters: left,
            ..Remainder::NONE
        };
        let name =
            utf8(raw_name, "parameter name").map_err(|error| self.reject(error, Some(after)))?;
        let value =
            utf8(raw_value, "parameter value").map_err(|error| self.reject(error, Some(after)))?;
        Ok(Some((name, value)))
    }
}

fn utf8(raw: &[u8], field: &'static str) -> Result<String, FrameError> {
    std::str::from_utf8(raw)
        .map(ToOwned::to_owned)
        .map_err(|_| FrameError::InvalidUtf8 { field })
}

/// Parses one request frame from the front of `bytes`.
///
/// Returns the request and the number of bytes it occupied.
fn parse_request(bytes: &[u8]) -> Parsed<Request> {
    let mut cursor = FrameCursor::new(bytes);
    let after_type = Remainder {
        count_pending: true,
        ..Remainder::NONE
    };
    let Some(type_name) = cursor.type_name("request type", after_type)? else {
        return Ok(None);
    };
    let request_type = type_name.parse::<RequestType>().map_err(|_| {
        cursor.reject(
            FrameError::UnknownRequestType { name: type_name },
            Some(after_type),
        )
    })?;
    let Some(count) = cursor.parameter_count()? else {
        return Ok(None);
    };

    let mut parameters = BTreeMap::new();
    for left in (0..count).rev() {
        let Some((name, value)) = cursor.parameter(left)? else {
            return Ok(None);
        };
        parameters.insert(name, value);
    }

    Ok(Some((
        Request::from_parts(request_type, parameters),
        cursor.position(),
    )))
}

fn parse_response(bytes: &[u8]) -> Parsed<Response> {
    let mut cursor = FrameCursor::new(bytes);
    let Some(type_name) = cursor.type_name("response type", Remainder::NONE)? else {
        return Ok(None);
    };
    let response_type = type_name.parse::<ResponseType>().map_err(|_| {
        cursor.reject(
            FrameError::UnknownResponseType { name: type_name },
            Some(Remainder::NONE),
        )
    })?;
    Ok(Some((Response::new(response_type), cursor.position())))
}

/// Position of the buffer relative to frame boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Alignment {
    /// The buffer starts at a frame boundary.
    #[default]
    Aligned,
    /// The buffer starts inside a rejected frame.
    Skipping(Remainder),
    /// No boundary can be found again; all input is discarded.
    Lost,
}

/// Buffer shared by both decoders; owns the resynchronisation policy.
#[derive(Debug, Default)]
struct FrameBuffer {
    bytes: BytesMut,
    alignment: Alignment,
}

impl FrameBuffer {
    fn extend(&mut self, input: &[u8]) -> Result<(), FrameError> {
        if self.alignment == Alignment::Lost {
            return Ok(());
        }
        let buffered = self.bytes.len() + input.len();
        if buffered > MAX_BUFFERED_BYTES {
            self.lose();
            return Err(FrameError::BufferOverflow {
                buffered,
                max: MAX_BUFFERED_BYTES,
            });
        }
        self.bytes.extend_from_slice(input);
        Ok(())
    }

    fn lose(&mut self) {
        self.bytes.clear();
        self.alignment = Alignment::Lost;
    }

    /// Drops whatever part of a rejected frame has arrived.
    fn skip_rejected(&mut self) -> Result<(), FrameError> {
        let Alignment::Skipping(mut rest) = self.alignment else {
            return Ok(());
        };
        loop {
            if rest.bytes > 0 {
                let available = rest.bytes.min(self.bytes.len());
                if available == 0 {
                    break;
                }
                self.bytes.advance(available);
                rest.bytes -= available;
            } else if rest.count_pending {
                if self.bytes.len() < LENGTH_BYTES {
                    break;
                }
                let raw = self.bytes.get_i32();
                let Ok(count) = usize::try_from(raw) else {
                    self.lose();
                    return Err(FrameError::NegativeLength {
                        field: "parameter count",
                        value: raw,
                    });
                };
                rest.count_pending = false;
                rest.parameters = count;
            } else if rest.parameters > 0 {
                if self.bytes.len() < 2 * LENGTH_BYTES {
                    break;
                }
                let raw_name = self.bytes.get_i32();
                let raw_value = self.bytes.get_i32();
                let (Ok(name), Ok(value)) = (usize::try_from(raw_name), usize::try_from(raw_value))
                else {
                    self.lose();
                    return Err(FrameError::NegativeLength {
                        field: "parameter entry",
                        value: raw_name.min(raw_value),
                    });
                };
                rest.bytes = name.saturating_add(value);
                rest.parameters -= 1;
            } else {
                self.alignment = Alignment::Aligned;
                return Ok(());
            }
        }
        self.alignment = Alignment::Skipping(rest);
        Ok(())
    }

    fn next<T>(
        &mut self,
        parse: impl FnOnce(&[u8]) -> Parsed<T>,
    ) -> Result<Option<T>, FrameError> {
        self.skip_rejected()?;
        if self.alignment != Alignment::Aligned {
            return Ok(None);
        }
        match parse(self.bytes.as_ref()) {
            Ok(Some((item, consumed))) => {
                self.bytes.advance(consumed);
                Ok(Some(item))
            }
            Ok(None) => Ok(None),
            Err(Rejection {
                error,
                consumed,
                remainder,
            }) => {
                match remainder {
                    Some(rest) => {
                        self.bytes.advance(consumed);
                        self.alignment = Alignment::Skipping(rest);
                        // `error` still describes this frame; a fault while
                        // skipping only changes the alignment.
                        if self.skip_rejected().is_err() {
                            self.lose();
                        }
                    }
                    None => self.lose(),
                }
                Err(error)
            }
        }
    }

    fn next_at_eof<T>(
        &mut self,
        parse: impl FnOnce(&[u8]) -> Parsed<T>,
    ) -> Result<Option<T>, FrameError> {
        if let Some(item) = self.next(parse)? {
            return Ok(Some(item));
        }
        if self.bytes.is_empty() {
            return Ok(None);
        }
        let buffered = self.bytes.len();
        self.bytes.clear();
        Err(FrameError::Truncated { buffered })
    }
}

/// Incremental decoder for request frames.
///
/// Feed bytes with [`extend`](Self::extend) and call
/// [`decode`](Self::decode) until it returns `Ok(None)`. An error reports one
/// rejected frame; the decoder skips the rest of that frame by itself.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    buffer: FrameBuffer,
}

impl RequestDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferOverflow`] when the undecoded backlog would
    /// exceed the buffer limit. The decoder is desynchronised afterwards.
    pub fn extend(&mut self, input: &[u8]) -> Result<(), FrameError> {
        self.buffer.extend(input)
    }

    /// Number of bytes buffered but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.bytes.len()
    }

    /// Whether the decoder lost track of frame boundaries.
    ///
    /// A desynchronised decoder discards all further input, so the stream
    /// feeding it is of no further use.
    #[must_use]
    pub fn is_desynchronised(&self) -> bool {
        self.buffer.alignment == Alignment::Lost
    }

    /// Decodes the next complete request, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameError`] describing a malformed frame.
    pub fn decode(&mut self) -> Result<Option<Request>, FrameError> {
        self.buffer.next(parse_request)
    }

    /// Decodes after the peer has closed its side of the stream.
    ///
    /// Behaves like [`decode`](Self::decode) but reports leftover bytes that
    /// can no longer form a frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] for an incomplete trailing frame, or
    /// any error [`decode`](Self::decode) can return.
    pub fn decode_eof(&mut self) -> Result<Option<Request>, FrameError> {
        self.buffer.next_at_eof(parse_request)
    }
}

/// Incremental decoder for response frames, used by clients of the server.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    buffer: FrameBuffer,
}

impl ResponseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferOverflow`] when the backlog grows too large.
    pub fn extend(&mut self, input: &[u8]) -> Result<(), FrameError> {
        self.buffer.extend(input)
    }

    /// Decodes the next complete response, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameError`] describing a malformed frame.
    pub fn decode(&mut self) -> Result<Option<Response>, FrameError> {
        self.buffer.next(parse_response)
    }

    /// Decodes after the server closed the stream.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] for an incomplete trailing frame.
    pub fn decode_eof(&mut self) -> Result<Option<Response>, FrameError> {
        self.buffer.next_at_eof(parse_response)
    }
}
