use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Outcome reported for a request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// The receiver handled the request.
    Ok,
    /// The request could not be handled.
    Error,
}

impl ResponseType {
    /// Returns the enum name used on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

/// Reply to a single [`Request`](crate::Request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Response {
    response_type: ResponseType,
}

impl Response {
    /// Creates a response of the given type.
    #[must_use]
    pub const fn new(response_type: ResponseType) -> Self {
        Self { response_type }
    }

    /// Successful response.
    #[must_use]
    pub const fn ok() -> Self {
        Self::new(ResponseType::Ok)
    }

    /// Failure response.
    #[must_use]
    pub const fn error() -> Self {
        Self::new(ResponseType::Error)
    }

    /// Response type.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        self.response_type
    }
}
