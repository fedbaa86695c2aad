use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Name of the reserved parameter carrying the receiver identifier.
pub const RECEIVER_PARAMETER: &str = "receiver";

/// Whether the sender of a request waits for a reply.
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
pub enum RequestType {
    /// The peer waits for a single response frame.
    ResponseExpected,
    /// Fire-and-forget request. The server answers these with `ERROR`.
    NoResponseExpected,
}

impl RequestType {
    /// Returns the enum name used on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

/// A decoded command request.
///
/// Requests are assembled once, either by the frame decoder or by the
/// builder methods, and are never mutated in place afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    request_type: RequestType,
    target: Option<SocketAddr>,
    parameters: BTreeMap<String, String>,
}

impl Request {
    /// Creates a request without a target or parameters.
    #[must_use]
    pub const fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            target: None,
            parameters: BTreeMap::new(),
        }
    }

    pub(crate) const fn from_parts(
        request_type: RequestType,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            request_type,
            target: None,
            parameters,
        }
    }

    /// Returns the request with `target` attached.
    #[must_use]
    pub const fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = Some(target);
        self
    }

    /// Returns the request with the parameter added, replacing any previous
    /// value for the same name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Returns the request addressed to `receiver`.
    #[must_use]
    pub fn with_receiver(self, receiver: impl Into<String>) -> Self {
        self.with_parameter(RECEIVER_PARAMETER, receiver)
    }

    /// Request type.
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Address the request originated from, when known.
    #[must_use]
    pub const fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    /// Receiver named by the reserved `receiver` parameter.
    #[must_use]
    pub fn receiver(&self) -> Option<&str> {
        self.parameter(RECEIVER_PARAMETER)
    }

    /// Looks up a single parameter value.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// All parameters keyed by name.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}
