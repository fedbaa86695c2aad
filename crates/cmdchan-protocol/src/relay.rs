//! JSON messages exchanged with the agent's command executor.
//!
//! Each message is a single JSON object carried as one local-channel
//! message. Requests travel as `{"request": {...}}`, replies as
//! `{"response": {"type": "OK"}}`, and the server announces its own
//! lifecycle with `{"lifecycle": "started"}` and `{"lifecycle": "ready"}`.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Request, RequestType, Response, ResponseType};

/// Errors raised while encoding or parsing relay messages.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request carries no originating address.
    #[error("request has no target address")]
    MissingTarget,
    /// The request does not name a receiver.
    #[error("request has no receiver parameter")]
    MissingReceiver,
    /// The message could not be serialised.
    #[error("failed to serialise relay message: {0}")]
    Serialise(#[source] serde_json::Error),
    /// The message was not valid JSON of the expected shape.
    #[error("failed to parse relay message: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct RelayTarget {
    host: IpAddr,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
struct RelayRequest {
    #[serde(rename = "type")]
    request_type: RequestType,
    target: RelayTarget,
    receiver: String,
    parameters: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestEnvelope {
    request: RelayRequest,
}

#[derive(Debug, Serialize, Deserialize)]
struct RelayResponse {
    #[serde(rename = "type")]
    response_type: ResponseType,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseEnvelope {
    response: RelayResponse,
}

/// Serialises a validated request for the executor.
///
/// # Errors
///
/// Returns [`RelayError::MissingTarget`] or [`RelayError::MissingReceiver`]
/// when the request has not been validated, or [`RelayError::Serialise`].
pub fn encode_relay_request(request: &Request) -> Result<Vec<u8>, RelayError> {
    let target = request.target().ok_or(RelayError::MissingTarget)?;
    let receiver = request.receiver().ok_or(RelayError::MissingReceiver)?;
    let envelope = RequestEnvelope {
        request: RelayRequest {
            request_type: request.request_type(),
            target: RelayTarget {
                host: target.ip(),
                port: target.port(),
            },
            receiver: receiver.to_owned(),
            parameters: request.parameters().clone(),
        },
    };
    serde_json::to_vec(&envelope).map_err(RelayError::Serialise)
}

/// Parses a relayed request, as the executor side does.
///
/// The `receiver` field wins over any `receiver` entry in `parameters`.
///
/// # Errors
///
/// Returns [`RelayError::Parse`] when the payload is not a request message.
pub fn parse_relay_request(bytes: &[u8]) -> Result<Request, RelayError> {
    let RequestEnvelope { request } = serde_json::from_slice(bytes).map_err(RelayError::Parse)?;
    let target = SocketAddr::new(request.target.host, request.target.port);
    let parsed = request
        .parameters
        .into_iter()
        .fold(Request::new(request.request_type), |acc, (name, value)| {
            acc.with_parameter(name, value)
        })
        .with_receiver(request.receiver)
        .with_target(target);
    Ok(parsed)
}

/// Serialises the executor's reply.
///
/// # Errors
///
/// Returns [`RelayError::Serialise`] if serialisation fails.
pub fn encode_relay_response(response: &Response) -> Result<Vec<u8>, RelayError> {
    let envelope = ResponseEnvelope {
        response: RelayResponse {
            response_type: response.response_type(),
        },
    };
    serde_json::to_vec(&envelope).map_err(RelayError::Serialise)
}

/// Parses the executor's reply to a relayed request.
///
/// # Errors
///
/// Returns [`RelayError::Parse`] for anything other than a response message.
pub fn parse_relay_response(bytes: &[u8]) -> Result<Response, RelayError> {
    let ResponseEnvelope { response } =
        serde_json::from_slice(bytes).map_err(RelayError::Parse)?;
    Ok(Response::new(response.response_type))
}

/// Lifecycle milestones announced to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleNotice {
    /// The listener is bound and accepting.
    Started,
    /// The server is ready to receive requests.
    Ready,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LifecycleEnvelope {
    lifecycle: LifecycleNotice,
}

impl LifecycleNotice {
    /// Serialises the notice as a local-channel message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialise`] if serialisation fails.
    pub fn encode(self) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(&LifecycleEnvelope { lifecycle: self }).map_err(RelayError::Serialise)
    }

    /// Parses a lifecycle notice.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Parse`] when the payload is not a notice.
    pub fn parse(bytes: &[u8]) -> Result<Self, RelayError> {
        let envelope: LifecycleEnvelope =
            serde_json::from_slice(bytes).map_err(RelayError::Parse)?;
        Ok(envelope.lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 12000))
    }

    #[test]
    fn request_message_carries_target_receiver_and_parameters() {
        let request = Request::new(RequestType::ResponseExpected)
            .with_receiver("com.example.Receiver")
            .with_parameter("k", "v")
            .with_target(peer());

        let bytes = encode_relay_request(&request).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(
            value,
            json!({"request": {
                "type": "RESPONSE_EXPECTED",
                "target": {"host": "127.0.0.1", "port": 12000},
                "receiver": "com.example.Receiver",
                "parameters": {"receiver": "com.example.Receiver", "k": "v"}
            }})
        );
        assert_eq!(parse_relay_request(&bytes).expect("parse"), request);
    }

    #[rstest]
    #[case::no_target(
        Request::new(RequestType::ResponseExpected).with_receiver("r"),
        "target"
    )]
    #[case::no_receiver(
        Request::new(RequestType::ResponseExpected).with_target(peer()),
        "receiver"
    )]
    fn unvalidated_requests_are_not_encoded(#[case] request: Request, #[case] missing: &str) {
        let error = encode_relay_request(&request).expect_err("must fail");
        assert!(error.to_string().contains(missing), "{error}");
    }

    #[rstest]
    #[case(br#"{"response":{"type":"OK"}}"#.as_slice(), ResponseType::Ok)]
    #[case(br#"{"response":{"type":"ERROR"}}"#.as_slice(), ResponseType::Error)]
    fn parses_executor_replies(#[case] bytes: &[u8], #[case] expected: ResponseType) {
        let response = parse_relay_response(bytes).expect("parse");
        assert_eq!(response.response_type(), expected);
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::not_json(b"OK".as_slice())]
    #[case::unknown_type(br#"{"response":{"type":"MAYBE"}}"#.as_slice())]
    #[case::wrong_envelope(br#"{"lifecycle":"ready"}"#.as_slice())]
    fn rejects_malformed_replies(#[case] bytes: &[u8]) {
        assert!(matches!(
            parse_relay_response(bytes),
            Err(RelayError::Parse(_))
        ));
    }

    #[test]
    fn encoded_response_matches_wire_shape() {
        let bytes = encode_relay_response(&Response::ok()).expect("encode");
        assert_eq!(bytes, br#"{"response":{"type":"OK"}}"#);
    }

    #[rstest]
    #[case(LifecycleNotice::Started, r#"{"lifecycle":"started"}"#)]
    #[case(LifecycleNotice::Ready, r#"{"lifecycle":"ready"}"#)]
    fn lifecycle_notices_use_lowercase_names(
        #[case] notice: LifecycleNotice,
        #[case] expected: &str,
    ) {
        let bytes = notice.encode().expect("encode");
        assert_eq!(bytes, expected.as_bytes());
        assert_eq!(LifecycleNotice::parse(&bytes).expect("parse"), notice);
    }
}
