//! Relays decoded requests to the agent's command executor.
//!
//! The dispatcher validates each request, writes it to the shared local
//! channel and waits for the executor's reply while holding the channel's
//! exchange lock. Every outcome is a [`Response`]: validation and relay
//! failures become ERROR rather than closing the network connection.

mod codec;
mod errors;
mod state;

use cmdchan_protocol::{Request, RequestType, Response};
use tracing::{debug, info, warn};

use crate::channel::SharedChannel;
use crate::pipeline::{HandshakeNotice, HandshakeObserver, RequestHandler};

pub use self::codec::{JsonRequestEncoder, JsonResponseParser, RequestEncoder, ResponseParser};
pub use self::errors::DispatchError;
pub use self::state::DispatchState;
use self::state::DispatchTrace;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Relays requests over the shared local channel.
pub struct RequestDispatcher {
    channel: SharedChannel,
    encoder: Box<dyn RequestEncoder>,
    parser: Box<dyn ResponseParser>,
}

impl RequestDispatcher {
    /// Builds a dispatcher using the JSON relay format.
    #[must_use]
    pub fn new(channel: SharedChannel) -> Self {
        Self::with_collaborators(
            channel,
            Box::new(JsonRequestEncoder),
            Box::new(JsonResponseParser),
        )
    }

    /// Builds a dispatcher with explicit relay collaborators.
    #[must_use]
    pub fn with_collaborators(
        channel: SharedChannel,
        encoder: Box<dyn RequestEncoder>,
        parser: Box<dyn ResponseParser>,
    ) -> Self {
        Self {
            channel,
            encoder,
            parser,
        }
    }

    /// Relays `request` and returns the response for the network peer.
    #[must_use]
    pub fn dispatch(&self, request: &Request) -> Response {
        self.dispatch_with_trace(request).0
    }

    /// Like [`dispatch`](Self::dispatch), also returning the states visited.
    #[must_use]
    pub fn dispatch_with_trace(&self, request: &Request) -> (Response, Vec<DispatchState>) {
        let mut trace = DispatchTrace::start();
        let response = match self.relay(request, &mut trace) {
            Ok(response) => {
                trace.enter(DispatchState::Replying);
                trace.enter(DispatchState::Done);
                response
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    peer = ?request.target(),
                    receiver = ?request.receiver(),
                    error = %error,
                    "request failed"
                );
                trace.enter(DispatchState::Error);
                Response::error()
            }
        };
        debug!(
            target: DISPATCH_TARGET,
            peer = ?request.target(),
            receiver = ?request.receiver(),
            response = %response.response_type(),
            trace = %trace,
            "dispatch complete"
        );
        (response, trace.into_states())
    }

    fn relay(&self, request: &Request, trace: &mut DispatchTrace) -> Result<Response, DispatchError> {
        trace.enter(DispatchState::Validating);
        validate(request)?;

        trace.enter(DispatchState::Relaying);
        let mut channel = self.channel.lock()?;
        if !channel.is_open() {
            return Err(DispatchError::ChannelClosed);
        }
        let message = self
            .encoder
            .encode(request)
            .map_err(|source| DispatchError::Encode { source })?;
        channel.send(&message)?;

        trace.enter(DispatchState::AwaitingLocalResponse);
        let reply = channel.receive()?;
        drop(channel);
        self.parser
            .parse(&reply)
            .map_err(|source| DispatchError::Parse { source })
    }
}

fn validate(request: &Request) -> Result<(), DispatchError> {
    if request.target().is_none() {
        return Err(DispatchError::MissingTarget);
    }
    if request.receiver().is_none() {
        return Err(DispatchError::MissingReceiver);
    }
    match request.request_type() {
        RequestType::ResponseExpected => Ok(()),
        request_type @ RequestType::NoResponseExpected => {
            Err(DispatchError::Unsupported { request_type })
        }
    }
}

impl RequestHandler for RequestDispatcher {
    fn handle(&self, request: &Request) -> Response {
        self.dispatch(request)
    }
}

impl HandshakeObserver for RequestDispatcher {
    fn handshake_completed(&self, notice: HandshakeNotice) {
        info!(
            target: DISPATCH_TARGET,
            peer = %notice.peer(),
            protocol = ?notice.protocol(),
            cipher_suite = ?notice.cipher_suite(),
            "TLS handshake completed"
        );
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestDispatcher")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
