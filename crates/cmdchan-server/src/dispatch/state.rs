//! Dispatch state machine states.

use std::fmt;

/// Stages a request passes through while being relayed.
///
/// A successful dispatch records `AwaitingRequest`, `Validating`,
/// `Relaying`, `AwaitingLocalResponse`, `Replying` and `Done`. Any failure
/// ends the trace with `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the pipeline to hand over a request.
    AwaitingRequest,
    /// Checking target, receiver and request type.
    Validating,
    /// Writing the relay message to the local channel.
    Relaying,
    /// Waiting for the executor's reply.
    AwaitingLocalResponse,
    /// Handing the response back to the pipeline.
    Replying,
    /// The exchange completed.
    Done,
    /// The exchange failed and an ERROR response was produced.
    Error,
}

impl DispatchState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingRequest => "awaiting_request",
            Self::Validating => "validating",
            Self::Relaying => "relaying",
            Self::AwaitingLocalResponse => "awaiting_local_response",
            Self::Replying => "replying",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Ordered record of the states one dispatch went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DispatchTrace {
    states: Vec<DispatchState>,
}

impl DispatchTrace {
    pub(crate) fn start() -> Self {
        Self {
            states: vec![DispatchState::AwaitingRequest],
        }
    }

    pub(crate) fn enter(&mut self, state: DispatchState) {
        self.states.push(state);
    }

    pub(crate) fn into_states(self) -> Vec<DispatchState> {
        self.states
    }
}

impl fmt::Display for DispatchTrace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for state in &self.states {
            if !first {
                formatter.write_str(" -> ")?;
            }
            first = false;
            write!(formatter, "{state}")?;
        }
        Ok(())
    }
}
