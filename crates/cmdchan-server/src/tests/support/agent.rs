//! Fake agent: listens on the local channel and plays the command executor.

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use cmdchan_config::ChannelEndpoint;
use cmdchan_protocol::relay::{encode_relay_response, parse_relay_request};
use cmdchan_protocol::{LifecycleNotice, Request, Response};
use serde_json::json;

use crate::channel::{read_message, write_message};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How the agent treats the channel once the server is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBehaviour {
    /// Answer every relayed request; receivers named `broken` get ERROR.
    Answer,
    /// Like `Answer`, but hold each reply back for the given time.
    AnswerAfter(Duration),
    /// Close the channel right after the `ready` notice.
    HangUpAfterReady,
}

#[derive(Default)]
struct AgentLog {
    notices: Mutex<Vec<LifecycleNotice>>,
    requests: Mutex<Vec<Request>>,
    overlaps: Mutex<usize>,
}

/// Agent side of one local channel.
pub struct FakeAgent {
    endpoint: ChannelEndpoint,
    log: Arc<AgentLog>,
}

impl FakeAgent {
    /// Listens on a loopback port. The first message sent to the server is
    /// `tls_config`.
    pub fn start(tls_config: Vec<u8>, behaviour: AgentBehaviour) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind agent listener");
        let port = listener.local_addr().expect("agent address").port();
        let log = Arc::new(AgentLog::default());
        let agent_log = Arc::clone(&log);
        // Detached: a server that never connects leaves the agent blocked in
        // accept until the test process exits.
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, &tls_config, behaviour, &agent_log);
            }
        });
        Self {
            endpoint: ChannelEndpoint::tcp("127.0.0.1", port),
            log,
        }
    }

    /// Endpoint the server should connect to.
    pub const fn endpoint(&self) -> &ChannelEndpoint {
        &self.endpoint
    }

    /// Lifecycle notices received so far.
    pub fn notices(&self) -> Vec<LifecycleNotice> {
        self.log.notices.lock().expect("notices lock").clone()
    }

    /// Requests relayed so far.
    pub fn requests(&self) -> Vec<Request> {
        self.log.requests.lock().expect("requests lock").clone()
    }

    /// Requests that arrived while an earlier one was still unanswered.
    pub fn overlaps(&self) -> usize {
        *self.log.overlaps.lock().expect("overlaps lock")
    }

    /// Waits until `count` notices have arrived.
    pub fn wait_for_notices(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.notices().len() >= count {
                return true;
            }
            thread::sleep(POLL_INTERVAL);
        }
        false
    }
}

fn serve(mut stream: TcpStream, tls_config: &[u8], behaviour: AgentBehaviour, log: &AgentLog) {
    if write_message(&mut stream, tls_config).is_err() {
        return;
    }
    while let Ok(message) = read_message(&mut stream, None) {
        if let Ok(notice) = LifecycleNotice::parse(&message) {
            log.notices.lock().expect("notices lock").push(notice);
            if notice == LifecycleNotice::Ready && behaviour == AgentBehaviour::HangUpAfterReady {
                return;
            }
            continue;
        }
        let request = parse_relay_request(&message).expect("relayed request");
        let response = if request.receiver() == Some("broken") {
            Response::error()
        } else {
            Response::ok()
        };
        log.requests.lock().expect("requests lock").push(request);
        if let AgentBehaviour::AnswerAfter(delay) = behaviour {
            thread::sleep(delay);
            if has_pending_input(&stream) {
                *log.overlaps.lock().expect("overlaps lock") += 1;
            }
        }
        let reply = encode_relay_response(&response).expect("encode reply");
        if write_message(&mut stream, &reply).is_err() {
            return;
        }
    }
}

/// Whether the server wrote more before being answered.
fn has_pending_input(stream: &TcpStream) -> bool {
    stream.set_nonblocking(true).expect("non-blocking agent socket");
    let pending = matches!(stream.peek(&mut [0_u8; 1]), Ok(read) if read > 0);
    stream.set_nonblocking(false).expect("blocking agent socket");
    pending
}

/// Builds the agent's TLS configuration message.
pub fn tls_config_message(keystore: Option<&Utf8Path>, command_channel: bool) -> Vec<u8> {
    let message = json!({
        "tls_config": {
            "keystore_file": keystore.map(Utf8Path::as_str),
            "keystore_password": keystore.map(|_| "changeit"),
            "enable_for_command_channel": command_channel,
            "enable_for_backing_storage": false,
            "disable_hostname_verification": false,
        }
    });
    serde_json::to_vec(&message).expect("serialise TLS configuration")
}
