//! Scripting sessions against a running PLAXIS 2D instance.
//!
//! The application exposes two servers: the input server (controller) opens and
//! computes models, the output server (reader) answers result queries for
//! whatever the controller currently has open.

mod http;
mod remote;

pub use http::HttpTransport;
pub use remote::{RemoteController, RemoteReader};

use crate::domain::{CrossSectionLine, PhaseInfo, ResultKind, XsectError};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Command sent to check a server is up; any reply from it will do.
const HANDSHAKE_COMMAND: &str = "echo";
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl SessionEndpoint {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Remote reference to the output plot a cross-section is drawn in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotHandle(pub String);

/// Remote reference to a line cross-section built in an output plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossSectionHandle(pub String);

/// One scripting command as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub target: Option<String>,
    pub command: String,
    pub arguments: Vec<Value>,
}

impl CommandRequest {
    pub fn global(command: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            target: None,
            command: command.into(),
            arguments,
        }
    }
}

pub trait CommandTransport {
    fn call(&mut self, request: &CommandRequest) -> SessionResult<Value>;
}

/// Input-server operations.
pub trait ModelController {
    /// Opens `model`, discarding whatever project was open before.
    fn open(&mut self, model: &Path) -> SessionResult<()>;

    /// Switches the open project to staged construction with phases computed.
    fn go_to_stages(&mut self) -> SessionResult<()>;

    /// Makes the first phase the active output view.
    fn view_first_phase(&mut self) -> SessionResult<()>;
}

/// Output-server operations.
pub trait ResultReader {
    fn phases(&mut self) -> SessionResult<Vec<PhaseInfo>>;

    fn active_plot(&mut self) -> SessionResult<PlotHandle>;

    fn line_cross_section(
        &mut self,
        plot: &PlotHandle,
        line: &CrossSectionLine,
    ) -> SessionResult<CrossSectionHandle>;

    fn cross_section_results(
        &mut self,
        cross_section: &CrossSectionHandle,
        phase: &PhaseInfo,
        kind: ResultKind,
    ) -> SessionResult<Vec<f64>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to reach scripting server {url}: {message}")]
    Transport { url: String, message: String },
    #[error("scripting server {url} rejected the session password")]
    Authentication { url: String },
    #[error("scripting server {url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed reply to '{command}': {message}")]
    MalformedReply { command: String, message: String },
    #[error("command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },
}

impl From<SessionError> for XsectError {
    fn from(error: SessionError) -> Self {
        let message = error.to_string();
        match error {
            SessionError::Authentication { .. } => {
                XsectError::input_validation("INPUT.SESSION_PASSWORD", message)
            }
            _ => XsectError::io_system("IO.SESSION", message),
        }
    }
}

/// One round-trip proving the server is up and accepts the password.
///
/// A failed or undecodable reply still comes from a live, authenticated
/// server, so it counts as ready.
pub fn handshake<T: CommandTransport + ?Sized>(transport: &mut T) -> SessionResult<()> {
    let request = CommandRequest::global(HANDSHAKE_COMMAND, vec![Value::from("plaxis-xsect")]);
    match transport.call(&request) {
        Ok(_)
        | Err(SessionError::CommandFailed { .. })
        | Err(SessionError::MalformedReply { .. }) => Ok(()),
        Err(error) => Err(error),
    }
}

/// Repeats the handshake while the server cannot be reached, for at most
/// `timeout`. A zero timeout makes exactly one attempt.
pub fn wait_until_ready<T: CommandTransport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
) -> SessionResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match handshake(transport) {
            Err(SessionError::Transport { url, message }) if Instant::now() < deadline => {
                debug!(%url, %message, "scripting server not reachable yet");
                let remaining = deadline.saturating_duration_since(Instant::now());
                thread::sleep(READY_POLL_INTERVAL.min(remaining));
            }
            result => return result,
        }
    }
}

pub type RemoteSessions = (RemoteController<HttpTransport>, RemoteReader<HttpTransport>);

/// Controller and reader sessions for one application instance.
///
/// The reader listens on the port right after the controller's. Both servers
/// must answer a handshake within `ready_timeout` before any session is
/// returned.
pub fn connect(
    controller: &SessionEndpoint,
    ready_timeout: Duration,
) -> SessionResult<RemoteSessions> {
    let (mut controller_transport, mut reader_transport) = transports(controller);
    wait_until_ready(&mut controller_transport, ready_timeout)?;
    wait_until_ready(&mut reader_transport, ready_timeout)?;
    info!(
        host = %controller.host,
        port = controller.port,
        "connected to scripting servers"
    );
    Ok((
        RemoteController::new(controller_transport),
        RemoteReader::new(reader_transport),
    ))
}

fn transports(controller: &SessionEndpoint) -> (HttpTransport, HttpTransport) {
    let reader = SessionEndpoint {
        port: controller.port.saturating_add(1),
        ..controller.clone()
    };
    (HttpTransport::new(controller.clone()), HttpTransport::new(reader))
}

#[cfg(test)]
mod tests {
    use super::{
        CommandRequest, CommandTransport, SessionEndpoint, SessionError, SessionResult, connect,
        handshake, transports, wait_until_ready,
    };
    use crate::domain::XsectError;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::time::Duration;

    /// Plays back canned results and counts the calls made.
    struct ReplayTransport {
        results: VecDeque<SessionResult<Value>>,
        calls: Vec<String>,
    }

    impl ReplayTransport {
        fn new(results: Vec<SessionResult<Value>>) -> Self {
            Self {
                results: results.into(),
                calls: Vec::new(),
            }
        }
    }

    impl CommandTransport for ReplayTransport {
        fn call(&mut self, request: &CommandRequest) -> SessionResult<Value> {
            self.calls.push(request.command.clone());
            self.results.pop_front().expect("unexpected extra call")
        }
    }

    fn refused() -> SessionResult<Value> {
        Err(SessionError::Transport {
            url: "http://127.0.0.1:1/".to_string(),
            message: "connection refused".to_string(),
        })
    }

    #[test]
    fn endpoint_url_uses_plain_http() {
        let endpoint = SessionEndpoint::new("localhost", 10000, "secret");
        assert_eq!(endpoint.url(), "http://localhost:10000/");
    }

    #[test]
    fn reader_session_uses_next_port() {
        let endpoint = SessionEndpoint::new("localhost", 10000, "secret");
        let (controller, reader) = transports(&endpoint);

        assert_eq!(controller.endpoint().port, 10000);
        assert_eq!(reader.endpoint().port, 10001);
        assert_eq!(reader.endpoint().password, "secret");
    }

    #[test]
    fn any_answer_from_the_server_counts_as_ready() {
        let mut transport = ReplayTransport::new(vec![
            Ok(json!("plaxis-xsect")),
            Err(SessionError::CommandFailed {
                command: "echo".to_string(),
                message: "unknown command".to_string(),
            }),
        ]);

        handshake(&mut transport).expect("echo reply should pass");
        handshake(&mut transport).expect("failed command still proves the server is up");
        assert_eq!(transport.calls, ["echo", "echo"]);
    }

    #[test]
    fn refused_connection_is_retried_until_the_server_answers() {
        let mut transport = ReplayTransport::new(vec![refused(), refused(), Ok(Value::Null)]);

        wait_until_ready(&mut transport, Duration::from_secs(10))
            .expect("third attempt should succeed");
        assert_eq!(transport.calls.len(), 3);
    }

    #[test]
    fn rejected_password_is_not_retried() {
        let mut transport = ReplayTransport::new(vec![Err(SessionError::Authentication {
            url: "http://127.0.0.1:10000/".to_string(),
        })]);

        let error = wait_until_ready(&mut transport, Duration::from_secs(10))
            .expect_err("wrong password should fail");
        assert_eq!(transport.calls.len(), 1);
        let error = XsectError::from(error);
        assert_eq!(error.placeholder(), "INPUT.SESSION_PASSWORD");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn zero_timeout_makes_a_single_attempt() {
        let mut transport = ReplayTransport::new(vec![refused()]);

        let error = wait_until_ready(&mut transport, Duration::ZERO)
            .expect_err("refused connection should fail");
        assert!(matches!(error, SessionError::Transport { .. }));
        assert_eq!(transport.calls.len(), 1);
    }

    #[test]
    fn connect_to_closed_port_is_a_session_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port should bind");
        let port = listener
            .local_addr()
            .expect("listener should have an address")
            .port();
        drop(listener);

        let error = connect(&SessionEndpoint::new("127.0.0.1", port, "pw"), Duration::ZERO)
            .err()
            .expect("nothing is listening");
        assert!(matches!(error, SessionError::Transport { .. }));
        let error = XsectError::from(error);
        assert_eq!(error.placeholder(), "IO.SESSION");
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn global_command_serializes_with_null_target() {
        let request = CommandRequest::global("open", vec![json!("C:/models/wall.p2dx")]);
        let encoded = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            encoded,
            json!({
                "target": null,
                "command": "open",
                "arguments": ["C:/models/wall.p2dx"]
            })
        );
    }
}
