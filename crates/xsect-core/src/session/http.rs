use super::{CommandRequest, CommandTransport, SessionEndpoint, SessionError, SessionResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub(crate) const PASSWORD_HEADER: &str = "X-AppServer-Password";

/// Blocking JSON-over-HTTP transport to one scripting server.
///
/// No read timeout is configured; a hung server blocks the caller.
pub struct HttpTransport {
    endpoint: SessionEndpoint,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(endpoint: SessionEndpoint) -> Self {
        Self {
            endpoint,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn endpoint(&self) -> &SessionEndpoint {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    success: bool,
    #[serde(default)]
    returned: Value,
    #[serde(default)]
    error: Option<String>,
}

impl CommandTransport for HttpTransport {
    fn call(&mut self, request: &CommandRequest) -> SessionResult<Value> {
        let url = self.endpoint.url();
        debug!(
            url = %url,
            command = %request.command,
            target = ?request.target,
            "scripting command"
        );

        let response = match self
            .agent
            .post(&url)
            .set(PASSWORD_HEADER, &self.endpoint.password)
            .send_json(request)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(401 | 403, _)) => {
                return Err(SessionError::Authentication { url });
            }
            Err(ureq::Error::Status(status, _)) => {
                return Err(SessionError::Status { url, status });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SessionError::Transport {
                    url,
                    message: transport.to_string(),
                });
            }
        };

        let reply: CommandReply = response
            .into_json()
            .map_err(|source| SessionError::MalformedReply {
                command: request.command.clone(),
                message: source.to_string(),
            })?;
        decode_reply(&request.command, reply)
    }
}

fn decode_reply(command: &str, reply: CommandReply) -> SessionResult<Value> {
    if reply.success {
        return Ok(reply.returned);
    }
    Err(SessionError::CommandFailed {
        command: command.to_string(),
        message: reply
            .error
            .unwrap_or_else(|| "server reported failure without a description".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::HttpTransport;
    use crate::session::{CommandRequest, CommandTransport, SessionEndpoint, SessionError};
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answers exactly one HTTP request and hands back what it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("stub server should bind");
        let port = listener
            .local_addr()
            .expect("stub server should have an address")
            .port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("stub server should accept");
            let mut reader =
                BufReader::new(stream.try_clone().expect("stream should be cloneable"));

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader
                    .read_line(&mut line)
                    .expect("request head should be readable");
                if line.is_empty() || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value
                            .trim()
                            .parse()
                            .expect("content length should be numeric");
                    }
                }
                head.push_str(&line);
            }

            let mut request_body = vec![0u8; content_length];
            reader
                .read_exact(&mut request_body)
                .expect("request body should be readable");

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("response should be writable");

            format!("{head}\r\n{}", String::from_utf8_lossy(&request_body))
        });

        (port, handle)
    }

    #[test]
    fn call_posts_command_with_password_header() {
        let (port, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"success": true, "returned": [1.5, 2.5], "error": null}"#,
        );
        let mut transport = HttpTransport::new(SessionEndpoint::new("127.0.0.1", port, "hunter2"));

        let returned = transport
            .call(&CommandRequest::global("getcrosssectionresults", vec![json!("cs-1")]))
            .expect("call should succeed");
        assert_eq!(returned, json!([1.5, 2.5]));

        let received = server.join().expect("stub server should finish");
        let lowered = received.to_ascii_lowercase();
        assert!(lowered.starts_with("post / http/1.1"));
        assert!(lowered.contains("x-appserver-password: hunter2"));
        assert!(received.contains(r#""command":"getcrosssectionresults""#));
        assert!(received.contains(r#""arguments":["cs-1"]"#));
    }

    #[test]
    fn unsuccessful_reply_becomes_command_failure() {
        let (port, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"success": false, "error": "Project file is locked"}"#,
        );
        let mut transport = HttpTransport::new(SessionEndpoint::new("127.0.0.1", port, "pw"));

        let error = transport
            .call(&CommandRequest::global("open", vec![json!("wall.p2dx")]))
            .expect_err("failed command should surface as error");
        server.join().expect("stub server should finish");

        match error {
            SessionError::CommandFailed { command, message } => {
                assert_eq!(command, "open");
                assert_eq!(message, "Project file is locked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_password_is_reported_as_authentication_failure() {
        let (port, server) = serve_once("HTTP/1.1 401 Unauthorized", r#"{}"#);
        let mut transport = HttpTransport::new(SessionEndpoint::new("127.0.0.1", port, "wrong"));

        let error = transport
            .call(&CommandRequest::global("gotostages", Vec::new()))
            .expect_err("401 should fail");
        server.join().expect("stub server should finish");

        assert!(matches!(error, SessionError::Authentication { .. }));
    }
}
