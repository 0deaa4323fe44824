//! Hook listener
//!
//! Exposes the agent to an external broker over TCP. Each line on a
//! connection is one JSON request and gets one JSON response line back.
//!
//! ```text
//! -> {"event":"connect","clientId":"c1","username":"alice","password":"secret"}
//! <- {"allowed":true,"reason":"accepted","code":0}
//! -> {"event":"subscribe","clientId":"c1","topic":"home/#"}
//! <- {"allowed":true,"reason":"allowed"}
//! ```

use crate::acl::AclDecision;
use crate::agent::{AuthzAgent, ConnectDecision};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Longest request line accepted, excluding the newline
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A hook invocation from the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookRequest {
    #[serde(rename_all = "camelCase")]
    Connect {
        client_id: String,
        username: String,
        password: String,
    },
    #[serde(rename_all = "camelCase")]
    Subscribe { client_id: String, topic: String },
    #[serde(rename_all = "camelCase")]
    Publish {
        client_id: String,
        topic: String,
        /// Base64 payload, logged by size only
        #[serde(default)]
        payload: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Disconnect { client_id: String },
}

/// Reply to a hook invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookResponse {
    pub allowed: bool,
    pub reason: String,
    /// CONNACK return code, connect only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
}

impl HookResponse {
    fn malformed() -> Self {
        Self {
            allowed: false,
            reason: "malformed-request".to_string(),
            code: None,
        }
    }
}

impl From<ConnectDecision> for HookResponse {
    fn from(decision: ConnectDecision) -> Self {
        Self {
            allowed: decision.accepted,
            reason: decision.code.as_str().to_string(),
            code: Some(decision.code as u8),
        }
    }
}

impl From<AclDecision> for HookResponse {
    fn from(decision: AclDecision) -> Self {
        Self {
            allowed: decision.allowed,
            reason: decision.reason.as_str().to_string(),
            code: None,
        }
    }
}

/// Dispatch a single request to the agent
pub fn dispatch(agent: &AuthzAgent, request: &HookRequest) -> HookResponse {
    match request {
        HookRequest::Connect {
            client_id,
            username,
            password,
        } => agent.on_connect(client_id, username, password).into(),
        HookRequest::Subscribe { client_id, topic } => agent.on_subscribe(client_id, topic).into(),
        HookRequest::Publish {
            client_id,
            topic,
            payload,
        } => {
            let bytes = match payload.as_deref().map(|p| BASE64.decode(p)) {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    debug!(error = %e, "Publish payload is not base64, logging size as zero");
                    Vec::new()
                }
                None => Vec::new(),
            };
            agent.on_publish(client_id, topic, &bytes).into()
        }
        HookRequest::Disconnect { client_id } => {
            let evicted = agent.on_disconnect(client_id);
            HookResponse {
                allowed: true,
                reason: if evicted { "evicted" } else { "retained" }.to_string(),
                code: None,
            }
        }
    }
}

/// Answer one raw request line. Blank lines get no answer.
pub fn handle_bytes(agent: &AuthzAgent, line: &[u8]) -> Option<HookResponse> {
    match std::str::from_utf8(line) {
        Ok(text) if text.trim().is_empty() => None,
        Ok(text) => Some(handle_line(agent, text)),
        Err(e) => {
            warn!(error = %e, "Hook request is not valid UTF-8");
            Some(HookResponse::malformed())
        }
    }
}

/// Parse and answer one request line
pub fn handle_line(agent: &AuthzAgent, line: &str) -> HookResponse {
    match serde_json::from_str::<HookRequest>(line) {
        Ok(request) => dispatch(agent, &request),
        Err(e) => {
            warn!(error = %e, "Failed to parse hook request");
            HookResponse::malformed()
        }
    }
}

/// TCP server for broker hook requests
pub struct HookServer {
    listener: TcpListener,
    agent: Arc<AuthzAgent>,
}

impl HookServer {
    /// Bind the listener
    pub async fn bind(addr: SocketAddr, agent: Arc<AuthzAgent>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind hook listener on {addr}"))?;
        Ok(Self { listener, agent })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read hook listener address")
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        info!(address = %self.local_addr()?, "Hook listener started");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept hook connection");
                    continue;
                }
            };

            debug!(peer = %peer, "Hook connection accepted");
            let agent = Arc::clone(&self.agent);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, agent).await {
                    warn!(peer = %peer, error = %e, "Hook connection failed");
                }
                debug!(peer = %peer, "Hook connection closed");
            });
        }
    }
}

/// One line read from a hook connection
#[derive(Debug, PartialEq, Eq)]
enum ReadLine {
    /// `buf` holds the line without its terminator
    Line,
    /// The line exceeded [`MAX_LINE_LENGTH`] and was discarded
    TooLong,
    Eof,
}

/// Read one newline-terminated line into `buf`, buffering at most
/// [`MAX_LINE_LENGTH`] bytes of it.
async fn read_request_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<ReadLine>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_LENGTH as u64 + 1;
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(ReadLine::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(ReadLine::Line);
    }

    if buf.len() <= MAX_LINE_LENGTH {
        // Final line without a terminator
        return Ok(ReadLine::Line);
    }

    // Skip the rest of the oversized line
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', buf)
            .await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(ReadLine::TooLong)
}

async fn serve_connection(stream: TcpStream, agent: Arc<AuthzAgent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let response = match read_request_line(&mut reader, &mut buf).await? {
            ReadLine::Eof => break,
            ReadLine::TooLong => {
                warn!(limit = MAX_LINE_LENGTH, "Hook request line too long");
                HookResponse::malformed()
            }
            ReadLine::Line => match handle_bytes(&agent, &buf) {
                Some(response) => response,
                None => continue,
            },
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthzConfig, PolicyConfig, UserConfig};

    fn make_agent() -> AuthzAgent {
        let config = AuthzConfig {
            users: vec![UserConfig {
                username: "alice".to_string(),
                password: Some("secret".to_string()),
                password_hash: None,
                policies: vec![PolicyConfig {
                    topic: "home/#".to_string(),
                    allow_subscription: true,
                    allow_publish: true,
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        AuthzAgent::with_config(&config).unwrap()
    }

    #[test]
    fn test_parse_requests() {
        let request: HookRequest = serde_json::from_str(
            r#"{"event":"publish","clientId":"c1","topic":"a/b","payload":"aGk="}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            HookRequest::Publish {
                client_id: "c1".to_string(),
                topic: "a/b".to_string(),
                payload: Some("aGk=".to_string()),
            }
        );

        let request: HookRequest =
            serde_json::from_str(r#"{"event":"disconnect","clientId":"c1"}"#).unwrap();
        assert!(matches!(request, HookRequest::Disconnect { .. }));
    }

    #[test]
    fn test_handle_connect_line() {
        let agent = make_agent();

        let response = handle_line(
            &agent,
            r#"{"event":"connect","clientId":"c1","username":"alice","password":"secret"}"#,
        );
        assert!(response.allowed);
        assert_eq!(response.code, Some(0x00));

        let response = handle_line(
            &agent,
            r#"{"event":"connect","clientId":"c2","username":"alice","password":"bad"}"#,
        );
        assert!(!response.allowed);
        assert_eq!(response.code, Some(0x04));
        assert_eq!(response.reason, "bad-username-or-password");
    }

    #[test]
    fn test_handle_publish_with_bad_payload() {
        let agent = make_agent();
        agent.on_connect("c1", "alice", "secret");

        let response = handle_line(
            &agent,
            r#"{"event":"publish","clientId":"c1","topic":"home/#","payload":"!!!"}"#,
        );
        assert!(response.allowed);
    }

    #[test]
    fn test_malformed_line() {
        let agent = make_agent();
        let response = handle_line(&agent, "{ not json");
        assert!(!response.allowed);
        assert_eq!(response.reason, "malformed-request");

        let response = handle_line(&agent, r#"{"event":"unsubscribe","clientId":"c1"}"#);
        assert_eq!(response, HookResponse::malformed());
    }

    #[test]
    fn test_response_encoding_skips_missing_code() {
        let response = HookResponse::from(crate::acl::AclDecision::default_deny());
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"allowed":false,"reason":"no-matching-policy"}"#);
    }

    #[test]
    fn test_non_utf8_line_is_malformed() {
        let agent = make_agent();
        assert_eq!(
            handle_bytes(&agent, b"\xff\xfe"),
            Some(HookResponse::malformed())
        );
        assert_eq!(handle_bytes(&agent, b"   "), None);
    }

    #[tokio::test]
    async fn test_read_request_line() {
        let input: &[u8] = b"first\r\n\xff\xfe\nlast";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Line);
        assert_eq!(buf, b"first");
        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Line);
        assert_eq!(buf, b"\xff\xfe");
        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Line);
        assert_eq!(buf, b"last");
        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Eof);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let mut input = vec![b'x'; MAX_LINE_LENGTH * 2 + 10];
        input.extend_from_slice(b"\nnext\n");
        let mut reader = BufReader::new(input.as_slice());
        let mut buf = Vec::new();

        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::TooLong);
        assert!(buf.is_empty());
        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Line);
        assert_eq!(buf, b"next");
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let mut input = vec![b'x'; MAX_LINE_LENGTH];
        input.push(b'\n');
        let mut reader = BufReader::new(input.as_slice());
        let mut buf = Vec::new();

        assert_eq!(read_request_line(&mut reader, &mut buf).await.unwrap(), ReadLine::Line);
        assert_eq!(buf.len(), MAX_LINE_LENGTH);
    }
}
