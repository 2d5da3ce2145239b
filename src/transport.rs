//! Transports that carry a single WHOIS query to a server.
//!
//! A transport never fails outright: it always hands back whatever text it
//! captured, plus the error that cut the exchange short, so callers can
//! decide whether partial output is good enough.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::TransportError;
use crate::servers::server_address;

/// Default command line client used by [`CommandTransport`]
pub const WHOIS_COMMAND: &str = "whois";

/// Host-selection flag of the system whois client
pub fn default_flag() -> &'static str {
    if cfg!(target_os = "macos") {
        "s"
    } else {
        "h"
    }
}

/// Raw text returned by one transport call
#[derive(Debug, Default)]
pub struct TransportOutput {
    pub text: String,
    pub error: Option<TransportError>,
}

impl TransportOutput {
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn partial(text: impl Into<String>, error: TransportError) -> Self {
        Self {
            text: text.into(),
            error: Some(error),
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self::partial(String::new(), error)
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Sends a query string to a named WHOIS server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        server: &str,
        query: &str,
        flag: &str,
        timeout: Duration,
    ) -> TransportOutput;
}

/// Direct RFC 3912 exchange over TCP port 43
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn exchange(address: &str, query: &str, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        let mut stream = TcpStream::connect(address)
            .await
            .map_err(|source| TransportError::Connect {
                server: address.to_string(),
                source,
            })?;

        let query_string = format!("{}\r\n", query);
        stream.write_all(query_string.as_bytes()).await?;

        read_into(&mut stream, buf).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn execute(
        &self,
        server: &str,
        query: &str,
        _flag: &str,
        timeout: Duration,
    ) -> TransportOutput {
        let address = server_address(server);
        debug!(%address, query, "connecting");

        let mut buf = Vec::new();
        let result = tokio::time::timeout(timeout, Self::exchange(&address, query, &mut buf)).await;
        let text = String::from_utf8_lossy(&buf).into_owned();

        match result {
            Ok(Ok(())) => TransportOutput::complete(text),
            Ok(Err(e)) => TransportOutput::partial(text, e),
            Err(_) => TransportOutput::partial(text, TransportError::Timeout(timeout)),
        }
    }
}

/// Runs the system whois client as `whois -<flag> <server> <query>`
#[derive(Debug, Clone)]
pub struct CommandTransport {
    program: String,
}

impl CommandTransport {
    pub fn new() -> Self {
        Self::with_program(WHOIS_COMMAND)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for CommandTransport {
    async fn execute(
        &self,
        server: &str,
        query: &str,
        flag: &str,
        timeout: Duration,
    ) -> TransportOutput {
        debug!(program = %self.program, server, query, flag, "spawning whois client");

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg(format!("-{}", flag))
            .arg(server)
            .arg(query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return TransportOutput::failed(TransportError::Spawn(e)),
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let run = async {
            // Drain both pipes together so a chatty stderr cannot block the child
            let (out, err) = tokio::join!(
                drain(stdout_pipe, &mut stdout),
                drain(stderr_pipe, &mut stderr),
            );
            out?;
            err?;
            child.wait().await
        };
        let result = tokio::time::timeout(timeout, run).await;

        let status = match result {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => {
                // Timeout: kill the process, not just the future
                if let Err(e) = child.kill().await {
                    debug!(program = %self.program, error = %e, "failed to kill timed out whois client");
                }
                Err(TransportError::Timeout(timeout))
            }
        };
        let text = String::from_utf8_lossy(&stdout).into_owned();

        match status {
            Ok(status) if status.success() => TransportOutput::complete(text),
            Ok(status) => TransportOutput::partial(
                text,
                TransportError::Exit {
                    code: status.code(),
                    stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
                },
            ),
            Err(e) => TransportOutput::partial(text, e),
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    match pipe {
        Some(mut reader) => read_into(&mut reader, buf).await,
        None => Ok(()),
    }
}

/// Read to EOF, keeping every chunk in `buf` even if the caller gives up early
async fn read_into<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_default_flag() {
        let flag = default_flag();
        assert!(flag == "s" || flag == "h");
    }

    #[test]
    fn test_output_constructors() {
        assert!(TransportOutput::complete("x").is_complete());
        let out = TransportOutput::partial("half", TransportError::Timeout(Duration::from_millis(5)));
        assert!(!out.is_complete());
        assert_eq!(out.text, "half");
        assert!(TransportOutput::failed(TransportError::Timeout(Duration::ZERO)).text.is_empty());
    }

    #[tokio::test]
    async fn test_tcp_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let n = socket.read(&mut request).await.unwrap();
            assert_eq!(&request[..n], b"192.0.2.0/24\r\n");
            socket.write_all(b"NetRange: 192.0.2.0 - 192.0.2.255\n").await.unwrap();
        });

        let out = TcpTransport::new()
            .execute(&addr.to_string(), "192.0.2.0/24", "h", Duration::from_secs(2))
            .await;
        assert!(out.is_complete());
        assert_eq!(out.text, "NetRange: 192.0.2.0 - 192.0.2.255\n");
    }

    #[tokio::test]
    async fn test_tcp_timeout_keeps_partial_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"NetType: Direct Allocation\n").await.unwrap();
            // Hold the connection open past the client's timeout
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let out = TcpTransport::new()
            .execute(&addr.to_string(), "q", "h", Duration::from_millis(300))
            .await;
        assert!(matches!(out.error, Some(TransportError::Timeout(_))));
        assert_eq!(out.text, "NetType: Direct Allocation\n");
    }

    #[tokio::test]
    async fn test_tcp_connect_failure() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let out = TcpTransport::new()
            .execute(&addr.to_string(), "q", "h", Duration::from_secs(2))
            .await;
        assert!(matches!(out.error, Some(TransportError::Connect { .. })));
        assert!(out.text.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_large_stderr_does_not_stall() {
        // Runs `sh -c <script> q`; the script floods stderr before writing stdout
        let script = "head -c 262144 /dev/zero >&2; echo 'NetName: EXAMPLE'";
        let out = CommandTransport::with_program("sh")
            .execute(script, "q", "c", Duration::from_secs(5))
            .await;

        assert!(out.is_complete(), "{:?}", out.error);
        assert_eq!(out.text, "NetName: EXAMPLE\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_nonzero_exit_keeps_stdout() {
        let out = CommandTransport::with_program("sh")
            .execute("echo 'NetName: PARTIAL'; echo denied >&2; exit 3", "q", "c", Duration::from_secs(5))
            .await;

        assert_eq!(out.text, "NetName: PARTIAL\n");
        match out.error {
            Some(TransportError::Exit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_spawn_failure() {
        let out = CommandTransport::with_program("definitely-not-a-whois-client")
            .execute("whois.arin.net", "q", "h", Duration::from_secs(1))
            .await;
        assert!(matches!(out.error, Some(TransportError::Spawn(_))));
    }
}
