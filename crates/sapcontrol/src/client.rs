//! Socket-backed sapcontrol connector.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::soap;
use crate::types::{OsProcess, StartStopOption, SystemInstance};

/// Calls the operators issue against one sapcontrol instance.
#[async_trait]
pub trait SapControl: Send + Sync {
    /// Trigger an instance start; returns immediately.
    async fn start(&self, token: &CancellationToken) -> Result<()>;

    /// Trigger an instance stop; returns immediately.
    async fn stop(&self, token: &CancellationToken) -> Result<()>;

    /// Trigger a system-wide start filtered by instance type.
    async fn start_system(
        &self,
        token: &CancellationToken,
        options: StartStopOption,
    ) -> Result<()>;

    /// Trigger a system-wide stop filtered by instance type.
    async fn stop_system(&self, token: &CancellationToken, options: StartStopOption)
    -> Result<()>;

    /// Processes directly started by this instance's start profile.
    async fn process_list(&self, token: &CancellationToken) -> Result<Vec<OsProcess>>;

    /// All instances of the system this instance belongs to.
    async fn system_instance_list(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<SystemInstance>>;
}

/// SOAP client over the per-instance UNIX domain socket.
///
/// The socket path is derived from the instance number:
/// `/tmp/.sapstream5<inst>13`.
pub struct UdsClient {
    socket: PathBuf,
}

impl UdsClient {
    pub fn new(instance_number: &str) -> Self {
        Self {
            socket: PathBuf::from(format!("/tmp/.sapstream5{instance_number}13")),
        }
    }

    /// Client over an explicit socket path.
    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// POST one SOAP operation and return the response body.
    async fn call(&self, token: &CancellationToken, operation: &str, inner: &str) -> Result<String> {
        let request_body = soap::envelope(operation, inner);
        debug!(operation, socket = %self.socket.display(), "sapcontrol call");

        let exchange = async {
            let mut stream =
                UnixStream::connect(&self.socket)
                    .await
                    .map_err(|source| Error::Connect {
                        socket: self.socket.clone(),
                        source,
                    })?;

            let request = format!(
                "POST / HTTP/1.1\r\n\
                 Host: localhost\r\n\
                 Content-Type: text/xml; charset=utf-8\r\n\
                 SOAPAction: \"\"\r\n\
                 Connection: close\r\n\
                 Content-Length: {}\r\n\
                 \r\n\
                 {}",
                request_body.len(),
                request_body
            );

            stream.write_all(request.as_bytes()).await?;
            stream.shutdown().await?;

            let mut raw = Vec::new();
            stream.read_to_end(&mut raw).await?;
            Ok::<Vec<u8>, Error>(raw)
        };

        let raw = tokio::select! {
            () = token.cancelled() => return Err(Error::Cancelled),
            result = exchange => result?,
        };

        let response = String::from_utf8_lossy(&raw);
        let body = http_body(&response)?;
        soap::check_fault(&body)?;

        if !response.starts_with("HTTP/1.1 200") && !response.starts_with("HTTP/1.0 200") {
            let status = response.lines().next().unwrap_or_default().to_string();
            return Err(Error::UnexpectedResponse(status));
        }

        Ok(body)
    }
}

#[async_trait]
impl SapControl for UdsClient {
    async fn start(&self, token: &CancellationToken) -> Result<()> {
        self.call(token, "Start", "").await.map(|_| ())
    }

    async fn stop(&self, token: &CancellationToken) -> Result<()> {
        self.call(token, "Stop", "").await.map(|_| ())
    }

    async fn start_system(
        &self,
        token: &CancellationToken,
        options: StartStopOption,
    ) -> Result<()> {
        let inner = format!("<options>{}</options>", options.as_wire());
        self.call(token, "StartSystem", &inner).await.map(|_| ())
    }

    async fn stop_system(
        &self,
        token: &CancellationToken,
        options: StartStopOption,
    ) -> Result<()> {
        let inner = format!("<options>{}</options>", options.as_wire());
        self.call(token, "StopSystem", &inner).await.map(|_| ())
    }

    async fn process_list(&self, token: &CancellationToken) -> Result<Vec<OsProcess>> {
        let body = self.call(token, "GetProcessList", "").await?;
        soap::parse_process_list(&body)
    }

    async fn system_instance_list(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<SystemInstance>> {
        let body = self.call(token, "GetSystemInstanceList", "").await?;
        soap::parse_system_instance_list(&body)
    }
}

/// Split an HTTP/1.x response into its body, de-chunking when needed.
fn http_body(response: &str) -> Result<String> {
    let Some((head, body)) = response.split_once("\r\n\r\n") else {
        return Err(Error::UnexpectedResponse(
            "missing header/body separator".to_string(),
        ));
    };

    let chunked = head
        .lines()
        .any(|line| line.to_ascii_lowercase().contains("transfer-encoding: chunked"));

    if !chunked {
        return Ok(body.to_string());
    }

    let mut decoded = String::new();
    let mut rest = body;
    loop {
        let Some((size_line, tail)) = rest.split_once("\r\n") else {
            return Err(Error::UnexpectedResponse("truncated chunked body".into()));
        };
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| Error::UnexpectedResponse(format!("bad chunk size: {size_line}")))?;
        if size == 0 {
            break;
        }
        if tail.len() < size {
            return Err(Error::UnexpectedResponse("truncated chunked body".into()));
        }
        decoded.push_str(&tail[..size]);
        rest = tail[size..].trim_start_matches("\r\n");
    }

    Ok(decoded)
}
