//! Local HTTP listener receiving the OAuth2 redirect.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;
use url::Url;

use drivedrop_common::{Error, Result};

/// Upper bound on the request head we are willing to buffer.
const MAX_REQUEST_HEAD: usize = 8 * 1024;
/// How long one connection may take to deliver its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body><p>The authentication flow has completed. \
You may close this window.</p></body></html>";

/// Query parameters of a redirect that ends the flow.
#[derive(Debug, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::Authorization(format!(
                "Authorization was denied: {}",
                error
            )));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(Error::Authorization(
                "State mismatch in authorization callback".to_string(),
            ));
        }

        self.code
            .ok_or_else(|| Error::Authorization("No authorization code received".to_string()))
    }
}

/// One-shot redirect listener bound to an ephemeral loopback port.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
    read_timeout: Duration,
}

impl CallbackListener {
    /// Bind to `127.0.0.1` on a port chosen by the OS.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            port,
            read_timeout: REQUEST_READ_TIMEOUT,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Wait for the browser to deliver the authorization code.
    ///
    /// Requests that carry neither `code` nor `error` (favicon probes and the
    /// like) are answered with 404 and ignored.
    ///
    /// # Errors
    /// - `Error::Authorization` when the operator denies access, the state
    ///   does not match, or `timeout` elapses first
    pub async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.accept_callback())
            .await
            .map_err(|_| {
                Error::Authorization(format!(
                    "Timed out after {}s waiting for the authorization callback",
                    timeout.as_secs()
                ))
            })??
            .into_code(expected_state)
    }

    async fn accept_callback(&self) -> Result<CallbackParams> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;

            let target =
                match tokio::time::timeout(self.read_timeout, read_request_target(&mut stream)).await {
                    Ok(Ok(target)) => target,
                    Ok(Err(e)) => {
                        debug!(%peer, error = %e, "Discarding unreadable callback request");
                        continue;
                    }
                    Err(_) => {
                        debug!(%peer, "Dropping idle connection on callback listener");
                        continue;
                    }
                };

            match parse_callback(&target) {
                Some(params) => {
                    if let Err(e) = respond(&mut stream, "200 OK", SUCCESS_PAGE).await {
                        debug!(error = %e, "Failed to answer authorization callback");
                    }
                    return Ok(params);
                }
                None => {
                    debug!(%target, "Ignoring unrelated request on callback listener");
                    let _ = respond(&mut stream, "404 Not Found", "").await;
                }
            }
        }
    }
}

/// Read the request head and return the request target of its first line.
async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_HEAD {
            return Err(Error::InvalidInput("Request head too large".to_string()));
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default();

    request_line
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidInput(format!("Malformed request line: {}", request_line)))
}

fn parse_callback(target: &str) -> Option<CallbackParams> {
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut params = CallbackParams {
        code: None,
        state: None,
        error: None,
    };

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }

    if params.code.is_none() && params.error.is_none() {
        return None;
    }

    Some(params)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
