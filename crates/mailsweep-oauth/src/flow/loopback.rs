//! One-shot loopback redirect receiver for installed-app consent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SUCCESS_PAGE: &str = "<html><body style=\"font-family:system-ui\"><h2>Sign-in complete</h2>\
<p>You can close this window and return to mailsweep.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body style=\"font-family:system-ui\"><h2>Sign-in failed</h2>\
<p>Return to mailsweep for details.</p></body></html>";

/// Listens on `127.0.0.1` for the provider's redirect after consent.
#[derive(Debug)]
pub struct LoopbackReceiver {
    listener: TcpListener,
    addr: SocketAddr,
}

/// What the redirect carried.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code { code: String, state: Option<String> },
    Denied(String),
    Unrelated,
}

impl LoopbackReceiver {
    /// Binds an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Returns an error if no port can be bound.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        debug!("Consent redirect receiver listening on {addr}");
        Ok(Self { listener, addr })
    }

    /// The redirect URI to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// Requests that carry neither a code nor an error (a browser's
    /// favicon request, for example) are answered and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if nothing arrives in `timeout_secs`,
    /// [`Error::AccessDenied`] if the user declined, and
    /// [`Error::StateMismatch`] if the redirect's state is not `expected_state`.
    pub async fn wait_for_code(self, expected_state: &str, timeout_secs: u64) -> Result<String> {
        tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.accept_until_callback(expected_state),
        )
        .await
        .map_err(|_| Error::Timeout(timeout_secs))?
    }

    async fn accept_until_callback(&self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let callback = match read_callback(&mut stream).await {
                Ok(callback) => callback,
                Err(e) => {
                    warn!("Dropping malformed redirect from {peer}: {e}");
                    continue;
                }
            };

            match callback {
                Callback::Code { code, state } => {
                    respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                    if state.as_deref() != Some(expected_state) {
                        return Err(Error::StateMismatch);
                    }
                    return Ok(code);
                }
                Callback::Denied(reason) => {
                    respond(&mut stream, "200 OK", FAILURE_PAGE).await;
                    debug!("Consent denied: {reason}");
                    return Err(Error::AccessDenied);
                }
                Callback::Unrelated => respond(&mut stream, "404 Not Found", "").await,
            }
        }
    }
}

async fn read_callback(stream: &mut TcpStream) -> Result<Callback> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    Ok(parse_request_line(request.lines().next().unwrap_or_default()))
}

fn parse_request_line(line: &str) -> Callback {
    let Some(target) = line.split_whitespace().nth(1) else {
        return Callback::Unrelated;
    };
    let query = target.split_once('?').map_or("", |(_, q)| q);
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        return Callback::Denied(error.clone());
    }
    params.get("code").map_or(Callback::Unrelated, |code| Callback::Code {
        code: code.clone(),
        state: params.get("state").cloned(),
    })
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Failed to answer redirect: {e}");
    }
}
