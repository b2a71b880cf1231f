//! One-shot localhost listener capturing the authorization redirect.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::AuthError;

const MAX_HEAD_BYTES: usize = 8192;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_HTML: &str = "<html><body><h1>Native App Authorization</h1>\
<p>Authorization complete. You may close this window.</p></body></html>";
const ERROR_HTML: &str = "<html><body><h1>Native App Authorization</h1>\
<p>Authorization failed. You may close this window and retry.</p></body></html>";

type Outcome = Result<String, AuthError>;

/// Bound callback endpoint. Serves until one redirect carries a code or an
/// error; everything else is answered and ignored.
///
/// Dropping the handle aborts the accept loop and releases the port.
///
/// # Example
/// ```no_run
/// use native_auth::auth::CallbackListener;
///
/// # async fn example() -> Result<(), native_auth::auth::AuthError> {
/// let listener = CallbackListener::bind(("127.0.0.1", 0)).await?;
/// println!("redirect to http://localhost:{}/", listener.port());
/// let code = listener.wait_for_code().await?;
/// # let _ = code;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CallbackListener {
    local_addr: SocketAddr,
    outcome: oneshot::Receiver<Outcome>,
    task: JoinHandle<()>,
}

impl CallbackListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr).await.map_err(|err| {
            AuthError::LocalListener(format!("failed to bind callback listener: {err}"))
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            AuthError::LocalListener(format!("callback listener has no local address: {err}"))
        })?;

        let (tx, outcome) = oneshot::channel();
        let task = tokio::spawn(serve(listener, tx));
        tracing::debug!(addr = %local_addr, "Callback listener bound");

        Ok(Self {
            local_addr,
            outcome,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Block until the redirect arrives. No timeout is applied.
    pub async fn wait_for_code(mut self) -> Result<String, AuthError> {
        match (&mut self.outcome).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AuthError::LocalListener(
                "callback listener stopped before a redirect arrived".to_string(),
            )),
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, outcome: oneshot::Sender<Outcome>) {
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(error = %err, "Callback listener accept failed");
                let _ = outcome.send(Err(AuthError::LocalListener(format!(
                    "callback listener accept failed: {err}"
                ))));
                return;
            }
        };

        let head = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut socket)).await {
            Ok(Ok(head)) => head,
            Ok(Err(err)) => {
                tracing::debug!(%peer, error = %err, "Dropping unreadable callback request");
                continue;
            }
            Err(_) => {
                tracing::debug!(%peer, "Dropping idle callback connection");
                continue;
            }
        };

        let callback = parse_request_head(&head);
        respond(&mut socket, &callback).await;
        match callback {
            Callback::Code(code) => {
                tracing::debug!(%peer, "Received authorization code");
                let _ = outcome.send(Ok(code));
                return;
            }
            Callback::Error { error, description } => {
                tracing::debug!(%peer, %error, "Received authorization error");
                let message = match description {
                    Some(description) => format!("authorization failed: {error}: {description}"),
                    None => format!("authorization failed: {error}"),
                };
                let _ = outcome.send(Err(AuthError::LocalListener(message)));
                return;
            }
            Callback::NotFound | Callback::BadRequest => {
                tracing::debug!(%peer, "Ignoring unrelated request to callback listener");
            }
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= MAX_HEAD_BYTES || buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    buf.truncate(MAX_HEAD_BYTES);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn respond(socket: &mut TcpStream, callback: &Callback) {
    let (status, body) = match callback {
        Callback::Code(_) => ("200 OK", SUCCESS_HTML),
        Callback::Error { .. } => ("400 Bad Request", ERROR_HTML),
        Callback::NotFound => ("404 Not Found", "Not Found"),
        Callback::BadRequest => ("400 Bad Request", "Bad Request"),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Callback {
    Code(String),
    Error {
        error: String,
        description: Option<String>,
    },
    NotFound,
    BadRequest,
}

fn parse_request_head(head: &str) -> Callback {
    let Some(first) = head.lines().next() else {
        return Callback::BadRequest;
    };
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || !target.starts_with('/') {
        return Callback::BadRequest;
    }
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return Callback::BadRequest;
    };

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            "error_description" if description.is_none() => {
                description = Some(value.into_owned())
            }
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) => Callback::Error { error, description },
        (Some(code), None) if !code.is_empty() => Callback::Code(code),
        _ => Callback::NotFound,
    }
}
