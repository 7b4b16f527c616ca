//! Local redirect listener for the browser login.
//!
//! The provider sends the browser back to the configured success URL; this
//! listener answers every request on the callback port, ignores anything that
//! is not a `GET` on the callback path (favicon probes, prefetches), and hands
//! back the query parameters of the first real callback.

use socialauth_types::{Params, SocialAuthError, traits::Result};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REQUEST_LINE: usize = 8192;
const NOT_FOUND: &str =
    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Bind the local callback port.
///
/// Must happen before the browser is opened so a fast redirect cannot race
/// the listener.
///
/// # Errors
///
/// Returns an error if the port is taken or cannot be bound.
pub async fn bind_callback(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
        if e.kind() == io::ErrorKind::AddrInUse {
            SocialAuthError::Auth(format!(
                "callback port {port} is already in use; free it or set `callback_port` \
                 in the configuration"
            ))
        } else {
            SocialAuthError::Auth(format!("cannot bind callback port {port}: {e}"))
        }
    })
}

/// Path component of a success URL, e.g. `/callback` for
/// `http://localhost:54546/callback`.
#[must_use]
pub fn callback_path(success_url: &str) -> &str {
    let rest = success_url
        .split_once("://")
        .map_or(success_url, |(_, rest)| rest);
    let Some(start) = rest.find('/') else {
        return "/";
    };
    rest[start..].split(['?', '#']).next().unwrap_or("/")
}

/// Serve the callback port until the provider redirect on `path` arrives.
///
/// The browser gets a page reporting either success or the provider's
/// `error` / `error_description`. Gives up after 120 seconds.
///
/// # Errors
///
/// Returns an error if accepting fails, the callback query is malformed, or
/// the timeout expires.
pub async fn accept_callback(listener: TcpListener, path: &str) -> Result<Params> {
    tokio::time::timeout(TIMEOUT, serve_until_callback(&listener, path))
        .await
        .map_err(|_| SocialAuthError::Auth("timed out waiting for the OAuth callback".into()))?
}

async fn serve_until_callback(listener: &TcpListener, path: &str) -> Result<Params> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| SocialAuthError::Auth(format!("callback accept failed: {e}")))?;

        let line = match read_request_line(&mut stream).await {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "dropping unreadable callback request");
                continue;
            }
        };
        let Some(query) = callback_query(&line, path) else {
            tracing::debug!(request = %line, "ignoring request outside the callback path");
            respond(&mut stream, NOT_FOUND).await;
            continue;
        };

        let params: Params = match serde_urlencoded::from_str(query) {
            Ok(params) => params,
            Err(e) => {
                respond(&mut stream, &page("Authentication failed", "Malformed callback query.")).await;
                return Err(SocialAuthError::Auth(format!(
                    "invalid callback query params: {e}"
                )));
            }
        };
        respond(&mut stream, &reply(&params)).await;
        return Ok(params);
    }
}

/// Read up to the end of the HTTP request line, across as many reads as it takes.
async fn read_request_line<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(2).position(|w| w == b"\r\n") {
            buf.truncate(end);
            return Ok(String::from_utf8_lossy(&buf).into_owned());
        }
        if buf.len() >= MAX_REQUEST_LINE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request line too long"));
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the request line ended",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Query string of `request_line` if it is a `GET` on `path`.
fn callback_query<'a>(request_line: &'a str, path: &str) -> Option<&'a str> {
    let mut parts = request_line.split_ascii_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let (target_path, query) = target.split_once('?').unwrap_or((target, ""));
    (target_path == path).then_some(query)
}

fn reply(params: &Params) -> String {
    match params.get("error") {
        Some(error) => {
            let detail = params
                .get("error_description")
                .map_or_else(|| error.clone(), |d| format!("{error}: {d}"));
            page("Authentication failed", &detail)
        }
        None => page("Authentication complete", "You may close this tab."),
    }
}

fn page(title: &str, message: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
         <html><body><h1>{title}</h1><p>{}</p></body></html>",
        escape_html(message)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

async fn respond(stream: &mut TcpStream, response: &str) {
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(error = %e, "failed to answer callback request");
    }
    let _ = stream.shutdown().await;
}
