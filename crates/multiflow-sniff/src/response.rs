//! HTTP/WebSocket handshake classification and reply construction.
//!
//! The parser inspects whatever bytes are present; it never waits for a
//! complete request. Header matching is case-insensitive over names and
//! values, and replies are built byte-exact, fixed header order included.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use tracing::debug;

/// GUID mixed into `Sec-WebSocket-Accept` (RFC 6455 §1.3).
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Key substituted when a client upgrades without `Sec-WebSocket-Key`.
/// Minimal field clients omit the header and still expect a 101.
pub const SAMPLE_WS_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Reply for malformed HTTP.
pub const BAD_REQUEST_REPLY: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

/// Decision for the opening bytes of a connection that did not sniff as a
/// tunneled protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send these bytes and keep sniffing subsequent reads.
    Send(Vec<u8>),
    /// Send these bytes and close the connection.
    SendAndClose(Vec<u8>),
}

/// Classify a request and decide the reply.
///
/// Callers route tunneled byte shapes (SSH banners included) through
/// [`crate::sniff`] before consulting this parser, so only HTTP-or-garbage
/// input arrives here. A parseable HTTP request line gets either the
/// WebSocket 101 handshake (when both upgrade headers are present) or
/// `default_reply`, in both cases leaving the connection open for an
/// embedded protocol; anything else is malformed and gets a 400 with
/// close-after-write.
///
/// The classification is a pure function of its inputs: running it twice on
/// the same bytes produces the same reply.
pub fn classify_request(data: &[u8], default_reply: &[u8]) -> Reply {
    if !is_http_request_line(data) {
        return Reply::SendAndClose(BAD_REQUEST_REPLY.to_vec());
    }

    if is_websocket_upgrade(data) {
        let key = match header_value(data, "sec-websocket-key") {
            Some(key) if !key.is_empty() => key,
            _ => {
                debug!("websocket upgrade without Sec-WebSocket-Key, using sample key");
                SAMPLE_WS_KEY.to_string()
            }
        };
        return Reply::Send(websocket_reply(&key));
    }

    Reply::Send(default_reply.to_vec())
}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
pub fn websocket_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn websocket_reply(key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        websocket_accept(key)
    )
    .into_bytes()
}

/// A valid request line is `METHOD SP TARGET SP HTTP/… CRLF`. Data with no
/// CRLF, or no method token before the first space, is malformed.
fn is_http_request_line(data: &[u8]) -> bool {
    let line = match find_crlf(data) {
        Some(end) => &data[..end],
        None => return false,
    };
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(_) => return false,
    };
    let mut parts = line.split(' ');
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    !method.is_empty()
        && method.bytes().all(|b| b.is_ascii_alphabetic())
        && !target.is_empty()
        && version.starts_with("HTTP/")
}

fn is_websocket_upgrade(data: &[u8]) -> bool {
    let upgrade = header_value(data, "upgrade")
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("websocket") || v.contains("ws")
        })
        .unwrap_or(false);
    let connection = header_value(data, "connection")
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    upgrade && connection
}

/// Find a header by lowercase name in whatever header lines are present.
/// Returns the trimmed value as sent by the client.
fn header_value(data: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    let mut lines = text.split("\r\n");
    lines.next(); // request line
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((header, value)) = line.split_once(':') {
            if header.trim().eq_ignore_ascii_case(name) {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}
