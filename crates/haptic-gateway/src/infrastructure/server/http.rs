//! Minimal HTTP/1.1 plumbing for the control server.
//!
//! The server speaks just enough HTTP for its one-request-per-connection
//! model: read a request head, answer with a JSON body (or an empty
//! preflight response), close. Bodies on incoming requests are ignored —
//! every route is parameterized through the path alone.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::responses::ApiResponse;

/// Upper bound on the request head; anything larger is rejected.
const MAX_HEAD_BYTES: usize = 8192;

/// CORS headers attached to every JSON response. The private-network header
/// lets public web origins reach this loopback-only server through Chrome's
/// private network access checks.
const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
                            Access-Control-Allow-Private-Network: true\r\n";

/// A parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// True when the head asks for a WebSocket upgrade.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.header("Upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }
}

/// Reads bytes until the blank line terminating the request head.
///
/// Returns `None` on an empty connection (client connected and went away)
/// and an error string when the head is oversized or not valid UTF-8.
pub async fn read_request_head<S>(stream: &mut S) -> Result<Option<String>, String>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| format!("read failed: {err}"))?;
        if read == 0 {
            return if head.is_empty() {
                Ok(None)
            } else {
                Err("connection closed mid-head".to_string())
            };
        }
        head.extend_from_slice(&chunk[..read]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err("request head too large".to_string());
        }
    }

    String::from_utf8(head).map(Some).map_err(|_| "request head is not UTF-8".to_string())
}

/// Parses the request line and headers out of a head.
pub fn parse_request_head(head: &str) -> Result<HttpRequest, String> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| "empty request line".to_string())?
        .to_ascii_uppercase();
    let target = parts
        .next()
        .ok_or_else(|| "request line has no target".to_string())?;
    // Strip any query string; routes are path-only.
    let path = target.split('?').next().unwrap_or(target).to_string();

    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    Ok(HttpRequest {
        method,
        path,
        headers,
    })
}

/// Writes a JSON response with CORS headers and `Connection: close`.
pub async fn write_json_response<S>(stream: &mut S, response: &ApiResponse) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let status = response.status_code();
    let body = serde_json::to_string_pretty(response)
        .unwrap_or_else(|_| r#"{"success":false,"error":"serialization failed"}"#.to_string());
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         {CORS_HEADERS}\
         Content-Length: {length}\r\n\
         Connection: close\r\n\r\n",
        reason = reason_phrase(status),
        length = body.len(),
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await
}

/// Writes the CORS preflight response: 200, no body, allowed methods and
/// headers advertised, cached by the browser for a day.
pub async fn write_preflight_response<S>(stream: &mut S) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let head = format!(
        "HTTP/1.1 200 OK\r\n\
         {CORS_HEADERS}\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Access-Control-Max-Age: 86400\r\n\
         Content-Length: 0\r\n\
         Connection: close\r\n\r\n",
    );
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line_and_headers() {
        let head = "GET /waveforms HTTP/1.1\r\nHost: local.jmw.nz\r\nUpgrade: websocket\r\n\r\n";
        let request = parse_request_head(head).expect("parse");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/waveforms");
        assert_eq!(request.header("host"), Some("local.jmw.nz"));
        assert!(request.is_websocket_upgrade());
    }

    #[test]
    fn test_parse_strips_query_string() {
        let head = "GET /devices?verbose=1 HTTP/1.1\r\n\r\n";
        let request = parse_request_head(head).expect("parse");
        assert_eq!(request.path, "/devices");
    }

    #[test]
    fn test_parse_uppercases_method() {
        let head = "post /haptic/wave HTTP/1.1\r\n\r\n";
        let request = parse_request_head(head).expect("parse");
        assert_eq!(request.method, "POST");
    }

    #[test]
    fn test_parse_empty_head_is_error() {
        assert!(parse_request_head("\r\n\r\n").is_err());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let head = "GET / HTTP/1.1\r\nSec-WebSocket-Key: abc==\r\n\r\n";
        let request = parse_request_head(head).expect("parse");
        assert_eq!(request.header("sec-websocket-key"), Some("abc=="));
    }

    #[test]
    fn test_non_websocket_request_is_not_upgrade() {
        let head = "GET /ws HTTP/1.1\r\nConnection: keep-alive\r\n\r\n";
        let request = parse_request_head(head).expect("parse");
        assert!(!request.is_websocket_upgrade());
    }

    #[tokio::test]
    async fn test_read_request_head_finds_terminator() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nBODYBYTES".to_vec();
        let mut stream = std::io::Cursor::new(raw);
        let head = read_request_head(&mut stream).await.expect("read");
        assert!(head.expect("present").contains("Host: x"));
    }

    #[tokio::test]
    async fn test_read_request_head_empty_connection_is_none() {
        let mut stream = std::io::Cursor::new(Vec::<u8>::new());
        assert_eq!(read_request_head(&mut stream).await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_read_request_head_truncated_is_error() {
        let mut stream = std::io::Cursor::new(b"GET / HT".to_vec());
        assert!(read_request_head(&mut stream).await.is_err());
    }

    #[tokio::test]
    async fn test_json_response_carries_cors_headers() {
        let mut out = std::io::Cursor::new(Vec::new());
        write_json_response(&mut out, &ApiResponse::not_found())
            .await
            .expect("write");
        let text = String::from_utf8(out.into_inner()).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *"));
        assert!(text.contains("Access-Control-Allow-Private-Network: true"));
        assert!(text.contains("\"error\": \"Not found\""));
    }

    #[tokio::test]
    async fn test_preflight_response_has_no_body() {
        let mut out = std::io::Cursor::new(Vec::new());
        write_preflight_response(&mut out).await.expect("write");
        let text = String::from_utf8(out.into_inner()).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 0"));
        assert!(text.contains("Access-Control-Allow-Methods: GET, POST, OPTIONS"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
