//! Minimal HTTP/1.1 parsing and response building.
//!
//! The clients are phones on the venue network polling a handful of JSON
//! endpoints; a full HTTP stack buys nothing here. Requests are framed out
//! of the raw receive buffer (supporting pipelined keep-alive), and every
//! response carries the same permissive CORS headers as the preflight so
//! browser clients on another origin can poll freely.

use crate::error::{ServerError, ServerResult};
use cuelink_model::wire::ErrorBody;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

/// Upper bound on the header block; larger heads are rejected as malformed.
const MAX_HEAD_BYTES: usize = 64 * 1024;
/// Upper bound on a request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A parsed HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, upper-case.
    pub method: String,
    /// Request path, without query string.
    pub path: String,
    headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Request {
    /// Builds a request directly, for in-process dispatch.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Sets a JSON body.
    pub fn with_json<T: Serialize>(mut self, payload: &T) -> Self {
        self.body = serde_json::to_vec(payload).unwrap_or_default();
        self
    }

    /// Tries to frame one request out of the front of `buf`.
    ///
    /// Returns `Ok(None)` while the buffer holds an incomplete request, and
    /// `Ok(Some((request, consumed)))` once a full head and body are
    /// present. Malformed bytes are an error, never a panic.
    pub fn try_parse(buf: &[u8]) -> ServerResult<Option<(Request, usize)>> {
        let Some(head_end) = find_head_end(buf) else {
            if buf.len() > MAX_HEAD_BYTES {
                return Err(ServerError::malformed("header block too large"));
            }
            return Ok(None);
        };

        let head = std::str::from_utf8(&buf[..head_end])
            .map_err(|_| ServerError::malformed("non-utf8 header block"))?;
        let mut lines = head.split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| ServerError::malformed("empty request"))?;
        let mut parts = request_line.split_ascii_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| ServerError::malformed("missing method"))?
            .to_ascii_uppercase();
        let target = parts
            .next()
            .ok_or_else(|| ServerError::malformed("missing request target"))?;
        if parts.next().is_none() {
            return Err(ServerError::malformed("missing http version"));
        }
        let path = target.split('?').next().unwrap_or(target).to_string();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ServerError::malformed("bad header line"))?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        let content_length = headers
            .iter()
            .find(|(name, _)| name == "content-length")
            .map(|(_, value)| {
                value
                    .parse::<usize>()
                    .map_err(|_| ServerError::malformed("bad content-length"))
            })
            .transpose()?
            .unwrap_or(0);
        if content_length > MAX_BODY_BYTES {
            return Err(ServerError::malformed("body too large"));
        }

        let body_start = head_end + 4;
        if buf.len() < body_start + content_length {
            return Ok(None);
        }
        let body = buf[body_start..body_start + content_length].to_vec();

        Ok(Some((
            Request {
                method,
                path,
                headers,
                body,
            },
            body_start + content_length,
        )))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ServerResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ServerError::invalid_body(e.to_string()))
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// An HTTP response ready for serialization.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    preflight: bool,
    close: bool,
}

impl Response {
    /// A JSON response with the given status.
    pub fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_vec(payload) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
                preflight: false,
                close: false,
            },
            Err(err) => {
                error!(%err, "response serialization failed");
                Self::text(500, "Internal Server Error")
            }
        }
    }

    /// A 200 JSON response.
    pub fn ok_json<T: Serialize>(payload: &T) -> Self {
        Self::json(200, payload)
    }

    /// A 200 HTML response.
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.as_bytes().to_vec(),
            preflight: false,
            close: false,
        }
    }

    /// A plain-text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
            preflight: false,
            close: false,
        }
    }

    /// The 404 response for unmatched routes.
    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    /// The CORS preflight response for `OPTIONS` on any path.
    pub fn preflight() -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
            preflight: true,
            close: false,
        }
    }

    /// Marks this as the last response on its connection.
    ///
    /// The connection header flips to `Connection: close`; the caller is
    /// expected to drop the socket after sending.
    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }

    /// A structured error response derived from a [`ServerError`].
    pub fn from_error(err: &ServerError) -> Self {
        Self::json(err.http_status(), &ErrorBody::new(err.to_string()))
    }

    /// The response status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response, CORS headers included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type, Authorization\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            if self.close { "close" } else { "keep-alive" },
        )
        .into_bytes();
        if self.preflight {
            out.extend_from_slice(b"Access-Control-Max-Age: 86400\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_get_with_query_and_headers() {
        let raw = b"GET /cues?poll=1 HTTP/1.1\r\nHost: x\r\nUser-Agent: CueLink/2.1\r\n\r\n";
        let (req, consumed) = Request::try_parse(raw).unwrap().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/cues");
        assert_eq!(req.header("user-agent"), Some("CueLink/2.1"));
        assert_eq!(req.header("User-Agent"), Some("CueLink/2.1"));
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn parses_post_with_body() {
        let raw = b"POST /auth/login HTTP/1.1\r\nContent-Length: 7\r\n\r\n{\"a\":1}";
        let (req, consumed) = Request::try_parse(raw).unwrap().unwrap();
        assert_eq!(req.body, b"{\"a\":1}");
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn incomplete_requests_wait_for_more_bytes() {
        assert!(Request::try_parse(b"GET /cues HT").unwrap().is_none());
        assert!(
            Request::try_parse(b"POST /x HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn pipelined_requests_frame_one_at_a_time() {
        let raw: &[u8] = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let (first, consumed) = Request::try_parse(raw).unwrap().unwrap();
        assert_eq!(first.path, "/a");
        let (second, rest) = Request::try_parse(&raw[consumed..]).unwrap().unwrap();
        assert_eq!(second.path, "/b");
        assert_eq!(consumed + rest, raw.len());
    }

    #[test]
    fn malformed_requests_are_errors_not_panics() {
        assert!(Request::try_parse(b"GET\r\n\r\n").is_err());
        assert!(Request::try_parse(b"\xff\xfe\r\n\r\n").is_err());
        assert!(
            Request::try_parse(b"POST /x HTTP/1.1\r\nContent-Length: nope\r\n\r\n").is_err()
        );
    }

    #[test]
    fn bearer_extraction() {
        let raw = b"GET /auth/me HTTP/1.1\r\nAuthorization: Bearer abc123\r\n\r\n";
        let (req, _) = Request::try_parse(raw).unwrap().unwrap();
        assert_eq!(req.bearer_token(), Some("abc123"));

        let raw = b"GET /auth/me HTTP/1.1\r\nAuthorization: Basic abc123\r\n\r\n";
        let (req, _) = Request::try_parse(raw).unwrap().unwrap();
        assert_eq!(req.bearer_token(), None);
    }

    #[test]
    fn responses_carry_cors_headers() {
        let bytes = Response::ok_json(&serde_json::json!({"success": true})).to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Connection: keep-alive"));
        assert!(text.contains("Access-Control-Allow-Origin: *"));
        assert!(text.contains("Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS"));
        assert!(!text.contains("Access-Control-Max-Age"));
    }

    #[test]
    fn closing_responses_advertise_connection_close() {
        let response = Response::from_error(&ServerError::malformed("garbage")).closing();
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.contains("Connection: close"));
        assert!(!text.contains("Connection: keep-alive"));
    }

    #[test]
    fn preflight_carries_max_age() {
        let text = String::from_utf8(Response::preflight().to_bytes()).unwrap();
        assert!(text.contains("Access-Control-Max-Age: 86400"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(buf in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let _ = Request::try_parse(&buf);
        }

        #[test]
        fn valid_head_with_junk_headers_never_panics(lines in proptest::collection::vec("[ -~]{0,40}", 0..8)) {
            let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
            for line in &lines {
                raw.extend_from_slice(line.as_bytes());
                raw.extend_from_slice(b"\r\n");
            }
            raw.extend_from_slice(b"\r\n");
            let _ = Request::try_parse(&raw);
        }
    }
}
