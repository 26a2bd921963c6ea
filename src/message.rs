//! Raw HTTP messages as they travel over the worker transport.
//!
//! Each inbound frame carries one complete HTTP/1.x request. The reply is written back as two
//! frames: the heart-beat (empty when the request could not be parsed) followed by the raw
//! HTTP response.

use bytes::Bytes;
use http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode, Version};

pub const PNG_MIME: &str = "image/png";
pub const TXT_MIME: &str = "text/plain;charset=utf-8";

/// Headers parsed per request. Anything past this is a malformed request.
const MAX_HEADERS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("incomplete HTTP request")]
    Incomplete,

    #[error("malformed HTTP request: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("invalid HTTP request: {0}")]
    Invalid(#[from] http::Error),
}

/// Parses one raw HTTP/1.x request.
///
/// The body is everything after the header block, cut to `Content-Length` when present.
pub fn parse_raw_request(raw: &[u8]) -> Result<Request<Vec<u8>>, MessageError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    let offset = match parsed.parse(raw)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Err(MessageError::Incomplete),
    };

    let method = parsed.method.unwrap_or("GET");
    let path = parsed.path.unwrap_or("/");
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).map_err(http::Error::from)?)
        .uri(path)
        .version(version);

    let mut content_length = None;
    for header in parsed.headers.iter() {
        if header.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            content_length = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok());
        }
        builder = builder.header(header.name, header.value);
    }

    let mut body = raw[offset..].to_vec();
    if let Some(len) = content_length {
        body.truncate(len);
    }

    Ok(builder.body(body)?)
}

/// A response ready to be sent back, plus the heart-beat that precedes it on the wire.
#[derive(Debug)]
pub struct WorkerReply {
    pub response: Response<Vec<u8>>,
    pub heart_beat: Option<String>,
}

impl WorkerReply {
    pub fn ok(version: Version, content_type: &'static str, body: Vec<u8>) -> Self {
        Self::build(version, StatusCode::OK, Some(content_type), body)
    }

    /// `400 Bad Request` with `reason` as the body.
    pub fn bad_request(version: Version, reason: impl Into<String>) -> Self {
        Self::build(version, StatusCode::BAD_REQUEST, None, reason.into().into_bytes())
    }

    pub fn with_heart_beat(mut self, heart_beat: impl Into<String>) -> Self {
        self.heart_beat = Some(heart_beat.into());
        self
    }

    fn build(version: Version, status: StatusCode, content_type: Option<&'static str>, body: Vec<u8>) -> Self {
        let len = body.len();
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.version_mut() = version;

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));

        Self { response, heart_beat: None }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// The two frames sent back over the transport.
    pub fn into_frames(self) -> [Bytes; 2] {
        let heart_beat = Bytes::from(self.heart_beat.unwrap_or_default());
        [heart_beat, Bytes::from(serialize_response(&self.response))]
    }
}

/// Writes `response` as raw HTTP/1.x bytes.
pub fn serialize_response(response: &Response<Vec<u8>>) -> Vec<u8> {
    let version = match response.version() {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };
    let status = response.status();

    let mut out = Vec::with_capacity(128 + response.body().len());
    out.extend_from_slice(
        format!("{version} {} {}\r\n", status.as_u16(), status.canonical_reason().unwrap_or("")).as_bytes(),
    );
    for (name, value) in response.headers() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(response.body());
    out
}
