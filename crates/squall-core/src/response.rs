//! HTTP response PDU
//!
//! Also home to [`TypedResponse`], the generic carrier higher layers use
//! to thread parse/convert results through a response pipeline without
//! losing the wire response metadata.

use crate::content_type::ContentType;
use crate::error::{BoxError, Error, Result};
use crate::headers::HeaderStore;
use crate::message::{split_header_block, Body, EventTrackingId};
use crate::method::Method;
use crate::request::{HttpVersion, Request};
use crate::status::StatusCode;
use bytes::Bytes;
use std::net::SocketAddr;

/// HTTP Response
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Protocol version of the status line
    pub version: HttpVersion,
    /// Response headers
    pub headers: HeaderStore,
    /// Response body
    pub body: Body,
    /// Remote endpoint, when the transport knows it
    pub remote: Option<SocketAddr>,
    /// Local endpoint, when the transport knows it
    pub local: Option<SocketAddr>,
    /// Tracking id of the request that produced this response
    pub tracking_id: Option<EventTrackingId>,
    /// First line of the originating request, kept for diagnostics
    pub request_line: Option<String>,
}

impl Response {
    /// Create a new response
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: HttpVersion::Http11,
            headers: HeaderStore::new(),
            body: Body::Empty,
            remote: None,
            local: None,
            tracking_id: None,
            request_line: None,
        }
    }

    /// Create a response correlated to the request that produced it.
    pub fn for_request(request: &Request, status: StatusCode) -> Self {
        let mut response = Self::new(status);
        response.version = request.version;
        response.remote = request.remote;
        response.local = request.local;
        response.tracking_id = Some(request.tracking_id.clone());
        response.request_line = Some(request.first_line());
        response
    }

    /// Create a 200 OK response
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Create a JSON response
    pub fn json(body: impl Into<Body>) -> Self {
        ResponseBuilder::new(StatusCode::OK)
            .content_type(ContentType::json_utf8())
            .body(body)
            .build()
    }

    /// Create a text response
    pub fn text(body: impl Into<Body>) -> Self {
        ResponseBuilder::new(StatusCode::OK)
            .content_type(ContentType::text_utf8())
            .body(body)
            .build()
    }

    /// Create a 404 Not Found response
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .content_type(ContentType::text_utf8())
            .body("Not Found")
            .build()
    }

    /// Create a 400 Bad Request response
    pub fn bad_request(message: &str) -> Self {
        ResponseBuilder::new(StatusCode::BAD_REQUEST)
            .content_type(ContentType::text_utf8())
            .body(message.to_string())
            .build()
    }

    /// Create a 405 response carrying the allowed-method set
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
            .header("Allow", allow)
            .build()
    }

    /// Create a 406 Not Acceptable response
    pub fn not_acceptable() -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE)
    }

    /// Create a 500 Internal Server Error response
    pub fn internal_error(message: &str) -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .content_type(ContentType::text_utf8())
            .body(message.to_string())
            .build()
    }

    /// The well-formed response for a message that failed structural
    /// parsing: 505 for version errors, 400 for everything else.
    pub fn from_parse_error(error: &Error) -> Self {
        ResponseBuilder::new(error.response_status())
            .content_type(ContentType::text_utf8())
            .body(error.to_string())
            .build()
    }

    /// Parse a response header block with no body.
    pub fn parse(header: &str) -> Result<Self> {
        Self::parse_with_body(header, Body::Empty)
    }

    /// Parse a response header block and attach a body.
    ///
    /// The status line must have at least three fields and a status code
    /// from the known table.
    pub fn parse_with_body(header: &str, body: Body) -> Result<Self> {
        let (first_line, fields) = split_header_block(header)?;

        let tokens: Vec<&str> = first_line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(Error::InvalidStatusLine(first_line));
        }

        let status = StatusCode::parse(tokens[1])?;

        // The protocol field is read leniently on the response path.
        let version = tokens[0]
            .split_once('/')
            .and_then(|(_, v)| HttpVersion::parse(v))
            .unwrap_or(HttpVersion::Http11);

        let mut headers = HeaderStore::new();
        for (name, value) in fields {
            headers.set(name, value);
        }

        log::debug!("parsed response {}", status);

        Ok(Self {
            status,
            version,
            headers,
            body,
            remote: None,
            local: None,
            tracking_id: None,
            request_line: None,
        })
    }

    /// Parse a received response and correlate it with the request that
    /// caused it.
    pub fn parse_for(header: &str, body: Body, request: &Request) -> Result<Self> {
        let mut response = Self::parse_with_body(header, body)?;
        response.tracking_id = Some(request.tracking_id.clone());
        response.request_line = Some(request.first_line());
        Ok(response)
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The Allow header as a method list
    pub fn allow(&mut self) -> Option<Vec<Method>> {
        self.headers.get_typed::<Vec<Method>>("Allow")
    }

    /// The Content-Type header, parsed
    pub fn content_type(&mut self) -> Option<ContentType> {
        self.headers.get_typed::<ContentType>("Content-Type")
    }

    /// The Content-Length header, parsed
    pub fn content_length(&mut self) -> Option<u64> {
        self.headers.get_typed::<u64>("Content-Length")
    }

    /// Get body as string (if buffered UTF-8)
    pub fn body_string(&self) -> Option<String> {
        self.body
            .as_bytes()
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(|s| s.to_string())
    }

    /// Serialize to wire form. `Content-Length` is synthesized for a
    /// buffered body when the header is absent; a streaming body is
    /// written by the transport, not here.
    pub fn to_wire_bytes(&self) -> Bytes {
        let body_len = self.body.as_bytes().map(|b| b.len()).unwrap_or(0);
        let mut buf = Vec::with_capacity(256 + body_len);

        // Status line
        buf.extend_from_slice(b"HTTP/");
        buf.extend_from_slice(self.version.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.status.as_u16().to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.status.reason_phrase().as_bytes());
        buf.extend_from_slice(b"\r\n");

        // Headers, in insertion order
        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        if body_len > 0 && !self.headers.contains("Content-Length") {
            buf.extend_from_slice(b"Content-Length: ");
            buf.extend_from_slice(body_len.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"\r\n");

        if let Some(body) = self.body.as_bytes() {
            buf.extend_from_slice(body);
        }

        Bytes::from(buf)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

/// Builder for constructing responses
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Create a new builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            response: Response::new(status),
        }
    }

    /// Set status code
    pub fn status(mut self, status: StatusCode) -> Self {
        self.response.status = status;
        self
    }

    /// Set the protocol version
    pub fn version(mut self, version: HttpVersion) -> Self {
        self.response.version = version;
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.set(name, value);
        self
    }

    /// Set the Content-Type header
    pub fn content_type(self, content_type: ContentType) -> Self {
        self.header("Content-Type", content_type.to_string())
    }

    /// Set body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.response.body = body.into();
        self
    }

    /// Build the response
    pub fn build(self) -> Response {
        self.response
    }
}

/// A response plus strongly-typed converted content.
///
/// Carries the outcome of interpreting a response body - the converted
/// value, or a fault flag with the captured error - while keeping the
/// original wire response intact.
pub struct TypedResponse<C> {
    /// The wire response this content was taken from
    pub response: Response,
    /// The parsed/converted content, when conversion succeeded
    pub content: Option<C>,
    is_fault: bool,
    /// An error captured during parsing or conversion
    pub error: Option<BoxError>,
}

impl<C> TypedResponse<C> {
    /// Successful conversion.
    pub fn ok(response: Response, content: C) -> Self {
        Self {
            response,
            content: Some(content),
            is_fault: false,
            error: None,
        }
    }

    /// The response carried a fault payload.
    pub fn fault(response: Response, error: BoxError) -> Self {
        Self {
            response,
            content: None,
            is_fault: true,
            error: Some(error),
        }
    }

    /// A fault that still carries content (e.g. a decoded fault detail).
    pub fn fault_with(response: Response, content: C, error: BoxError) -> Self {
        Self {
            response,
            content: Some(content),
            is_fault: true,
            error: Some(error),
        }
    }

    /// Interpret a buffered response body with the given parser.
    pub fn parse_content<F>(response: Response, parser: F) -> Self
    where
        F: FnOnce(&Bytes) -> std::result::Result<C, BoxError>,
    {
        let parsed = response.body.as_bytes().map(|bytes| parser(bytes));
        match parsed {
            Some(Ok(content)) => Self::ok(response, content),
            Some(Err(error)) => Self::fault(response, error),
            None => Self::fault(response, "response body is not buffered".into()),
        }
    }

    /// Whether the response was classified as a fault.
    pub fn is_fault(&self) -> bool {
        self.is_fault
    }

    /// An unexpected error during conversion - an error that was *not*
    /// part of a deliberate fault payload.
    pub fn has_errors(&self) -> bool {
        self.error.is_some() && !self.is_fault
    }

    /// Convert the content, keeping metadata and fault state.
    pub fn map_content<D>(self, convert: impl FnOnce(C) -> D) -> TypedResponse<D> {
        TypedResponse {
            response: self.response,
            content: self.content.map(convert),
            is_fault: self.is_fault,
            error: self.error,
        }
    }

    /// Convert the content fallibly; a conversion error flips the
    /// result into a fault.
    pub fn try_map_content<D>(
        self,
        convert: impl FnOnce(C) -> std::result::Result<D, BoxError>,
    ) -> TypedResponse<D> {
        let TypedResponse {
            response,
            content,
            is_fault,
            error,
        } = self;
        match content.map(convert) {
            Some(Ok(converted)) => TypedResponse {
                response,
                content: Some(converted),
                is_fault,
                error,
            },
            Some(Err(convert_error)) => TypedResponse {
                response,
                content: None,
                is_fault: true,
                error: Some(convert_error),
            },
            None => TypedResponse {
                response,
                content: None,
                is_fault,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[test]
    fn test_response_json() {
        let mut res = Response::json(r#"{"foo":"bar"}"#);
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some(ContentType::json_utf8()));
    }

    #[test]
    fn test_parse_status_line() {
        let res = Response::parse("HTTP/1.1 200 OK\r\nServer: test\r\n\r\n").unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.version, HttpVersion::Http11);
        assert_eq!(res.header("server"), Some("test"));
    }

    #[test]
    fn test_parse_status_line_too_short() {
        assert!(matches!(
            Response::parse("HTTP/1.1 200\r\n\r\n"),
            Err(Error::InvalidStatusLine(_))
        ));
    }

    #[test]
    fn test_parse_unknown_status_rejected() {
        assert!(matches!(
            Response::parse("HTTP/1.1 299 Whatever\r\n\r\n"),
            Err(Error::UnknownStatusCode(_))
        ));
    }

    #[test]
    fn test_to_wire_bytes_synthesizes_content_length() {
        let res = ResponseBuilder::new(StatusCode::OK)
            .header("X-Custom", "value")
            .body("Hello")
            .build();

        let wire = res.to_wire_bytes();
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("X-Custom: value\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_explicit_content_length_not_duplicated() {
        let res = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Length", "5")
            .body("Hello")
            .build();
        let wire = res.to_wire_bytes();
        let text = std::str::from_utf8(&wire).unwrap();
        assert_eq!(text.matches("Content-Length").count(), 1);
    }

    #[test]
    fn test_method_not_allowed_carries_allow() {
        let mut res = Response::method_not_allowed(&[Method::Get, Method::Head]);
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("Allow"), Some("GET, HEAD"));
        assert_eq!(res.allow(), Some(vec![Method::Get, Method::Head]));
    }

    #[test]
    fn test_for_request_copies_correlation() {
        let req = crate::request::Request::parse("GET /x HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        let res = Response::for_request(&req, StatusCode::OK);
        assert_eq!(res.tracking_id, Some(req.tracking_id.clone()));
        assert_eq!(res.request_line.as_deref(), Some("GET /x HTTP/1.1"));
    }

    #[test]
    fn test_typed_response_parse_content() {
        let res = Response::json("41");
        let typed = TypedResponse::parse_content(res, |bytes| {
            std::str::from_utf8(bytes)
                .map_err(BoxError::from)?
                .trim()
                .parse::<u32>()
                .map_err(BoxError::from)
        });
        assert!(!typed.is_fault());
        assert!(!typed.has_errors());
        assert_eq!(typed.content, Some(41));

        let typed = typed.map_content(|n| n + 1);
        assert_eq!(typed.content, Some(42));
    }

    #[test]
    fn test_typed_response_fault() {
        let res = Response::json("not a number");
        let typed = TypedResponse::parse_content(res, |bytes| {
            std::str::from_utf8(bytes)
                .map_err(BoxError::from)?
                .trim()
                .parse::<u32>()
                .map_err(BoxError::from)
        });
        assert!(typed.is_fault());
        assert!(typed.content.is_none());
        assert!(typed.error.is_some());
        // A deliberate fault is not an unexpected error.
        assert!(!typed.has_errors());
    }

    #[test]
    fn test_typed_response_try_map_flips_to_fault() {
        let typed = TypedResponse::ok(Response::ok(), "x");
        let typed = typed.try_map_content(|s| s.parse::<u32>().map_err(BoxError::from));
        assert!(typed.is_fault());
        assert!(typed.content.is_none());
    }

    #[test]
    fn test_from_parse_error_status() {
        let res = Response::from_parse_error(&Error::VersionNotSupported("3.0".into()));
        assert_eq!(res.status, StatusCode::HTTP_VERSION_NOT_SUPPORTED);
        let res = Response::from_parse_error(&Error::MissingHostHeader);
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }
}
