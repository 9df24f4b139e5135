//! HTTP request PDU
//!
//! Parsing operates on already-received header text plus an optional
//! body; it never performs I/O. The structural rules are the RFC-level
//! ones: a three-token request line, HTTP/1.0 or 1.1 only, and a
//! mandatory Host header on 1.1.

use crate::content_type::{AcceptTypes, ContentType};
use crate::error::{Error, Result};
use crate::headers::HeaderStore;
use crate::hostname::Hostname;
use crate::message::{split_header_block, Body, CancellationSignal, EventTrackingId};
use crate::method::Method;
use crate::query::{percent_decode, QueryString};
use std::fmt;
use std::net::SocketAddr;

/// HTTP protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    /// Parse the version token after `HTTP/`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1.0" => Some(HttpVersion::Http10),
            "1.1" => Some(HttpVersion::Http11),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "1.0",
            HttpVersion::Http11 => "1.1",
        }
    }

    /// rfc 2616 section 19.6.1.1: an HTTP/1.1 request MUST send a Host
    /// header.
    pub fn requires_host(&self) -> bool {
        matches!(self, HttpVersion::Http11)
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP Request
#[derive(Debug)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path, percent-decoded, query string stripped
    pub path: String,
    /// Parsed query string
    pub query: QueryString,
    /// Protocol version
    pub version: HttpVersion,
    /// Request headers
    pub headers: HeaderStore,
    /// Request body
    pub body: Body,
    /// Remote endpoint, when the transport knows it
    pub remote: Option<SocketAddr>,
    /// Local endpoint, when the transport knows it
    pub local: Option<SocketAddr>,
    /// Cancellation signal forwarded to handlers
    pub cancellation: CancellationSignal,
    /// Correlates this request with its response and downstream calls
    pub tracking_id: EventTrackingId,
    /// Prefix prepended to the path when re-serializing for forwarding
    pub fake_uri_prefix: Option<String>,
    /// Values captured from the matched URI template, in template order.
    /// Set by the dispatcher.
    pub uri_params: Vec<String>,
    /// Placeholder names of the matched template. Set by the dispatcher.
    pub uri_param_names: Vec<String>,
    /// The negotiated best-matching accept type. Set by the dispatcher.
    pub best_accept: Option<ContentType>,
}

impl Request {
    /// Parse a request header block with no body.
    pub fn parse(header: &str) -> Result<Self> {
        Self::parse_at(header, Body::Empty, None, None)
    }

    /// Parse a request header block and attach a body.
    pub fn parse_with_body(header: &str, body: Body) -> Result<Self> {
        Self::parse_at(header, body, None, None)
    }

    /// Transport entry point: parse with endpoint information attached.
    pub fn parse_at(
        header: &str,
        body: Body,
        remote: Option<SocketAddr>,
        local: Option<SocketAddr>,
    ) -> Result<Self> {
        let (first_line, fields) = split_header_block(header)?;

        let mut headers = HeaderStore::new();
        for (name, value) in fields {
            headers.set(name, value);
        }

        // e.g: PROPFIND /file/file%20name HTTP/1.1
        let tokens: Vec<&str> = first_line.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(Error::InvalidRequestLine(first_line));
        }

        let method = Method::parse(tokens[0]);
        let (path, query) = parse_target(tokens[1]);
        let version = parse_protocol(tokens[2])?;

        match headers.get("Host") {
            Some(value) => validate_host_header(value)?,
            None => {
                if version.requires_host() {
                    // rfc 2616 section 14.23: respond 400 to any HTTP/1.1
                    // request lacking a Host header.
                    return Err(Error::MissingHostHeader);
                }
                // HTTP/1.0 may come without any Host header
                headers.set("Host", "*");
            }
        }

        log::debug!("parsed request {} {}", method, path);

        Ok(Self {
            method,
            path,
            query,
            version,
            headers,
            body,
            remote,
            local,
            cancellation: CancellationSignal::new(),
            tracking_id: EventTrackingId::next(),
            fake_uri_prefix: None,
            uri_params: Vec::new(),
            uri_param_names: Vec::new(),
            best_accept: None,
        })
    }

    /// The interpreted Host header. A bare name means port 80; a request
    /// without the header (possible only for builder-made requests) is
    /// the wildcard host.
    pub fn host(&mut self) -> Hostname {
        self.headers
            .get_typed::<Hostname>("Host")
            .unwrap_or_else(Hostname::any)
    }

    /// The accept list; absent header accepts anything.
    pub fn accept(&mut self) -> AcceptTypes {
        self.headers
            .get_typed::<AcceptTypes>("Accept")
            .unwrap_or_else(AcceptTypes::any)
    }

    pub fn content_type(&mut self) -> Option<ContentType> {
        self.headers.get_typed::<ContentType>("Content-Type")
    }

    pub fn content_length(&mut self) -> Option<u64> {
        self.headers.get_typed::<u64>("Content-Length")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("User-Agent")
    }

    /// A captured URI-template value, by placeholder name.
    pub fn uri_param(&self, name: &str) -> Option<&str> {
        self.uri_param_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.uri_params.get(i))
            .map(String::as_str)
    }

    /// The request line as it would appear on the wire.
    pub fn first_line(&self) -> String {
        format!(
            "{} {}{}{} HTTP/{}",
            self.method,
            self.fake_uri_prefix.as_deref().unwrap_or(""),
            encode_path(&self.path),
            self.query,
            self.version,
        )
    }

    /// Serialize to wire form. A streaming body is written by the
    /// transport, not here.
    pub fn to_wire_bytes(&self) -> bytes::Bytes {
        let body_len = self.body.as_bytes().map(|b| b.len()).unwrap_or(0);
        let mut buf = Vec::with_capacity(256 + body_len);

        buf.extend_from_slice(self.first_line().as_bytes());
        buf.extend_from_slice(b"\r\n");

        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"\r\n");

        if let Some(body) = self.body.as_bytes() {
            buf.extend_from_slice(body);
        }

        bytes::Bytes::from(buf)
    }
}

/// Split the request-target into decoded path and parsed query string.
///
/// Absolute-form targets are reduced to their path; an empty path
/// normalizes to `/`.
fn parse_target(raw_target: &str) -> (String, QueryString) {
    let (raw_path, raw_query) = match raw_target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_target, None),
    };

    let mut path = percent_decode(raw_path);

    if path.starts_with("http://") || path.starts_with("https://") {
        if let Some(idx) = path.find("://") {
            let after_authority = &path[idx + 3..];
            let stripped = match after_authority.find('/') {
                Some(slash) => after_authority[slash..].to_string(),
                None => String::from("/"),
            };
            path = stripped;
        }
    }

    if path.is_empty() {
        path = String::from("/");
    }

    let query = raw_query.map(QueryString::parse).unwrap_or_default();
    (path, query)
}

/// Parse `HTTP/major.minor`; only 1.0 and 1.1 are supported.
fn parse_protocol(token: &str) -> Result<HttpVersion> {
    let (name, version) = token
        .split_once('/')
        .ok_or_else(|| Error::VersionNotSupported(token.to_string()))?;

    if !name.eq_ignore_ascii_case("HTTP") {
        return Err(Error::UnsupportedProtocol(name.to_string()));
    }

    HttpVersion::parse(version).ok_or_else(|| Error::VersionNotSupported(version.to_string()))
}

/// Structural validation of the Host header value. Interpreting the
/// value (bare name means port 80) is done lazily by [`Request::host`];
/// the stored header text is never rewritten, since that would leak
/// into re-serialization.
fn validate_host_header(value: &str) -> Result<()> {
    let parts: Vec<&str> = value
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.len() {
        // rfc 2616 section 3.2.2: empty or missing port means 80
        0 | 1 => Ok(()),
        2 => {
            parts[1]
                .parse::<u16>()
                .map(|_| ())
                .map_err(|_| Error::InvalidHostHeader(value.to_string()))
        }
        _ => Err(Error::InvalidHostHeader(value.to_string())),
    }
}

/// Escape only what would corrupt the request line; slashes and already
/// unreserved characters pass through, so typical lines round-trip.
fn encode_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => result.push_str("%20"),
            '%' => result.push_str("%25"),
            '?' => result.push_str("%3F"),
            '\x00'..='\x1f' | '\x7f' => result.push_str(&format!("%{:02X}", c as u32)),
            _ => result.push(c),
        }
    }
    result
}

/// Builder for constructing requests programmatically, e.g. by layers
/// that inject headers and a raw body before dispatch.
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request {
                method,
                path: path.into(),
                query: QueryString::empty(),
                version: HttpVersion::Http11,
                headers: HeaderStore::new(),
                body: Body::Empty,
                remote: None,
                local: None,
                cancellation: CancellationSignal::new(),
                tracking_id: EventTrackingId::next(),
                fake_uri_prefix: None,
                uri_params: Vec::new(),
                uri_param_names: Vec::new(),
                best_accept: None,
            },
        }
    }

    /// Set the protocol version
    pub fn version(mut self, version: HttpVersion) -> Self {
        self.request.version = version;
        self
    }

    /// Set the query string from its wire text
    pub fn query(mut self, query: &str) -> Self {
        self.request.query = QueryString::parse(query);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.set(name, value);
        self
    }

    /// Set the Host header
    pub fn host(self, host: impl Into<String>) -> Self {
        self.header("Host", host)
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Set the remote endpoint
    pub fn remote(mut self, addr: SocketAddr) -> Self {
        self.request.remote = Some(addr);
        self
    }

    /// Set the local endpoint
    pub fn local(mut self, addr: SocketAddr) -> Self {
        self.request.local = Some(addr);
        self
    }

    /// Attach a cancellation signal
    pub fn cancellation(mut self, signal: CancellationSignal) -> Self {
        self.request.cancellation = signal;
        self
    }

    /// Use a transport-supplied tracking id
    pub fn tracking_id(mut self, id: EventTrackingId) -> Self {
        self.request.tracking_id = id;
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}
