//! Shared PDU plumbing: bodies, correlation ids, cancellation, and the
//! header-block scanner used by both message kinds.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A message body: fully buffered bytes or a streaming source, never
/// both. The parser and builder only ever touch buffered bodies; a
/// stream is pulled by whoever asked for it (transport or handler).
pub enum Body {
    Empty,
    Buffered(Bytes),
    Stream(Box<dyn Read + Send>),
}

impl Body {
    /// Buffered bytes, if this body is buffered.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether there is no body content to write.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Buffered(bytes) => bytes.is_empty(),
            Body::Stream(_) => false,
        }
    }

    /// Whether this body is a streaming source.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Buffered(bytes) => write!(f, "Body::Buffered({} bytes)", bytes.len()),
            Body::Stream(_) => write!(f, "Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Buffered(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Buffered(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Buffered(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Buffered(Bytes::from_static(text.as_bytes()))
    }
}

/// Correlates a request with its response and any downstream calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTrackingId(String);

static NEXT_TRACKING_ID: AtomicU64 = AtomicU64::new(1);

impl EventTrackingId {
    /// A fresh process-unique id.
    pub fn next() -> Self {
        Self(format!(
            "evt-{:08x}",
            NEXT_TRACKING_ID.fetch_add(1, Ordering::Relaxed)
        ))
    }

    /// Use a transport-supplied id.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventTrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cheap clonable cancellation flag the transport may set. Handlers
/// are expected to observe it; the dispatch path itself never blocks,
/// so it only forwards the signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Split raw header text into the first PDU line and `Name: Value`
/// fields. Accepts CRLF or LF line endings, skips leading empty lines,
/// stops at the first empty line, and folds obsolete continuation lines
/// into the preceding field value.
pub(crate) fn split_header_block(text: &str) -> Result<(String, Vec<(String, String)>)> {
    let mut lines = text.lines();

    let first = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line.to_string(),
            None => return Err(Error::InvalidRequestLine(String::new())),
        }
    };

    let mut fields: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            match fields.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                    continue;
                }
                None => return Err(Error::InvalidHeaderLine(line.to_string())),
            }
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderLine(line.to_string()))?;
        fields.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok((first, fields))
}
