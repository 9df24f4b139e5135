//! Case-insensitive header store with lazy typed coercion
//!
//! Each entry is a tagged cell: raw text, or a parsed typed value kept
//! next to the raw text it came from. The first successful typed read
//! upgrades the cell in place, so the parse happens once; the raw form is
//! retained so re-serialization never observes the coercion.

use crate::content_type::{AcceptTypes, ContentType};
use crate::hostname::Hostname;
use crate::method::Method;
use smallvec::SmallVec;

/// A parsed header value, memoized in its cell.
#[derive(Debug, Clone)]
pub enum TypedValue {
    UInt(u64),
    Host(Hostname),
    ContentType(ContentType),
    Accept(AcceptTypes),
    Methods(Vec<Method>),
}

/// One header cell: raw text, or parsed value plus the raw text.
#[derive(Debug, Clone)]
enum HeaderValue {
    Raw(String),
    Parsed(TypedValue, String),
}

impl HeaderValue {
    fn raw(&self) -> &str {
        match self {
            HeaderValue::Raw(raw) => raw,
            HeaderValue::Parsed(_, raw) => raw,
        }
    }
}

/// Types that can be read from a header cell with memoization.
pub trait HeaderParse: Sized + Clone {
    /// Extract a previously-memoized value of this type.
    fn from_typed(value: &TypedValue) -> Option<&Self>;

    /// Parse the raw header text. `None` for malformed values - a
    /// malformed optional header reads as absent, never as an error.
    fn parse(raw: &str) -> Option<Self>;

    /// Wrap for memoization.
    fn to_typed(&self) -> TypedValue;
}

impl HeaderParse for u64 {
    fn from_typed(value: &TypedValue) -> Option<&Self> {
        match value {
            TypedValue::UInt(n) => Some(n),
            _ => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::UInt(*self)
    }
}

impl HeaderParse for Hostname {
    fn from_typed(value: &TypedValue) -> Option<&Self> {
        match value {
            TypedValue::Host(h) => Some(h),
            _ => None,
        }
    }

    /// Host-header semantics: a bare name implies port 80 (rfc 2616
    /// section 3.2.2), `*` is the synthesized wildcard host.
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(Hostname::any());
        }
        match raw.split_once(':') {
            None => Hostname::new(raw, Some(80)).ok(),
            Some((name, port)) => {
                let port = port.trim().parse::<u16>().ok()?;
                Hostname::new(name, Some(port)).ok()
            }
        }
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Host(self.clone())
    }
}

impl HeaderParse for ContentType {
    fn from_typed(value: &TypedValue) -> Option<&Self> {
        match value {
            TypedValue::ContentType(ct) => Some(ct),
            _ => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        ContentType::parse(raw)
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::ContentType(self.clone())
    }
}

impl HeaderParse for AcceptTypes {
    fn from_typed(value: &TypedValue) -> Option<&Self> {
        match value {
            TypedValue::Accept(a) => Some(a),
            _ => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(AcceptTypes::parse(raw))
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Accept(self.clone())
    }
}

impl HeaderParse for Vec<Method> {
    fn from_typed(value: &TypedValue) -> Option<&Self> {
        match value {
            TypedValue::Methods(m) => Some(m),
            _ => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Method::parse)
                .collect(),
        )
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Methods(self.clone())
    }
}

/// Insertion-ordered, case-insensitive header map.
///
/// Owned exclusively by one message; not safe for concurrent writers.
/// Typed reads mutate the internal cache but never the observable
/// header content.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    fields: SmallVec<[(String, HeaderValue); 16]>,
}

impl HeaderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Get the raw header text (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.fields[i].1.raw())
    }

    /// Get a header as a parsed type, memoizing the result.
    ///
    /// If the cell already holds a `T`, that value is returned without
    /// re-parsing. A failed parse leaves the cell untouched and returns
    /// `None`.
    pub fn get_typed<T: HeaderParse>(&mut self, name: &str) -> Option<T> {
        let idx = self.position(name)?;

        if let HeaderValue::Parsed(typed, _) = &self.fields[idx].1 {
            if let Some(value) = T::from_typed(typed) {
                return Some(value.clone());
            }
        }

        let raw = self.fields[idx].1.raw().to_string();
        let parsed = T::parse(&raw)?;
        self.fields[idx].1 = HeaderValue::Parsed(parsed.to_typed(), raw);
        Some(parsed)
    }

    /// Insert or overwrite a header; last write wins and resets any
    /// memoized parse.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = HeaderValue::Raw(value.into());
        match self.position(&name) {
            Some(i) => self.fields[i].1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header, returning its raw text.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.position(name)?;
        let (_, value) = self.fields.remove(idx);
        Some(match value {
            HeaderValue::Raw(raw) => raw,
            HeaderValue::Parsed(_, raw) => raw,
        })
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, raw value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.raw()))
    }
}
