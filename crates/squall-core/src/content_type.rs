//! Content types and Accept-header negotiation

use std::fmt;

/// An HTTP media type, optionally with a charset parameter.
///
/// `*` is accepted for either component, so `*/*` and `text/*` work as
/// Accept-header ranges. Matching ignores the charset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType {
    media_type: String,
    sub_type: String,
    charset: Option<String>,
}

impl ContentType {
    /// Create a content type without a charset.
    pub fn new(media_type: &str, sub_type: &str) -> Self {
        Self {
            media_type: media_type.trim().to_ascii_lowercase(),
            sub_type: sub_type.trim().to_ascii_lowercase(),
            charset: None,
        }
    }

    /// Attach a charset parameter.
    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.trim().to_ascii_lowercase());
        self
    }

    /// `application/json; charset=utf-8`
    pub fn json_utf8() -> Self {
        Self::new("application", "json").with_charset("utf-8")
    }

    /// `text/plain; charset=utf-8`
    pub fn text_utf8() -> Self {
        Self::new("text", "plain").with_charset("utf-8")
    }

    /// `text/html; charset=utf-8`
    pub fn html_utf8() -> Self {
        Self::new("text", "html").with_charset("utf-8")
    }

    /// `text/xml; charset=utf-8`
    pub fn xml_utf8() -> Self {
        Self::new("text", "xml").with_charset("utf-8")
    }

    /// `application/octet-stream`
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// `*/*`
    pub fn all() -> Self {
        Self::new("*", "*")
    }

    /// Parse `type/sub` with optional `;`-separated parameters
    /// (only `charset` is retained; unknown parameters are ignored).
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(';');
        let range = parts.next()?.trim();
        let (media_type, sub_type) = range.split_once('/')?;
        if media_type.trim().is_empty() || sub_type.trim().is_empty() {
            return None;
        }

        let mut content_type = Self::new(media_type, sub_type);
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("charset") {
                    content_type = content_type.with_charset(value);
                }
            }
        }
        Some(content_type)
    }

    /// The major media type, e.g. `application`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The sub type, e.g. `json`.
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// The charset parameter, if any.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Whether this type contains a wildcard component.
    pub fn is_wildcard(&self) -> bool {
        self.media_type == "*" || self.sub_type == "*"
    }

    /// Treat `self` as an Accept-header range and test whether a concrete
    /// `offered` type satisfies it. Charset never participates.
    pub fn satisfied_by(&self, offered: &ContentType) -> bool {
        (self.media_type == "*" || self.media_type == offered.media_type)
            && (self.sub_type == "*" || self.sub_type == offered.sub_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.sub_type)?;
        if let Some(charset) = &self.charset {
            write!(f, "; charset={charset}")?;
        }
        Ok(())
    }
}

/// One entry of a parsed Accept header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    /// The acceptable media range
    pub content_type: ContentType,
    /// Its quality weight, 0.0 to 1.0
    pub quality: f32,
}

/// The priority-ordered list of content types a client accepts.
///
/// An empty list means "accept anything" (absent Accept header).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptTypes {
    entries: Vec<AcceptEntry>,
}

impl AcceptTypes {
    /// The accept-anything list.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a comma-separated media-range list with optional `;q=`
    /// weights. Malformed entries are skipped, not fatal.
    pub fn parse(header: &str) -> Self {
        let mut entries = Vec::new();

        for part in header.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let mut quality = 1.0f32;
            for param in part.split(';').skip(1) {
                if let Some((key, value)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        quality = value.trim().parse().unwrap_or(1.0);
                    }
                }
            }

            if let Some(content_type) = ContentType::parse(part) {
                entries.push(AcceptEntry {
                    content_type,
                    quality: quality.clamp(0.0, 1.0),
                });
            }
        }

        Self { entries }
    }

    /// Whether any content type is acceptable.
    pub fn is_any(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in header order.
    pub fn entries(&self) -> &[AcceptEntry] {
        &self.entries
    }

    /// Select the best supported type for this accept list.
    ///
    /// Acceptable entries are visited best-quality-first (header order for
    /// equal weights); the first `declared` type satisfying an entry wins,
    /// so ties break on declaration order. `None` is the 406 outcome.
    pub fn best_match(&self, declared: &[ContentType]) -> Option<ContentType> {
        if self.is_any() {
            return declared.first().cloned();
        }

        let mut ranked: Vec<&AcceptEntry> = self.entries.iter().collect();
        // Stable sort keeps header order among equal qualities.
        ranked.sort_by(|a, b| {
            b.quality
                .partial_cmp(&a.quality)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for entry in ranked {
            if entry.quality <= 0.0 {
                // q=0 means explicitly not acceptable
                continue;
            }
            for offered in declared {
                if entry.content_type.satisfied_by(offered) {
                    return Some(offered.clone());
                }
            }
        }

        None
    }
}

impl fmt::Display for AcceptTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", entry.content_type)?;
            if entry.quality != 1.0 {
                write!(f, ";q={}", entry.quality)?;
            }
        }
        Ok(())
    }
}
