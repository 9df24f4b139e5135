//! squall-router: Zero-dependency URI-template route matcher
//!
//! Single Source of Truth (SSOT) for path matching, used by squall-core
//! to back its per-host route tables.
//!
//! ## Template Syntax
//! - Literal path text: `/users`, `/api/v1/health`
//! - `{name}` - Named parameter (captures one path segment)
//! - A trailing `{name}` at the very end of a template is greedy and
//!   captures the remainder of the path, including `/`
//!
//! ## Best match
//! Templates are matched against the full path (anchored at both ends).
//! When several templates accept the same path, the winner is chosen by:
//! 1. Fewer parameters (more literal = more specific)
//! 2. Larger sort length (template length with placeholders removed)
//! 3. Earlier registration
//!
//! ## Example
//! ```
//! use squall_router::RouteSet;
//!
//! let mut routes = RouteSet::new();
//! routes.insert_str("/users/{id}", 1).unwrap();
//! routes.insert_str("/users/me", 2).unwrap();
//! routes.insert_str("/files/{path}", 3).unwrap();
//!
//! let m = routes.find("/users/me").unwrap();
//! assert_eq!(*m.value, 2);
//!
//! let m = routes.find("/users/42").unwrap();
//! assert_eq!(*m.value, 1);
//! assert_eq!(m.captures, vec!["42".to_string()]);
//!
//! let m = routes.find("/files/a/b.txt").unwrap();
//! assert_eq!(m.captures, vec!["a/b.txt".to_string()]);
//! ```

use std::fmt;

/// Error compiling a URI template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// The template string is empty
    Empty,
    /// A `{` without matching `}`, a stray `}`, or a nested `{`
    UnbalancedBrace,
    /// A `{}` placeholder with no name
    EmptyPlaceholder,
    /// A placeholder name containing `/`
    SlashInPlaceholder,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Empty => write!(f, "empty URI template"),
            TemplateError::UnbalancedBrace => write!(f, "unbalanced brace in URI template"),
            TemplateError::EmptyPlaceholder => write!(f, "empty placeholder in URI template"),
            TemplateError::SlashInPlaceholder => {
                write!(f, "placeholder name must not contain '/'")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// One compiled template token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Literal text that must match exactly
    Literal(String),
    /// Interior placeholder: one or more non-`/` characters
    Param,
    /// Trailing placeholder: the rest of the path, `/` included
    Tail,
}

/// A compiled URI template.
///
/// Compilation records two specificity signals used for best-match
/// ranking among overlapping templates:
/// - `parameter_count` - total number of placeholders
/// - `sort_length` - byte length of the template with placeholders removed
///
/// ```
/// use squall_router::UriTemplate;
///
/// let t = UriTemplate::compile("/files/{path}").unwrap();
/// assert_eq!(t.parameter_count(), 1);
/// assert_eq!(t.sort_length(), 7);
/// assert_eq!(t.matches("/files/a/b.txt"), Some(vec!["a/b.txt"]));
/// assert_eq!(t.matches("/other"), None);
/// ```
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    tokens: Vec<Token>,
    names: Vec<String>,
    parameter_count: u16,
    sort_length: u16,
}

impl UriTemplate {
    /// Compile a URI template.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        if template.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut tokens = Vec::new();
        let mut names = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(i) = rest.find(['{', '}']) {
            if rest.as_bytes()[i] == b'}' {
                return Err(TemplateError::UnbalancedBrace);
            }
            literal.push_str(&rest[..i]);

            let after = &rest[i + 1..];
            let j = after.find(['{', '}']).ok_or(TemplateError::UnbalancedBrace)?;
            if after.as_bytes()[j] == b'{' {
                return Err(TemplateError::UnbalancedBrace);
            }

            let name = &after[..j];
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder);
            }
            if name.contains('/') {
                return Err(TemplateError::SlashInPlaceholder);
            }

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }

            rest = &after[j + 1..];
            // A placeholder closing at the end of the template is the
            // greedy catch-all form.
            tokens.push(if rest.is_empty() { Token::Tail } else { Token::Param });
            names.push(name.to_string());
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        let sort_length = tokens
            .iter()
            .map(|t| match t {
                Token::Literal(l) => l.len(),
                _ => 0,
            })
            .sum::<usize>() as u16;

        Ok(Self {
            template: template.to_string(),
            parameter_count: names.len() as u16,
            sort_length,
            tokens,
            names,
        })
    }

    /// The template source text.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Total number of placeholders.
    pub fn parameter_count(&self) -> u16 {
        self.parameter_count
    }

    /// Byte length of the template with all placeholders removed.
    pub fn sort_length(&self) -> u16 {
        self.sort_length
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Match a full path against this template.
    ///
    /// Returns one capture per placeholder, in template order, or `None`
    /// if the path does not match end to end.
    pub fn matches<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let mut captures = Vec::with_capacity(self.names.len());
        if Self::match_at(&self.tokens, path, &mut captures) {
            Some(captures)
        } else {
            None
        }
    }

    fn match_at<'p>(tokens: &[Token], path: &'p str, captures: &mut Vec<&'p str>) -> bool {
        let Some((token, rest)) = tokens.split_first() else {
            return path.is_empty();
        };

        match token {
            Token::Literal(lit) => path
                .strip_prefix(lit.as_str())
                .is_some_and(|p| Self::match_at(rest, p, captures)),
            Token::Param => {
                // Greedy within the current segment, backtracking one
                // character at a time so templates like "/{x}.json" work.
                let mut end = path.find('/').unwrap_or(path.len());
                while end > 0 {
                    captures.push(&path[..end]);
                    if Self::match_at(rest, &path[end..], captures) {
                        return true;
                    }
                    captures.pop();
                    end = path[..end]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                }
                false
            }
            Token::Tail => {
                if path.is_empty() {
                    false
                } else {
                    captures.push(path);
                    true
                }
            }
        }
    }
}

/// A successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// The winning template
    pub template: &'a UriTemplate,
    /// The value registered for it
    pub value: &'a T,
    /// Captured placeholder values, in template order
    pub captures: Vec<String>,
}

/// An insertion-ordered set of templates with attached values.
///
/// `find` evaluates every template against the path and returns the best
/// match per the ranking described in the crate docs.
#[derive(Debug)]
pub struct RouteSet<T> {
    routes: Vec<(UriTemplate, T)>,
}

impl<T> Default for RouteSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteSet<T> {
    /// Create an empty route set.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Insert a pre-compiled template.
    pub fn insert(&mut self, template: UriTemplate, value: T) {
        self.routes.push((template, value));
    }

    /// Compile and insert a template.
    pub fn insert_str(&mut self, template: &str, value: T) -> Result<(), TemplateError> {
        self.insert(UriTemplate::compile(template)?, value);
        Ok(())
    }

    /// Look up the value registered for an exact template string.
    pub fn get(&self, template: &str) -> Option<&T> {
        self.routes
            .iter()
            .find(|(t, _)| t.as_str() == template)
            .map(|(_, v)| v)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, template: &str) -> Option<&mut T> {
        self.routes
            .iter_mut()
            .find(|(t, _)| t.as_str() == template)
            .map(|(_, v)| v)
    }

    /// Get the value for a template, compiling and inserting it if absent.
    pub fn get_or_insert_with(
        &mut self,
        template: &str,
        default: impl FnOnce() -> T,
    ) -> Result<&mut T, TemplateError> {
        if let Some(pos) = self.routes.iter().position(|(t, _)| t.as_str() == template) {
            return Ok(&mut self.routes[pos].1);
        }
        let compiled = UriTemplate::compile(template)?;
        let idx = self.routes.len();
        self.routes.push((compiled, default()));
        Ok(&mut self.routes[idx].1)
    }

    /// Find the best-matching template for a path.
    ///
    /// Ranking: fewer parameters, then larger sort length, then earlier
    /// registration. Deterministic for any registration sequence.
    pub fn find(&self, path: &str) -> Option<RouteMatch<'_, T>> {
        let mut best: Option<RouteMatch<'_, T>> = None;

        for (template, value) in &self.routes {
            let Some(captures) = template.matches(path) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some(b) => {
                    template.parameter_count() < b.template.parameter_count()
                        || (template.parameter_count() == b.template.parameter_count()
                            && template.sort_length() > b.template.sort_length())
                }
            };
            if replace {
                best = Some(RouteMatch {
                    template,
                    value,
                    captures: captures.into_iter().map(str::to_string).collect(),
                });
            }
        }

        best
    }

    /// Iterate over registered templates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&UriTemplate, &T)> {
        self.routes.iter().map(|(t, v)| (t, v))
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_counts() {
        let t = UriTemplate::compile("/users/{id}/posts/{post}").unwrap();
        assert_eq!(t.parameter_count(), 2);
        // "/users/" + "/posts/"
        assert_eq!(t.sort_length(), 14);
        assert_eq!(t.param_names(), &["id".to_string(), "post".to_string()]);

        let t = UriTemplate::compile("/a/fixed").unwrap();
        assert_eq!(t.parameter_count(), 0);
        assert_eq!(t.sort_length(), 8);
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(UriTemplate::compile(""), Err(TemplateError::Empty)));
        assert!(matches!(
            UriTemplate::compile("/a/{x"),
            Err(TemplateError::UnbalancedBrace)
        ));
        assert!(matches!(
            UriTemplate::compile("/a/x}"),
            Err(TemplateError::UnbalancedBrace)
        ));
        assert!(matches!(
            UriTemplate::compile("/a/{{x}}"),
            Err(TemplateError::UnbalancedBrace)
        ));
        assert!(matches!(
            UriTemplate::compile("/a/{}"),
            Err(TemplateError::EmptyPlaceholder)
        ));
        assert!(matches!(
            UriTemplate::compile("/a/{x/y}"),
            Err(TemplateError::SlashInPlaceholder)
        ));
    }

    #[test]
    fn test_literal_match() {
        let t = UriTemplate::compile("/users").unwrap();
        assert_eq!(t.matches("/users"), Some(vec![]));
        assert_eq!(t.matches("/users/42"), None);
        assert_eq!(t.matches("/user"), None);
    }

    #[test]
    fn test_interior_param_single_segment() {
        let t = UriTemplate::compile("/users/{id}/profile").unwrap();
        assert_eq!(t.matches("/users/42/profile"), Some(vec!["42"]));
        assert_eq!(t.matches("/users/42/x/profile"), None);
        assert_eq!(t.matches("/users//profile"), None);
    }

    #[test]
    fn test_trailing_placeholder_crosses_segments() {
        // A placeholder anchored at the template end is the greedy form.
        let t = UriTemplate::compile("/users/{id}").unwrap();
        assert_eq!(t.matches("/users/42"), Some(vec!["42"]));
        assert_eq!(t.matches("/users/42/posts"), Some(vec!["42/posts"]));
        assert_eq!(t.matches("/users/"), None);
    }

    #[test]
    fn test_param_between_literals() {
        let t = UriTemplate::compile("/users/{id}/posts").unwrap();
        assert_eq!(t.matches("/users/42/posts"), Some(vec!["42"]));
        assert_eq!(t.matches("/users/42/comments"), None);
    }

    #[test]
    fn test_param_backtracking() {
        let t = UriTemplate::compile("/data/{name}.json").unwrap();
        assert_eq!(t.matches("/data/report.json"), Some(vec!["report"]));
        assert_eq!(t.matches("/data/report.xml"), None);
    }

    #[test]
    fn test_trailing_param_is_greedy() {
        let t = UriTemplate::compile("/files/{path}").unwrap();
        assert_eq!(t.matches("/files/a/b/c.txt"), Some(vec!["a/b/c.txt"]));
        assert_eq!(t.matches("/files/"), None);
    }

    #[test]
    fn test_interior_and_tail() {
        let t = UriTemplate::compile("/repos/{owner}/tree/{path}").unwrap();
        assert_eq!(
            t.matches("/repos/alice/tree/src/main.rs"),
            Some(vec!["alice", "src/main.rs"])
        );
    }

    #[test]
    fn test_unicode_captures() {
        let t = UriTemplate::compile("/tags/{tag}").unwrap();
        assert_eq!(t.matches("/tags/caf\u{e9}"), Some(vec!["caf\u{e9}"]));
    }

    #[test]
    fn test_best_match_prefers_fewer_params() {
        let mut routes = RouteSet::new();
        routes.insert_str("/a/{p}", "param").unwrap();
        routes.insert_str("/a/fixed", "fixed").unwrap();

        let m = routes.find("/a/fixed").unwrap();
        assert_eq!(*m.value, "fixed");
        assert!(m.captures.is_empty());

        let m = routes.find("/a/other").unwrap();
        assert_eq!(*m.value, "param");
        assert_eq!(m.captures, vec!["other".to_string()]);
    }

    #[test]
    fn test_best_match_prefers_longer_literal() {
        let mut routes = RouteSet::new();
        routes.insert_str("/api/{x}", "short").unwrap();
        routes.insert_str("/api/v1-{x}", "long").unwrap();

        // Both have one parameter; "/api/v1-" has more literal text.
        let m = routes.find("/api/v1-live").unwrap();
        assert_eq!(*m.value, "long");
        assert_eq!(m.captures, vec!["live".to_string()]);
    }

    #[test]
    fn test_best_match_registration_order_tie_break() {
        let mut routes = RouteSet::new();
        routes.insert_str("/x/{a}", "first").unwrap();
        routes.insert_str("/y/{b}", "second").unwrap();

        // Identical specificity is impossible for one path here, so force
        // a real tie with two templates of equal shape.
        let mut tied = RouteSet::new();
        tied.insert_str("/t/{a}", "first").unwrap();
        tied.insert_str("/t/{b}", "second").unwrap();
        let m = tied.find("/t/1").unwrap();
        assert_eq!(*m.value, "first");

        assert_eq!(*routes.find("/x/1").unwrap().value, "first");
        assert_eq!(*routes.find("/y/1").unwrap().value, "second");
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut routes: RouteSet<Vec<u32>> = RouteSet::new();
        routes
            .get_or_insert_with("/a/{p}", Vec::new)
            .unwrap()
            .push(1);
        routes
            .get_or_insert_with("/a/{p}", Vec::new)
            .unwrap()
            .push(2);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes.get("/a/{p}"), Some(&vec![1, 2]));
    }
}
