//! Query-language expressions.
//!
//! Expressions are kept as text (`c.owner.name`, `UPPER(c.name)`, `:minAge`) and
//! tokenized on demand. Three token kinds matter to the builder:
//!
//! - **paths** (`alias.attr.attr`), which may trigger implicit joins and are
//!   rewritten to join aliases at render time;
//! - **named parameters** (`:name`), which must be bound before execution;
//! - **string literals** (`'it''s'`), whose content is never interpreted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"'(?:[^']|'')*'|:[A-Za-z_][A-Za-z0-9_]*|[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+",
    )
    .expect("expression token pattern is valid")
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'(?:[^']|'')*'|:[A-Za-z_][A-Za-z0-9_]*|[A-Za-z_][A-Za-z0-9_]*")
        .expect("identifier pattern is valid")
});

/// A query-language expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    /// A quoted string literal, with embedded quotes doubled
    pub fn string_literal(value: &str) -> Self {
        Self(format!("'{}'", value.replace('\'', "''")))
    }

    /// A named parameter reference (`:name`)
    pub fn parameter(name: &str) -> Self {
        Self(format!(":{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every dotted path referenced by the expression, in order of appearance
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        TOKEN
            .find_iter(&self.0)
            .map(|m| m.as_str())
            .filter(|token| !token.starts_with('\'') && !token.starts_with(':'))
    }

    /// Every bare identifier and the first segment of every path, skipping
    /// literals and parameters
    pub fn identifier_roots(&self) -> impl Iterator<Item = &str> {
        let text = self.0.as_str();
        IDENTIFIER
            .find_iter(text)
            .filter(move |m| !text[..m.start()].ends_with('.'))
            .map(|m| m.as_str())
            .filter(|token| !token.starts_with(['\'', ':']))
    }

    /// Every named parameter referenced by the expression (without the colon)
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        TOKEN
            .find_iter(&self.0)
            .map(|m| m.as_str())
            .filter_map(|token| token.strip_prefix(':'))
    }

    /// Whether the whole expression is a single path
    pub fn is_path(&self) -> bool {
        TOKEN
            .find(&self.0)
            .map(|m| m.start() == 0 && m.end() == self.0.len() && !m.as_str().starts_with(['\'', ':']))
            .unwrap_or(false)
    }

    /// Render the expression, replacing every path for which `f` returns a value
    pub fn rewrite_paths<F>(&self, mut f: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.0.len());
        let mut last = 0;
        for m in TOKEN.find_iter(&self.0) {
            let token = m.as_str();
            if token.starts_with('\'') || token.starts_with(':') {
                continue;
            }
            if let Some(replacement) = f(token) {
                out.push_str(&self.0[last..m.start()]);
                out.push_str(&replacement);
                last = m.end();
            }
        }
        out.push_str(&self.0[last..]);
        out
    }
}

/// Rewrites association paths to their join aliases at render time
pub trait PathResolver {
    fn resolve(&self, expression: &Expression) -> String;
}

/// Resolver that renders expressions verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl PathResolver for IdentityResolver {
    fn resolve(&self, expression: &Expression) -> String {
        expression.as_str().to_string()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Expression::new(text)
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Expression::new(text)
    }
}

impl From<&String> for Expression {
    fn from(text: &String) -> Self {
        Expression::new(text.as_str())
    }
}
