//! Query model
//!
//! A [`Query`] is the request handle passed to a provider. It either
//! originates from a line of the input file ([`QueryKind::Default`]) or is a
//! continuation handed back by a provider in a previous page
//! ([`QueryKind::Continuation`]). Both carry the same label, query text and
//! start index bookkeeping, plus the registration key attached by the
//! orchestrator just before each fetch.

use serde::{Deserialize, Serialize};

/// Character separating the sub-keys of a composite registration key,
/// e.g. `api_key$cx`.
pub const KEY_DELIMITER: char = '$';

/// What kind of request a query represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// User-originated query, paged by start index
    Default,
    /// Provider-specific opaque payload (a URL or cursor)
    Continuation(String),
}

/// A request for one page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    label: String,
    query_text: String,
    start_index: u64,
    key: Option<String>,
    kind: QueryKind,
}

impl Query {
    /// Create a default query starting at the first result
    pub fn new(label: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            query_text: query_text.into(),
            start_index: 1,
            key: None,
            kind: QueryKind::Default,
        }
    }

    /// Same query, starting at another (1-based) result index
    pub fn with_start_index(mut self, start_index: u64) -> Self {
        self.start_index = start_index;
        self
    }

    /// Same query, signed with the given registration key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Default query for the page following this one
    pub fn next_page(&self, start_index: u64) -> Self {
        Self {
            label: self.label.clone(),
            query_text: self.query_text.clone(),
            start_index,
            key: self.key.clone(),
            kind: QueryKind::Default,
        }
    }

    /// Continuation query carrying a provider payload
    pub fn continuation(&self, payload: impl Into<String>, start_index: u64) -> Self {
        Self {
            label: self.label.clone(),
            query_text: self.query_text.clone(),
            start_index,
            key: self.key.clone(),
            kind: QueryKind::Continuation(payload.into()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// The continuation payload, if this is a continuation query
    pub fn continuation_payload(&self) -> Option<&str> {
        match &self.kind {
            QueryKind::Continuation(payload) => Some(payload),
            QueryKind::Default => None,
        }
    }

    pub fn is_continuation(&self) -> bool {
        matches!(self.kind, QueryKind::Continuation(_))
    }

    /// Split the registration key into exactly `expected` sub-keys.
    ///
    /// Returns `None` when no key is attached or the count differs.
    pub fn sub_keys(&self, expected: usize) -> Option<Vec<&str>> {
        let key = self.key.as_deref()?;
        let parts: Vec<&str> = key.split(KEY_DELIMITER).collect();
        if parts.len() == expected {
            Some(parts)
        } else {
            None
        }
    }
}

/// One line of the input file, split into label and query text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub label: String,
    pub query_text: String,
}

impl InputLine {
    /// Parse `label: query text` or a bare `query text`.
    ///
    /// The label is everything before the first colon. Both parts are
    /// trimmed; a line without a colon gets an empty label.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(':') {
            Some((label, query_text)) => Self {
                label: label.trim().to_string(),
                query_text: query_text.trim().to_string(),
            },
            None => Self {
                label: String::new(),
                query_text: line.to_string(),
            },
        }
    }

    /// Whether there is nothing to search for
    pub fn is_blank(&self) -> bool {
        self.query_text.is_empty()
    }

    /// The first query issued for this line
    pub fn to_query(&self) -> Query {
        Query::new(self.label.clone(), self.query_text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelled_line() {
        let line = InputLine::parse("0001: hello world");
        assert_eq!(line.label, "0001");
        assert_eq!(line.query_text, "hello world");
        assert!(!line.is_blank());
    }

    #[test]
    fn test_parse_bare_line() {
        let line = InputLine::parse("  sensei's library  ");
        assert_eq!(line.label, "");
        assert_eq!(line.query_text, "sensei's library");
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let line = InputLine::parse("0003: site:example.com rust");
        assert_eq!(line.label, "0003");
        assert_eq!(line.query_text, "site:example.com rust");
    }

    #[test]
    fn test_blank_query_after_label() {
        assert!(InputLine::parse("0002:   ").is_blank());
        assert!(InputLine::parse("").is_blank());
    }

    #[test]
    fn test_default_query_starts_at_one() {
        let query = InputLine::parse("a: b").to_query();
        assert_eq!(query.start_index(), 1);
        assert_eq!(query.kind(), &QueryKind::Default);
        assert!(query.key().is_none());
    }

    #[test]
    fn test_continuation_keeps_bookkeeping() {
        let query = Query::new("l", "q").with_key("k1");
        let next = query.continuation("https://example.com/next?p=2", 11);

        assert!(next.is_continuation());
        assert_eq!(next.continuation_payload(), Some("https://example.com/next?p=2"));
        assert_eq!(next.label(), "l");
        assert_eq!(next.query_text(), "q");
        assert_eq!(next.start_index(), 11);
        assert_eq!(next.key(), Some("k1"));
    }

    #[test]
    fn test_sub_keys() {
        let query = Query::new("", "q").with_key("abc$def");
        assert_eq!(query.sub_keys(2), Some(vec!["abc", "def"]));
        assert_eq!(query.sub_keys(4), None);
        assert_eq!(Query::new("", "q").sub_keys(1), None);
    }
}
