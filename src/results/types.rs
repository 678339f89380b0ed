//! Result type definitions

use crate::query::Query;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultItem {
    /// The URL of the result
    pub url: String,
    /// The title of the result
    pub title: String,
    /// Snippet, one entry per line
    pub snippet: Vec<String>,
}

impl ResultItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: Vec::new(),
        }
    }

    /// Replace the snippet lines
    pub fn with_snippet<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snippet = lines.into_iter().map(Into::into).collect();
        self
    }
}

/// One page of results, or the aggregate of all pages for an input line.
///
/// Pages are built once through the consuming `with_*` methods and are not
/// mutated afterwards; an update produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    label: String,
    query_text: String,
    total_hits: BigUint,
    start_index: u64,
    items: Vec<ResultItem>,
    start_time_millis: i64,
    end_time_millis: i64,
    fatal_error: bool,
    next_query: Option<Query>,
}

impl ResultPage {
    /// Create an empty page for the given query bookkeeping
    pub fn new(label: impl Into<String>, query_text: impl Into<String>, start_index: u64) -> Self {
        Self {
            label: label.into(),
            query_text: query_text.into(),
            total_hits: BigUint::default(),
            start_index,
            items: Vec::new(),
            start_time_millis: 0,
            end_time_millis: 0,
            fatal_error: false,
            next_query: None,
        }
    }

    /// Create an empty page answering `query`
    pub fn for_query(query: &Query) -> Self {
        Self::new(query.label(), query.query_text(), query.start_index())
    }

    /// Terminal page recorded when a query can never succeed
    pub fn fatal(query: &Query, start_time_millis: i64, end_time_millis: i64) -> Self {
        Self::for_query(query)
            .with_timing(start_time_millis, end_time_millis)
            .with_fatal_error(true)
    }

    pub fn with_total_hits(mut self, total_hits: impl Into<BigUint>) -> Self {
        self.total_hits = total_hits.into();
        self
    }

    pub fn with_items(mut self, items: Vec<ResultItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_timing(mut self, start_time_millis: i64, end_time_millis: i64) -> Self {
        self.start_time_millis = start_time_millis;
        self.end_time_millis = end_time_millis;
        self
    }

    pub fn with_fatal_error(mut self, fatal_error: bool) -> Self {
        self.fatal_error = fatal_error;
        self
    }

    /// Signal that more results can be requested with `next_query`
    pub fn with_next_query(mut self, next_query: Option<Query>) -> Self {
        self.next_query = next_query;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// Provider estimate of the total number of matches
    pub fn total_hits(&self) -> &BigUint {
        &self.total_hits
    }

    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ResultItem> {
        self.items
    }

    /// Number of items actually returned (not the hit estimate)
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    pub fn end_time_millis(&self) -> i64 {
        self.end_time_millis
    }

    /// Always derived from the start and end times
    pub fn elapsed_millis(&self) -> i64 {
        self.end_time_millis - self.start_time_millis
    }

    pub fn fatal_error(&self) -> bool {
        self.fatal_error
    }

    pub fn next_query(&self) -> Option<&Query> {
        self.next_query.as_ref()
    }

    /// Take the continuation out of the page
    pub fn take_next_query(&mut self) -> Option<Query> {
        self.next_query.take()
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_equality_is_structural() {
        let a = ResultItem::new("https://a.example", "A").with_snippet(["one", "two"]);
        let b = ResultItem::new("https://a.example", "A").with_snippet(vec!["one".to_string(), "two".to_string()]);
        let c = ResultItem::new("https://a.example", "A").with_snippet(["one"]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fatal_page() {
        let query = Query::new("0001", "hello").with_start_index(11);
        let page = ResultPage::fatal(&query, 1_000, 1_250);

        assert!(page.fatal_error());
        assert!(page.is_empty());
        assert_eq!(page.start_index(), 11);
        assert_eq!(page.total_hits(), &BigUint::default());
        assert_eq!(page.elapsed_millis(), 250);
        assert!(page.next_query().is_none());
    }

    #[test]
    fn test_total_hits_beyond_u64() {
        let huge: BigUint = "123456789012345678901234567890".parse().unwrap();
        let page = ResultPage::new("", "q", 1).with_total_hits(huge.clone());
        assert_eq!(page.total_hits(), &huge);
    }
}
