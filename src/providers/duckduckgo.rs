//! DuckDuckGo Instant Answer API

use super::error::ProviderError;
use super::text::{collapse_whitespace, html_to_text};
use super::traits::*;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<a\s+href=".*?">(.*?)</a>"#).unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    #[serde(rename = "AbstractSource")]
    abstract_source: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "DefinitionSource")]
    definition_source: String,
    #[serde(rename = "Definition")]
    definition: String,
    #[serde(rename = "DefinitionURL")]
    definition_url: String,
    #[serde(rename = "Results")]
    results: Vec<Topic>,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<Topic>,
}

/// A result or a group of related topics; groups nest through `Topics`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Topic {
    #[serde(rename = "Topics")]
    topics: Vec<Topic>,
    #[serde(rename = "Result")]
    result: String,
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
}

/// DuckDuckGo instant answers; unkeyed, single page
pub struct DuckDuckGo {
    client: HttpClient,
    base_url: String,
}

impl DuckDuckGo {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://api.duckduckgo.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn title_of(result: &str) -> String {
    let title = ANCHOR
        .captures(result)
        .and_then(|caps| caps.get(1))
        .map_or(result, |m| m.as_str());
    collapse_whitespace(title)
}

fn snippet_of(text: &str) -> Vec<String> {
    let line = collapse_whitespace(&html_to_text(text).replace("'''", ""));
    if line.is_empty() {
        Vec::new()
    } else {
        vec![line]
    }
}

fn collect_topic(topic: &Topic, items: &mut Vec<ResultItem>) {
    for child in &topic.topics {
        collect_topic(child, items);
    }
    if !topic.first_url.is_empty() {
        items.push(
            ResultItem::new(topic.first_url.clone(), title_of(&topic.result))
                .with_snippet(snippet_of(&topic.text)),
        );
    }
}

fn collect(response: &Response) -> Vec<ResultItem> {
    let mut items = Vec::new();
    if !response.abstract_url.is_empty() {
        items.push(
            ResultItem::new(response.abstract_url.clone(), response.abstract_source.clone())
                .with_snippet(snippet_of(&response.abstract_text)),
        );
    }
    if !response.definition_url.is_empty() {
        items.push(
            ResultItem::new(response.definition_url.clone(), response.definition_source.clone())
                .with_snippet(snippet_of(&response.definition)),
        );
    }
    for topic in response.results.iter().chain(&response.related_topics) {
        collect_topic(topic, &mut items);
    }
    items
}

#[async_trait]
impl Provider for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new().website("https://duckduckgo.com/api")
    }

    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
        if query.is_continuation() {
            return Err(ProviderError::fatal("duckduckgo: invalid query"));
        }

        let request = FetchRequest::get(format!("{}/", self.base_url))
            .param("q", query.query_text())
            .param("format", "json")
            .param("no_html", "1");

        let response = self
            .client
            .execute(request)
            .await?
            .error_for_status("duckduckgo")?;

        let items = collect(&response.json()?);
        Ok(ResultPage::for_query(query)
            .with_total_hits(items.len() as u64)
            .with_items(items))
    }
}
