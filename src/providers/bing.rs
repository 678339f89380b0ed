//! Bing Web Search API (v7)

use super::error::ProviderError;
use super::text::{collapse_whitespace, snippet_lines, ELLIPSIS};
use super::traits::*;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use serde::Deserialize;

const KEY_FORMAT: &str = "subscription_key";

const RESULTS_PER_REQUEST: u64 = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Response {
    web_pages: WebPages,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WebPages {
    total_estimated_matches: u64,
    value: Vec<WebPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebPage {
    name: String,
    url: String,
    snippet: String,
}

/// Bing Web Search; keys are a single subscription key
pub struct Bing {
    client: HttpClient,
    base_url: String,
}

impl Bing {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://api.bing.microsoft.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn classify_error(response: &FetchResponse) -> ProviderError {
        // Azure answers an exhausted subscription with 403 "Out of call volume quota"
        if response.status == 403 && response.text.to_ascii_lowercase().contains("quota") {
            return ProviderError::quota(format!("bing: HTTP {}", response.status));
        }
        ProviderError::from_status(response.status, "bing")
    }

    fn parse(query: &Query, response: Response) -> ResultPage {
        let total = response.web_pages.total_estimated_matches;
        let items: Vec<ResultItem> = response
            .web_pages
            .value
            .into_iter()
            .map(|page| {
                let title = collapse_whitespace(&ELLIPSIS.replace_all(&page.name, " "));
                ResultItem::new(page.url, title).with_snippet(snippet_lines(&page.snippet, &ELLIPSIS))
            })
            .collect();

        let next_start = query.start_index() + items.len() as u64;
        let next_query = if !items.is_empty() && next_start <= total {
            Some(query.next_page(next_start))
        } else {
            None
        };

        ResultPage::for_query(query)
            .with_total_hits(total)
            .with_items(items)
            .with_next_query(next_query)
    }
}

#[async_trait]
impl Provider for Bing {
    fn name(&self) -> &str {
        "bing"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.microsoft.com/bing/apis/bing-web-search-api")
            .keyed(KEY_FORMAT)
            .paging(true)
    }

    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
        if query.is_continuation() {
            return Err(ProviderError::fatal("bing: invalid query"));
        }
        let keys = query
            .sub_keys(1)
            .ok_or_else(|| ProviderError::bad_key(KEY_FORMAT))?;
        if query.start_index() < 1 {
            return Err(ProviderError::fatal("start index must be at least 1"));
        }

        let request = FetchRequest::get(format!("{}/v7.0/search", self.base_url))
            .header("Ocp-Apim-Subscription-Key", keys[0])
            .param("q", query.query_text())
            .param("count", RESULTS_PER_REQUEST)
            .param("offset", query.start_index() - 1)
            .param("textDecorations", "false");

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(Self::classify_error(&response));
        }

        Ok(Self::parse(query, response.json()?))
    }
}
