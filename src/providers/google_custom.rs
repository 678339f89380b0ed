//! Google Custom Search JSON API

use super::error::ProviderError;
use super::text::{collapse_whitespace, snippet_lines, BOLD_ELLIPSIS};
use super::traits::*;
use super::urls::hit_count;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use serde::Deserialize;

const KEY_FORMAT: &str = "api_key$cx";

/// Largest page the API serves
const RESULTS_PER_REQUEST: usize = 10;

const QUOTA_REASONS: &[&str] = &[
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "quotaExceeded",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Response {
    search_information: SearchInformation,
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchInformation {
    total_results: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    link: String,
    title: String,
    html_snippet: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    status: String,
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorDetail {
    reason: String,
}

/// Google Custom Search; keys have the form `api_key$cx`
pub struct GoogleCustom {
    client: HttpClient,
    base_url: String,
}

impl GoogleCustom {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://www.googleapis.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn classify_error(response: &FetchResponse) -> ProviderError {
        let body: ErrorResponse = serde_json::from_str(&response.text).unwrap_or_default();
        let quota = body.error.status == "RESOURCE_EXHAUSTED"
            || body
                .error
                .errors
                .iter()
                .any(|e| QUOTA_REASONS.contains(&e.reason.as_str()));
        if quota {
            ProviderError::quota(format!("google-custom: HTTP {}", response.status))
        } else {
            ProviderError::from_status(response.status, "google-custom")
        }
    }

    fn parse(query: &Query, response: Response) -> ResultPage {
        let items: Vec<ResultItem> = response
            .items
            .into_iter()
            .map(|item| {
                ResultItem::new(item.link, collapse_whitespace(&item.title))
                    .with_snippet(snippet_lines(&item.html_snippet, &BOLD_ELLIPSIS))
            })
            .collect();

        let next_query = if items.len() >= RESULTS_PER_REQUEST {
            Some(query.next_page(query.start_index() + items.len() as u64))
        } else {
            None
        };

        ResultPage::for_query(query)
            .with_total_hits(hit_count(&response.search_information.total_results))
            .with_items(items)
            .with_next_query(next_query)
    }
}

#[async_trait]
impl Provider for GoogleCustom {
    fn name(&self) -> &str {
        "google-custom"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://programmablesearchengine.google.com")
            .keyed(KEY_FORMAT)
            .paging(true)
    }

    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
        if query.is_continuation() {
            return Err(ProviderError::fatal("google-custom: invalid query"));
        }
        let keys = query
            .sub_keys(2)
            .ok_or_else(|| ProviderError::bad_key(KEY_FORMAT))?;
        if query.start_index() < 1 {
            return Err(ProviderError::fatal("start index must be at least 1"));
        }

        let request = FetchRequest::get(format!("{}/customsearch/v1", self.base_url))
            .param("key", keys[0])
            .param("cx", keys[1])
            .param("q", query.query_text())
            .param("start", query.start_index())
            .param("num", RESULTS_PER_REQUEST);

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(Self::classify_error(&response));
        }

        Ok(Self::parse(query, response.json()?))
    }
}
