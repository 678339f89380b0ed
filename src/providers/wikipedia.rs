//! Wikipedia full-text search through the MediaWiki API

use super::error::ProviderError;
use super::text::{collapse_whitespace, snippet_lines, BOLD_ELLIPSIS};
use super::traits::*;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use serde::Deserialize;

const RESULTS_PER_REQUEST: u64 = 50;

/// API error codes that mean "slow down" rather than "bad request"
const THROTTLE_CODES: &[&str] = &["ratelimited", "maxlag"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    query: QueryBody,
    #[serde(rename = "continue")]
    continuation: Option<serde_json::Value>,
    #[serde(rename = "query-continue")]
    legacy_continuation: Option<serde_json::Value>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryBody {
    searchinfo: SearchInfo,
    search: Vec<Article>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchInfo {
    totalhits: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Article {
    title: String,
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    code: String,
    info: String,
}

/// Wikipedia search; unkeyed, paged by offset
pub struct Wikipedia {
    client: HttpClient,
    host: String,
    base_url: String,
}

impl Wikipedia {
    /// Search the wiki at `host`; a bare language code such as `de` means
    /// `de.wikipedia.org`
    pub fn new(client: HttpClient, host: &str) -> Self {
        let host = if host.contains(':') || host.contains('.') {
            host.to_string()
        } else {
            format!("{host}.wikipedia.org")
        };
        Self {
            client,
            base_url: format!("https://{host}"),
            host,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn article_url(&self, title: &str) -> String {
        format!(
            "https://{}/wiki/{}",
            self.host,
            urlencoding::encode(&title.replace(' ', "_"))
        )
    }

    fn parse(&self, query: &Query, response: Response) -> Result<ResultPage, ProviderError> {
        if let Some(error) = response.error {
            let message = format!("wikipedia: {} ({})", error.info, error.code);
            return Err(if THROTTLE_CODES.contains(&error.code.as_str()) {
                ProviderError::quota(message)
            } else {
                ProviderError::fatal(message)
            });
        }

        let items: Vec<ResultItem> = response
            .query
            .search
            .into_iter()
            .map(|article| {
                ResultItem::new(self.article_url(&article.title), collapse_whitespace(&article.title))
                    .with_snippet(snippet_lines(&article.snippet, &BOLD_ELLIPSIS))
            })
            .collect();

        let more = response.continuation.is_some() || response.legacy_continuation.is_some();
        let next_query = if more {
            Some(query.next_page(query.start_index() + items.len() as u64))
        } else {
            None
        };

        Ok(ResultPage::for_query(query)
            .with_total_hits(response.query.searchinfo.totalhits)
            .with_items(items)
            .with_next_query(next_query))
    }
}

#[async_trait]
impl Provider for Wikipedia {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.mediawiki.org/wiki/API:Search")
            .paging(true)
    }

    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
        if query.is_continuation() {
            return Err(ProviderError::fatal("wikipedia: invalid query"));
        }
        if query.start_index() < 1 {
            return Err(ProviderError::fatal("start index must be at least 1"));
        }

        let request = FetchRequest::get(format!("{}/w/api.php", self.base_url))
            .param("action", "query")
            .param("list", "search")
            .param("srsearch", query.query_text())
            .param("srinfo", "totalhits")
            .param("srprop", "snippet")
            .param("sroffset", query.start_index() - 1)
            .param("srlimit", RESULTS_PER_REQUEST)
            .param("format", "json");

        let response = self
            .client
            .execute(request)
            .await?
            .error_for_status("wikipedia")?;

        self.parse(query, response.json()?)
    }
}
