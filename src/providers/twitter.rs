//! Twitter standard search (v1.1) with app-only authentication

use super::error::{FailureKind, ProviderError};
use super::text::{collapse_whitespace, snippet_lines, NEWLINES};
use super::traits::*;
use super::urls::unknown_hit_count;
use crate::cache::TokenCache;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const KEY_FORMAT: &str = "consumer_key$consumer_secret";

const SEARCH_PATH: &str = "/1.1/search/tweets.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    statuses: Vec<Status>,
    search_metadata: SearchMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchMetadata {
    next_results: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Status {
    id_str: String,
    text: String,
    full_text: String,
    user: User,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct User {
    name: String,
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Twitter tweet search; keys have the form `consumer_key$consumer_secret`
pub struct Twitter {
    client: HttpClient,
    base_url: String,
    tokens: TokenCache,
}

impl Twitter {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://api.twitter.com".to_string(),
            tokens: TokenCache::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Exchange the consumer credentials for an app-only bearer token
    async fn login(&self, consumer_key: &str, consumer_secret: &str) -> Result<String, ProviderError> {
        let request = FetchRequest::post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(
                urlencoding::encode(consumer_key),
                urlencoding::encode(consumer_secret),
            )
            .form(vec![("grant_type".to_string(), "client_credentials".to_string())]);

        let response = self
            .client
            .execute(request)
            .await?
            .error_for_status("twitter login")?;
        let token: TokenResponse = response.json()?;
        if token.access_token.is_empty() {
            return Err(ProviderError::transient("twitter: empty bearer token"));
        }
        Ok(token.access_token)
    }

    async fn search(&self, url: &str, token: &str) -> Result<Response, ProviderError> {
        let response = self
            .client
            .execute(FetchRequest::get(url).bearer_auth(token))
            .await?
            .error_for_status("twitter")?;
        response.json()
    }

    fn parse(&self, query: &Query, response: Response) -> ResultPage {
        let items: Vec<ResultItem> = response
            .statuses
            .into_iter()
            .map(|status| {
                let text = if status.full_text.is_empty() {
                    &status.text
                } else {
                    &status.full_text
                };
                let url = format!(
                    "https://twitter.com/{}/status/{}",
                    status.user.screen_name, status.id_str
                );
                ResultItem::new(url, collapse_whitespace(&status.user.name))
                    .with_snippet(snippet_lines(text, &NEWLINES))
            })
            .collect();

        let next = response.search_metadata.next_results.trim();
        let next_query = if next.starts_with('?') {
            let url = format!("{}{}{}", self.base_url, SEARCH_PATH, next);
            Some(query.continuation(url, query.start_index() + items.len() as u64))
        } else {
            None
        };

        ResultPage::for_query(query)
            .with_total_hits(unknown_hit_count())
            .with_items(items)
            .with_next_query(next_query)
    }
}

#[async_trait]
impl Provider for Twitter {
    fn name(&self) -> &str {
        "twitter"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://developer.twitter.com/en/docs/twitter-api/v1/tweets/search")
            .keyed(KEY_FORMAT)
            .paging(true)
    }

    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError> {
        let credential = query
            .key()
            .ok_or_else(|| ProviderError::bad_key(KEY_FORMAT))?;
        let url = match query.continuation_payload() {
            Some(url) => url.to_string(),
            None => format!(
                "{}{}?q={}&count=100&tweet_mode=extended",
                self.base_url,
                SEARCH_PATH,
                urlencoding::encode(query.query_text())
            ),
        };

        if let Some(token) = self.tokens.get(credential).await {
            match self.search(&url, &token).await {
                Ok(response) => return Ok(self.parse(query, response)),
                Err(e) if e.kind() == FailureKind::Fatal => {
                    debug!("twitter: cached bearer token refused, requesting a new one");
                    self.tokens.remove(credential).await;
                }
                Err(e) => return Err(e),
            }
        }

        let keys = query
            .sub_keys(2)
            .ok_or_else(|| ProviderError::bad_key(KEY_FORMAT))?;
        let token = self.login(keys[0], keys[1]).await?;
        let response = self.search(&url, &token).await?;
        self.tokens.set(credential, token).await;

        Ok(self.parse(query, response))
    }
}
