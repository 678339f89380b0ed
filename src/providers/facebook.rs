//! Facebook Graph API post search

use super::error::{FailureKind, ProviderError};
use super::text::{clean_lines, collapse_whitespace};
use super::traits::*;
use super::urls::{is_http_url, set_query_param, unknown_hit_count};
use crate::cache::TokenCache;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::{ResultItem, ResultPage};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const KEY_FORMAT: &str = "app_id$app_secret";

/// Graph searches can take a while to answer
const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    data: Vec<Post>,
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Paging {
    next: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    id: String,
    from: Author,
    message: String,
    name: String,
    caption: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Facebook post search; keys have the form `app_id$app_secret`.
///
/// App access tokens are cached per key. A cached token that is refused is
/// dropped and a fresh one is requested once before giving up.
pub struct Facebook {
    client: HttpClient,
    base_url: String,
    tokens: TokenCache,
}

impl Facebook {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://graph.facebook.com".to_string(),
            tokens: TokenCache::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn login(&self, app_id: &str, app_secret: &str) -> Result<String, ProviderError> {
        let request = FetchRequest::get(format!("{}/oauth/access_token", self.base_url))
            .param("client_id", app_id)
            .param("client_secret", app_secret)
            .param("grant_type", "client_credentials");

        let response = self.client.execute(request).await?;
        if response.status == 400 {
            return Err(ProviderError::fatal("facebook: login refused"));
        }
        let response = response.error_for_status("facebook login")?;
        parse_token(&response.text)
            .ok_or_else(|| ProviderError::transient("facebook: error parsing login response"))
    }

    async fn search(&self, url: &str, token: &str) -> Result<Response, ProviderError> {
        let url = set_query_param(url, "access_token", token)?;
        let response = self
            .client
            .execute_with_timeout(FetchRequest::get(url), SEARCH_TIMEOUT)
            .await?;
        if response.status == 400 {
            return Err(ProviderError::fatal("facebook: request refused"));
        }
        response.error_for_status("facebook")?.json()
    }

    fn parse(query: &Query, response: Response) -> ResultPage {
        let items: Vec<ResultItem> = response
            .data
            .into_iter()
            .map(|post| {
                let snippet = clean_lines([
                    post.message.as_str(),
                    post.name.as_str(),
                    post.caption.as_str(),
                    post.description.as_str(),
                ]);
                ResultItem::new(
                    format!("https://www.facebook.com/{}", post.id.trim()),
                    collapse_whitespace(&post.from.name),
                )
                .with_snippet(snippet)
            })
            .collect();

        let next = response.paging.next.trim();
        let next_query = if is_http_url(next) {
            Some(query.continuation(next, query.start_index() + items.len() as u64))
        } else {
            None
        };

        ResultPage::for_query(query)
            .with_total_hits(unknown_hit_count())
            .with_items(items)
            .with_next_query(next_query)
    }
}

/// Token from either a JSON body or the older `access_token=...` form body
fn parse_token(body: &str) -> Option<String> {
    if let Ok(token) = serde_json::from_str::<TokenResponse>(body) {
        return Some(token.access_token).filter(|t| !t.is_empty());
    }
    url::form_urlencoded::parse(body.trim().as_bytes())
        .find(|(key, value)| key == "access_token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

#[async_trait]
impl Provider for Facebook {
    fn name(&self) -> &str {
        "facebook"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://developers.facebook.com/docs/graph-api")
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
                "{}/search?q={}&type=post&limit=100",
                self.base_url,
                urlencoding::encode(query.query_text())
            ),
        };

        if let Some(token) = self.tokens.get(credential).await {
            match self.search(&url, &token).await {
                Ok(response) => return Ok(Self::parse(query, response)),
                Err(e) if e.kind() == FailureKind::Fatal => {
                    debug!("facebook: cached token refused, logging in again");
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

        Ok(Self::parse(query, response))
    }
}
