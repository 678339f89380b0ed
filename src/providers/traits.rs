//! Provider traits and types

use super::error::ProviderError;
use crate::query::Query;
use crate::results::ResultPage;
use async_trait::async_trait;
use std::collections::HashMap;

/// Main provider trait that every search provider adapter implements
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    /// Short description of the provider
    fn about(&self) -> ProviderAbout {
        ProviderAbout::default()
    }

    /// Whether fetches must be signed with a registration key
    fn is_keyed(&self) -> bool {
        self.about().key_format.is_some()
    }

    /// Execute one query and return one page of results.
    ///
    /// Failures are classified so the caller knows whether to give up, switch
    /// credentials, or back off and retry.
    async fn fetch(&self, query: &Query) -> Result<ResultPage, ProviderError>;
}

/// Provider metadata
#[derive(Debug, Clone, Default)]
pub struct ProviderAbout {
    /// Website URL
    pub website: Option<String>,
    /// Layout of the registration key, e.g. `api_key$cx`; `None` for unkeyed providers
    pub key_format: Option<&'static str>,
    /// Whether the provider returns continuation handles for further pages
    pub supports_paging: bool,
}

impl ProviderAbout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn keyed(mut self, format: &'static str) -> Self {
        self.key_format = Some(format);
        self
    }

    pub fn paging(mut self, supported: bool) -> Self {
        self.supports_paging = supported;
        self
    }
}

/// HTTP request built by a provider
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters, in order
    pub params: Vec<(String, String)>,
    /// POST body data
    pub data: Option<RequestBody>,
    /// Credentials injected into the Authorization header
    pub auth: Option<Auth>,
}

impl FetchRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            params: Vec::new(),
            data: None,
            auth: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Add form data
    pub fn form(mut self, data: Vec<(String, String)>) -> Self {
        self.data = Some(RequestBody::Form(data));
        self
    }

    /// Authenticate with HTTP basic auth
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Authenticate with a bearer token
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(token.into()));
        self
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Raw(Vec<u8>),
}

/// Authorization header contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
}

/// HTTP response to a provider request
#[derive(Debug)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl FetchResponse {
    /// Parse response as JSON; a malformed body is a transient failure
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProviderError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Pass successful responses through, classify the rest by status
    pub fn error_for_status(self, context: &str) -> Result<Self, ProviderError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProviderError::from_status(self.status, context))
        }
    }
}
