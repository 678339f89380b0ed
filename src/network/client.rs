//! HTTP client for making requests to search providers

use crate::config::OutgoingSettings;
use crate::error::{Error, Result};
use crate::providers::{Auth, FetchRequest, FetchResponse, HttpMethod, ProviderError, RequestBody};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// HTTP client wrapper shared by all provider adapters
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let request_timeout = timeout("request_timeout", settings.request_timeout)?;
        let mut builder = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(timeout("connect_timeout", settings.connect_timeout)?)
            .gzip(true)
            .brotli(true);

        // SSL verification
        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        // Proxy settings
        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout: request_timeout,
            user_agent: settings.user_agent.clone(),
        })
    }

    /// Execute a provider request
    pub async fn execute(&self, request: FetchRequest) -> std::result::Result<FetchResponse, ProviderError> {
        self.execute_with_timeout(request, self.default_timeout).await
    }

    /// Execute a provider request with custom timeout.
    ///
    /// Transport failures (connect errors, timeouts, broken bodies) come back
    /// as transient errors; the status code is left for the caller to judge.
    pub async fn execute_with_timeout(
        &self,
        request: FetchRequest,
        timeout: Duration,
    ) -> std::result::Result<FetchResponse, ProviderError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder
            .timeout(timeout)
            .header("User-Agent", &self.user_agent);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(auth) = request.auth {
            req_builder = match auth {
                Auth::Basic { username, password } => {
                    req_builder.basic_auth(username, Some(password))
                }
                Auth::Bearer(token) => req_builder.bearer_auth(token),
            };
        }

        if let Some(body) = request.data {
            req_builder = match body {
                RequestBody::Form(data) => req_builder.form(&data),
                RequestBody::Raw(bytes) => req_builder.body(bytes),
            };
        }

        debug!("Fetching {}", request.url);
        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Simple GET request
    pub async fn get(&self, url: &str) -> std::result::Result<FetchResponse, ProviderError> {
        self.execute(FetchRequest::get(url)).await
    }

    async fn parse_response(response: Response) -> std::result::Result<FetchResponse, ProviderError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let text = response.text().await?;

        Ok(FetchResponse { status, text, url })
    }

    /// Get current user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn timeout(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Config(format!("invalid {name}: {secs}")))
}
