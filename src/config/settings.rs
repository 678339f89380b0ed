//! Settings structures for search-wrapper configuration

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure, loaded from `search-wrapper.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub retry: RetrySettings,
    pub outgoing: OutgoingSettings,
    pub input: InputSettings,
    pub output: OutputSettings,
    pub providers: Vec<ProviderConfig>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (SEARCH_WRAPPER_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_NUM_RESULTS") {
            if let Ok(n) = val.parse() {
                self.search.num_results = n;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_MAX_REQUESTS") {
            if let Ok(n) = val.parse() {
                self.search.max_requests = n;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_COMBINE_PAGES") {
            self.search.combine_pages = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_WAIT_MAX_SECS") {
            if let Ok(n) = val.parse() {
                self.retry.wait_max_secs = n;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_OUTPUT_ENCODING") {
            self.output.encoding = val;
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_INPUT_ENCODING") {
            self.input.encoding = Some(val);
        }
        if let Ok(val) = std::env::var("SEARCH_WRAPPER_PROXY") {
            self.outgoing.proxies.all = Some(val);
        }
    }

    /// Reject settings the orchestrator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.search.num_results == 0 {
            return Err(Error::Config("search.num_results must be positive".into()));
        }
        if self.search.max_requests == 0 {
            return Err(Error::Config("search.max_requests must be positive".into()));
        }
        if self.retry.wait_multiplier < 1 {
            return Err(Error::Config("retry.wait_multiplier must be at least 1".into()));
        }
        if self.retry.max_attempts_per_page == Some(0) {
            return Err(Error::Config(
                "retry.max_attempts_per_page must be positive when set".into(),
            ));
        }
        check_timeout("outgoing.request_timeout", self.outgoing.request_timeout)?;
        check_timeout("outgoing.connect_timeout", self.outgoing.connect_timeout)?;
        for provider in &self.providers {
            if let Some(timeout) = provider.timeout {
                check_timeout(&format!("providers[{}].timeout", provider.name), timeout)?;
            }
        }
        self.output.encoding()?;
        self.input.encoding()?;
        Ok(())
    }

    /// Get provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Pagination limits per input line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of results requested per query
    pub num_results: u64,
    /// Maximum number of requests per query, excluding retries
    pub max_requests: u32,
    /// Write one combined record per input line instead of one per page
    pub combine_pages: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            num_results: 10,
            max_requests: 10,
            combine_pages: true,
        }
    }
}

/// Backoff and key rotation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Interval of the first wait in seconds
    pub wait_first_secs: u64,
    /// Multiplier applied to the wait interval after each wait
    pub wait_multiplier: u64,
    /// Maximum wait interval in seconds
    pub wait_max_secs: u64,
    /// Consecutive waits on one key before switching to the next key
    pub max_num_waits: u32,
    /// Give up on a page after this many failed attempts (unbounded if unset)
    pub max_attempts_per_page: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            wait_first_secs: 5,
            wait_multiplier: 2,
            wait_max_secs: 1800,
            max_num_waits: 9,
            max_attempts_per_page: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Request timeout in seconds
    pub request_timeout: f64,
    /// Connection timeout in seconds
    pub connect_timeout: f64,
    /// User agent string
    pub user_agent: String,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            connect_timeout: 10.0,
            user_agent: format!("search-wrapper/{}", crate::VERSION),
            verify_ssl: true,
            proxies: ProxySettings::default(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Input file settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Encoding label of the input file; BOM sniffing with UTF-8 fallback if unset
    pub encoding: Option<String>,
}

impl InputSettings {
    pub fn encoding(&self) -> Result<Option<&'static Encoding>> {
        self.encoding.as_deref().map(lookup_encoding).transpose()
    }
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Encoding label of the output file
    pub encoding: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_string(),
        }
    }
}

impl OutputSettings {
    pub fn encoding(&self) -> Result<&'static Encoding> {
        lookup_encoding(&self.encoding)
    }
}

/// Timeouts are positive, finite numbers of seconds
fn check_timeout(name: &str, secs: f64) -> Result<()> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be a positive number of seconds, got {secs}")))
    }
}

/// Resolve a WHATWG encoding label such as `utf-8` or `latin1`
pub fn lookup_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Encoding(label.to_string()))
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Registry name, e.g. `google-custom`
    pub name: String,
    /// Adapter to use
    pub provider: String,
    /// Whether the provider is disabled
    pub disabled: bool,
    /// Override for the API base URL
    pub base_url: Option<String>,
    /// Site host, for providers that serve several sites (e.g. a Wikipedia language)
    pub host: Option<String>,
    /// Custom request timeout for this provider in seconds
    pub timeout: Option<f64>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            provider: name.clone(),
            name,
            ..Default::default()
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: String::new(),
            disabled: false,
            base_url: None,
            host: None,
            timeout: None,
        }
    }
}
