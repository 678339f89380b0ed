//! Provider loader for building the registry from configuration

use super::registry::ProviderRegistry;
use super::traits::Provider;
use super::{bing, duckduckgo, facebook, google_custom, twitter, wikipedia};
use crate::config::{ProviderConfig, Settings};
use crate::error::{Error, Result};
use crate::network::HttpClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Built-in adapters, in the order they are listed
const BUILT_IN: &[&str] = &[
    "google-custom",
    "bing",
    "duckduckgo",
    "wikipedia",
    "twitter",
    "facebook",
];

/// Loader for initializing providers from configuration
pub struct ProviderLoader;

impl ProviderLoader {
    /// Build the registry: every built-in adapter under its own name, plus
    /// any extra entries from the settings file. A settings entry with a
    /// built-in name overrides that adapter's defaults.
    pub fn load(settings: &Settings) -> Result<ProviderRegistry> {
        let client = HttpClient::with_settings(&settings.outgoing)?;
        let mut registry = ProviderRegistry::new();

        let defaults = BUILT_IN
            .iter()
            .filter(|name| settings.get_provider(name).is_none())
            .map(|name| ProviderConfig::new(*name));
        let configs: Vec<ProviderConfig> = defaults.chain(settings.providers.iter().cloned()).collect();

        for config in &configs {
            if config.disabled {
                info!("Skipping disabled provider: {}", config.name);
                continue;
            }

            match Self::create_provider(config, settings, &client) {
                Ok(provider) => {
                    debug!("Loaded provider: {} ({})", config.name, config.provider);
                    registry.register(config.name.clone(), provider);
                }
                Err(e) => {
                    warn!("Failed to load provider {}: {}", config.name, e);
                }
            }
        }

        info!("Loaded {} providers", registry.len());
        Ok(registry)
    }

    /// Create a provider instance from its configuration
    fn create_provider(
        config: &ProviderConfig,
        settings: &Settings,
        shared: &HttpClient,
    ) -> Result<Arc<dyn Provider>> {
        let client = match config.timeout {
            Some(timeout) => {
                let mut outgoing = settings.outgoing.clone();
                outgoing.request_timeout = timeout;
                HttpClient::with_settings(&outgoing)?
            }
            None => shared.clone(),
        };
        let base_url = config.base_url.clone();

        let provider: Arc<dyn Provider> = match config.provider.as_str() {
            "google-custom" => {
                let provider = google_custom::GoogleCustom::new(client);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            "bing" => {
                let provider = bing::Bing::new(client);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            "duckduckgo" => {
                let provider = duckduckgo::DuckDuckGo::new(client);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            "wikipedia" => {
                let host = config.host.as_deref().unwrap_or("en");
                let provider = wikipedia::Wikipedia::new(client, host);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            "twitter" => {
                let provider = twitter::Twitter::new(client);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            "facebook" => {
                let provider = facebook::Facebook::new(client);
                Arc::new(rebase(provider, base_url, |p, url| p.with_base_url(url)))
            }
            other => {
                return Err(Error::UnknownProvider {
                    name: other.to_string(),
                    available: BUILT_IN.join(", "),
                });
            }
        };

        Ok(provider)
    }

    /// Names of the built-in adapters
    pub fn available_providers() -> Vec<&'static str> {
        BUILT_IN.to_vec()
    }
}

fn rebase<P>(provider: P, base_url: Option<String>, apply: impl FnOnce(P, String) -> P) -> P {
    match base_url {
        Some(url) => apply(provider, url),
        None => provider,
    }
}
