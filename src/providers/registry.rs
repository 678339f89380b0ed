//! Provider registry mapping names to adapters

use super::traits::Provider;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of the search providers available to a run
pub struct ProviderRegistry {
    /// Providers by name
    providers: HashMap<String, Arc<dyn Provider>>,
    /// Names in registration order, for listings
    order: Vec<String>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a provider under a name; re-registering a name replaces it
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_none() {
            self.order.push(name);
        }
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    /// Get a provider by name, or an error listing the known names
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider {
                name: name.to_string(),
                available: self.order.join(", "),
            })
    }

    /// All provider names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Check if a provider exists
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
