//! HTTP networking module
//!
//! Provides the "fetch bytes from a URL" capability the provider adapters
//! build on: timeouts, proxies and Authorization header injection.

mod client;

pub use client::HttpClient;
