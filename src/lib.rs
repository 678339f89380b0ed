//! search-wrapper: batch querying of rate-limited search APIs
//!
//! Reads queries from a file, pages through each one with a search provider
//! (retrying with backoff and rotating registration keys when a key runs out
//! of quota), and streams the results to an XML file that older tools can
//! still read.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod network;
pub mod providers;
pub mod query;
pub mod results;
pub mod search;
pub mod xml;

pub use config::Settings;
pub use credentials::CredentialPool;
pub use error::{Error, Result};
pub use providers::{FailureKind, Provider, ProviderError, ProviderLoader, ProviderRegistry};
pub use query::{InputLine, Query};
pub use results::{OutputMode, ResultItem, ResultPage};
pub use search::{RetryPolicy, RunOptions, RunSummary, SearchLimits, SearchWrapper};
pub use xml::{ResultsReader, ResultsWriter};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
