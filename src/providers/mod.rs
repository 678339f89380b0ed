//! Search provider module
//!
//! Defines the [`Provider`] trait, the classified [`ProviderError`], and a
//! registry of the built-in adapters.

mod error;
mod loader;
mod registry;
mod traits;
mod urls;

pub mod text;

// Provider implementations
pub mod bing;
pub mod duckduckgo;
pub mod facebook;
pub mod google_custom;
pub mod twitter;
pub mod wikipedia;

pub use error::{FailureKind, ProviderError};
pub use loader::ProviderLoader;
pub use registry::ProviderRegistry;
pub use traits::*;
