//! Result types and aggregation
//!
//! This module defines the search hit and result page values produced by
//! providers and consumed by the orchestrator and the XML codec.

mod aggregate;
mod types;

pub use aggregate::{collate, combine, OutputMode};
pub use types::*;
