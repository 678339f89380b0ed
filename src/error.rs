//! Crate-level errors
//!
//! Per-query provider failures are [`ProviderError`](crate::providers::ProviderError)
//! and never abort a run. Everything here does: it is surfaced to the caller
//! and the run stops.

use crate::xml::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown encoding label: {0}")]
    Encoding(String),

    #[error("Unrecognized provider \"{name}\"; available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("Provider \"{0}\" requires a registration keys file")]
    MissingKeys(String),

    #[error("Registration keys file contains no keys")]
    EmptyKeyPool,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
