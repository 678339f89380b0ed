//! XML codec for result pages
//!
//! Output is one `<resultslist>` root holding one `<results>` record per
//! page. The reader also accepts the older layout where records were simply
//! concatenated without a root (see [`RootShim`]).

mod reader;
mod shim;
mod writer;

pub use reader::{FileResultsReader, ResultsReader};
pub use shim::RootShim;
pub use writer::{DurableFile, ResultsWriter};

use thiserror::Error;

/// Name of the element wrapping all page records
pub const ROOT: &str = "resultslist";

/// Errors raised while reading or writing result files
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed XML: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("Invalid value {value:?} for <{name}>")]
    Field { name: &'static str, value: String },

    #[error("Unexpected end of input inside <{0}>")]
    UnexpectedEof(&'static str),

    #[error("Cannot write XML as {0}")]
    UnsupportedEncoding(String),
}
