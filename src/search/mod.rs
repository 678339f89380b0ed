//! Search orchestration module
//!
//! Pages through each input line with one provider, retrying with backoff
//! and rotating registration keys, and streams the collected records to the
//! output file.

mod backoff;
mod driver;
mod wrapper;

pub use backoff::{Backoff, RetryPolicy};
pub use driver::{process, run, RunOptions, RunSummary};
pub use wrapper::{Clock, SearchLimits, SearchWrapper};
