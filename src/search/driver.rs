//! File driver: input lines in, result records out

use super::wrapper::SearchWrapper;
use crate::error::Result;
use crate::query::InputLine;
use crate::results::{collate, OutputMode};
use crate::xml::ResultsWriter;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// How input is read and output written
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: OutputMode,
    /// Input encoding; `None` sniffs a byte order mark and falls back to UTF-8
    pub input_encoding: Option<&'static Encoding>,
    pub output_encoding: &'static Encoding,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Combined,
            input_encoding: None,
            output_encoding: UTF_8,
        }
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input lines searched
    pub lines: usize,
    /// Input lines with no query text
    pub skipped: usize,
    /// Records written to the output
    pub pages_written: usize,
    /// Lines that ended with a fatal failure
    pub fatal_lines: usize,
}

/// Search every line of `input` and write the results to `output`
pub async fn run(
    wrapper: &mut SearchWrapper,
    input: &Path,
    output: &Path,
    options: RunOptions,
) -> Result<RunSummary> {
    let file = File::open(input)?;
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(options.input_encoding)
        .bom_sniffing(true)
        .strip_bom(true)
        .build(file);

    let mut writer = ResultsWriter::create(output, options.output_encoding)?;
    let summary = process(wrapper, BufReader::new(decoder), &mut writer, options.mode).await?;
    writer.finish()?;

    info!(
        lines = summary.lines,
        skipped = summary.skipped,
        pages = summary.pages_written,
        fatal = summary.fatal_lines,
        "run complete"
    );
    Ok(summary)
}

/// Search each line of `input` in turn, writing its records before the
/// next line starts
pub async fn process<R: BufRead, W: Write>(
    wrapper: &mut SearchWrapper,
    input: R,
    writer: &mut ResultsWriter<W>,
    mode: OutputMode,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for (number, line) in input.lines().enumerate() {
        let line = InputLine::parse(&line?);
        if line.is_blank() {
            warn!(line = number + 1, label = %line.label, "skipping line without query text");
            summary.skipped += 1;
            continue;
        }

        let pages = wrapper.search(&line).await;
        summary.lines += 1;
        if pages.iter().any(|page| page.fatal_error()) {
            summary.fatal_lines += 1;
        }

        let records = collate(pages, mode);
        writer.write_pages(&records)?;
        summary.pages_written += records.len();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Provider, ProviderError};
    use crate::query::Query;
    use crate::results::{ResultItem, ResultPage};
    use crate::xml::ResultsReader;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Two pages per query; queries containing "bad" fail outright
    struct TwoPages;

    #[async_trait]
    impl Provider for TwoPages {
        fn name(&self) -> &str {
            "two-pages"
        }

        async fn fetch(&self, query: &Query) -> std::result::Result<ResultPage, ProviderError> {
            if query.query_text().contains("bad") {
                return Err(ProviderError::fatal("rejected"));
            }
            let start = query.start_index();
            let next = (start == 1).then(|| query.next_page(3));
            Ok(ResultPage::for_query(query)
                .with_total_hits(7u32)
                .with_items(vec![
                    ResultItem::new(format!("https://a.example/{start}"), "a"),
                    ResultItem::new(format!("https://b.example/{start}"), "b"),
                ])
                .with_next_query(next))
        }
    }

    async fn run_lines(input: &str, mode: OutputMode) -> (RunSummary, Vec<ResultPage>) {
        let mut wrapper = SearchWrapper::new(Arc::new(TwoPages));
        let mut writer = ResultsWriter::new(Vec::new()).unwrap();
        let summary = process(&mut wrapper, input.as_bytes(), &mut writer, mode)
            .await
            .unwrap();
        let bytes = writer.finish().unwrap();
        let pages = ResultsReader::new(bytes.as_slice()).unwrap().read_all().unwrap();
        (summary, pages)
    }

    #[tokio::test]
    async fn test_combined_records() {
        let (summary, pages) = run_lines("0001: one\n\n0002:   \n0003: two\n", OutputMode::Combined).await;

        assert_eq!(
            summary,
            RunSummary {
                lines: 2,
                skipped: 2,
                pages_written: 2,
                fatal_lines: 0
            }
        );
        assert_eq!(pages[0].label(), "0001");
        assert_eq!(pages[0].len(), 4);
        assert_eq!(pages[0].items()[2].url, "https://a.example/3");
        assert_eq!(pages[1].label(), "0003");
    }

    #[tokio::test]
    async fn test_per_page_records() {
        let (summary, pages) = run_lines("0001: one\n", OutputMode::PerPage).await;
        assert_eq!(summary.pages_written, 2);
        assert_eq!(pages[0].start_index(), 1);
        assert_eq!(pages[1].start_index(), 3);
    }

    #[tokio::test]
    async fn test_fatal_line_does_not_stop_run() {
        let (summary, pages) = run_lines("0001: bad\n0002: good\n", OutputMode::Combined).await;
        assert_eq!(summary.fatal_lines, 1);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].fatal_error());
        assert!(pages[0].is_empty());
        assert!(!pages[1].fatal_error());
    }
}
