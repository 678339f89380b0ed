//! Aggregation of the pages collected for one input line

use super::types::{ResultItem, ResultPage};

/// How the pages of one input line are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One combined record per input line
    #[default]
    Combined,
    /// One record per provider page
    PerPage,
}

/// Combine the pages of one input line into a single closed record.
///
/// Items are concatenated in page order. Label, query text, start index,
/// start time and the hit estimate come from the first page, the end time
/// from the last one. The fatal flag is set if any page is fatal. The result
/// never carries a next query. Returns `None` for an empty sequence.
pub fn combine(pages: Vec<ResultPage>) -> Option<ResultPage> {
    let mut pages = pages.into_iter();
    let first = pages.next()?;

    let mut end_time = first.end_time_millis();
    let mut fatal_error = first.fatal_error();
    let start_time = first.start_time_millis();
    let head = ResultPage::new(first.label(), first.query_text(), first.start_index())
        .with_total_hits(first.total_hits().clone());
    let mut items: Vec<ResultItem> = first.into_items();

    for page in pages {
        end_time = page.end_time_millis();
        fatal_error |= page.fatal_error();
        items.extend(page.into_items());
    }

    Some(
        head.with_items(items)
            .with_timing(start_time, end_time)
            .with_fatal_error(fatal_error)
            .with_next_query(None),
    )
}

/// Turn the pages of one input line into output records
pub fn collate(pages: Vec<ResultPage>, mode: OutputMode) -> Vec<ResultPage> {
    match mode {
        OutputMode::Combined => combine(pages).into_iter().collect(),
        OutputMode::PerPage => pages,
    }
}
