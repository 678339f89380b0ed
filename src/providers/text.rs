//! Text clean-up shared by the provider adapters

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Highlighted ellipsis (`<b>...</b>`) that separates snippet fragments
pub static BOLD_ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b>\.+</b>").unwrap());

/// Plain `...` separator
pub static ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\.\.").unwrap());

/// Blank-line separator
pub static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

/// Trim and collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Drop markup and decode entities
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.to_string();
    }
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect()
}

/// Split a snippet into clean, non-empty lines
pub fn snippet_lines(snippet: &str, separator: &Regex) -> Vec<String> {
    separator
        .split(snippet)
        .map(|part| collapse_whitespace(&html_to_text(part)))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Clean a list of independent snippet fields, dropping empty ones
pub fn clean_lines<'a>(fields: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    fields
        .into_iter()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<b>Rust</b> &amp; friends"), "Rust & friends");
        assert_eq!(html_to_text("plain"), "plain");
    }

    #[test]
    fn test_snippet_lines_bold_ellipsis() {
        let snippet = "First <b>part</b> here <b>...</b> second&nbsp;part<br> <b>...</b> ";
        let lines = snippet_lines(snippet, &BOLD_ELLIPSIS);
        assert_eq!(lines, ["First part here", "second part"]);
    }

    #[test]
    fn test_snippet_lines_plain_ellipsis() {
        let lines = snippet_lines("one ... two...", &ELLIPSIS);
        assert_eq!(lines, ["one", "two"]);
    }

    #[test]
    fn test_clean_lines() {
        assert_eq!(clean_lines(["  a  b ", "", "c"]), ["a b", "c"]);
    }
}
