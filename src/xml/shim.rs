//! Reader stage that wraps a stream of page records in a synthetic root.
//!
//! Older output files are a bare concatenation of `<results>` fragments
//! with no enclosing element, which no XML parser accepts. [`RootShim`]
//! forwards the underlying bytes unchanged, except that a root start tag is
//! inserted right after any leading XML declaration and DOCTYPE, and the
//! matching end tag is emitted once the underlying stream is exhausted. A
//! well-formed current file simply ends up with one extra level of nesting.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::io::{self, Cursor, Read};

/// How far into the stream the prolog is searched for
pub const LOOKAHEAD: usize = 8192;

static PROLOG: Lazy<Regex> = Lazy::new(|| {
    let decl = r"<\?xml(?:\s+[^<>]*)?\?>";
    let doctype = r"<!DOCTYPE(?:\s+[^<>\[\]]*(?:\[(?:\s*<[^<>\[\]]+>)*\s*\])?)?>";
    Regex::new(&format!(r"(?s-u)^\s*((?:{decl})?\s*(?:{doctype})?)")).unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Head,
    Body,
    Tail,
    Done,
}

/// `Read` decorator injecting a root element around the stream
pub struct RootShim<R> {
    inner: R,
    head: Cursor<Vec<u8>>,
    tail: Cursor<Vec<u8>>,
    stage: Stage,
}

impl<R: Read> RootShim<R> {
    /// Wrap `inner` in `<root>`...`</root>`.
    ///
    /// Reads up to [`LOOKAHEAD`] bytes eagerly to locate the prolog.
    /// Whitespace before the prolog is dropped.
    pub fn new(mut inner: R, root: &str) -> io::Result<Self> {
        let mut lookahead = Vec::with_capacity(LOOKAHEAD);
        (&mut inner)
            .take(LOOKAHEAD as u64)
            .read_to_end(&mut lookahead)?;

        let (prolog_start, prolog_end) = PROLOG
            .captures(&lookahead)
            .and_then(|caps| caps.get(1))
            .map_or((0, 0), |m| (m.start(), m.end()));

        let mut head = Vec::with_capacity(lookahead.len() + root.len() + 2);
        head.extend_from_slice(&lookahead[prolog_start..prolog_end]);
        head.extend_from_slice(format!("<{root}>").as_bytes());
        head.extend_from_slice(&lookahead[prolog_end..]);

        Ok(Self {
            inner,
            head: Cursor::new(head),
            tail: Cursor::new(format!("</{root}>").into_bytes()),
            stage: Stage::Head,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for RootShim<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = match self.stage {
                Stage::Head => self.head.read(buf)?,
                Stage::Body => self.inner.read(buf)?,
                Stage::Tail => self.tail.read(buf)?,
                Stage::Done => return Ok(0),
            };
            if n > 0 {
                return Ok(n);
            }
            self.stage = match self.stage {
                Stage::Head => Stage::Body,
                Stage::Body => Stage::Tail,
                Stage::Tail | Stage::Done => Stage::Done,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shim(input: &str) -> String {
        let mut out = String::new();
        RootShim::new(input.as_bytes(), "resultslist")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_bare_fragments() {
        assert_eq!(
            shim("<results/><results/>"),
            "<resultslist><results/><results/></resultslist>"
        );
    }

    #[test]
    fn test_after_declaration() {
        assert_eq!(
            shim("  \n<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<results/>"),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resultslist><results/></resultslist>"
        );
    }

    #[test]
    fn test_after_doctype() {
        let input = "<?xml version=\"1.0\"?>\n<!DOCTYPE resultslist [ <!ELEMENT results ANY> ]>\n<results/>";
        assert_eq!(
            shim(input),
            "<?xml version=\"1.0\"?>\n<!DOCTYPE resultslist [ <!ELEMENT results ANY> ]><resultslist>\n<results/></resultslist>"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(shim(""), "<resultslist></resultslist>");
    }

    #[test]
    fn test_stream_longer_than_lookahead() {
        let body = "<results/>".repeat(LOOKAHEAD);
        let out = shim(&body);
        assert!(out.starts_with("<resultslist><results/>"));
        assert!(out.ends_with("<results/></resultslist>"));
        assert_eq!(out.len(), body.len() + "<resultslist></resultslist>".len());
    }

    #[test]
    fn test_small_reads() {
        let mut reader = RootShim::new("<a/>".as_bytes(), "r").unwrap();
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while reader.read(&mut byte).unwrap() == 1 {
            out.push(byte[0]);
        }
        assert_eq!(out, b"<r><a/></r>");
    }
}
