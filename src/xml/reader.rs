//! Pull reader for result pages

use super::shim::RootShim;
use super::{XmlError, ROOT};
use crate::results::{ResultItem, ResultPage};
use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

static DECLARED_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?-u)^(?:\xEF\xBB\xBF)?\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .unwrap()
});

/// Reader over a results file on disk
pub type FileResultsReader = ResultsReader<BufReader<RootShim<DecodeReaderBytes<File, Vec<u8>>>>>;

/// Parser event reduced to what the record grammar needs
enum Node {
    Start(Vec<u8>),
    Empty(Vec<u8>),
    Text(String),
    End,
    Eof,
    Other,
}

/// Reads page records one at a time.
///
/// Accepts current files, legacy files made of bare `<results>` fragments,
/// and files truncated after a complete record. Unknown elements are
/// skipped wherever they appear.
pub struct ResultsReader<B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    done: bool,
}

impl FileResultsReader {
    /// Open a results file. Without an explicit encoding, a byte order mark
    /// or the encoding named in the XML declaration is used, else UTF-8.
    pub fn open<P: AsRef<Path>>(path: P, encoding: Option<&'static Encoding>) -> Result<Self, XmlError> {
        let mut file = File::open(path)?;
        let encoding = match encoding {
            Some(encoding) => Some(encoding),
            None => {
                let declared = declared_encoding(&mut file)?;
                file.seek(SeekFrom::Start(0))?;
                declared
            }
        };
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(encoding)
            .bom_sniffing(true)
            .strip_bom(true)
            .build(file);
        Self::new(decoder)
    }
}

impl<R: Read> ResultsReader<BufReader<RootShim<R>>> {
    /// Read UTF-8 XML from `source`
    pub fn new(source: R) -> Result<Self, XmlError> {
        let shim = RootShim::new(source, ROOT)?;
        let mut reader = Reader::from_reader(BufReader::new(shim));
        reader.config_mut().trim_text(true);
        Ok(Self {
            reader,
            buf: Vec::new(),
            done: false,
        })
    }
}

impl<B: BufRead> ResultsReader<B> {
    /// The next page record, or `None` at the end of the data
    pub fn read_page(&mut self) -> Result<Option<ResultPage>, XmlError> {
        if self.done {
            return Ok(None);
        }
        match self.next_record() {
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
            page => page,
        }
    }

    /// All remaining page records
    pub fn read_all(&mut self) -> Result<Vec<ResultPage>, XmlError> {
        let mut pages = Vec::new();
        while let Some(page) = self.read_page()? {
            pages.push(page);
        }
        Ok(pages)
    }

    fn next_record(&mut self) -> Result<Option<ResultPage>, XmlError> {
        loop {
            match self.next_node()? {
                Node::Start(name) if name == b"results" => return self.read_record().map(Some),
                Node::Empty(name) if name == b"results" => return Ok(Some(RecordFields::default().build())),
                Node::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn read_record(&mut self) -> Result<ResultPage, XmlError> {
        let mut record = RecordFields::default();
        loop {
            match self.next_node()? {
                Node::Start(name) => match name.as_slice() {
                    b"label" => record.label = self.read_text("label")?,
                    b"query" => record.query = self.read_text("query")?,
                    b"totalresults" => record.total_hits = parse_field("totalresults", self.read_text("totalresults")?)?,
                    b"startindex" => record.start_index = parse_field("startindex", self.read_text("startindex")?)?,
                    b"starttime" => record.start_time = parse_field("starttime", self.read_text("starttime")?)?,
                    b"endtime" => record.end_time = parse_field("endtime", self.read_text("endtime")?)?,
                    b"fatalerror" => {
                        let flag: i64 = parse_field("fatalerror", self.read_text("fatalerror")?)?;
                        record.fatal_error = flag != 0;
                    }
                    b"result" => record.items.push(self.read_item()?),
                    _ => self.skip_subtree("results")?,
                },
                Node::Empty(name) if name == b"result" => record.items.push(ResultItem::new("", "")),
                Node::End => return Ok(record.build()),
                Node::Eof => return Err(XmlError::UnexpectedEof("results")),
                _ => {}
            }
        }
    }

    fn read_item(&mut self) -> Result<ResultItem, XmlError> {
        let mut item = ResultItem::new("", "");
        loop {
            match self.next_node()? {
                Node::Start(name) => match name.as_slice() {
                    b"url" => item.url = self.read_text("url")?,
                    b"title" => item.title = self.read_text("title")?,
                    b"snippet" => item.snippet = split_snippet(&self.read_text("snippet")?),
                    _ => self.skip_subtree("result")?,
                },
                Node::End => return Ok(item),
                Node::Eof => return Err(XmlError::UnexpectedEof("result")),
                _ => {}
            }
        }
    }

    /// Text content of the element just opened, trimmed; nested markup is skipped
    fn read_text(&mut self, element: &'static str) -> Result<String, XmlError> {
        let mut text = String::new();
        loop {
            match self.next_node()? {
                Node::Text(part) => text.push_str(&part),
                Node::Start(_) => self.skip_subtree(element)?,
                Node::End => return Ok(text.trim().to_string()),
                Node::Eof => return Err(XmlError::UnexpectedEof(element)),
                _ => {}
            }
        }
    }

    /// Skip past the end of the element just opened
    fn skip_subtree(&mut self, context: &'static str) -> Result<(), XmlError> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_node()? {
                Node::Start(_) => depth += 1,
                Node::End => depth -= 1,
                Node::Eof => return Err(XmlError::UnexpectedEof(context)),
                _ => {}
            }
        }
        Ok(())
    }

    fn next_node(&mut self) -> Result<Node, XmlError> {
        self.buf.clear();
        let node = match self.reader.read_event_into(&mut self.buf)? {
            Event::Start(e) => Node::Start(e.local_name().as_ref().to_vec()),
            Event::Empty(e) => Node::Empty(e.local_name().as_ref().to_vec()),
            Event::End(_) => Node::End,
            Event::Text(t) => Node::Text(t.unescape()?.into_owned()),
            Event::CData(c) => Node::Text(String::from_utf8_lossy(&c).into_owned()),
            Event::Eof => Node::Eof,
            _ => Node::Other,
        };
        Ok(node)
    }
}

impl<B: BufRead> Iterator for ResultsReader<B> {
    type Item = Result<ResultPage, XmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_page().transpose()
    }
}

/// Fields of a page record as they are read
struct RecordFields {
    label: String,
    query: String,
    total_hits: BigUint,
    start_index: u64,
    start_time: i64,
    end_time: i64,
    fatal_error: bool,
    items: Vec<ResultItem>,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            label: String::new(),
            query: String::new(),
            total_hits: BigUint::default(),
            start_index: 1,
            start_time: 0,
            end_time: 0,
            fatal_error: false,
            items: Vec::new(),
        }
    }
}

impl RecordFields {
    fn build(self) -> ResultPage {
        ResultPage::new(self.label, self.query, self.start_index)
            .with_total_hits(self.total_hits)
            .with_items(self.items)
            .with_timing(self.start_time, self.end_time)
            .with_fatal_error(self.fatal_error)
    }
}

fn parse_field<T: FromStr>(name: &'static str, value: String) -> Result<T, XmlError> {
    value.parse().map_err(|_| XmlError::Field { name, value })
}

/// One line per `\n`, each trimmed; tolerates `\r\n` from older files
fn split_snippet(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(|line| line.trim().to_string()).collect()
}

/// Encoding named in the XML declaration at the start of `source`, if any
fn declared_encoding<R: Read>(source: &mut R) -> Result<Option<&'static Encoding>, XmlError> {
    let mut head = Vec::with_capacity(512);
    source.take(512).read_to_end(&mut head)?;
    Ok(DECLARED_ENCODING
        .captures(&head)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .filter(|encoding| encoding.is_ascii_compatible()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(xml: &str) -> Vec<ResultPage> {
        ResultsReader::new(xml.as_bytes()).unwrap().read_all().unwrap()
    }

    const RECORD: &str = "<results>
<label>0001</label>
<query>hello world</query>
<totalresults>123456789012345678901234567890</totalresults>
<startindex>11</startindex>
<starttime>1000</starttime>
<endtime>1500</endtime>
<elapsedtime>999</elapsedtime>
<fatalerror>0</fatalerror>
<result>
<url>https://a.example/?x=1&amp;y=2</url>
<title> A &lt;title&gt; </title>
<snippet>first line
  second line  </snippet>
</result>
</results>";

    #[test]
    fn test_current_document() {
        let xml = format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\n<resultslist>\n\n{RECORD}\n\n</resultslist>\n");
        let pages = read(&xml);

        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.label(), "0001");
        assert_eq!(page.query_text(), "hello world");
        assert_eq!(
            page.total_hits(),
            &"123456789012345678901234567890".parse::<BigUint>().unwrap()
        );
        assert_eq!(page.start_index(), 11);
        // elapsed time is derived, never read back
        assert_eq!(page.elapsed_millis(), 500);
        assert!(!page.fatal_error());
        assert_eq!(page.items()[0].url, "https://a.example/?x=1&y=2");
        assert_eq!(page.items()[0].title, "A <title>");
        assert_eq!(page.items()[0].snippet, ["first line", "second line"]);
    }

    #[test]
    fn test_bare_fragments() {
        let xml = format!("{RECORD}{}", RECORD.replace("0001", "0002"));
        let pages = read(&xml);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].label(), "0001");
        assert_eq!(pages[1].label(), "0002");
    }

    #[test]
    fn test_legacy_concatenated_documents() {
        let xml = format!("<?xml version=\"1.0\"?>\n{RECORD}\n{RECORD}\n");
        assert_eq!(read(&xml).len(), 2);
    }

    #[test]
    fn test_unknown_elements_skipped() {
        let xml = "<results><label>x</label><extra><deep>1</deep></extra>\
                   <result><url>u</url><rank>3</rank><snippet/></result>\
                   <fatalerror>1</fatalerror></results>";
        let pages = read(xml);
        assert_eq!(pages[0].label(), "x");
        assert!(pages[0].fatal_error());
        assert_eq!(pages[0].items()[0].url, "u");
        assert!(pages[0].items()[0].snippet.is_empty());
    }

    #[test]
    fn test_missing_root_end_tag() {
        let xml = format!("<?xml version=\"1.0\"?>\n<resultslist>\n{RECORD}\n");
        assert_eq!(read(&xml).len(), 1);
    }

    #[test]
    fn test_truncated_record_is_an_error() {
        let truncated = &RECORD[..RECORD.find("<result>").unwrap()];
        let mut reader = ResultsReader::new(truncated.as_bytes()).unwrap();
        assert!(reader.read_page().is_err());
        assert!(reader.read_page().unwrap().is_none());
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let mut reader = ResultsReader::new("<results><startindex>abc</startindex></results>".as_bytes()).unwrap();
        assert!(matches!(
            reader.read_page(),
            Err(XmlError::Field { name: "startindex", .. })
        ));
    }

    #[test]
    fn test_iterator_and_empty_input() {
        let reader = ResultsReader::new("".as_bytes()).unwrap();
        assert_eq!(reader.count(), 0);

        let reader = ResultsReader::new(RECORD.as_bytes()).unwrap();
        let pages: Result<Vec<_>, _> = reader.collect();
        assert_eq!(pages.unwrap().len(), 1);
    }

    #[test]
    fn test_declared_encoding() {
        let mut head = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>".as_bytes();
        assert_eq!(
            declared_encoding(&mut head).unwrap(),
            Some(encoding_rs::WINDOWS_1252)
        );
        let mut none = "<a/>".as_bytes();
        assert_eq!(declared_encoding(&mut none).unwrap(), None);
    }
}
