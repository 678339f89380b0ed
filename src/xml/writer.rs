//! Streaming writer for result pages

use super::{XmlError, ROOT};
use crate::results::ResultPage;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// File whose `flush` also pushes written data to the storage device
pub struct DurableFile(File);

impl DurableFile {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        File::create(path).map(Self)
    }
}

impl Write for DurableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_data()
    }
}

/// Writes page records under a single root element.
///
/// Each page is rendered in memory, encoded, written and flushed on its own,
/// so a run that dies part way leaves every completed page readable. A page
/// cut off in the middle of its own write is not recoverable.
pub struct ResultsWriter<W: Write> {
    sink: W,
    encoding: &'static Encoding,
}

impl ResultsWriter<DurableFile> {
    /// Create (or truncate) an output file
    pub fn create<P: AsRef<Path>>(path: P, encoding: &'static Encoding) -> Result<Self, XmlError> {
        Self::with_encoding(DurableFile::create(path)?, encoding)
    }
}

impl<W: Write> ResultsWriter<W> {
    /// UTF-8 writer
    pub fn new(sink: W) -> Result<Self, XmlError> {
        Self::with_encoding(sink, UTF_8)
    }

    /// Writer producing `encoding`; characters the encoding cannot represent
    /// are written as numeric character references
    pub fn with_encoding(sink: W, encoding: &'static Encoding) -> Result<Self, XmlError> {
        // encoding_rs can only encode to ASCII-compatible encodings
        if encoding.output_encoding() != encoding {
            return Err(XmlError::UnsupportedEncoding(encoding.name().to_string()));
        }

        let mut writer = Self { sink, encoding };
        let label = encoding.name().to_ascii_lowercase();
        let mut xml = Writer::new(Vec::new());
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some(label.as_str()), None)))?;
        xml.get_mut().extend_from_slice(b"\n\n");
        xml.write_event(Event::Start(BytesStart::new(ROOT)))?;
        xml.get_mut().extend_from_slice(b"\n\n");
        writer.emit(&xml.into_inner())?;
        Ok(writer)
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Append one page record
    pub fn write_page(&mut self, page: &ResultPage) -> Result<(), XmlError> {
        let mut xml = Writer::new(Vec::new());
        xml.write_event(Event::Start(BytesStart::new("results")))?;
        xml.get_mut().push(b'\n');

        field(&mut xml, "label", page.label())?;
        field(&mut xml, "query", page.query_text())?;
        field(&mut xml, "totalresults", &page.total_hits().to_string())?;
        field(&mut xml, "startindex", &page.start_index().to_string())?;
        field(&mut xml, "starttime", &page.start_time_millis().to_string())?;
        field(&mut xml, "endtime", &page.end_time_millis().to_string())?;
        field(&mut xml, "elapsedtime", &page.elapsed_millis().to_string())?;
        field(&mut xml, "fatalerror", if page.fatal_error() { "1" } else { "0" })?;

        for item in page.items() {
            xml.write_event(Event::Start(BytesStart::new("result")))?;
            xml.get_mut().push(b'\n');
            field(&mut xml, "url", &item.url)?;
            field(&mut xml, "title", &item.title)?;
            let snippet: Vec<&str> = item.snippet.iter().map(|line| line.trim()).collect();
            field(&mut xml, "snippet", &snippet.join("\n"))?;
            xml.write_event(Event::End(BytesEnd::new("result")))?;
            xml.get_mut().push(b'\n');
        }

        xml.write_event(Event::End(BytesEnd::new("results")))?;
        xml.get_mut().extend_from_slice(b"\n\n");
        self.emit(&xml.into_inner())
    }

    /// Append several page records
    pub fn write_pages<'a>(&mut self, pages: impl IntoIterator<Item = &'a ResultPage>) -> Result<(), XmlError> {
        for page in pages {
            self.write_page(page)?;
        }
        Ok(())
    }

    /// Close the root element and hand back the sink
    pub fn finish(mut self) -> Result<W, XmlError> {
        let mut xml = Writer::new(Vec::new());
        xml.write_event(Event::End(BytesEnd::new(ROOT)))?;
        xml.get_mut().push(b'\n');
        self.emit(&xml.into_inner())?;
        Ok(self.sink)
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Encode rendered UTF-8 markup and push it to the sink
    fn emit(&mut self, utf8: &[u8]) -> Result<(), XmlError> {
        if self.encoding == UTF_8 {
            self.sink.write_all(utf8)?;
        } else {
            let text = std::str::from_utf8(utf8)
                .map_err(|e| XmlError::UnsupportedEncoding(e.to_string()))?;
            let (bytes, _, _) = self.encoding.encode(text);
            self.sink.write_all(&bytes)?;
        }
        self.sink.flush()?;
        Ok(())
    }
}

/// `<name>value</name>` followed by a line break
fn field(xml: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<(), XmlError> {
    xml.create_element(name)
        .write_text_content(BytesText::new(value))?;
    xml.get_mut().push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::results::ResultItem;

    fn sample() -> ResultPage {
        ResultPage::for_query(&Query::new("0001", "fish & chips"))
            .with_total_hits(42u32)
            .with_timing(1000, 1250)
            .with_items(vec![ResultItem::new("https://a.example/?x=1&y=2", "<Fish>")
                .with_snippet(["first line ", " second"])])
    }

    fn render(page: &ResultPage) -> String {
        let mut writer = ResultsWriter::new(Vec::new()).unwrap();
        writer.write_page(page).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_layout() {
        let out = render(&sample());
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\n<resultslist>\n\n<results>\n"));
        assert!(out.contains("<label>0001</label>\n"));
        assert!(out.contains("<totalresults>42</totalresults>\n"));
        assert!(out.contains("<startindex>1</startindex>\n"));
        assert!(out.contains("<elapsedtime>250</elapsedtime>\n"));
        assert!(out.contains("<fatalerror>0</fatalerror>\n<result>\n"));
        assert!(out.contains("<snippet>first line\nsecond</snippet>\n</result>\n</results>\n\n"));
        assert!(out.ends_with("</resultslist>\n"));
    }

    #[test]
    fn test_markup_is_escaped() {
        let out = render(&sample());
        assert!(out.contains("<query>fish &amp; chips</query>"));
        assert!(out.contains("<title>&lt;Fish&gt;</title>"));
        assert!(out.contains("x=1&amp;y=2"));
    }

    #[test]
    fn test_fatal_flag() {
        let page = ResultPage::fatal(&Query::new("", "q"), 5, 9);
        assert!(render(&page).contains("<fatalerror>1</fatalerror>"));
    }

    #[test]
    fn test_single_byte_encoding_uses_char_refs() {
        let page = ResultPage::for_query(&Query::new("", "café ☕"));
        let mut writer = ResultsWriter::with_encoding(Vec::new(), encoding_rs::WINDOWS_1252).unwrap();
        writer.write_page(&page).unwrap();
        let bytes = writer.finish().unwrap();

        assert!(bytes.starts_with(b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>"));
        let needle = b"caf\xe9 &#9749;";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_utf16_rejected() {
        assert!(matches!(
            ResultsWriter::with_encoding(Vec::new(), encoding_rs::UTF_16LE),
            Err(XmlError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_pages_written_incrementally() {
        let mut writer = ResultsWriter::new(Vec::new()).unwrap();
        let header_len = writer.get_ref().len();
        writer.write_page(&sample()).unwrap();
        assert!(writer.get_ref().len() > header_len);
        assert!(std::str::from_utf8(writer.get_ref()).unwrap().ends_with("</results>\n\n"));
    }
}
