//! Document entry point: locates the header and the tail `startxref`,
//! drives `XRef::parse` with the recovery-mode retry and, over a chunked
//! source, the request-range/retry loop, and hands out the catalog.

use std::path::Path;
use std::rc::Rc;

use crate::catalog::Catalog;
use crate::chunked::{ChunkSource, ChunkedStream};
use crate::crypt::CipherTransformFactory;
use crate::error::*;
use crate::parser::find_subslice;
use crate::primitive::{Dict, PlainRef, Primitive};
use crate::stream::{BaseStream, MemStream};
use crate::xref::XRef;

/// How deep into the file the `%PDF-` header may sit.
const HEADER_SEARCH_WINDOW: usize = 1024;
/// How far from the end the `startxref` keyword is searched.
const STARTXREF_SEARCH_WINDOW: usize = 1024;

pub struct LoadOptions {
    doc_base_url: Option<String>,
    cipher_factory: Option<Rc<dyn CipherTransformFactory>>,
}

impl LoadOptions {
    pub fn new() -> LoadOptions {
        LoadOptions { doc_base_url: None, cipher_factory: None }
    }
    pub fn doc_base_url(mut self, url: impl Into<String>) -> LoadOptions {
        self.doc_base_url = Some(url.into());
        self
    }
    /// Installed before objects are fetched, once the trailer exposes
    /// `/Encrypt`. Hosts build the factory from that dictionary, the file
    /// ID and the user password.
    pub fn cipher_factory(mut self, factory: Rc<dyn CipherTransformFactory>) -> LoadOptions {
        self.cipher_factory = Some(factory);
        self
    }

    pub fn load(self, data: Vec<u8>) -> Result<Document> {
        Document::from_stream(Box::new(MemStream::new(data)), self)
    }
    pub fn load_chunked(self, source: Box<dyn ChunkSource>) -> Result<Document> {
        Document::from_stream(Box::new(ChunkedStream::new(source)), self)
    }
    pub fn open(self, path: impl AsRef<Path>) -> Result<Document> {
        let data = std::fs::read(path)?;
        self.load(data)
    }
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions::new()
    }
}

pub struct Document {
    xref: Rc<XRef>,
    catalog: Catalog,
}

impl Document {
    pub fn load(data: Vec<u8>) -> Result<Document> {
        LoadOptions::new().load(data)
    }
    pub fn open(path: impl AsRef<Path>) -> Result<Document> {
        LoadOptions::new().open(path)
    }
    pub fn load_chunked(source: Box<dyn ChunkSource>) -> Result<Document> {
        LoadOptions::new().load_chunked(source)
    }

    fn from_stream(stream: Box<dyn BaseStream>, options: LoadOptions) -> Result<Document> {
        let start_offset = Self::locate_start_offset(&*stream)?;
        let start_xref = Self::locate_xref_offset(&*stream)?;

        let xref = Rc::new(XRef::new(stream, start_offset));
        xref.set_start_xref(start_xref);
        if let Some(factory) = options.cipher_factory {
            xref.set_cipher_factory(factory);
        }

        let mut recovery = false;
        loop {
            match xref.parse(recovery) {
                Ok(()) => break,
                Err(e) => match e.missing_range() {
                    Some((begin, end)) => xref.stream().request_range(begin, end)?,
                    None if !recovery => {
                        warn!("falling back to reconstruction: {}", e);
                        // the scan walks the whole file
                        let (start, end) = (xref.stream().start(), xref.stream().end());
                        xref.stream().request_range(start, end)?;
                        recovery = true;
                    }
                    None => return Err(e),
                },
            }
        }

        let catalog = Catalog::new(xref.clone(), options.doc_base_url)?;
        Ok(Document { xref, catalog })
    }

    /// Position of the `%PDF-` header; leading junk is tolerated within
    /// the first kilobyte.
    fn locate_start_offset(stream: &dyn BaseStream) -> Result<usize> {
        const HEADER: &[u8] = b"%PDF-";
        let begin = stream.start();
        let end = (begin + HEADER_SEARCH_WINDOW).min(stream.end());
        let buf = read_blocking(stream, begin, end)?;
        find_subslice(&buf, HEADER)
            .map(|pos| begin + pos)
            .ok_or_else(|| other!("file header is missing"))
    }

    /// The `startxref` value near the end of the file.
    fn locate_xref_offset(stream: &dyn BaseStream) -> Result<usize> {
        const KEYWORD: &[u8] = b"startxref";
        let end = stream.end();
        let begin = end.saturating_sub(STARTXREF_SEARCH_WINDOW).max(stream.start());
        let buf = read_blocking(stream, begin, end)?;
        let pos = rfind_subslice(&buf, KEYWORD).ok_or_else(|| other!("'startxref' is missing"))?;
        let tail = &buf[pos + KEYWORD.len()..];
        let digits: Vec<u8> = tail
            .iter()
            .copied()
            .skip_while(|b| b.is_ascii_whitespace())
            .take_while(|b| b.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            bail!("'startxref' is not followed by an offset");
        }
        Ok(std::str::from_utf8(&digits).unwrap().parse::<usize>()?)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
    pub fn xref(&self) -> &XRef {
        &self.xref
    }
    pub fn trailer(&self) -> Option<Dict> {
        self.xref.trailer()
    }

    pub fn num_pages(&self) -> Result<u32> {
        self.catalog.num_pages()
    }

    /// Page lookup that drives the chunked source instead of surfacing
    /// `MissingData`.
    pub fn get_page(&self, index: u32) -> Result<(Dict, Option<PlainRef>)> {
        retry_loop(self.xref.stream(), || self.catalog.page_dict(index))
    }

    pub fn get_page_index(&self, page_ref: PlainRef) -> Result<u32> {
        retry_loop(self.xref.stream(), || self.catalog.page_index(page_ref))
    }

    pub fn fetch(&self, r: PlainRef) -> Result<Primitive> {
        self.xref.fetch_blocking(r)
    }
}

fn read_blocking(stream: &dyn BaseStream, begin: usize, end: usize) -> Result<Vec<u8>> {
    retry_loop(stream, || stream.get_byte_range(begin, end))
}

/// Runs `f`, requesting the missing range and retrying whenever it
/// suspends on unfetched bytes.
fn retry_loop<T>(stream: &dyn BaseStream, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut last_range = None;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => match e.missing_range() {
                Some((begin, end)) => {
                    if last_range == Some((begin, end)) {
                        return Err(e);
                    }
                    last_range = Some((begin, end));
                    stream.request_range(begin, end)?;
                }
                None => return Err(e),
            },
        }
    }
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::MemorySource;
    use crate::testutil::PdfBuilder;

    fn two_page_doc() -> Vec<u8> {
        let mut b = PdfBuilder::new();
        b.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
        b.add_object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>");
        b.add_object(3, "<< /Type /Page /Parent 2 0 R >>");
        b.add_object(4, "<< /Type /Page /Parent 2 0 R >>");
        let (data, _) = b.finish("/Root 1 0 R");
        data
    }

    #[test]
    fn loads_a_resident_document() {
        let doc = Document::load(two_page_doc()).unwrap();
        assert_eq!(doc.num_pages().unwrap(), 2);
        let (page, page_ref) = doc.get_page(1).unwrap();
        assert_eq!(page.get("Type").unwrap().as_name().unwrap(), "Page");
        assert_eq!(doc.get_page_index(page_ref.unwrap()).unwrap(), 1);
    }

    #[test]
    fn loads_through_a_chunked_source() {
        let doc = Document::load_chunked(Box::new(MemorySource::new(two_page_doc()))).unwrap();
        assert_eq!(doc.num_pages().unwrap(), 2);
        let (page, _) = doc.get_page(0).unwrap();
        assert_eq!(page.get("Type").unwrap().as_name().unwrap(), "Page");
    }

    #[test]
    fn junk_before_the_header_is_tolerated() {
        let mut data = b"junk bytes before the file\n".to_vec();
        let inner = two_page_doc();
        data.extend_from_slice(&inner);
        let doc = Document::load(data).unwrap();
        assert_eq!(doc.num_pages().unwrap(), 2);
    }

    #[test]
    fn broken_xref_offset_falls_back_to_reconstruction() {
        let mut data = two_page_doc();
        // corrupt the table keyword so the normal parse fails
        let pos = crate::parser::find_subslice(&data, b"xref\n0").unwrap();
        data[pos] = b'y';
        let doc = Document::load(data).unwrap();
        assert_eq!(doc.num_pages().unwrap(), 2);
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(Document::load(b"startxref%PDF-".to_vec()).is_err());
        assert!(Document::load(b"not a pdf at all".to_vec()).is_err());
    }
}
