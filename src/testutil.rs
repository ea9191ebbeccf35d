//! Shared fixtures for the in-module tests: a document builder that tracks
//! real byte offsets, so no test carries hand-counted numbers.

use crate::primitive::ObjNr;
use crate::stream::{BaseStream, MemStream};
use crate::xref::XRef;

pub struct PdfBuilder {
    pub out: Vec<u8>,
    pub offsets: Vec<(ObjNr, usize)>,
}

impl PdfBuilder {
    pub fn new() -> PdfBuilder {
        PdfBuilder { out: b"%PDF-1.7\n".to_vec(), offsets: Vec::new() }
    }

    pub fn offset_of(&self, id: ObjNr) -> usize {
        self.offsets.iter().find(|&&(i, _)| i == id).unwrap().1
    }

    pub fn add_object(&mut self, id: ObjNr, body: &str) -> usize {
        let offset = self.out.len();
        self.offsets.push((id, offset));
        self.out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        offset
    }

    pub fn add_stream_object(&mut self, id: ObjNr, dict_body: &str, data: &[u8]) -> usize {
        let offset = self.out.len();
        self.offsets.push((id, offset));
        self.out.extend_from_slice(
            format!("{} 0 obj\n<< {} /Length {} >>\nstream\n", id, dict_body, data.len()).as_bytes(),
        );
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        offset
    }

    /// A minimal catalog (object 1) and empty page tree (object 2).
    pub fn add_catalog_pair(&mut self) {
        self.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
        self.add_object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    }

    /// Writes a `0 Size` table covering every added object plus the
    /// trailer; returns (bytes, table offset).
    pub fn finish(self, trailer_extra: &str) -> (Vec<u8>, usize) {
        let mut out = self.out;
        let size = self.offsets.iter().map(|&(id, _)| id).max().unwrap_or(0) + 1;
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..size {
            let line = match self.offsets.iter().find(|&&(i, _)| i == id) {
                Some(&(_, offset)) => format!("{:010} {:05} n \n", offset, 0),
                None => format!("{:010} {:05} f \n", 0, 0),
            };
            out.extend_from_slice(line.as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
                size, trailer_extra, xref_pos
            )
            .as_bytes(),
        );
        (out, xref_pos)
    }
}

pub fn xref_over(data: Vec<u8>, start: usize) -> XRef {
    let xref = XRef::new(Box::new(MemStream::new(data)), 0);
    xref.set_start_xref(start);
    xref
}

/// Builds with a `/Root 1 0 R` trailer and parses; the builder must have
/// added the catalog pair (or equivalents).
pub fn parsed_xref(b: PdfBuilder) -> XRef {
    let (data, xref_pos) = b.finish("/Root 1 0 R");
    let xref = xref_over(data, xref_pos);
    xref.parse(false).unwrap();
    xref
}

/// The parse-side request/retry loop a host runs over a chunked source.
pub fn parse_blocking(xref: &XRef, recovery: bool) -> crate::error::Result<()> {
    loop {
        match xref.parse(recovery) {
            Ok(()) => return Ok(()),
            Err(e) => match e.missing_range() {
                Some((begin, end)) => xref.stream().request_range(begin, end)?,
                None => return Err(e),
            },
        }
    }
}
