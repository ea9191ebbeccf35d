//! Document builder for the end-to-end tests: assembles objects and the
//! cross-reference table while tracking real byte offsets.

use pdfgraph::primitive::ObjNr;

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

    /// Appends a `0 Size` table covering every added object, the trailer
    /// and the `startxref` tail.
    pub fn finish(self, trailer_extra: &str) -> Vec<u8> {
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
        out
    }
}
