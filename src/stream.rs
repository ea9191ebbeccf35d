use std::ops::Range;
use std::rc::Rc;

use crate::error::*;

/// Random-access byte source the tokenizer and the cross-reference reader
/// run on. Positions are absolute file offsets; a sub-stream is a window
/// `start..end` sharing the backing storage.
///
/// A fully resident source never fails a read. A progressively loaded
/// source reports unfetched bytes with `PdfError::MissingData` and answers
/// `missing_ranges`/`request_range`, which are no-ops here.
pub trait BaseStream {
    fn start(&self) -> usize;
    fn end(&self) -> usize;
    fn pos(&self) -> usize;
    fn set_pos(&mut self, pos: usize);

    /// Next byte, advancing the cursor. `None` at the end of the window.
    fn get_byte(&mut self) -> Result<Option<u8>>;

    /// Up to `n` bytes from the cursor, advancing it. Shorter at the end.
    fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>>;

    /// Bytes of `begin..end` (absolute), without touching the cursor.
    /// The range is clamped to the window.
    fn get_byte_range(&self, begin: usize, end: usize) -> Result<Vec<u8>>;

    /// A window `start..start+len` (absolute) over the same bytes, with its
    /// own cursor. `len: None` extends to the end of this stream.
    fn make_sub_stream(&self, start: usize, len: Option<usize>) -> Box<dyn BaseStream>;

    fn len(&self) -> usize {
        self.end() - self.start()
    }
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unloaded sub-ranges of `begin..end`. Empty for resident sources.
    fn missing_ranges(&self, _begin: usize, _end: usize) -> Vec<Range<usize>> {
        Vec::new()
    }
    fn is_range_loaded(&self, begin: usize, end: usize) -> bool {
        self.missing_ranges(begin, end).is_empty()
    }
    /// Ask the byte source to make `begin..end` resident. Blocks until the
    /// data arrived. No-op for resident sources.
    fn request_range(&self, _begin: usize, _end: usize) -> Result<()> {
        Ok(())
    }
    fn request_ranges(&self, ranges: &[Range<usize>]) -> Result<()> {
        for r in ranges {
            self.request_range(r.start, r.end)?;
        }
        Ok(())
    }
}

/// Fully resident byte stream.
pub struct MemStream {
    data: Rc<[u8]>,
    start: usize,
    end: usize,
    pos: usize,
}

impl MemStream {
    pub fn new(data: Vec<u8>) -> MemStream {
        let end = data.len();
        MemStream { data: data.into(), start: 0, end, pos: 0 }
    }
}

impl BaseStream for MemStream {
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
    fn pos(&self) -> usize {
        self.pos
    }
    fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }
    fn get_byte(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
    fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let begin = self.pos;
        let end = (begin + n).min(self.end);
        self.pos = end;
        Ok(self.data[begin..end].to_vec())
    }
    fn get_byte_range(&self, begin: usize, end: usize) -> Result<Vec<u8>> {
        let begin = begin.max(self.start).min(self.end);
        let end = end.max(begin).min(self.end);
        Ok(self.data[begin..end].to_vec())
    }
    fn make_sub_stream(&self, start: usize, len: Option<usize>) -> Box<dyn BaseStream> {
        let start = start.min(self.data.len());
        let end = match len {
            Some(len) => (start + len).min(self.data.len()),
            None => self.data.len(),
        };
        Box::new(MemStream {
            data: self.data.clone(),
            start,
            end: end.max(start),
            pos: start,
        })
    }
}
