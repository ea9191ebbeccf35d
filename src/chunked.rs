use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use crate::error::*;
use crate::stream::BaseStream;

/// 64KB, matching the usual range-request granularity.
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Blocking range fetcher behind a `ChunkedStream`.
///
/// A network implementation would issue a byte-range request and wait for
/// the response; reading a chunk is the suspension point of the whole
/// crate. `read_chunk` may return fewer bytes only for the final chunk.
pub trait ChunkSource {
    fn total_length(&self) -> usize;
    fn read_chunk(&mut self, begin: usize, end: usize) -> Result<Vec<u8>>;
}

/// Tracks which chunks of the document are resident.
pub struct ChunkManager {
    bytes: Vec<u8>,
    loaded: Vec<bool>,
    chunk_size: usize,
}

impl ChunkManager {
    pub fn new(total_length: usize, chunk_size: usize) -> ChunkManager {
        assert!(chunk_size > 0);
        let num_chunks = total_length.div_ceil(chunk_size);
        ChunkManager {
            bytes: vec![0; total_length],
            loaded: vec![false; num_chunks],
            chunk_size,
        }
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
    pub fn num_chunks(&self) -> usize {
        self.loaded.len()
    }
    pub fn chunk_of(&self, pos: usize) -> usize {
        pos / self.chunk_size
    }
    pub fn chunk_bounds(&self, chunk: usize) -> Range<usize> {
        let begin = chunk * self.chunk_size;
        begin..(begin + self.chunk_size).min(self.bytes.len())
    }
    pub fn has_chunk(&self, chunk: usize) -> bool {
        self.loaded.get(chunk).copied().unwrap_or(false)
    }
    pub fn has_range(&self, begin: usize, end: usize) -> bool {
        if begin >= end {
            return true;
        }
        let last = self.chunk_of(end - 1);
        (self.chunk_of(begin)..=last).all(|c| self.has_chunk(c))
    }
    pub fn is_data_loaded(&self) -> bool {
        self.loaded.iter().all(|&l| l)
    }
    pub fn on_receive_data(&mut self, chunk: usize, data: &[u8]) -> Result<()> {
        let bounds = self.chunk_bounds(chunk);
        if chunk >= self.num_chunks() || data.len() != bounds.len() {
            bail!("received chunk {} with {} bytes, expected {}", chunk, data.len(), bounds.len());
        }
        self.bytes[bounds.clone()].copy_from_slice(data);
        self.loaded[chunk] = true;
        Ok(())
    }
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }
    pub fn slice(&self, range: Range<usize>) -> &[u8] {
        &self.bytes[range]
    }
    /// Chunk-aligned unloaded sub-ranges of `begin..end`, coalesced.
    pub fn missing_ranges(&self, begin: usize, end: usize) -> Vec<Range<usize>> {
        let end = end.min(self.bytes.len());
        let mut out: Vec<Range<usize>> = Vec::new();
        if begin >= end {
            return out;
        }
        for chunk in self.chunk_of(begin)..=self.chunk_of(end - 1) {
            if self.has_chunk(chunk) {
                continue;
            }
            let bounds = self.chunk_bounds(chunk);
            match out.last_mut() {
                Some(last) if last.end == bounds.start => last.end = bounds.end,
                _ => out.push(bounds),
            }
        }
        out
    }
}

struct ChunkedInner {
    manager: ChunkManager,
    source: Box<dyn ChunkSource>,
}

/// Progressively loaded byte stream. Reading a byte that is not resident
/// yet raises `MissingData{begin, end}`; the caller requests the range and
/// retries. Sub-streams share the chunk store.
pub struct ChunkedStream {
    inner: Rc<RefCell<ChunkedInner>>,
    start: usize,
    end: usize,
    pos: usize,
}

impl ChunkedStream {
    pub fn new(source: Box<dyn ChunkSource>) -> ChunkedStream {
        ChunkedStream::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }
    pub fn with_chunk_size(source: Box<dyn ChunkSource>, chunk_size: usize) -> ChunkedStream {
        let total = source.total_length();
        ChunkedStream {
            inner: Rc::new(RefCell::new(ChunkedInner {
                manager: ChunkManager::new(total, chunk_size),
                source,
            })),
            start: 0,
            end: total,
            pos: 0,
        }
    }
    pub fn is_data_loaded(&self) -> bool {
        self.inner.borrow().manager.is_data_loaded()
    }
}

impl BaseStream for ChunkedStream {
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
        let inner = self.inner.borrow();
        if !inner.manager.has_chunk(inner.manager.chunk_of(self.pos)) {
            return Err(PdfError::MissingData { begin: self.pos, end: self.pos + 1 });
        }
        let b = inner.manager.byte_at(self.pos);
        drop(inner);
        self.pos += 1;
        Ok(b)
    }
    fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let begin = self.pos;
        let end = (begin + n).min(self.end);
        let data = self.get_byte_range(begin, end)?;
        self.pos = end;
        Ok(data)
    }
    fn get_byte_range(&self, begin: usize, end: usize) -> Result<Vec<u8>> {
        let begin = begin.max(self.start).min(self.end);
        let end = end.max(begin).min(self.end);
        let inner = self.inner.borrow();
        if !inner.manager.has_range(begin, end) {
            return Err(PdfError::MissingData { begin, end });
        }
        Ok(inner.manager.slice(begin..end).to_vec())
    }
    fn make_sub_stream(&self, start: usize, len: Option<usize>) -> Box<dyn BaseStream> {
        let total = self.inner.borrow().manager.len();
        let start = start.min(total);
        let end = match len {
            Some(len) => (start + len).min(total),
            None => total,
        };
        Box::new(ChunkedStream {
            inner: self.inner.clone(),
            start,
            end: end.max(start),
            pos: start,
        })
    }
    fn missing_ranges(&self, begin: usize, end: usize) -> Vec<Range<usize>> {
        self.inner.borrow().manager.missing_ranges(begin, end)
    }
    fn request_range(&self, begin: usize, end: usize) -> Result<()> {
        let inner = &mut *self.inner.borrow_mut();
        let ChunkedInner { manager, source } = inner;
        if begin >= end {
            return Ok(());
        }
        let end = end.min(manager.len());
        if begin >= end {
            return Ok(());
        }
        for chunk in manager.chunk_of(begin)..=manager.chunk_of(end - 1) {
            if manager.has_chunk(chunk) {
                continue;
            }
            let bounds = manager.chunk_bounds(chunk);
            let data = source.read_chunk(bounds.start, bounds.end)?;
            manager.on_receive_data(chunk, &data)?;
        }
        Ok(())
    }
}

/// In-memory `ChunkSource`, mostly useful for tests and demos: the data is
/// all there, but the stream still only sees what was requested.
pub struct MemorySource {
    data: Vec<u8>,
    reads: usize,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> MemorySource {
        MemorySource { data, reads: 0 }
    }
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ChunkSource for MemorySource {
    fn total_length(&self) -> usize {
        self.data.len()
    }
    fn read_chunk(&mut self, begin: usize, end: usize) -> Result<Vec<u8>> {
        if begin > end || end > self.data.len() {
            return Err(PdfError::Bounds { index: end, len: self.data.len() });
        }
        self.reads += 1;
        Ok(self.data[begin..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_over(data: &[u8], chunk_size: usize) -> ChunkedStream {
        ChunkedStream::with_chunk_size(Box::new(MemorySource::new(data.to_vec())), chunk_size)
    }

    #[test]
    fn unloaded_byte_raises_missing_data() {
        let mut s = stream_over(b"abcdefgh", 4);
        match s.get_byte() {
            Err(PdfError::MissingData { begin: 0, end: 1 }) => {}
            other => panic!("expected MissingData, got {:?}", other),
        }
        s.request_range(0, 1).unwrap();
        assert_eq!(s.get_byte().unwrap(), Some(b'a'));
        // only the first chunk was fetched
        assert_eq!(s.missing_ranges(0, 8), vec![4..8]);
    }

    #[test]
    fn request_range_rounds_to_chunks() {
        let s = stream_over(b"abcdefghij", 4);
        s.request_range(5, 6).unwrap();
        assert!(s.missing_ranges(4, 8).is_empty());
        assert_eq!(s.missing_ranges(0, 10), vec![0..4, 8..10]);
        assert_eq!(s.get_byte_range(4, 8).unwrap(), b"efgh");
    }

    #[test]
    fn missing_ranges_coalesce() {
        let s = stream_over(&[0u8; 20], 4);
        s.request_range(8, 12).unwrap();
        assert_eq!(s.missing_ranges(0, 20), vec![0..8, 12..20]);
    }

    #[test]
    fn sub_streams_share_chunks() {
        let s = stream_over(b"abcdefgh", 4);
        let mut sub = s.make_sub_stream(4, None);
        assert!(sub.get_byte().is_err());
        s.request_range(0, 8).unwrap();
        assert_eq!(sub.get_byte().unwrap(), Some(b'e'));
    }
}
