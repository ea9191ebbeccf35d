//! The cross-reference resolver: entry table, object cache, table and
//! stream parsing with resumable state, recovery by rescanning, and the
//! fetch family.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::crypt::CipherTransformFactory;
use crate::enc;
use crate::error::*;
use crate::parser::{find_subslice, is_delimiter, is_whitespace, Lexer, Parser};
use crate::primitive::{Dict, GenNr, ObjNr, PdfStream, PlainRef, Primitive, MAX_ID};
use crate::stream::BaseStream;

/// Follows an indirect reference to its value.
pub trait Resolve {
    fn resolve_ref(&self, r: PlainRef) -> Result<Primitive>;
}

pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve_ref(&self, _: PlainRef) -> Result<Primitive> {
        Err(PdfError::Reference)
    }
}

impl Resolve for XRef {
    fn resolve_ref(&self, r: PlainRef) -> Result<Primitive> {
        self.fetch(r)
    }
}

///////////////////////////
// Cross-reference table //
///////////////////////////

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot, may be reallocated on update.
    Free { next: ObjNr, gen: GenNr },
    /// In use, at a byte offset into the file.
    Uncompressed { offset: usize, gen: GenNr },
    /// In use, member `index` of the object stream `stream_id`.
    Compressed { stream_id: ObjNr, index: usize },
}

impl XRefEntry {
    pub fn is_free(&self) -> bool {
        matches!(*self, XRefEntry::Free { .. })
    }
    pub fn gen(&self) -> GenNr {
        match *self {
            XRefEntry::Free { gen, .. } | XRefEntry::Uncompressed { gen, .. } => gen,
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Counters filled in by collaborators while they process the document.
#[derive(Default)]
pub struct DocStats {
    stream_types: RefCell<BTreeSet<String>>,
    font_types: RefCell<BTreeSet<String>>,
}

impl DocStats {
    pub fn register_stream_type(&self, t: &str) {
        self.stream_types.borrow_mut().insert(t.into());
    }
    pub fn register_font_type(&self, t: &str) {
        self.font_types.borrow_mut().insert(t.into());
    }
    pub fn stream_types(&self) -> Vec<String> {
        self.stream_types.borrow().iter().cloned().collect()
    }
    pub fn font_types(&self) -> Vec<String> {
        self.font_types.borrow().iter().cloned().collect()
    }
}

/// Checkpoint of a partially read classical table. Saved before every
/// header and entry read, so a `MissingData` retry resumes at exactly the
/// interrupted token.
struct TableState {
    stream_pos: usize,
    parser_buf1: Option<Primitive>,
    parser_buf2: Option<Primitive>,
    first_entry_num: Option<ObjNr>,
    entry_count: Option<usize>,
    entry_num: usize,
    subsection: usize,
}

const MAX_RESOLVE_DEPTH: usize = 64;

pub struct XRef {
    stream: Box<dyn BaseStream>,
    /// Position of the `%PDF-` header; file offsets are relative to it.
    start_offset: usize,

    entries: RefCell<Vec<Option<XRefEntry>>>,
    cache: RefCell<HashMap<PlainRef, Primitive>>,

    trailer: RefCell<Option<Dict>>,
    top_dict: RefCell<Option<Dict>>,
    root: RefCell<Option<Dict>>,
    encrypt: RefCell<Option<Dict>>,
    cipher: RefCell<Option<Rc<dyn CipherTransformFactory>>>,

    start_xref_queue: RefCell<VecDeque<usize>>,
    parsed_offsets: RefCell<HashSet<usize>>,
    table_state: RefCell<Option<TableState>>,

    depth: Cell<usize>,
    stats: DocStats,
}

impl XRef {
    pub fn new(stream: Box<dyn BaseStream>, start_offset: usize) -> XRef {
        XRef {
            stream,
            start_offset,
            entries: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
            trailer: RefCell::new(None),
            top_dict: RefCell::new(None),
            root: RefCell::new(None),
            encrypt: RefCell::new(None),
            cipher: RefCell::new(None),
            start_xref_queue: RefCell::new(VecDeque::new()),
            parsed_offsets: RefCell::new(HashSet::new()),
            table_state: RefCell::new(None),
            depth: Cell::new(0),
            stats: DocStats::default(),
        }
    }

    /// Seeds the queue of cross-reference locations with the `startxref`
    /// value found at the file tail.
    pub fn set_start_xref(&self, offset: usize) {
        self.start_xref_queue.borrow_mut().push_back(offset);
    }

    pub fn stream(&self) -> &dyn BaseStream {
        &*self.stream
    }
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }
    pub fn stats(&self) -> &DocStats {
        &self.stats
    }
    pub fn trailer(&self) -> Option<Dict> {
        self.trailer.borrow().clone()
    }
    /// The root (catalog) dictionary, available after `parse`.
    pub fn catalog_dict(&self) -> Result<Dict> {
        self.root.borrow().clone().ok_or(PdfError::XRefParse)
    }
    pub fn encrypt_dict(&self) -> Option<Dict> {
        self.encrypt.borrow().clone()
    }
    pub fn set_cipher_factory(&self, factory: Rc<dyn CipherTransformFactory>) {
        *self.cipher.borrow_mut() = Some(factory);
    }
    pub fn cipher_factory(&self) -> Option<Rc<dyn CipherTransformFactory>> {
        self.cipher.borrow().clone()
    }

    /// Drops every cached object. Purely a cache: subsequent fetches
    /// re-read the file and observe the same values.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /////////////
    // Parsing //
    /////////////

    /// Processes all queued cross-reference data and establishes `trailer`,
    /// the root dictionary and the `/Encrypt` dictionary.
    ///
    /// In normal mode a structurally broken table surfaces as `XRefParse`,
    /// prompting the caller to retry with `recovery_mode` on. A recovery
    /// run that still finds no usable trailer is `InvalidPdf`.
    /// `MissingData` is re-raised in either mode.
    pub fn parse(&self, recovery_mode: bool) -> Result<()> {
        let trailer_dict = if recovery_mode {
            self.index_objects()?
        } else {
            match self.read_xref(false) {
                Ok(dict) => dict,
                Err(e) if e.is_missing_data() => return Err(e),
                Err(e) => {
                    warn!("cross-reference parse failed: {}", e);
                    return Err(PdfError::XRefParse);
                }
            }
        };
        *self.trailer.borrow_mut() = Some(trailer_dict.clone());

        if let Some(p) = trailer_dict.get("Encrypt") {
            match self.fetch_if_ref(p).and_then(|p| p.into_dictionary()) {
                Ok(d) => *self.encrypt.borrow_mut() = Some(d),
                Err(e) if e.is_missing_data() => return Err(e),
                Err(e) => warn!("unreadable /Encrypt entry: {}", e),
            }
        }

        let root = match trailer_dict.get("Root").map(|p| self.fetch_if_ref(p)) {
            Some(Ok(Primitive::Dictionary(d))) if d.has("Pages") => d,
            Some(Err(e)) if e.is_missing_data() => return Err(e),
            _ => {
                warn!("trailer has no usable /Root entry");
                return Err(if recovery_mode { PdfError::InvalidPdf } else { PdfError::XRefParse });
            }
        };
        *self.root.borrow_mut() = Some(root);
        Ok(())
    }

    fn enqueue(&self, offset: usize) {
        if self.parsed_offsets.borrow().contains(&offset) {
            return;
        }
        let mut queue = self.start_xref_queue.borrow_mut();
        if !queue.contains(&offset) {
            queue.push_back(offset);
        }
    }

    /// Drains the `startxref` queue. The first section parsed for the
    /// document provides the trailer; `Prev`/`XRefStm` keep feeding the
    /// queue, guarded against cycles by the parsed-offsets set.
    fn read_xref(&self, recovery: bool) -> Result<Dict> {
        loop {
            let offset = match self.start_xref_queue.borrow().front().copied() {
                Some(o) => o,
                None => break,
            };
            if self.parsed_offsets.borrow().contains(&offset) {
                self.start_xref_queue.borrow_mut().pop_front();
                continue;
            }
            let dict = match self.read_xref_section(offset) {
                Ok(d) => d,
                Err(e) if e.is_missing_data() => return Err(e),
                Err(e) if recovery => {
                    warn!("skipping unreadable cross-reference section at {}: {}", offset, e);
                    *self.table_state.borrow_mut() = None;
                    self.parsed_offsets.borrow_mut().insert(offset);
                    self.start_xref_queue.borrow_mut().pop_front();
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.parsed_offsets.borrow_mut().insert(offset);
            self.start_xref_queue.borrow_mut().pop_front();

            // hybrid file: the stream table fills the gaps of this one
            if let Some(p) = dict.get("XRefStm") {
                match p.as_usize() {
                    Ok(n) => self.enqueue(n),
                    Err(_) => warn!("unusable /XRefStm entry {}", p),
                }
            }
            match dict.get("Prev") {
                None => {}
                Some(&Primitive::Integer(n)) if n >= 0 => self.enqueue(n as usize),
                Some(&Primitive::Reference(r)) => {
                    // not allowed by the structure rules, but some writers
                    // emit it; the parsed-offsets set still bounds the loop
                    match self.fetch(r).and_then(|p| p.as_usize()) {
                        Ok(n) => self.enqueue(n),
                        Err(e) if e.is_missing_data() => return Err(e),
                        Err(e) => warn!("unusable /Prev reference: {}", e),
                    }
                }
                Some(p) => warn!("unusable /Prev entry {}", p),
            }

            let mut top = self.top_dict.borrow_mut();
            if top.is_none() {
                *top = Some(dict);
            }
        }
        self.top_dict.borrow().clone().ok_or(PdfError::XRefParse)
    }

    fn read_xref_section(&self, offset: usize) -> Result<Dict> {
        let pos = self.start_offset + offset;
        if pos >= self.stream.end() {
            bail!("cross-reference offset {} is outside the file", offset);
        }
        let sub = self.stream.make_sub_stream(pos, None);
        let mut parser = Parser::new(Lexer::new(sub), self)?;

        // mid-table retry after MissingData
        if self.table_state.borrow().is_some() {
            return self.process_xref_table(&mut parser);
        }

        let tok = parser.get_obj()?;
        if tok.is_cmd("xref") {
            self.process_xref_table(&mut parser)
        } else if tok.is_integer() {
            // `N G obj` introducing a cross-reference stream
            let _gen = t!(parser.get_obj()).as_integer()?;
            let kw = parser.get_obj()?;
            if !kw.is_cmd("obj") {
                err!(PdfError::UnexpectedLexeme {
                    pos,
                    lexeme: kw.to_string(),
                    expected: "obj"
                });
            }
            let stream = t!(parser.get_obj()).into_stream()?;
            self.process_xref_stream(&stream)
        } else {
            bail!("invalid cross-reference data at offset {}", offset)
        }
    }

    /// Classical table. Reads `FIRST COUNT` subsections of
    /// `OFFSET GEN (n|f)` lines until `trailer`; earlier tables win over
    /// older ones, so entries are only written into unset slots.
    fn process_xref_table(&self, parser: &mut Parser) -> Result<Dict> {
        let mut state = match self.table_state.borrow_mut().take() {
            Some(st) => {
                parser.restore(st.stream_pos, st.parser_buf1.clone(), st.parser_buf2.clone());
                st
            }
            None => {
                let (pos, b1, b2) = parser.checkpoint();
                TableState {
                    stream_pos: pos,
                    parser_buf1: b1,
                    parser_buf2: b2,
                    first_entry_num: None,
                    entry_count: None,
                    entry_num: 0,
                    subsection: 0,
                }
            }
        };
        match self.read_table_entries(parser, &mut state) {
            Ok(trailer) => Ok(trailer),
            Err(e) => {
                if e.is_missing_data() {
                    *self.table_state.borrow_mut() = Some(state);
                }
                Err(e)
            }
        }
    }

    fn read_table_entries(&self, parser: &mut Parser, state: &mut TableState) -> Result<Dict> {
        loop {
            if state.first_entry_num.is_none() {
                Self::save_checkpoint(parser, state);
                let obj = t!(parser.get_obj());
                if obj.is_cmd("trailer") {
                    break;
                }
                let first = obj.as_integer()?;
                if first < 0 {
                    bail!("negative object number in cross-reference subsection");
                }
                let count = t!(parser.get_obj()).as_usize()?;
                state.first_entry_num = Some(first as ObjNr);
                state.entry_count = Some(count);
                state.entry_num = 0;
            }
            let count = state.entry_count.unwrap();
            while state.entry_num < count {
                Self::save_checkpoint(parser, state);
                let w1 = t!(parser.get_obj());
                if w1.is_cmd("trailer") {
                    bail!(
                        "cross-reference subsection declares {} entries, but only {} follow",
                        count,
                        state.entry_num
                    );
                }
                let offset = w1.as_usize()?;
                let gen = t!(parser.get_obj()).as_integer()?;
                let kind = t!(parser.get_obj());
                let n = state.entry_num;
                state.entry_num += 1;

                // repair: a first subsection starting at 1 with a free first
                // entry is missing object 0, renumber the whole subsection
                if state.subsection == 0
                    && n == 0
                    && state.first_entry_num == Some(1)
                    && gen == 65535
                    && kind.is_cmd("f")
                {
                    state.first_entry_num = Some(0);
                }
                let first = state.first_entry_num.unwrap();

                if !(0..=GenNr::MAX as i64).contains(&gen) {
                    bail!("generation {} out of range", gen);
                }
                let gen = gen as GenNr;
                let entry = if kind.is_cmd("f") {
                    XRefEntry::Free { next: offset as ObjNr, gen }
                } else if kind.is_cmd("n") {
                    XRefEntry::Uncompressed { offset, gen }
                } else {
                    err!(PdfError::UnexpectedLexeme {
                        pos: state.stream_pos,
                        lexeme: kind.to_string(),
                        expected: "n or f"
                    });
                };
                self.set_entry_if_unset(first + n as ObjNr, entry);
            }
            state.first_entry_num = None;
            state.entry_count = None;
            state.subsection += 1;
        }
        let trailer = t!(parser.get_obj()).into_dictionary()?;

        // structural sanity: the first object must be free
        if let Some(entry) = self.entries.borrow().first().copied().flatten() {
            if !entry.is_free() {
                bail!("invalid cross-reference table: entry 0 is not free");
            }
        }
        Ok(trailer)
    }

    fn save_checkpoint(parser: &Parser, state: &mut TableState) {
        let (pos, b1, b2) = parser.checkpoint();
        state.stream_pos = pos;
        state.parser_buf1 = b1;
        state.parser_buf2 = b2;
    }

    /// Stream table. `W` gives the three field widths, `Index` the
    /// `[first n]` subsection pairs. The body is materialized and decoded
    /// up front, so a `MissingData` retry simply re-reads it; entry writes
    /// are first-writer-wins and therefore idempotent.
    fn process_xref_stream(&self, stream: &PdfStream) -> Result<Dict> {
        let dict = stream.dict.clone();
        let size = t!(self.dict_get(&dict, "Size")).as_usize()?;

        let w = t!(self.dict_get(&dict, "W"));
        let w = w.as_array()?;
        if w.len() < 3 {
            bail!("/W must have three elements, found {}", w.len());
        }
        let mut widths = [0usize; 3];
        for (i, p) in w.iter().take(3).enumerate() {
            widths[i] = t!(self.fetch_if_ref(p)).as_usize()?;
        }

        let index = match dict.get("Index") {
            None => vec![(0 as ObjNr, size)],
            Some(p) => {
                let arr = t!(self.fetch_if_ref(p)).into_array()?;
                if arr.len() % 2 != 0 {
                    bail!("/Index must hold pairs, found {} elements", arr.len());
                }
                let mut pairs = Vec::with_capacity(arr.len() / 2);
                for pair in arr.chunks_exact(2) {
                    pairs.push((pair[0].as_usize()? as ObjNr, pair[1].as_usize()?));
                }
                pairs
            }
        };

        // cross-reference streams are never encrypted
        let data = self.stream_data(stream, true)?;
        let mut slice = &data[..];
        for (first, n) in index {
            for i in 0..n {
                // a zero-width type field defaults to "in use"
                let typ = if widths[0] == 0 { 1 } else { read_be(&mut slice, widths[0])? };
                let f1 = read_be(&mut slice, widths[1])?;
                let f2 = read_be(&mut slice, widths[2])?;
                if f2 > GenNr::MAX as u64 && typ != 2 {
                    bail!("generation {} out of range", f2);
                }
                let entry = match typ {
                    0 => XRefEntry::Free { next: f1, gen: f2 as GenNr },
                    1 => XRefEntry::Uncompressed { offset: f1 as usize, gen: f2 as GenNr },
                    2 => XRefEntry::Compressed { stream_id: f1, index: f2 as usize },
                    t => return Err(PdfError::XRefStreamType { found: t }),
                };
                self.set_entry_if_unset(first + i as ObjNr, entry);
            }
        }
        Ok(dict)
    }

    fn set_entry_if_unset(&self, id: ObjNr, entry: XRefEntry) {
        if id > MAX_ID {
            warn!("ignoring out-of-range object number {}", id);
            return;
        }
        let mut entries = self.entries.borrow_mut();
        let idx = id as usize;
        if entries.len() <= idx {
            entries.resize(idx + 1, None);
        }
        if entries[idx].is_none() {
            entries[idx] = Some(entry);
        }
    }

    //////////////
    // Recovery //
    //////////////

    /// Rebuilds the entry table by scanning the whole byte stream for
    /// `N G obj` headers, `trailer` keywords and `/XRef` tags, then picks
    /// the best recovered trailer.
    fn index_objects(&self) -> Result<Dict> {
        info!("indexing all PDF objects");
        let begin = self.stream.start();
        let buf = self.stream.get_byte_range(begin, self.stream.end())?;

        self.entries.borrow_mut().clear();
        self.cache.borrow_mut().clear();
        *self.table_state.borrow_mut() = None;
        *self.top_dict.borrow_mut() = None;
        self.start_xref_queue.borrow_mut().clear();
        self.parsed_offsets.borrow_mut().clear();

        let mut trailer_positions: Vec<usize> = Vec::new();
        let mut xref_stms: Vec<usize> = Vec::new();

        let mut i = 0usize;
        while i < buf.len() {
            let b = buf[i];
            if is_whitespace(b) {
                i += 1;
                continue;
            }
            if b == b'%' {
                while i < buf.len() && buf[i] != b'\n' && buf[i] != b'\r' {
                    i += 1;
                }
                continue;
            }
            let word_start = i;
            while i < buf.len() && !is_whitespace(buf[i]) && !is_delimiter(buf[i]) {
                i += 1;
            }
            if i == word_start {
                // lone delimiter
                i += 1;
                continue;
            }
            let word = &buf[word_start..i];
            if word == b"trailer" {
                trailer_positions.push(i);
                continue;
            }
            if word.iter().all(u8::is_ascii_digit) {
                if let Some(m) = OBJ_HEADER.captures(&buf[word_start..]) {
                    let id: ObjNr = match parse_digits(&m[1]) {
                        Some(n) => n,
                        None => continue,
                    };
                    let gen: u64 = match parse_digits(&m[2]) {
                        Some(n) => n,
                        None => continue,
                    };
                    let body_start = word_start + m.get(0).unwrap().end();
                    let (consumed, content_len) = object_body_len(&buf[body_start..]);

                    let abs = begin + word_start;
                    if abs >= self.start_offset && gen <= GenNr::MAX as u64 {
                        self.set_entry_recovery(
                            id,
                            XRefEntry::Uncompressed {
                                offset: abs - self.start_offset,
                                gen: gen as GenNr,
                            },
                        );
                        if XREF_TAG.is_match(&buf[body_start..body_start + content_len]) {
                            xref_stms.push(abs - self.start_offset);
                        }
                    }
                    i = body_start + consumed;
                    continue;
                }
            }
        }

        // replay recovered cross-reference streams; their entries fill in
        // the object-stream members the linear scan cannot see
        for off in xref_stms {
            self.enqueue(off);
        }
        let stream_trailer = match self.read_xref(true) {
            Ok(d) => Some(d),
            Err(e) if e.is_missing_data() => return Err(e),
            Err(_) => None,
        };

        // first valid trailer carrying /ID wins, else the last valid one
        let mut last_valid: Option<Dict> = None;
        for pos in trailer_positions {
            let sub = self.stream.make_sub_stream(begin + pos, None);
            let mut parser = match Parser::with_options(Lexer::new(sub), self, None, false, true) {
                Ok(p) => p,
                Err(e) if e.is_missing_data() => return Err(e),
                Err(_) => continue,
            };
            let dict = match parser.get_obj() {
                Ok(Primitive::Dictionary(d)) => d,
                Ok(_) => continue,
                Err(e) if e.is_missing_data() => return Err(e),
                Err(_) => continue,
            };
            if !self.validate_root(&dict)? {
                continue;
            }
            if dict.has("ID") {
                return Ok(dict);
            }
            last_valid = Some(dict);
        }
        if let Some(dict) = last_valid {
            return Ok(dict);
        }
        // a stream-only file keeps its trailer on the xref stream itself
        if let Some(dict) = stream_trailer {
            if self.validate_root(&dict)? {
                return Ok(dict);
            }
        }
        Err(PdfError::InvalidPdf)
    }

    fn validate_root(&self, trailer: &Dict) -> Result<bool> {
        match trailer.get("Root").map(|p| self.fetch_if_ref(p)) {
            Some(Ok(Primitive::Dictionary(root))) => Ok(root.has("Pages")),
            Some(Err(e)) if e.is_missing_data() => Err(e),
            _ => Ok(false),
        }
    }

    fn set_entry_recovery(&self, id: ObjNr, entry: XRefEntry) {
        if id > MAX_ID {
            warn!("ignoring out-of-range object number {}", id);
            return;
        }
        let mut entries = self.entries.borrow_mut();
        let idx = id as usize;
        if entries.len() <= idx {
            entries.resize(idx + 1, None);
        }
        // in document order a later object of the same or newer generation
        // supersedes the earlier one
        match entries[idx] {
            Some(old) if entry.gen() < old.gen() => {}
            _ => entries[idx] = Some(entry),
        }
    }

    ///////////
    // Fetch //
    ///////////

    /// Returns the entry for `num` when it is allocated, uncompressed and
    /// has a nonzero offset.
    pub fn get_entry(&self, num: ObjNr) -> Option<XRefEntry> {
        match self.entries.borrow().get(num as usize).copied().flatten() {
            Some(e @ XRefEntry::Uncompressed { offset, .. }) if offset != 0 => Some(e),
            _ => None,
        }
    }

    fn raw_entry(&self, num: ObjNr) -> Option<XRefEntry> {
        self.entries.borrow().get(num as usize).copied().flatten()
    }

    pub fn fetch(&self, r: PlainRef) -> Result<Primitive> {
        self.fetch_with(r, false)
    }

    /// Fetches an indirect object, decrypting unless suppressed. A free or
    /// absent entry resolves to `Null`. Deterministic within a session:
    /// the first completed fetch fixes the value all later fetches see.
    pub fn fetch_with(&self, r: PlainRef, suppress_encryption: bool) -> Result<Primitive> {
        if let Some(p) = self.cache.borrow().get(&r).cloned() {
            if let Primitive::Dictionary(ref d) = p {
                if d.obj_id().is_none() {
                    d.set_obj_id(r.to_obj_id());
                }
            }
            return Ok(p);
        }
        let depth = self.depth.get();
        if depth >= MAX_RESOLVE_DEPTH {
            return Err(PdfError::MaxDepth);
        }
        self.depth.set(depth + 1);
        let result = self.fetch_uncached(r, suppress_encryption);
        self.depth.set(depth);
        result
    }

    fn fetch_uncached(&self, r: PlainRef, suppress_encryption: bool) -> Result<Primitive> {
        match self.raw_entry(r.id) {
            None | Some(XRefEntry::Free { .. }) => {
                self.cache.borrow_mut().insert(r, Primitive::Null);
                Ok(Primitive::Null)
            }
            Some(XRefEntry::Uncompressed { offset, gen }) => {
                self.fetch_uncompressed(r, offset, gen, suppress_encryption)
            }
            Some(XRefEntry::Compressed { stream_id, index }) => {
                self.fetch_compressed(r, stream_id, index)
            }
        }
    }

    fn fetch_uncompressed(
        &self,
        r: PlainRef,
        offset: usize,
        gen: GenNr,
        suppress_encryption: bool,
    ) -> Result<Primitive> {
        if gen != r.gen {
            return Err(PdfError::XRefEntry { obj_nr: r.id });
        }
        let sub = self.stream.make_sub_stream(self.start_offset + offset, None);
        let transform = match (self.cipher.borrow().as_ref(), suppress_encryption) {
            (Some(factory), false) => Some(factory.create_transform(r)),
            _ => None,
        };
        let mut parser =
            Parser::with_options(Lexer::new(sub), self, transform.as_deref(), true, false)?;

        let obj1 = parser.get_obj()?;
        let obj2 = parser.get_obj()?;
        let obj3 = parser.get_obj()?;
        let num_ok = matches!(obj1, Primitive::Integer(n) if n >= 0 && n as ObjNr == r.id);
        let gen_ok = matches!(obj2, Primitive::Integer(g) if g >= 0 && g as u64 == r.gen as u64);
        let kw_ok = match obj3 {
            ref p if p.is_cmd("obj") => true,
            // some writers glue the keyword and a number together
            Primitive::Cmd(ref s) if s.starts_with("obj") => {
                let glued = s[3..].parse::<ObjNr>().is_ok();
                if glued {
                    warn!("tolerating glued keyword '{}' for object {}", s, r.id);
                }
                glued
            }
            _ => false,
        };
        if !num_ok || !gen_ok || !kw_ok {
            return Err(PdfError::XRefEntry { obj_nr: r.id });
        }

        let mut obj = t!(parser.get_obj(), r);
        match obj {
            Primitive::Stream(ref mut s) => {
                s.id = Some(r);
                s.dict.set_obj_id(r.to_obj_id());
                // streams wrap file byte ranges and are not cached
            }
            ref p => {
                if let Primitive::Dictionary(ref d) = *p {
                    d.set_obj_id(r.to_obj_id());
                }
                self.cache.borrow_mut().insert(r, p.clone());
            }
        }
        Ok(obj)
    }

    /// The entry names a member of an object stream: fetch the container,
    /// read its `N` `(number, offset)` header pairs, parse the members and
    /// cache those the entry table still points at.
    fn fetch_compressed(&self, r: PlainRef, stream_id: ObjNr, index: usize) -> Result<Primitive> {
        let container = t!(self.fetch(PlainRef { id: stream_id, gen: 0 }), r);
        let stream = match container {
            Primitive::Stream(s) => s,
            _ => return Err(PdfError::XRefEntry { obj_nr: r.id }),
        };
        let n = t!(self.dict_get(&stream.dict, "N")).as_usize()?;
        let first = t!(self.dict_get(&stream.dict, "First")).as_usize()?;
        let data = crate::stream::MemStream::new(self.stream_data(&stream, false)?);

        let mut parser = Parser::with_options(
            Lexer::new(data.make_sub_stream(0, None)),
            self,
            None,
            false,
            false,
        )?;
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let id = t!(parser.get_obj()).as_usize()? as ObjNr;
            let _offset = t!(parser.get_obj()).as_usize()?;
            ids.push(id);
        }

        // members are parsed sequentially from /First on
        let mut parser = Parser::with_options(
            Lexer::new(data.make_sub_stream(first, None)),
            self,
            None,
            false,
            false,
        )?;
        let mut members = Vec::with_capacity(n);
        for _ in 0..n {
            let mut obj = t!(parser.get_obj());
            // a stray endobj between members is tolerated
            if obj.is_cmd("endobj") {
                obj = t!(parser.get_obj());
            }
            if let Primitive::Cmd(ref c) = obj {
                bail!("unexpected token '{}' in object stream {}", c, stream_id);
            }
            members.push(obj);
        }

        // the entry table wins: only members it still points at are cached
        {
            let entries = self.entries.borrow();
            for (i, (&id, member)) in ids.iter().zip(&members).enumerate() {
                let points_back = matches!(
                    entries.get(id as usize).copied().flatten(),
                    Some(XRefEntry::Compressed { stream_id: s, index }) if s == stream_id && index == i
                );
                if points_back {
                    if let Primitive::Dictionary(ref d) = *member {
                        d.set_obj_id(PlainRef { id, gen: 0 }.to_obj_id());
                    }
                    self.cache
                        .borrow_mut()
                        .insert(PlainRef { id, gen: 0 }, member.clone());
                }
            }
        }
        members
            .into_iter()
            .nth(index)
            .ok_or(PdfError::ObjStmOutOfBounds { index, max: n })
    }

    /// Identity on non-references.
    pub fn fetch_if_ref(&self, p: &Primitive) -> Result<Primitive> {
        match *p {
            Primitive::Reference(r) => self.fetch(r),
            ref p => Ok(p.clone()),
        }
    }

    /// Resolved dictionary access; an absent key reads as `Null`.
    pub fn dict_get(&self, dict: &Dict, key: &str) -> Result<Primitive> {
        match dict.get(key) {
            None => Ok(Primitive::Null),
            Some(p) => self.fetch_if_ref(p),
        }
    }

    /// The suspending variant of `fetch`: requests every missing range from
    /// the underlying chunked source and retries until the object is
    /// resolvable. Never surfaces `MissingData`.
    pub fn fetch_blocking(&self, r: PlainRef) -> Result<Primitive> {
        let mut last_range = None;
        loop {
            match self.fetch(r) {
                Err(e) => match e.missing_range() {
                    Some((begin, end)) => {
                        if last_range == Some((begin, end)) {
                            // the source did not deliver; surface the error
                            // instead of spinning
                            return Err(e);
                        }
                        last_range = Some((begin, end));
                        self.stream.request_range(begin, end)?;
                    }
                    None => return Err(e),
                },
                ok => return ok,
            }
        }
    }

    pub fn fetch_if_ref_blocking(&self, p: &Primitive) -> Result<Primitive> {
        match *p {
            Primitive::Reference(r) => self.fetch_blocking(r),
            ref p => Ok(p.clone()),
        }
    }

    /// Raw body of a stream object, decrypted (unless suppressed) and run
    /// through its declared filters.
    pub fn stream_data(&self, stream: &PdfStream, suppress_encryption: bool) -> Result<Vec<u8>> {
        let raw = self
            .stream
            .get_byte_range(stream.file_range.start, stream.file_range.end)?;
        let raw = match (self.cipher.borrow().as_ref(), suppress_encryption, stream.id) {
            (Some(factory), false, Some(id)) => factory.create_transform(id).decrypt_stream(raw),
            _ => raw,
        };
        let filters = enc::filters_of(&stream.dict, self)?;
        enc::decode_all(raw, &filters)
    }
}

/// Big-endian field of `width` bytes, consuming from the slice.
fn read_be(data: &mut &[u8], width: usize) -> Result<u64> {
    if data.len() < width {
        bail!("cross-reference stream is {} bytes short", width - data.len());
    }
    let mut result = 0u64;
    for &b in &data[..width] {
        result = result << 8 | b as u64;
    }
    *data = &data[width..];
    Ok(result)
}

static OBJ_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^(\d+)[ \t\r\n]+(\d+)[ \t\r\n]+obj\b").unwrap());
static NEXT_OBJ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)\b\d+[ \t\r\n]+\d+[ \t\r\n]+obj\b").unwrap());
static ENDOBJ_KW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\bendobj\b").unwrap());
static STREAM_KW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\bstream\b").unwrap());
static XREF_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/XRef([^A-Za-z]|$)").unwrap());

fn parse_digits(b: &[u8]) -> Option<u64> {
    std::str::from_utf8(b).ok()?.parse().ok()
}

/// Bounds an object body during the recovery scan. Returns
/// `(bytes consumed, content length)`: the body ends at its `endobj`, at
/// the next `N G obj` header when `endobj` is missing, or at the end of
/// the buffer. Stream bodies are skipped wholesale so binary content
/// cannot fake either keyword.
fn object_body_len(body: &[u8]) -> (usize, usize) {
    let mut from = 0usize;
    loop {
        let rest = &body[from..];
        let endobj = ENDOBJ_KW.find(rest).map(|m| (from + m.start(), from + m.end()));
        let next_obj = NEXT_OBJ.find(rest).map(|m| from + m.start());
        let stream_kw = STREAM_KW.find(rest).map(|m| (from + m.start(), from + m.end()));

        if let Some((s_start, s_end)) = stream_kw {
            let first = endobj
                .map(|(e, _)| e)
                .into_iter()
                .chain(next_obj)
                .min()
                .unwrap_or(usize::MAX);
            if s_start < first {
                // jump over the binary body
                match find_subslice(&body[s_end..], b"endstream") {
                    Some(off) => {
                        from = s_end + off + b"endstream".len();
                        continue;
                    }
                    None => return (body.len(), body.len()),
                }
            }
        }
        return match (endobj, next_obj) {
            (Some((e_start, _)), Some(h)) if h < e_start => (h, h),
            (Some((e_start, e_end)), _) => (e_end, e_start),
            (None, Some(h)) => (h, h),
            (None, None) => (body.len(), body.len()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;
    use crate::testutil::{xref_over, PdfBuilder};

    #[test]
    fn classical_table() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let off1 = b.offset_of(1);
        let off2 = b.offset_of(2);
        let (data, xref_pos) = b.finish("/Root 1 0 R");

        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();

        assert!(matches!(xref.raw_entry(0), Some(XRefEntry::Free { gen: 65535, .. })));
        assert_eq!(xref.raw_entry(1), Some(XRefEntry::Uncompressed { offset: off1, gen: 0 }));
        assert_eq!(xref.raw_entry(2), Some(XRefEntry::Uncompressed { offset: off2, gen: 0 }));

        let root = xref.catalog_dict().unwrap();
        assert_eq!(root.get("Type").unwrap().as_name().unwrap(), "Catalog");
        assert_eq!(xref.trailer().unwrap().get("Size").unwrap().as_integer().unwrap(), 3);
    }

    #[test]
    fn xref_stream_entries() {
        let mut b = PdfBuilder::new();
        let body: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x00, // free
            0x01, 0x00, 0x10, 0x00, // uncompressed at 0x10, gen 0
            0x02, 0x00, 0x05, 0x01, // member 1 of object stream 5
        ];
        let off = b.add_stream_object(
            3,
            "/Type /XRef /W [1 2 1] /Index [0 3] /Size 3",
            &body,
        );
        let (data, _) = b.finish("");

        let xref = xref_over(data, off);
        // no /Root on the stream dict: parse reports that, but the entry
        // table is established first
        assert!(matches!(xref.parse(false), Err(PdfError::XRefParse)));
        assert!(matches!(xref.raw_entry(0), Some(XRefEntry::Free { .. })));
        assert_eq!(xref.raw_entry(1), Some(XRefEntry::Uncompressed { offset: 0x10, gen: 0 }));
        assert_eq!(xref.raw_entry(2), Some(XRefEntry::Compressed { stream_id: 5, index: 1 }));
    }

    #[test]
    fn type_field_width_zero_defaults_to_in_use() {
        let mut b = PdfBuilder::new();
        let body: Vec<u8> = vec![0x00, 0x40, 0x00, 0x00, 0x50, 0x00];
        let off = b.add_stream_object(3, "/Type /XRef /W [0 2 1] /Index [4 2] /Size 6", &body);
        let (data, _) = b.finish("");

        let xref = xref_over(data, off);
        assert!(xref.parse(false).is_err());
        assert_eq!(xref.raw_entry(4), Some(XRefEntry::Uncompressed { offset: 0x40, gen: 0 }));
        assert_eq!(xref.raw_entry(5), Some(XRefEntry::Uncompressed { offset: 0x50, gen: 0 }));
    }

    #[test]
    fn unknown_stream_entry_type_is_fatal() {
        let mut b = PdfBuilder::new();
        let body: Vec<u8> = vec![0x07, 0x00, 0x00, 0x00];
        let off = b.add_stream_object(3, "/Type /XRef /W [1 2 1] /Index [0 1] /Size 1", &body);
        let (data, _) = b.finish("");

        let xref = xref_over(data, off);
        assert!(matches!(xref.parse(false), Err(PdfError::XRefParse)));
    }

    #[test]
    fn newer_table_wins_over_prev_chain() {
        // v1 of object 3, then an update appending v2 and a newer table
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        b.add_object(3, "(old value)");
        let off_old = b.offset_of(3);
        let off1 = b.offset_of(1);
        let off2 = b.offset_of(2);
        let (mut data, old_table) = b.finish("/Root 1 0 R");

        let off_new = data.len();
        data.extend_from_slice(b"3 0 obj\n(new value)\nendobj\n");
        let new_table = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 1\n0000000000 65535 f \n3 1\n{:010} 00000 n \ntrailer\n<< /Size 4 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                off_new, old_table, new_table
            )
            .as_bytes(),
        );

        let xref = xref_over(data, new_table);
        xref.parse(false).unwrap();

        // the newest table saw object 3 first
        assert_eq!(xref.raw_entry(3), Some(XRefEntry::Uncompressed { offset: off_new, gen: 0 }));
        assert_eq!(xref.raw_entry(1), Some(XRefEntry::Uncompressed { offset: off1, gen: 0 }));
        assert_eq!(xref.raw_entry(2), Some(XRefEntry::Uncompressed { offset: off2, gen: 0 }));
        let v = xref.fetch(PlainRef { id: 3, gen: 0 }).unwrap();
        assert_eq!(v.as_string().unwrap().as_bytes(), b"new value");
    }

    #[test]
    fn prev_cycle_terminates() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let (mut data, table_a) = b.finish("/Root 1 0 R /Prev 999999");
        // second table pointing back at the first
        let table_b = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 3 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                table_a, table_b
            )
            .as_bytes(),
        );
        // patch the first trailer to point at the second: a -> b -> a
        let patched = String::from_utf8(data).unwrap().replace("/Prev 999999", &format!("/Prev {:6}", table_b));
        let xref = xref_over(patched.into_bytes(), table_a);
        xref.parse(false).unwrap();
        assert!(xref.catalog_dict().is_ok());
    }

    #[test]
    fn entry_zero_renumber_repair() {
        // table claims to start at object 1 but begins with the free entry
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let off1 = b.offset_of(1);
        let off2 = b.offset_of(2);
        let (mut data, _) = b.finish("/Root 1 0 R");
        let table = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                off1, off2, table
            )
            .as_bytes(),
        );
        let xref = xref_over(data, table);
        xref.parse(false).unwrap();
        assert!(matches!(xref.raw_entry(0), Some(XRefEntry::Free { gen: 65535, .. })));
        assert_eq!(xref.raw_entry(1), Some(XRefEntry::Uncompressed { offset: off1, gen: 0 }));
        assert_eq!(xref.raw_entry(2), Some(XRefEntry::Uncompressed { offset: off2, gen: 0 }));
    }

    #[test]
    fn generation_mismatch_is_a_bad_entry() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();
        match xref.fetch(PlainRef { id: 1, gen: 7 }) {
            Err(PdfError::XRefEntry { obj_nr: 1 }) => {}
            other => panic!("expected XRefEntry error, got {:?}", other),
        }
    }

    #[test]
    fn free_entry_fetches_as_null() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();
        assert!(xref.fetch(PlainRef { id: 0, gen: 65535 }).unwrap().is_null());
        // absent slots too
        assert!(xref.fetch(PlainRef { id: 50, gen: 0 }).unwrap().is_null());
    }

    #[test]
    fn fetch_is_deterministic_and_stamps_obj_id() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();

        let a = xref.fetch(PlainRef { id: 2, gen: 0 }).unwrap();
        let b = xref.fetch(PlainRef { id: 2, gen: 0 }).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_dict().unwrap().obj_id(), Some("2R"));
    }

    #[test]
    fn glued_obj_keyword_is_tolerated() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let offset = b.out.len();
        b.offsets.push((3, offset));
        b.out.extend_from_slice(b"3 0 obj42\n(value)\nendobj\n");
        let (data, xref_pos) = b.finish("/Root 1 0 R");

        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();
        let v = xref.fetch(PlainRef { id: 3, gen: 0 }).unwrap();
        assert_eq!(v.as_string().unwrap().as_bytes(), b"value");
    }

    #[test]
    fn object_stream_members() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();

        let first_member = "<< /A 1 >>";
        let second_member = "(two)";
        let header = format!("5 0 6 {} ", first_member.len() + 1);
        let mut body = Vec::new();
        body.extend_from_slice(header.as_bytes());
        body.extend_from_slice(first_member.as_bytes());
        body.push(b' ');
        // a stray endobj between members must be skipped
        body.extend_from_slice(b"endobj ");
        body.extend_from_slice(second_member.as_bytes());
        b.add_stream_object(4, &format!("/Type /ObjStm /N 2 /First {}", header.len()), &body);

        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();
        xref.set_entry_if_unset(5, XRefEntry::Compressed { stream_id: 4, index: 0 });
        xref.set_entry_if_unset(6, XRefEntry::Compressed { stream_id: 4, index: 1 });

        let five = xref.fetch(PlainRef { id: 5, gen: 0 }).unwrap();
        assert_eq!(five.as_dict().unwrap().get("A").unwrap().as_integer().unwrap(), 1);
        let six = xref.fetch(PlainRef { id: 6, gen: 0 }).unwrap();
        assert_eq!(six.as_string().unwrap().as_bytes(), b"two");
    }

    #[test]
    fn recovery_scan_rebuilds_entries() {
        // object 1 is missing its endobj; the scan truncates it at the
        // next header
        let data = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\ntrailer\n<< /Size 3 /Root 1 0 R >>\n".to_vec();
        let xref = XRef::new(Box::new(MemStream::new(data)), 0);
        xref.parse(true).unwrap();

        assert!(matches!(xref.raw_entry(1), Some(XRefEntry::Uncompressed { .. })));
        assert!(matches!(xref.raw_entry(2), Some(XRefEntry::Uncompressed { .. })));
        let root = xref.catalog_dict().unwrap();
        assert_eq!(root.get("Type").unwrap().as_name().unwrap(), "Catalog");
    }

    #[test]
    fn recovery_prefers_trailer_with_id() {
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.7\n");
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        data.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R /ID [(a)(b)] >>\n");
        data.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        let xref = XRef::new(Box::new(MemStream::new(data)), 0);
        xref.parse(true).unwrap();
        assert!(xref.trailer().unwrap().has("ID"));
    }

    #[test]
    fn recovery_skips_binary_stream_bodies() {
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.7\n");
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        // binary body containing a fake endobj and a fake header
        data.extend_from_slice(b"3 0 obj\n<< /Length 28 >>\nstream\nendobj 9 0 obj bogus content\nendstream\nendobj\n");
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        data.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
        let xref = XRef::new(Box::new(MemStream::new(data)), 0);
        xref.parse(true).unwrap();
        assert!(xref.raw_entry(9).is_none());
        assert!(matches!(xref.raw_entry(3), Some(XRefEntry::Uncompressed { .. })));
        assert!(matches!(xref.raw_entry(2), Some(XRefEntry::Uncompressed { .. })));
    }

    #[test]
    fn object_body_bounds() {
        let (consumed, content) = object_body_len(b"<< /A 1 >>\nendobj\nrest");
        assert_eq!(&b"<< /A 1 >>\nendobj\nrest"[..content], b"<< /A 1 >>\n");
        assert_eq!(&b"<< /A 1 >>\nendobj\nrest"[consumed..], b"\nrest");

        let body = b"<<>>\n2 0 obj <<>>\nendobj\n";
        let (consumed, content) = object_body_len(body);
        assert_eq!(consumed, content);
        assert_eq!(&body[..content], b"<<>>\n");
    }

    #[test]
    fn read_be_fields() {
        let mut data: &[u8] = &[0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_be(&mut data, 2).unwrap(), 0x0102);
        assert_eq!(read_be(&mut data, 1).unwrap(), 0x03);
        assert!(read_be(&mut data, 2).is_err());
    }

    struct ShiftCipher;
    impl crate::crypt::CipherTransform for ShiftCipher {
        fn decrypt_string(&self, data: Vec<u8>) -> Vec<u8> {
            data.iter().map(|b| b.wrapping_sub(1)).collect()
        }
        fn decrypt_stream(&self, data: Vec<u8>) -> Vec<u8> {
            data.iter().map(|b| b.wrapping_sub(1)).collect()
        }
    }
    impl crate::crypt::CipherTransformFactory for ShiftCipher {
        fn create_transform(&self, _id: PlainRef) -> Box<dyn crate::crypt::CipherTransform> {
            Box::new(ShiftCipher)
        }
    }

    #[test]
    fn fetch_decrypts_strings_and_streams() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        // "secret" and "hello", shifted up by one
        b.add_object(3, "(tfdsfu)");
        b.add_stream_object(4, "", b"ifmmp");
        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.parse(false).unwrap();
        xref.set_cipher_factory(Rc::new(ShiftCipher));

        let s = xref.fetch(PlainRef { id: 3, gen: 0 }).unwrap();
        assert_eq!(s.as_string().unwrap().as_bytes(), b"secret");

        // suppression reads the raw bytes
        xref.clear_cache();
        let raw = xref.fetch_with(PlainRef { id: 3, gen: 0 }, true).unwrap();
        assert_eq!(raw.as_string().unwrap().as_bytes(), b"tfdsfu");

        let stream = xref.fetch(PlainRef { id: 4, gen: 0 }).unwrap();
        let body = xref.stream_data(stream.as_stream().unwrap(), false).unwrap();
        assert_eq!(body, b"hello");
        let body = xref.stream_data(stream.as_stream().unwrap(), true).unwrap();
        assert_eq!(body, b"ifmmp");
    }

    #[test]
    fn stats_accumulate_without_duplicates() {
        let mut b = PdfBuilder::new();
        b.add_catalog_pair();
        let (data, xref_pos) = b.finish("/Root 1 0 R");
        let xref = xref_over(data, xref_pos);
        xref.stats().register_stream_type("FlateDecode");
        xref.stats().register_stream_type("FlateDecode");
        xref.stats().register_font_type("Type1");
        assert_eq!(xref.stats().stream_types(), ["FlateDecode"]);
        assert_eq!(xref.stats().font_types(), ["Type1"]);
    }
}
