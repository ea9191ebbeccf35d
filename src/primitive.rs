use std::borrow::Borrow;
use std::fmt;
use std::ops::{Deref, Range};
use std::rc::Rc;

use indexmap::IndexMap;
use istring::{IBytes, SmallString};
use itertools::Itertools;
use once_cell::unsync::OnceCell;

use crate::error::*;

pub type ObjNr = u64;
pub type GenNr = u16;

/// Object numbers above this are treated as structurally invalid.
pub const MAX_ID: ObjNr = 1_000_000;

/// An indirect reference: `12 0 R`.
///
/// Plain value with structural equality, so two references to the same
/// object always compare equal in O(1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PlainRef {
    pub id: ObjNr,
    pub gen: GenNr,
}
impl PlainRef {
    /// The textual id stamped onto dictionaries for diagnostics: `12R`, `12R3`.
    pub fn to_obj_id(&self) -> String {
        if self.gen == 0 {
            format!("{}R", self.id)
        } else {
            format!("{}R{}", self.id, self.gen)
        }
    }
}
impl fmt::Display for PlainRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Boolean (bool),
    Integer (i64),
    Number (f64),
    Name (Name),
    String (PdfString),
    Array (Vec<Primitive>),
    Dictionary (Dict),
    Stream (PdfStream),
    Reference (PlainRef),
    /// A bare keyword token (`obj`, `endobj`, `xref`, `n`, `f`, ...).
    /// Never part of a parsed object graph, only of the token layer.
    Cmd (SmallString),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Integer(i) => i.fmt(f),
            Primitive::Number(n) => n.fmt(f),
            Primitive::Boolean(b) => b.fmt(f),
            Primitive::String(ref s) => write!(f, "{:?}", s),
            Primitive::Stream(_) => write!(f, "stream"),
            Primitive::Dictionary(ref d) => d.fmt(f),
            Primitive::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Primitive::Reference(r) => write!(f, "@{}", r.id),
            Primitive::Name(ref s) => s.fmt(f),
            Primitive::Cmd(ref s) => write!(f, "{}", s),
        }
    }
}

macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => (
        Err(PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found
        })
    )
}

impl Primitive {
    /// For debugging / error messages: get the name of the variant
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Primitive::Null => "Null",
            Primitive::Integer (..) => "Integer",
            Primitive::Number (..) => "Number",
            Primitive::Boolean (..) => "Boolean",
            Primitive::String (..) => "String",
            Primitive::Stream (..) => "Stream",
            Primitive::Dictionary (..) => "Dictionary",
            Primitive::Array (..) => "Array",
            Primitive::Reference (..) => "Reference",
            Primitive::Name (..) => "Name",
            Primitive::Cmd (..) => "Cmd",
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(*self, Primitive::Null)
    }
    pub fn is_integer(&self) -> bool {
        matches!(*self, Primitive::Integer(_))
    }
    /// True for the keyword token `name`.
    pub fn is_cmd(&self, name: &str) -> bool {
        matches!(*self, Primitive::Cmd(ref s) if s.as_str() == name)
    }
    pub fn as_integer(&self) -> Result<i64> {
        match *self {
            Primitive::Integer(n) => Ok(n),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_u32(&self) -> Result<u32> {
        match *self {
            Primitive::Integer(n) if n >= 0 && n <= u32::MAX as i64 => Ok(n as u32),
            Primitive::Integer(_) => bail!("integer out of range"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_usize(&self) -> Result<usize> {
        match *self {
            Primitive::Integer(n) if n >= 0 => Ok(n as usize),
            Primitive::Integer(_) => bail!("negative integer"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_number(&self) -> Result<f64> {
        match *self {
            Primitive::Integer(n) => Ok(n as f64),
            Primitive::Number(f) => Ok(f),
            ref p => unexpected_primitive!(Number, p.get_debug_name())
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Primitive::Boolean(b) => Ok(b),
            ref p => unexpected_primitive!(Boolean, p.get_debug_name())
        }
    }
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Primitive::Name(ref name) => Ok(name.as_str()),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Primitive::String(ref data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn as_array(&self) -> Result<&[Primitive]> {
        match self {
            Primitive::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn as_dict(&self) -> Result<&Dict> {
        match self {
            Primitive::Dictionary(ref d) => Ok(d),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            Primitive::Stream(ref s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
    pub fn as_reference(&self) -> Result<PlainRef> {
        match *self {
            Primitive::Reference(r) => Ok(r),
            ref p => unexpected_primitive!(Reference, p.get_debug_name())
        }
    }
    pub fn into_array(self) -> Result<Vec<Primitive>> {
        match self {
            Primitive::Array(v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn into_dictionary(self) -> Result<Dict> {
        match self {
            Primitive::Dictionary(dict) => Ok(dict),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Primitive::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Primitive::String(data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Primitive::Stream(s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
}

impl From<i64> for Primitive {
    fn from(x: i64) -> Primitive {
        Primitive::Integer(x)
    }
}
impl From<f64> for Primitive {
    fn from(x: f64) -> Primitive {
        Primitive::Number(x)
    }
}
impl From<bool> for Primitive {
    fn from(x: bool) -> Primitive {
        Primitive::Boolean(x)
    }
}
impl From<Name> for Primitive {
    fn from(x: Name) -> Primitive {
        Primitive::Name(x)
    }
}
impl From<PdfString> for Primitive {
    fn from(x: PdfString) -> Primitive {
        Primitive::String(x)
    }
}
impl From<Dict> for Primitive {
    fn from(x: Dict) -> Primitive {
        Primitive::Dictionary(x)
    }
}
impl From<Vec<Primitive>> for Primitive {
    fn from(x: Vec<Primitive>) -> Primitive {
        Primitive::Array(x)
    }
}
impl From<PlainRef> for Primitive {
    fn from(x: PlainRef) -> Primitive {
        Primitive::Reference(x)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Ord, PartialOrd)]
pub struct Name(pub SmallString);
impl Name {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Deref for Name {
    type Target = str;
    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}
impl From<String> for Name {
    #[inline]
    fn from(s: String) -> Name {
        Name(s.into())
    }
}
impl<'a> From<&'a str> for Name {
    #[inline]
    fn from(s: &'a str) -> Name {
        Name(s.into())
    }
}
impl PartialEq<str> for Name {
    #[inline]
    fn eq(&self, rhs: &str) -> bool {
        self.as_str() == rhs
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
impl Borrow<str> for Name {
    #[inline]
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// Primitive String type. A byte string, not text.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PdfString {
    pub data: IBytes,
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in self.data.as_slice() {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' ' ..= b'~' => write!(f, "{}", b as char)?,
                o @ 0 ..= 7 => write!(f, "\\{}", o)?,
                x => write!(f, "\\x{:02x}", x)?
            }
        }
        write!(f, "\"")
    }
}
impl PdfString {
    pub fn new(data: IBytes) -> PdfString {
        PdfString { data }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    /// Text rendering of a PDF string: UTF-16BE when the BOM is present,
    /// UTF-8 with replacement otherwise. Without encoding information a
    /// fully correct decoding is not possible.
    pub fn to_string_lossy(&self) -> String {
        if self.data.starts_with(&[0xfe, 0xff]) {
            utf16be_to_string_lossy(&self.data[2..])
        } else {
            String::from_utf8_lossy(&self.data).into()
        }
    }
}
impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl<'a> From<&'a str> for PdfString {
    fn from(value: &'a str) -> Self {
        PdfString { data: value.into() }
    }
}
impl From<Vec<u8>> for PdfString {
    fn from(value: Vec<u8>) -> Self {
        PdfString { data: value.as_slice().into() }
    }
}

pub fn utf16be_to_string_lossy(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks(2)
        .map(|c| if c.len() == 2 { u16::from_be_bytes([c[0], c[1]]) } else { 0xfffd })
        .collect();
    String::from_utf16_lossy(&units)
}

#[derive(Default)]
struct DictInner {
    map: IndexMap<Name, Primitive>,
    // textual id of the containing indirect object, stamped on first fetch
    obj_id: OnceCell<String>,
}

/// Primitive Dictionary type.
///
/// Insertion-ordered and cheaply clonable: clones share the node, so a
/// dictionary fetched twice through the object cache is the same value.
#[derive(Clone, Default)]
pub struct Dict {
    inner: Rc<DictInner>,
}
impl Dict {
    pub fn new() -> Dict {
        Dict::default()
    }
    pub fn len(&self) -> usize {
        self.inner.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Raw access: a `Reference` value is returned as-is.
    /// Resolved access goes through `XRef::dict_get`.
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.inner.map.get(key)
    }
    pub fn has(&self, key: &str) -> bool {
        self.inner.map.contains_key(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Primitive)> {
        self.inner.map.iter()
    }
    /// like `get`, but takes the name of the calling type and returns
    /// `PdfError::MissingEntry` if the entry is not found
    pub fn require(&self, typ: &'static str, key: &str) -> Result<&Primitive> {
        self.get(key).ok_or(
            PdfError::MissingEntry {
                typ,
                field: key.into()
            }
        )
    }
    pub fn obj_id(&self) -> Option<&str> {
        self.inner.obj_id.get().map(|s| s.as_str())
    }
    /// Stamps the containing object id. A second stamp is ignored, the
    /// first writer wins.
    pub fn set_obj_id(&self, id: String) {
        let _ = self.inner.obj_id.set(id);
    }
}
impl From<IndexMap<Name, Primitive>> for Dict {
    fn from(map: IndexMap<Name, Primitive>) -> Dict {
        Dict { inner: Rc::new(DictInner { map, obj_id: OnceCell::new() }) }
    }
}
impl PartialEq for Dict {
    fn eq(&self, rhs: &Dict) -> bool {
        Rc::ptr_eq(&self.inner, &rhs.inner) || self.inner.map == rhs.inner.map
    }
}
impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self.iter() {
            writeln!(f, "{:>15}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.iter().format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v))))
    }
}
impl<'a> IntoIterator for &'a Dict {
    type Item = (&'a Name, &'a Primitive);
    type IntoIter = indexmap::map::Iter<'a, Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.map.iter()
    }
}

/// Primitive Stream: a dictionary plus a window into the document bytes.
///
/// The raw body stays in the file; `XRef::stream_data` materializes and
/// decodes it on demand. `id` is the containing indirect object, needed to
/// create the per-object cipher transform.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfStream {
    pub id: Option<PlainRef>,
    pub dict: Dict,
    pub file_range: Range<usize>,
}
