use std::error::Error;
use std::io;

use crate::primitive::ObjNr;

#[derive(Debug, Snafu)]
pub enum PdfError {
    // Syntax / parsing
    #[snafu(display("Unexpected end of file"))]
    EOF,

    #[snafu(display("Bytes {}..{} are not loaded yet", begin, end))]
    MissingData { begin: usize, end: usize },

    #[snafu(display("Error parsing from string: {}", source))]
    Parse { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Invalid encoding: {}", source))]
    Encoding { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Out of bounds: index {}, but len is {}", index, len))]
    Bounds { index: usize, len: usize },

    #[snafu(display("Unexpected token '{}' at {} - expected '{}'", lexeme, pos, expected))]
    UnexpectedLexeme { pos: usize, lexeme: String, expected: &'static str },

    #[snafu(display("Cannot follow reference during parsing - no resolver given (most likely /Length of Stream)."))]
    Reference,

    //////////////////
    // Cross-reference data
    #[snafu(display("Erroneous 'type' field in xref stream - expected 0, 1 or 2, found {}", found))]
    XRefStreamType { found: u64 },

    #[snafu(display("Cross-reference entry for object {} does not match the object found there", obj_nr))]
    XRefEntry { obj_nr: ObjNr },

    #[snafu(display("The cross-reference data could not be parsed"))]
    XRefParse,

    #[snafu(display("No usable trailer was found - the file is not a readable PDF"))]
    InvalidPdf,

    #[snafu(display("Object stream index out of bounds ({}/{}).", index, max))]
    ObjStmOutOfBounds { index: usize, max: usize },

    //////////////////
    // Dictionary
    #[snafu(display("Field /{} is missing in dictionary for type {}.", field, typ))]
    MissingEntry { typ: &'static str, field: String },

    //////////////////
    // Misc
    #[snafu(display("Expected primitive {}, found primitive {} instead.", expected, found))]
    UnexpectedPrimitive { expected: &'static str, found: &'static str },

    #[snafu(display("Page out of bounds ({}/{}).", page_nr, max))]
    PageOutOfBounds { page_nr: u32, max: u32 },

    #[snafu(display("Max nesting depth reached"))]
    MaxDepth,

    #[snafu(display("IO Error"))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Format { msg: String },

    #[snafu(display("Try at {}:{}:{}:{}", file, line, column, context))]
    Try { file: &'static str, line: u32, column: u32, context: Context, source: Box<PdfError> },
}

impl PdfError {
    pub fn trace(&self) {
        trace(self, 0);
    }
    pub fn is_eof(&self) -> bool {
        match self {
            PdfError::EOF => true,
            PdfError::Try { ref source, .. } => source.is_eof(),
            _ => false
        }
    }
    /// The byte range a `MissingData` carries, looking through `Try` wrappers.
    pub fn missing_range(&self) -> Option<(usize, usize)> {
        match *self {
            PdfError::MissingData { begin, end } => Some((begin, end)),
            PdfError::Try { ref source, .. } => source.missing_range(),
            _ => None
        }
    }
    pub fn is_missing_data(&self) -> bool {
        self.missing_range().is_some()
    }
}

fn trace(err: &dyn Error, depth: usize) {
    warn!("{}: {}", depth, err);
    if let Some(source) = err.source() {
        trace(source, depth + 1);
    }
}

#[derive(Debug)]
pub struct Context(pub Vec<(&'static str, String)>);
impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, &(key, ref val)) in self.0.iter().enumerate() {
            if i == 0 {
                writeln!(f)?;
            }
            writeln!(f, "    {} = {}", key, val)?;
        }
        Ok(())
    }
}

pub type Result<T, E = PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Format { msg }
    }
}

#[macro_export]
macro_rules! try_opt {
    ($e:expr $(,$c:expr)*) => (
        match $e {
            Some(v) => v,
            None => {
                let context = $crate::error::Context(vec![ $( (stringify!($c), format!("{:?}", $c) ) ),* ]);
                return Err($crate::PdfError::Try {
                    file: file!(),
                    line: line!(),
                    column: column!(),
                    context,
                    source: Box::new($crate::PdfError::EOF),
                });
            }
        }
    );
}

#[macro_export]
macro_rules! t {
    ($e:expr $(,$c:expr)*) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                let context = $crate::error::Context(vec![ $( (stringify!($c), format!("{:?}", $c) ) ),* ]);
                return Err($crate::PdfError::Try { file: file!(), line: line!(), column: column!(), context, source: Box::new(e.into()) })
            }
        }
    };
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error, std::string::FromUtf16Error => Encoding);
err_from!(std::num::ParseIntError, std::num::ParseFloatError => Parse);

macro_rules! other {
    ($($t:tt)*) => ($crate::PdfError::Format { msg: format!($($t)*) })
}

macro_rules! err {
    ($e: expr) => ({
        return Err($e);
    })
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Format { msg: format!($($t)*) })
    }
}
