//! Assembling `Primitive`s from the token layer.

mod lexer;

pub use self::lexer::*;

use indexmap::IndexMap;

use crate::crypt::CipherTransform;
use crate::error::*;
use crate::primitive::{Dict, GenNr, ObjNr, PdfStream, PdfString, PlainRef, Primitive};
use crate::stream::MemStream;
use crate::xref::Resolve;

/// Two-token-lookahead parser. `buf1`/`buf2` are exposed so resumable
/// callers (the classical xref table reader) can checkpoint and restore
/// their exact position mid-table.
pub struct Parser<'a> {
    lexer: Lexer,
    resolve: &'a dyn Resolve,
    transform: Option<&'a dyn CipherTransform>,
    pub allow_streams: bool,
    pub recovery_mode: bool,
    buf1: Option<Primitive>,
    buf2: Option<Primitive>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer, resolve: &'a dyn Resolve) -> Result<Parser<'a>> {
        Parser::with_options(lexer, resolve, None, true, false)
    }

    pub fn with_options(
        mut lexer: Lexer,
        resolve: &'a dyn Resolve,
        transform: Option<&'a dyn CipherTransform>,
        allow_streams: bool,
        recovery_mode: bool,
    ) -> Result<Parser<'a>> {
        let buf1 = lexer.get_token()?;
        let buf2 = match buf1 {
            Some(_) => lexer.get_token()?,
            None => None,
        };
        Ok(Parser {
            lexer,
            resolve,
            transform,
            allow_streams,
            recovery_mode,
            buf1,
            buf2,
        })
    }

    pub fn buf1(&self) -> Option<&Primitive> {
        self.buf1.as_ref()
    }
    pub fn buf2(&self) -> Option<&Primitive> {
        self.buf2.as_ref()
    }
    /// Position of the first byte the lexer has not consumed yet. Together
    /// with clones of `buf1`/`buf2` this is a complete parse checkpoint.
    pub fn checkpoint(&self) -> (usize, Option<Primitive>, Option<Primitive>) {
        (self.lexer.pos(), self.buf1.clone(), self.buf2.clone())
    }
    pub fn restore(&mut self, pos: usize, buf1: Option<Primitive>, buf2: Option<Primitive>) {
        self.lexer.set_pos(pos);
        self.buf1 = buf1;
        self.buf2 = buf2;
    }

    /// Take the current token and refill the lookahead.
    pub fn shift(&mut self) -> Result<Primitive> {
        let out = self.buf1.take().ok_or(PdfError::EOF)?;
        self.buf1 = self.buf2.take();
        self.buf2 = match self.buf1 {
            Some(_) => self.lexer.get_token()?,
            None => None,
        };
        Ok(out)
    }

    pub fn at_end(&self) -> bool {
        self.buf1.is_none()
    }

    /// Parse one object starting at the current token.
    /// Keywords the grammar does not know come back as `Cmd`, which lets
    /// the cross-reference readers see `trailer`, `obj`, `n`, `f`, ...
    pub fn get_obj(&mut self) -> Result<Primitive> {
        let first = self.shift()?;
        match first {
            Primitive::Cmd(ref cmd) => match cmd.as_str() {
                "[" => {
                    let mut array = Vec::new();
                    loop {
                        match self.buf1 {
                            None => return Err(PdfError::EOF),
                            Some(ref p) if p.is_cmd("]") => {
                                self.shift()?;
                                break;
                            }
                            _ => array.push(t!(self.get_obj())),
                        }
                    }
                    Ok(Primitive::Array(array))
                }
                "<<" => self.parse_dict_or_stream(),
                "true" => Ok(Primitive::Boolean(true)),
                "false" => Ok(Primitive::Boolean(false)),
                "null" => Ok(Primitive::Null),
                _ => Ok(first),
            },
            Primitive::Integer(n) => {
                let looks_like_ref = n >= 0
                    && matches!(self.buf1, Some(Primitive::Integer(g)) if g >= 0 && g <= GenNr::MAX as i64)
                    && matches!(self.buf2, Some(ref p) if p.is_cmd("R"));
                if looks_like_ref {
                    let gen = self.shift()?.as_integer()?;
                    self.shift()?; // the R
                    Ok(Primitive::Reference(PlainRef {
                        id: n as ObjNr,
                        gen: gen as GenNr,
                    }))
                } else {
                    Ok(first)
                }
            }
            Primitive::String(s) => match self.transform {
                Some(tf) => Ok(Primitive::String(PdfString::from(
                    tf.decrypt_string(s.as_bytes().to_vec()),
                ))),
                None => Ok(Primitive::String(s)),
            },
            other => Ok(other),
        }
    }

    fn parse_dict_or_stream(&mut self) -> Result<Primitive> {
        let mut map = IndexMap::new();
        loop {
            match self.buf1 {
                None => return Err(PdfError::EOF),
                Some(ref p) if p.is_cmd(">>") => break,
                Some(Primitive::Name(_)) => {
                    let key = self.shift()?.into_name()?;
                    let value = t!(self.get_obj(), key);
                    if let Primitive::Cmd(ref c) = value {
                        err!(PdfError::UnexpectedLexeme {
                            pos: self.lexer.pos(),
                            lexeme: c.as_str().into(),
                            expected: "object"
                        });
                    }
                    map.insert(key, value);
                }
                Some(ref p) => {
                    if self.recovery_mode {
                        warn!("skipping unexpected token {} in dictionary", p);
                        self.shift()?;
                    } else {
                        err!(PdfError::UnexpectedLexeme {
                            pos: self.lexer.pos(),
                            lexeme: p.to_string(),
                            expected: "/ or >>"
                        });
                    }
                }
            }
        }
        // buf1 is '>>'. If 'stream' follows, the lexer stands right after
        // that keyword and has not touched the binary body.
        if self.allow_streams && matches!(self.buf2, Some(ref p) if p.is_cmd("stream")) {
            return self.make_stream(Dict::from(map));
        }
        self.shift()?; // consume '>>'
        Ok(Primitive::Dictionary(Dict::from(map)))
    }

    fn make_stream(&mut self, dict: Dict) -> Result<Primitive> {
        self.lexer.skip_stream_eol()?;
        let start = self.lexer.pos();

        let length = match dict.get("Length") {
            Some(&Primitive::Integer(n)) if n >= 0 => n as usize,
            Some(&Primitive::Reference(r)) => t!(t!(self.resolve.resolve_ref(r)).as_usize()),
            Some(p) => err!(PdfError::UnexpectedPrimitive {
                expected: "Integer or Reference",
                found: p.get_debug_name()
            }),
            None => err!(PdfError::MissingEntry {
                typ: "<Stream>",
                field: "Length".into()
            }),
        };

        let mut end = start.saturating_add(length);
        self.lexer.set_pos(end);
        self.buf1 = self.lexer.get_token()?;
        self.buf2 = match self.buf1 {
            Some(_) => self.lexer.get_token()?,
            None => None,
        };

        if !matches!(self.buf1, Some(ref p) if p.is_cmd("endstream")) {
            // Broken /Length. Search for the delimiting keyword instead.
            warn!("stream at {} has bad /Length {}", start, length);
            let tail = self.lexer.get_byte_range(start, usize::MAX)?;
            let off = try_opt!(find_subslice(&tail, b"endstream"), start);
            end = start + trim_trailing_eol(&tail[..off]);
            self.lexer.set_pos(start + off);
            self.buf1 = self.lexer.get_token()?;
            self.buf2 = match self.buf1 {
                Some(_) => self.lexer.get_token()?,
                None => None,
            };
        }
        self.shift()?; // endstream

        Ok(Primitive::Stream(PdfStream {
            id: None,
            dict,
            file_range: start..end,
        }))
    }
}

pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_trailing_eol(body: &[u8]) -> usize {
    let mut end = body.len();
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && body[end - 1] == b'\r' {
        end -= 1;
    }
    end
}

/// Parse a single object from a resident buffer.
pub fn parse(data: &[u8], resolve: &dyn Resolve) -> Result<Primitive> {
    let lexer = Lexer::new(Box::new(MemStream::new(data.to_vec())));
    Parser::new(lexer, resolve)?.get_obj()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::NoResolve;

    fn parse_one(data: &[u8]) -> Primitive {
        parse(data, &NoResolve).unwrap()
    }

    #[test]
    fn parses_dict() {
        let p = parse_one(b"<< /Type /Example /Version 1.2 /Ok true >>");
        let dict = p.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Example");
        assert_eq!(dict.get("Version").unwrap().as_number().unwrap(), 1.2);
        assert_eq!(dict.get("Ok").unwrap().as_bool().unwrap(), true);
    }

    #[test]
    fn reference_vs_array_of_integers() {
        let p = parse_one(b"[ 1 0 R 2 0 R 3 4 5 ]");
        let arr = p.as_array().unwrap();
        assert_eq!(arr[0], Primitive::Reference(PlainRef { id: 1, gen: 0 }));
        assert_eq!(arr[1], Primitive::Reference(PlainRef { id: 2, gen: 0 }));
        assert_eq!(&arr[2..], &[Primitive::Integer(3), Primitive::Integer(4), Primitive::Integer(5)]);
    }

    #[test]
    fn nested_structures() {
        let p = parse_one(b"<< /Kids [<< /A (x) >> << /B <AB> >>] /N null >>");
        let dict = p.as_dict().unwrap();
        let kids = dict.get("Kids").unwrap().as_array().unwrap();
        assert_eq!(kids.len(), 2);
        assert!(dict.get("N").unwrap().is_null());
    }

    #[test]
    fn stream_with_explicit_length() {
        let data = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let p = parse_one(data);
        let s = p.as_stream().unwrap();
        let body = &data[s.file_range.clone()];
        assert_eq!(body, b"hello");
    }

    #[test]
    fn stream_with_broken_length_recovers() {
        let data = b"<< /Length 9999 >>\nstream\nhello\nendstream";
        let p = parse_one(data);
        let s = p.as_stream().unwrap();
        assert_eq!(&data[s.file_range.clone()], b"hello");
    }

    #[test]
    fn keywords_come_back_as_cmd() {
        let lexer = Lexer::new(Box::new(MemStream::new(b"trailer << /Size 3 >>".to_vec())));
        let mut parser = Parser::new(lexer, &NoResolve).unwrap();
        assert!(parser.get_obj().unwrap().is_cmd("trailer"));
        let dict = parser.get_obj().unwrap().into_dictionary().unwrap();
        assert_eq!(dict.get("Size").unwrap().as_integer().unwrap(), 3);
    }

    #[test]
    fn checkpoint_restore_roundtrip() {
        let lexer = Lexer::new(Box::new(MemStream::new(b"1 2 3 4 5".to_vec())));
        let mut parser = Parser::new(lexer, &NoResolve).unwrap();
        assert_eq!(parser.get_obj().unwrap(), Primitive::Integer(1));
        let (pos, b1, b2) = parser.checkpoint();
        assert_eq!(parser.get_obj().unwrap(), Primitive::Integer(2));
        assert_eq!(parser.get_obj().unwrap(), Primitive::Integer(3));
        parser.restore(pos, b1, b2);
        assert_eq!(parser.get_obj().unwrap(), Primitive::Integer(2));
        assert_eq!(parser.get_obj().unwrap(), Primitive::Integer(3));
    }
}
