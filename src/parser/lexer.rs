//! Tokenizing a byte stream into `Primitive` tokens: numbers, names,
//! strings and bare keywords (`Cmd`). The lexer runs directly on a
//! `BaseStream`, so on a chunked source any token read can raise
//! `MissingData` and be retried by the owner after the range arrived.

use crate::error::*;
use crate::primitive::{PdfString, Primitive};
use crate::stream::BaseStream;

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

#[inline]
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub struct Lexer {
    stream: Box<dyn BaseStream>,
    peeked: Option<u8>,
}

impl Lexer {
    pub fn new(stream: Box<dyn BaseStream>) -> Lexer {
        Lexer { stream, peeked: None }
    }

    /// Absolute position of the next unconsumed byte.
    #[inline]
    pub fn pos(&self) -> usize {
        self.stream.pos() - self.peeked.is_some() as usize
    }
    pub fn set_pos(&mut self, pos: usize) {
        self.peeked = None;
        self.stream.set_pos(pos);
    }
    pub fn get_byte_range(&self, begin: usize, end: usize) -> Result<Vec<u8>> {
        self.stream.get_byte_range(begin, end)
    }

    #[inline]
    fn read(&mut self) -> Result<Option<u8>> {
        match self.peeked.take() {
            Some(b) => Ok(Some(b)),
            None => self.stream.get_byte(),
        }
    }
    #[inline]
    fn unread(&mut self, b: u8) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(b);
    }

    /// Next token, or `None` at the end of the data.
    pub fn get_token(&mut self) -> Result<Option<Primitive>> {
        loop {
            let b = match self.read()? {
                None => return Ok(None),
                Some(b) => b,
            };
            if is_whitespace(b) {
                continue;
            }
            if b == b'%' {
                // comment runs to the end of the line
                loop {
                    match self.read()? {
                        None => return Ok(None),
                        Some(b'\r') | Some(b'\n') => break,
                        Some(_) => {}
                    }
                }
                continue;
            }
            if b == b')' {
                warn!("stray ')' at {}", self.pos());
                continue;
            }
            return match b {
                b'0'..=b'9' | b'+' | b'-' | b'.' => self.lex_number(b).map(Some),
                b'/' => self.lex_name().map(Some),
                b'(' => self.lex_string().map(Some),
                b'<' => match self.read()? {
                    Some(b'<') => Ok(Some(Primitive::Cmd("<<".into()))),
                    Some(n) => {
                        self.unread(n);
                        self.lex_hex_string().map(Some)
                    }
                    None => Err(PdfError::EOF),
                },
                b'>' => match self.read()? {
                    Some(b'>') => Ok(Some(Primitive::Cmd(">>".into()))),
                    other => {
                        if let Some(n) = other {
                            self.unread(n);
                        }
                        Ok(Some(Primitive::Cmd(">".into())))
                    }
                },
                b'[' => Ok(Some(Primitive::Cmd("[".into()))),
                b']' => Ok(Some(Primitive::Cmd("]".into()))),
                b'{' => Ok(Some(Primitive::Cmd("{".into()))),
                b'}' => Ok(Some(Primitive::Cmd("}".into()))),
                _ => self.lex_keyword(b).map(Some),
            };
        }
    }

    fn lex_number(&mut self, first: u8) -> Result<Primitive> {
        let start = self.pos() - 1;
        let mut word = vec![first];
        loop {
            match self.read()? {
                Some(b @ (b'0'..=b'9' | b'+' | b'-' | b'.')) => word.push(b),
                Some(other) => {
                    self.unread(other);
                    break;
                }
                None => break,
            }
        }
        // Safe: the byte set above is ASCII
        let text = std::str::from_utf8(&word).unwrap();
        if !text.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Primitive::Integer(n));
            }
        }
        match text.parse::<f64>() {
            Ok(f) => Ok(Primitive::Number(f)),
            Err(_) => Err(PdfError::UnexpectedLexeme {
                pos: start,
                lexeme: text.into(),
                expected: "number",
            }),
        }
    }

    fn lex_name(&mut self) -> Result<Primitive> {
        let mut bytes = Vec::new();
        loop {
            match self.read()? {
                None => break,
                Some(b) if is_whitespace(b) || is_delimiter(b) => {
                    self.unread(b);
                    break;
                }
                Some(b'#') => {
                    // two-digit hex escape; kept literally when malformed
                    let hi = self.read()?;
                    let lo = if hi.is_some() { self.read()? } else { None };
                    match (hi.and_then(hex_val), lo.and_then(hex_val)) {
                        (Some(h), Some(l)) => bytes.push(h << 4 | l),
                        _ => {
                            warn!("malformed name escape at {}", self.pos());
                            bytes.push(b'#');
                            if let Some(b) = hi {
                                bytes.push(b);
                            }
                            if let Some(b) = lo {
                                bytes.push(b);
                            }
                        }
                    }
                }
                Some(b) => bytes.push(b),
            }
        }
        let name = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Primitive::Name(name.into()))
    }

    fn lex_string(&mut self) -> Result<Primitive> {
        let mut bytes = Vec::new();
        let mut depth = 1usize;
        loop {
            match self.read()?.ok_or(PdfError::EOF)? {
                b'(' => {
                    depth += 1;
                    bytes.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(b')');
                }
                b'\\' => match self.read()?.ok_or(PdfError::EOF)? {
                    b'n' => bytes.push(b'\n'),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'b' => bytes.push(8),
                    b'f' => bytes.push(12),
                    b @ (b'(' | b')' | b'\\') => bytes.push(b),
                    b'\n' => {} // line continuation
                    b'\r' => {
                        if let Some(b) = self.read()? {
                            if b != b'\n' {
                                self.unread(b);
                            }
                        }
                    }
                    b @ b'0'..=b'7' => {
                        let mut code = (b - b'0') as u16;
                        for _ in 0..2 {
                            match self.read()? {
                                Some(d @ b'0'..=b'7') => code = code * 8 + (d - b'0') as u16,
                                Some(other) => {
                                    self.unread(other);
                                    break;
                                }
                                None => break,
                            }
                        }
                        bytes.push(code as u8);
                    }
                    other => bytes.push(other),
                },
                b => bytes.push(b),
            }
        }
        Ok(Primitive::String(PdfString::from(bytes)))
    }

    fn lex_hex_string(&mut self) -> Result<Primitive> {
        let mut bytes = Vec::new();
        let mut pending: Option<u8> = None;
        loop {
            let b = self.read()?.ok_or(PdfError::EOF)?;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            match hex_val(b) {
                Some(v) => match pending.take() {
                    Some(hi) => bytes.push(hi << 4 | v),
                    None => pending = Some(v),
                },
                None => warn!("invalid character {:?} in hex string", b as char),
            }
        }
        if let Some(hi) = pending {
            bytes.push(hi << 4);
        }
        Ok(Primitive::String(PdfString::from(bytes)))
    }

    fn lex_keyword(&mut self, first: u8) -> Result<Primitive> {
        let mut word = vec![first];
        loop {
            match self.read()? {
                None => break,
                Some(b) if is_whitespace(b) || is_delimiter(b) => {
                    self.unread(b);
                    break;
                }
                Some(b) => word.push(b),
            }
        }
        let word = String::from_utf8_lossy(&word).into_owned();
        Ok(Primitive::Cmd(word.into()))
    }

    /// Consume the end-of-line marker that follows the `stream` keyword.
    pub fn skip_stream_eol(&mut self) -> Result<()> {
        match self.read()? {
            Some(b'\n') => Ok(()),
            Some(b'\r') => {
                if let Some(b) = self.read()? {
                    if b != b'\n' {
                        self.unread(b);
                    }
                }
                Ok(())
            }
            Some(other) => {
                warn!("missing EOL after 'stream' keyword");
                self.unread(other);
                Ok(())
            }
            None => Err(PdfError::EOF),
        }
    }
}

#[inline]
fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;

    fn lex_all(data: &[u8]) -> Vec<Primitive> {
        let mut lexer = Lexer::new(Box::new(MemStream::new(data.to_vec())));
        let mut out = Vec::new();
        while let Some(tok) = lexer.get_token().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_all(b"42 -17 +3 3.14 -.5 4."),
            [
                Primitive::Integer(42),
                Primitive::Integer(-17),
                Primitive::Integer(3),
                Primitive::Number(3.14),
                Primitive::Number(-0.5),
                Primitive::Number(4.0),
            ]
        );
    }

    #[test]
    fn names_with_escapes() {
        let toks = lex_all(b"/Name /A#20B /Lime#20Green /");
        assert_eq!(toks[0], Primitive::Name("Name".into()));
        assert_eq!(toks[1], Primitive::Name("A B".into()));
        assert_eq!(toks[2], Primitive::Name("Lime Green".into()));
        assert_eq!(toks[3], Primitive::Name("".into()));
    }

    #[test]
    fn strings() {
        let toks = lex_all(b"(simple) (with (nested) parens) (esc\\(aped\\)) (a\\101) (line\\\ncont)");
        assert_eq!(toks[0], Primitive::String(PdfString::from("simple")));
        assert_eq!(toks[1], Primitive::String(PdfString::from("with (nested) parens")));
        assert_eq!(toks[2], Primitive::String(PdfString::from("esc(aped)")));
        assert_eq!(toks[3], Primitive::String(PdfString::from("aA")));
        assert_eq!(toks[4], Primitive::String(PdfString::from("linecont")));
    }

    #[test]
    fn hex_strings() {
        let toks = lex_all(b"<68 65 6C6C6F> <901FA>");
        assert_eq!(toks[0], Primitive::String(PdfString::from("hello")));
        assert_eq!(
            toks[1],
            Primitive::String(PdfString::from(vec![0x90, 0x1f, 0xa0]))
        );
    }

    #[test]
    fn delimiters_and_keywords() {
        let toks = lex_all(b"<< /K 1 >> [ true ] obj endobj");
        assert!(toks[0].is_cmd("<<"));
        assert_eq!(toks[1], Primitive::Name("K".into()));
        assert_eq!(toks[2], Primitive::Integer(1));
        assert!(toks[3].is_cmd(">>"));
        assert!(toks[4].is_cmd("["));
        assert!(toks[5].is_cmd("true"));
        assert!(toks[6].is_cmd("]"));
        assert!(toks[7].is_cmd("obj"));
        assert!(toks[8].is_cmd("endobj"));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex_all(b"1 % a comment\n2"),
            [Primitive::Integer(1), Primitive::Integer(2)]
        );
    }
}
