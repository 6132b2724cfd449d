//! The reader: tokenizer + atom nester.
//!
//! Turns a UTF-8 byte stream into a tree of [`Atom`]s. Performs no semantic
//! interpretation of its own — parentheses, brackets and braces are
//! interchangeable openers/closers, and the only validation it does is
//! structural (balanced nesting, well-formed string escapes).

use crate::error::{CompileError, Result};
use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Integer(i64),
    Float(f64),
    Symbol(Symbol),
    String(Symbol),
    List(Vec<Atom>),
}

impl Atom {
    /// `Some(name)` if this atom is exactly the bare symbol `name` when one
    /// is given, or `Some(())`-shaped "is a symbol at all" when `None` is
    /// given. Mirrors the original's `is_symbol(atom, name)` helper.
    pub fn as_symbol<'a>(&self, interner: &'a Interner) -> Option<&'a str> {
        match self {
            Atom::Symbol(sym) => Some(interner.resolve(*sym)),
            _ => None,
        }
    }

    pub fn is_symbol_named(&self, name: &str, interner: &Interner) -> bool {
        self.as_symbol(interner) == Some(name)
    }

    pub fn as_list(&self) -> Option<&[Atom]> {
        match self {
            Atom::List(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    String,
    Int,
    Symbol,
    Space,
    Eof,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
    int_val: i64,
}

fn is_whitespace(cp: u32) -> bool {
    matches!(cp, 0x09 | 0x0A | 0x0B | 0x0C | 0x0D | 0x20)
        || matches!(
            cp,
            0x0085
                | 0x00A0
                | 0x1680
                | 0x2000..=0x200A
                | 0x2028
                | 0x2029
                | 0x202F
                | 0x205F
                | 0x3000
        )
}

fn is_delimiter(cp: u32) -> bool {
    matches!(
        cp,
        0x28 /* ( */ | 0x5B /* [ */ | 0x7B /* { */ |
        0x29 /* ) */ | 0x5D /* ] */ | 0x7D /* } */ |
        0x22 /* " */
    )
}

/// Minimal UTF-8 decoder: the leading byte selects a width of 1-4 bytes,
/// continuation bytes contribute 6 bits each.
fn decode_char(bytes: &[u8], pos: usize) -> Result<(u32, usize)> {
    let b0 = bytes[pos];

    let (width, mut cp): (usize, u32) = if b0 < 0x80 {
        (1, b0 as u32)
    } else if b0 & 0xE0 == 0xC0 {
        (2, (b0 & 0x1F) as u32)
    } else if b0 & 0xF0 == 0xE0 {
        (3, (b0 & 0x0F) as u32)
    } else if b0 & 0xF8 == 0xF0 {
        (4, (b0 & 0x07) as u32)
    } else {
        return Err(CompileError::Lex(format!(
            "malformed UTF-8 leading byte 0x{b0:02x} at offset {pos}"
        )));
    };

    if pos + width > bytes.len() {
        return Err(CompileError::Lex(format!(
            "truncated UTF-8 sequence at offset {pos}"
        )));
    }

    for b in &bytes[pos + 1..pos + width] {
        if b & 0xC0 != 0x80 {
            return Err(CompileError::Lex(format!(
                "malformed UTF-8 continuation byte at offset {pos}"
            )));
        }
        cp = (cp << 6) | (*b & 0x3F) as u32;
    }

    Ok((cp, width))
}

/// Tokenize and nest in one pass, mirroring the original reader's combined
/// lexer+parser: `SPACE` tokens are skipped between atoms, each `LPAREN`
/// begins a new list and each `RPAREN` closes the innermost one.
pub struct Reader<'a> {
    bytes: &'a [u8],
    peek_start: usize,
    next_pos: usize,
    peek: Option<u32>,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a [u8]) -> Result<Self> {
        let mut reader = Reader {
            bytes: source,
            peek_start: 0,
            next_pos: 0,
            peek: None,
        };
        reader.bump()?;
        Ok(reader)
    }

    fn bump(&mut self) -> Result<()> {
        self.peek_start = self.next_pos;
        if self.peek_start >= self.bytes.len() || self.bytes[self.peek_start] == 0 {
            self.peek = None;
            return Ok(());
        }
        let (cp, width) = decode_char(self.bytes, self.peek_start)?;
        self.peek = Some(cp);
        self.next_pos = self.peek_start + width;
        Ok(())
    }

    fn raw(&self, start: usize, end: usize) -> &'a [u8] {
        &self.bytes[start..end]
    }

    /// Consume and return the next non-space token.
    fn next_token(&mut self, interner: &mut Interner) -> Result<Token> {
        loop {
            let tok = self.lex_one(interner)?;
            if tok.kind != TokenKind::Space {
                return Ok(tok);
            }
        }
    }

    fn lex_one(&mut self, interner: &mut Interner) -> Result<Token> {
        let start = self.peek_start;
        let c = self.peek;
        self.bump()?;

        match c {
            None => Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
                int_val: 0,
            }),

            Some(0x28) | Some(0x5B) | Some(0x7B) => Ok(Token {
                kind: TokenKind::LParen,
                start,
                end: self.peek_start,
                int_val: 0,
            }),

            Some(0x29) | Some(0x5D) | Some(0x7D) => Ok(Token {
                kind: TokenKind::RParen,
                start,
                end: self.peek_start,
                int_val: 0,
            }),

            Some(0x22) => {
                // String literal: consume until the next unescaped '"'.
                loop {
                    match self.peek {
                        None => {
                            return Err(CompileError::Lex(
                                "unterminated string literal".to_string(),
                            ))
                        }
                        Some(0x5C) => {
                            // Backslash escapes the next codepoint, consumed
                            // uninterpreted.
                            self.bump()?;
                            if self.peek.is_none() {
                                return Err(CompileError::Lex(
                                    "unterminated string literal".to_string(),
                                ));
                            }
                            self.bump()?;
                        }
                        Some(0x22) => break,
                        Some(_) => self.bump()?,
                    }
                }
                let content_end = self.peek_start;
                self.bump()?; // consume closing quote

                let text = std::str::from_utf8(self.raw(start + 1, content_end))
                    .map_err(|e| CompileError::Lex(format!("invalid UTF-8 in string: {e}")))?;
                let sym = interner.intern(text);

                Ok(Token {
                    kind: TokenKind::String,
                    start,
                    end: self.peek_start,
                    int_val: sym.raw() as i64,
                })
            }

            Some(d) if d.is_ascii_digit_cp() => {
                let mut value: i64 = (d - 0x30) as i64;
                while matches!(self.peek, Some(p) if p.is_ascii_digit_cp()) {
                    value = value.wrapping_mul(10).wrapping_add((self.peek.unwrap() - 0x30) as i64);
                    self.bump()?;
                }
                if self.peek == Some(0x2E) {
                    return Err(CompileError::Lex(
                        "floating-point literals are not supported".to_string(),
                    ));
                }
                Ok(Token {
                    kind: TokenKind::Int,
                    start,
                    end: self.peek_start,
                    int_val: value,
                })
            }

            Some(c) if is_whitespace(c) => {
                while matches!(self.peek, Some(p) if is_whitespace(p)) {
                    self.bump()?;
                }
                Ok(Token {
                    kind: TokenKind::Space,
                    start,
                    end: self.peek_start,
                    int_val: 0,
                })
            }

            Some(_) => {
                while matches!(self.peek, Some(p) if !is_whitespace(p) && !is_delimiter(p)) {
                    self.bump()?;
                }
                let end = self.peek_start;
                let text = std::str::from_utf8(self.raw(start, end))
                    .map_err(|e| CompileError::Lex(format!("invalid UTF-8 in symbol: {e}")))?;
                let sym = interner.intern(text);

                Ok(Token {
                    kind: TokenKind::Symbol,
                    start,
                    end,
                    int_val: sym.raw() as i64,
                })
            }
        }
    }

    fn parse_items_until_rparen(&mut self, interner: &mut Interner) -> Result<Vec<Atom>> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token(interner)?;
            match tok.kind {
                TokenKind::Eof => {
                    return Err(CompileError::Parse("expected ')', found EOF".to_string()))
                }
                TokenKind::RParen => return Ok(items),
                _ => items.push(self.atom_from_token(tok, interner)?),
            }
        }
    }

    fn atom_from_token(&mut self, tok: Token, interner: &mut Interner) -> Result<Atom> {
        match tok.kind {
            TokenKind::LParen => Ok(Atom::List(self.parse_items_until_rparen(interner)?)),
            TokenKind::Int => Ok(Atom::Integer(tok.int_val)),
            TokenKind::String => Ok(Atom::String(Symbol::from_raw(tok.int_val as u32))),
            TokenKind::Symbol => Ok(Atom::Symbol(Symbol::from_raw(tok.int_val as u32))),
            TokenKind::RParen => Err(CompileError::Parse(format!(
                "unexpected ')' at offset {}",
                tok.start
            ))),
            TokenKind::Eof | TokenKind::Space => {
                unreachable!("EOF/Space are handled by the caller before reaching here")
            }
        }
    }

    /// Read the whole program: the top level is an implicit list.
    pub fn read_program(mut self, interner: &mut Interner) -> Result<Atom> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token(interner)?;
            if tok.kind == TokenKind::Eof {
                break;
            }
            items.push(self.atom_from_token(tok, interner)?);
        }
        Ok(Atom::List(items))
    }
}

trait AsciiDigitCp {
    fn is_ascii_digit_cp(self) -> bool;
}

impl AsciiDigitCp for u32 {
    fn is_ascii_digit_cp(self) -> bool {
        (0x30..=0x39).contains(&self)
    }
}

/// Read `source` into a single top-level [`Atom::List`].
pub fn read(source: &[u8], interner: &mut Interner) -> Result<Atom> {
    let reader = Reader::new(source)?;
    reader.read_program(interner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_are_interchangeable() {
        let parens = read(b"(foo bar)", &mut Interner::new()).unwrap();
        let brackets = read(b"[foo bar]", &mut Interner::new()).unwrap();
        let braces = read(b"{foo bar}", &mut Interner::new()).unwrap();

        for atom in [&parens, &brackets, &braces] {
            assert!(matches!(atom, Atom::List(v) if v.len() == 2));
        }
    }

    #[test]
    fn integers_accumulate_decimal_digits() {
        let mut interner = Interner::new();
        let atom = read(b"(123 4)", &mut interner).unwrap();
        match atom {
            Atom::List(items) => {
                assert_eq!(items[0], Atom::Integer(123));
                assert_eq!(items[1], Atom::Integer(4));
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn strings_strip_quotes_and_keep_escapes_uninterpreted() {
        let mut interner = Interner::new();
        let atom = read(b"(\"hi\\n\")", &mut interner).unwrap();
        match atom {
            Atom::List(items) => match items[0] {
                Atom::String(sym) => assert_eq!(interner.resolve(sym), "hi\\n"),
                _ => panic!("expected string atom"),
            },
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let mut interner = Interner::new();
        let err = read(b"(\"unterminated", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn mismatched_close_is_a_parse_error() {
        let mut interner = Interner::new();
        let err = read(b"(foo))", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn eof_inside_list_is_a_parse_error() {
        let mut interner = Interner::new();
        let err = read(b"(foo bar", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn decimal_point_after_digits_is_rejected() {
        let mut interner = Interner::new();
        let err = read(b"(3.14)", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn symbols_stop_at_whitespace_and_delimiters() {
        let mut interner = Interner::new();
        let atom = read(b"(a+b (c))", &mut interner).unwrap();
        match atom {
            Atom::List(items) => {
                assert!(matches!(items[0], Atom::Symbol(_)));
                assert!(matches!(items[1], Atom::List(_)));
            }
            _ => panic!("expected list"),
        }
    }
}
