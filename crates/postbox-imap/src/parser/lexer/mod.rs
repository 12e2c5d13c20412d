//! Tokenizer for server responses.
//!
//! Operates on one complete response as assembled by the framed reader, so
//! literal payloads already sit inline after their `{n}\r\n` header.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over the bytes of a single response.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Starts a cursor at the beginning of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Whether the whole input has been consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The byte under the cursor.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn take_while(&mut self, keep: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn utf8(&self, raw: &'a [u8], what: &str) -> Result<&'a str> {
        std::str::from_utf8(raw).map_err(|_| self.error(&format!("{what} is not valid UTF-8")))
    }

    /// Produces the next token, or [`Token::Eof`] once the input is used up.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        if let Some(token) = punctuation(byte) {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' => {
                self.pos += 1;
                match self.advance() {
                    Some(b'\n') => Ok(Token::Crlf),
                    _ => Err(self.error("bare CR in response")),
                }
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            b'~' if self.input.get(self.pos + 1) == Some(&b'{') => {
                self.pos += 1;
                self.literal()
            }
            _ if is_atom_char(byte) => self.atom(),
            _ => Err(self.error(&format!("stray byte {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut text = Vec::new();

        loop {
            let byte = self
                .advance()
                .ok_or_else(|| self.error("quoted string runs past end of response"))?;
            match byte {
                b'"' => break,
                b'\r' | b'\n' => return Err(self.error("quoted string spans a line break")),
                b'\\' => match self.advance() {
                    Some(escaped @ (b'"' | b'\\')) => text.push(escaped),
                    Some(other) => {
                        return Err(self.error(&format!("bad escape \\{}", char::from(other))));
                    }
                    None => return Err(self.error("quoted string runs past end of response")),
                },
                other => text.push(other),
            }
        }

        String::from_utf8(text)
            .map(Token::QuotedString)
            .map_err(|_| self.error("quoted string is not valid UTF-8"))
    }

    /// `{n}` or `{n+}`, CRLF, then exactly `n` payload bytes.
    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;

        let digits = self.take_while(|b| b.is_ascii_digit());
        let size: usize = self
            .utf8(digits, "literal size")?
            .parse()
            .map_err(|_| self.error("literal size is not a number"))?;

        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        let header_end = [self.advance(), self.advance(), self.advance()];
        if header_end != [Some(b'}'), Some(b'\r'), Some(b'\n')] {
            return Err(self.error("malformed literal header"));
        }

        let start = self.pos;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("literal is shorter than announced"))?;
        self.pos = end;

        Ok(Token::Literal(&self.input[start..end]))
    }

    /// Atoms made only of digits come back as [`Token::Number`]; `NIL` in
    /// any case comes back as [`Token::Nil`].
    fn atom(&mut self) -> Result<Token<'a>> {
        let raw = self.take_while(is_atom_char);
        let text = self.utf8(raw, "atom")?;

        if raw.iter().all(u8::is_ascii_digit) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("number exceeds 64 bits"));
        }
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(text))
    }

    /// Builds a [`Error::Parse`] pointing at the cursor.
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_owned(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let found = self.next_token()?;
        if std::mem::discriminant(&found) != std::mem::discriminant(&expected) {
            return Err(self.error(&format!("wanted {expected:?}, found {found:?}")));
        }
        Ok(())
    }

    /// Consumes a single space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads a number that must fit in 32 bits.
    pub fn read_number(&mut self) -> Result<u32> {
        let wide = self.read_number64()?;
        u32::try_from(wide).map_err(|_| self.error(&format!("{wide} does not fit in 32 bits")))
    }

    /// Reads a number of up to 64 bits.
    pub fn read_number64(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            found => Err(self.error(&format!("wanted a number, found {found:?}"))),
        }
    }

    /// Reads a bare atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(atom) => Ok(atom),
            found => Err(self.error(&format!("wanted an atom, found {found:?}"))),
        }
    }

    /// Reads a flag such as `\Seen`, `\*` or `$Forwarded`.
    pub fn read_flag(&mut self) -> Result<&'a str> {
        let raw = self.take_while(|b| !matches!(b, b' ' | b'(' | b')' | b']' | b'\r' | b'\n'));
        if raw.is_empty() {
            return Err(self.error("wanted a flag"));
        }
        self.utf8(raw, "flag")
    }

    /// Raw bytes up to the first byte matching `stop` or the line end.
    pub fn read_until(&mut self, stop: impl Fn(u8) -> bool) -> &'a [u8] {
        self.take_while(|b| b != b'\r' && b != b'\n' && !stop(b))
    }

    /// Steps over one value, descending into parenthesised lists.
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token()? {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => return Err(self.error("unbalanced ')'")),
                Token::RParen => depth -= 1,
                Token::Crlf | Token::Eof => return Err(self.error("value cut off by line end")),
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Skips any run of spaces.
    pub fn skip_spaces(&mut self) {
        self.take_while(|b| b == b' ');
    }
}

const fn punctuation(byte: u8) -> Option<Token<'static>> {
    Some(match byte {
        b' ' => Token::Space,
        b'(' => Token::LParen,
        b')' => Token::RParen,
        b'[' => Token::LBracket,
        b']' => Token::RBracket,
        b'*' => Token::Asterisk,
        b'+' => Token::Plus,
        _ => return None,
    })
}

/// Whether `b` may appear in an atom.
///
/// Printable ASCII minus the atom specials, except that `\` is let through
/// so system flags like `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b.is_ascii_graphic()
        && !matches!(b, b'(' | b')' | b'{' | b'}' | b'%' | b'*' | b'"' | b'[' | b']')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn status_line_punctuation() {
        assert_eq!(
            tokens(b"* OK [ALERT] (x)\r\n"),
            vec![
                Token::Asterisk,
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::LBracket,
                Token::Atom("ALERT"),
                Token::RBracket,
                Token::Space,
                Token::LParen,
                Token::Atom("x"),
                Token::RParen,
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn digits_become_numbers_unless_mixed() {
        assert_eq!(
            tokens(b"42 4294967296 12ab"),
            vec![
                Token::Number(42),
                Token::Space,
                Token::Number(4_294_967_296),
                Token::Space,
                Token::Atom("12ab"),
            ]
        );
        assert!(Lexer::new(b"4294967296").read_number().is_err());
    }

    #[test]
    fn bare_cr_is_rejected() {
        assert!(Lexer::new(b"\rx").next_token().is_err());
    }

    #[test]
    fn quoted_string_unescapes() {
        assert_eq!(
            tokens(br#""a \"b\" \\c""#),
            vec![Token::QuotedString("a \"b\" \\c".to_owned())]
        );
        assert!(matches!(
            Lexer::new(br#""\n""#).next_token(),
            Err(Error::Parse { .. })
        ));
        assert!(Lexer::new(b"\"open").next_token().is_err());
    }

    #[test]
    fn literals_borrow_their_payload() {
        assert_eq!(
            tokens(b"{5}\r\nhello)"),
            vec![Token::Literal(b"hello"), Token::RParen]
        );
        assert_eq!(tokens(b"{2+}\r\nhi"), vec![Token::Literal(b"hi")]);
        assert_eq!(tokens(b"~{3}\r\n\x00\x01\x02"), vec![Token::Literal(&[0, 1, 2])]);
        assert!(Lexer::new(b"{10}\r\nshort").next_token().is_err());
        assert!(Lexer::new(b"{3\r\nabc").next_token().is_err());
    }

    #[test]
    fn nil_ignores_case() {
        assert_eq!(tokens(b"nil NIL"), vec![Token::Nil, Token::Space, Token::Nil]);
    }

    #[test]
    fn flags_stop_at_delimiters() {
        let mut lexer = Lexer::new(b"\\* \\Seen)");
        assert_eq!(lexer.read_flag().unwrap(), "\\*");
        lexer.skip_spaces();
        assert_eq!(lexer.read_flag().unwrap(), "\\Seen");
        assert_eq!(lexer.peek(), Some(b')'));
        assert!(lexer.read_flag().is_err());
    }

    #[test]
    fn skip_value_handles_nesting_and_literals() {
        let mut lexer = Lexer::new(b"(a (b \"c\") {1}\r\nx) NEXT");
        lexer.skip_value().unwrap();
        lexer.skip_spaces();
        assert_eq!(lexer.read_atom_string().unwrap(), "NEXT");

        assert!(Lexer::new(b"(a b\r\n").skip_value().is_err());
    }

    #[test]
    fn atom_specials() {
        for b in [b'A', b'\\', b'.', b'~', b'|', b'$'] {
            assert!(is_atom_char(b), "{}", char::from(b));
        }
        for b in [b'"', b'%', b'*', b']', b'[', b' ', b'{', b'}', b'(', 0x7f, 0x1f] {
            assert!(!is_atom_char(b), "{b:#04x}");
        }
    }
}
