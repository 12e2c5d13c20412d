//! Lexical units of a server response.

/// One lexical unit. Borrowed variants point into the response buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Run of atom characters that is neither all digits nor `NIL`.
    Atom(&'a str),
    /// Contents of a `"..."` string with escapes resolved.
    QuotedString(String),
    /// Payload of a `{n}` or `~{n}` literal.
    Literal(&'a [u8]),
    /// All-digit atom.
    Number(u64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// ` `
    Space,
    /// `*`, which opens untagged data.
    Asterisk,
    /// `+`, which opens a continuation request.
    Plus,
    /// `NIL` in any case.
    Nil,
    /// Line terminator.
    Crlf,
    /// Input exhausted.
    Eof,
}
