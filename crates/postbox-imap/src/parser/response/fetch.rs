//! FETCH response parsing.

use bytes::Bytes;

use crate::parser::lexer::{Lexer, Token};
use crate::{Error, Result};

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the parenthesized item list of a FETCH response.
///
/// `input` is the buffer the lexer runs over; payloads are sliced from it
/// without copying.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>, input: &Bytes) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        lexer.skip_spaces();
        if lexer.peek() == Some(b')') {
            lexer.advance();
            break;
        }
        if lexer.is_eof() || lexer.peek() == Some(b'\r') {
            return Err(lexer.error("Unterminated FETCH item list"));
        }
        items.push(parse_fetch_item(lexer, input)?);
    }

    Ok(items)
}

fn parse_fetch_item(lexer: &mut Lexer<'_>, input: &Bytes) -> Result<FetchItem> {
    let name = lexer.read_atom_string()?.to_ascii_uppercase();

    if lexer.peek() == Some(b'[') && matches!(name.as_str(), "BODY" | "BINARY" | "RFC822") {
        let (section, origin) = parse_body_section_and_origin(lexer)?;
        lexer.expect_space()?;
        let data = read_nstring_bytes(lexer, input)?;
        return Ok(FetchItem::Body {
            section,
            origin,
            data,
        });
    }

    lexer.expect_space()?;

    match name.as_str() {
        "UID" => {
            let uid = lexer.read_number()?;
            if uid == 0 {
                return Err(lexer.error("Invalid UID 0"));
            }
            Ok(FetchItem::Uid(uid))
        }
        "RFC822.SIZE" => Ok(FetchItem::Rfc822Size(lexer.read_number64()?)),
        "FLAGS" => Ok(FetchItem::Flags(parse_flag_list(lexer)?)),
        // Whole-message forms carry the same payload as BODY[].
        "RFC822" | "BINARY" => Ok(FetchItem::Body {
            section: String::new(),
            origin: None,
            data: read_nstring_bytes(lexer, input)?,
        }),
        _ => {
            let start = lexer.position();
            lexer.skip_value()?;
            Ok(FetchItem::Other {
                name,
                raw: input.slice(start..lexer.position()),
            })
        }
    }
}

/// Parses `[section]` and an optional `<origin>` after BODY or BINARY.
fn parse_body_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(String, Option<u64>)> {
    lexer.expect(Token::LBracket)?;
    let section = String::from_utf8_lossy(lexer.read_until(|b| b == b']'))
        .to_ascii_uppercase();
    lexer.expect(Token::RBracket)?;

    let mut origin = None;
    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let digits = lexer.read_until(|b| b == b'>');
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| lexer.error("Invalid partial origin"))?;
        if lexer.advance() != Some(b'>') {
            return Err(lexer.error("Expected > after partial origin"));
        }
        origin = Some(value);
    }

    Ok((section, origin))
}

/// Reads NIL, a quoted string or a literal as raw bytes.
fn read_nstring_bytes(lexer: &mut Lexer<'_>, input: &Bytes) -> Result<Option<Bytes>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::QuotedString(s) => Ok(Some(Bytes::from(s.into_bytes()))),
        Token::Literal(data) => Ok(Some(input.slice_ref(data))),
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected nstring, got {token:?}"),
        }),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn parse(data: &'static [u8]) -> Result<Vec<FetchItem>> {
        let input = Bytes::from_static(data);
        let mut lexer = Lexer::new(&input);
        parse_fetch_response(&mut lexer, &input)
    }

    #[test]
    fn test_parse_fetch_uid_and_flags() {
        let items = parse(b"(UID 123 FLAGS (\\Seen $Forwarded))").unwrap();
        assert_eq!(
            items,
            vec![
                FetchItem::Uid(123),
                FetchItem::Flags(vec!["\\Seen".to_string(), "$Forwarded".to_string()]),
            ]
        );
    }

    #[test]
    fn test_parse_fetch_uid_zero_rejected() {
        assert!(parse(b"(UID 0)").is_err());
    }

    #[test]
    fn test_parse_partial_body_literal() {
        let items = parse(b"(RFC822.SIZE 40 BODY[]<16> {16}\r\n0123456789abcdef)").unwrap();
        assert_eq!(items[0], FetchItem::Rfc822Size(40));
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: String::new(),
                origin: Some(16),
                data: Some(Bytes::from_static(b"0123456789abcdef")),
            }
        );
    }

    #[test]
    fn test_parse_body_section_with_fields() {
        let items = parse(b"(BODY[HEADER.FIELDS (From To)] \"x\")").unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: "HEADER.FIELDS (FROM TO)".to_string(),
                origin: None,
                data: Some(Bytes::from_static(b"x")),
            }
        );
    }

    #[test]
    fn test_parse_body_nil() {
        let items = parse(b"(BODY[1] NIL)").unwrap();
        assert!(matches!(&items[0], FetchItem::Body { data: None, .. }));
    }

    #[test]
    fn test_parse_binary_literal8() {
        let items = parse(b"(BINARY[1]<0> ~{2}\r\n\x00\xff)").unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: "1".to_string(),
                origin: Some(0),
                data: Some(Bytes::from_static(&[0x00, 0xff])),
            }
        );
    }

    #[test]
    fn test_unknown_items_kept_raw() {
        let items =
            parse(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" ENVELOPE (NIL \"s\") UID 7)")
                .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            FetchItem::Other {
                name: "INTERNALDATE".to_string(),
                raw: Bytes::from_static(b"\"17-Jul-1996 02:44:25 -0700\""),
            }
        );
        assert_eq!(
            items[1],
            FetchItem::Other {
                name: "ENVELOPE".to_string(),
                raw: Bytes::from_static(b"(NIL \"s\")"),
            }
        );
        assert_eq!(items[2], FetchItem::Uid(7));
    }

    #[test]
    fn test_unterminated_list() {
        assert!(parse(b"(UID 5\r\n").is_err());
    }
}
