//! IMAP response parser.
//!
//! Parses one complete server response (a line plus any literals it
//! announced) into a [`Response`].

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, UntaggedResponse};

use bytes::Bytes;

use crate::parser::lexer::{Lexer, Token, is_atom_char};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_number_list, parse_response_code,
    read_text_until_crlf,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text after `+ `; base64 challenge during AUTHENTICATE.
        text: String,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &Bytes) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.peek() {
            Some(b'*') => {
                lexer.advance();
                Self::parse_untagged(&mut lexer, input)
            }
            Some(b'+') => {
                lexer.advance();
                Self::parse_continuation(&mut lexer)
            }
            Some(_) => Self::parse_tagged(&mut lexer),
            None => Err(Error::Parse {
                position: 0,
                message: "Empty response".to_string(),
            }),
        }
    }

    /// Parses a tagged response. The tag is taken verbatim up to the first
    /// space since tags like `0012` would otherwise lex as numbers.
    fn parse_tagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        let tag = lexer.read_until(|b| b == b' ');
        if tag.is_empty() || !tag.iter().copied().all(is_atom_char) {
            return Err(lexer.error("Invalid tag"));
        }
        let tag = String::from_utf8_lossy(tag).into_owned();
        lexer.expect_space()?;

        let status = Self::parse_status(lexer)?;
        if status == Status::PreAuth {
            return Err(lexer.error("PREAUTH is not a tagged status"));
        }
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>, input: &Bytes) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => {
                if let Some(status) = Status::parse(keyword) {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Condition { status, code, text }
                } else {
                    let upper = keyword.to_ascii_uppercase();
                    match upper.as_str() {
                        "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)),
                        "FLAGS" => {
                            lexer.expect_space()?;
                            UntaggedResponse::Flags(parse_flag_list(lexer)?)
                        }
                        "SEARCH" => UntaggedResponse::Search(parse_number_list(lexer)?),
                        "SORT" => UntaggedResponse::Sort(parse_number_list(lexer)?),
                        _ => Self::other(lexer, input, upper, None),
                    }
                }
            }
            Token::Number(n) => {
                let n = u32::try_from(n).map_err(|_| lexer.error("Message number too large"))?;
                lexer.expect_space()?;
                let upper = lexer.read_atom_string()?.to_ascii_uppercase();

                match upper.as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" | "FETCH" if n == 0 => {
                        return Err(lexer.error("Invalid sequence number 0"));
                    }
                    "EXPUNGE" => UntaggedResponse::Expunge(n),
                    "FETCH" => {
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer, input)?;
                        UntaggedResponse::Fetch { seq: n, items }
                    }
                    _ => Self::other(lexer, input, upper, Some(n)),
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    /// Captures the rest of the response raw.
    fn other(
        lexer: &mut Lexer<'_>,
        input: &Bytes,
        keyword: String,
        number: Option<u32>,
    ) -> UntaggedResponse {
        lexer.skip_spaces();
        let start = lexer.position();
        let end = input
            .strip_suffix(b"\r\n")
            .map_or(input.len(), <[u8]>::len)
            .max(start);
        UntaggedResponse::Other {
            keyword,
            number,
            raw: input.slice(start..end),
        }
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Result<Response> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Ok(Response::Continuation {
            text: read_text_until_crlf(lexer),
        })
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let atom = lexer.read_atom_string()?;
        Status::parse(atom).ok_or_else(|| lexer.error(&format!("Unknown status: {atom}")))
    }

    /// Parses `[SP ["[" code "]" SP] text]`.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = if lexer.peek() == Some(b'[') {
            let code = parse_response_code(lexer)?;
            if lexer.peek() == Some(b' ') {
                lexer.advance();
            }
            Some(code)
        } else {
            None
        };

        Ok((code, read_text_until_crlf(lexer)))
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
    use crate::types::Capability;

    fn parse(data: &'static [u8]) -> Result<Response> {
        ResponseParser::parse(&Bytes::from_static(data))
    }

    #[test]
    fn test_tagged_ok_with_numeric_tag() {
        let response = parse(b"0012 OK [READ-WRITE] SELECT completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: "0012".to_string(),
                status: Status::Ok,
                code: Some(ResponseCode::ReadWrite),
                text: "SELECT completed".to_string(),
            }
        );
    }

    #[test]
    fn test_tagged_no_trycreate() {
        let response = parse(b"000a NO [TRYCREATE] Mailbox doesn't exist\r\n").unwrap();
        let Response::Tagged { status, code, .. } = response else {
            panic!("expected tagged");
        };
        assert_eq!(status, Status::No);
        assert_eq!(code, Some(ResponseCode::TryCreate));
    }

    #[test]
    fn test_greeting_with_capabilities() {
        let response =
            parse(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Condition {
            status,
            code: Some(ResponseCode::Capability(caps)),
            text,
        }) = response
        else {
            panic!("expected condition");
        };
        assert_eq!(status, Status::Ok);
        assert!(caps.contains(&Capability::STARTTLS));
        assert!(caps.contains(&Capability::LOGINDISABLED));
        assert_eq!(text, "ready");
    }

    #[test]
    fn test_preauth_and_bye() {
        assert!(matches!(
            parse(b"* PREAUTH welcome\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::PreAuth,
                ..
            })
        ));
        assert!(matches!(
            parse(b"* BYE [REFERRAL imap://b.example.com/] go away\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Bye,
                code: Some(ResponseCode::Referral(_)),
                ..
            })
        ));
    }

    #[test]
    fn test_untagged_ok_without_text() {
        assert!(matches!(
            parse(b"* OK\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Condition { status: Status::Ok, code: None, .. })
        ));
    }

    #[test]
    fn test_message_data() {
        assert_eq!(
            parse(b"* 172 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(172))
        );
        assert_eq!(
            parse(b"* 1 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Recent(1))
        );
        assert_eq!(
            parse(b"* 3 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(3))
        );
        assert!(parse(b"* 0 EXPUNGE\r\n").is_err());
    }

    #[test]
    fn test_fetch() {
        let response = parse(b"* 12 FETCH (UID 99 BODY[] {3}\r\nabc)\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Fetch { seq, items }) = response else {
            panic!("expected fetch");
        };
        assert_eq!(seq, 12);
        assert_eq!(items[0], FetchItem::Uid(99));
        assert!(matches!(&items[1], FetchItem::Body { data: Some(d), .. } if &d[..] == b"abc"));
    }

    #[test]
    fn test_search_and_sort() {
        assert_eq!(
            parse(b"* SEARCH 2 3 6\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![2, 3, 6]))
        );
        assert_eq!(
            parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![]))
        );
        assert_eq!(
            parse(b"* SORT 5 3 4\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Sort(vec![5, 3, 4]))
        );
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            parse(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Flags(vec![
                "\\Answered".to_string(),
                "\\Flagged".to_string(),
                "\\Deleted".to_string(),
                "\\Seen".to_string(),
                "\\Draft".to_string(),
            ]))
        );
    }

    #[test]
    fn test_other_kinds_kept_raw() {
        let response = parse(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Other {
                keyword: "LIST".to_string(),
                number: None,
                raw: Bytes::from_static(b"(\\HasNoChildren) \"/\" INBOX"),
            })
        );

        let response = parse(b"* NAMESPACE ((\"\" \"/\")) NIL NIL\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Untagged(UntaggedResponse::Other { ref keyword, .. }) if keyword == "NAMESPACE"
        ));
    }

    #[test]
    fn test_continuation() {
        assert_eq!(
            parse(b"+ Ready for literal data\r\n").unwrap(),
            Response::Continuation {
                text: "Ready for literal data".to_string()
            }
        );
        assert_eq!(
            parse(b"+\r\n").unwrap(),
            Response::Continuation {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_malformed() {
        assert!(parse(b"").is_err());
        assert!(parse(b"0001 MAYBE whatever\r\n").is_err());
        assert!(parse(b"* (garbage\r\n").is_err());
    }
}
