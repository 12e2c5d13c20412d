//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, CapabilitySet, ResponseCode};
use crate::Result;

/// Parses a bracketed response code, `[` through `]`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_ascii_uppercase();

    let code = match upper.as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNOTSTICKY" => ResponseCode::UidNotSticky,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "AUTHORIZATIONFAILED" => ResponseCode::AuthorizationFailed,
        "EXPIRED" => ResponseCode::Expired,
        "UNAVAILABLE" => ResponseCode::Unavailable,
        "INUSE" => ResponseCode::InUse,
        "NOTSAVED" => ResponseCode::NotSaved,
        "UIDNEXT" => {
            lexer.expect_space()?;
            ResponseCode::UidNext(lexer.read_number()?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(lexer.read_number()?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            ResponseCode::Unseen(lexer.read_number()?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uid_validity = lexer.read_number()?;
            lexer.expect_space()?;
            ResponseCode::AppendUid {
                uid_validity,
                uids: read_code_word(lexer),
            }
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let uid_validity = lexer.read_number()?;
            lexer.expect_space()?;
            let source = read_code_word(lexer);
            lexer.expect_space()?;
            ResponseCode::CopyUid {
                uid_validity,
                source,
                destination: read_code_word(lexer),
            }
        }
        "REFERRAL" => {
            lexer.skip_spaces();
            ResponseCode::Referral(read_code_text(lexer))
        }
        _ => {
            lexer.skip_spaces();
            let text = read_code_text(lexer);
            ResponseCode::Other {
                name: upper,
                text: (!text.is_empty()).then_some(text),
            }
        }
    };

    // Tolerate trailing junk inside the brackets.
    while lexer.peek() != Some(b']') && !lexer.is_eof() && lexer.peek() != Some(b'\r') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Reads a space-delimited word inside a response code.
fn read_code_word(lexer: &mut Lexer<'_>) -> String {
    String::from_utf8_lossy(lexer.read_until(|b| b == b' ' || b == b']')).into_owned()
}

/// Reads the rest of a response code up to `]`.
fn read_code_text(lexer: &mut Lexer<'_>) -> String {
    String::from_utf8_lossy(lexer.read_until(|b| b == b']')).into_owned()
}

/// Parses capability names following a `CAPABILITY` keyword, up to the end
/// of the line or a closing `]`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> CapabilitySet {
    let mut caps = CapabilitySet::new();

    loop {
        lexer.skip_spaces();
        let word = lexer.read_until(|b| b == b' ' || b == b']');
        if word.is_empty() {
            break;
        }
        caps.insert(Capability::new(String::from_utf8_lossy(word).into_owned()));
    }

    caps
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;

    let mut flags = Vec::new();

    loop {
        lexer.skip_spaces();
        if lexer.peek() == Some(b')') {
            lexer.advance();
            break;
        }
        flags.push(lexer.read_flag()?.to_string());
    }

    Ok(flags)
}

/// Parses the space-separated numbers of a SEARCH or SORT response.
///
/// Parenthesized trailers such as `(MODSEQ 917162500)` are skipped.
pub fn parse_number_list(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut numbers = Vec::new();

    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b'0'..=b'9') => numbers.push(lexer.read_number()?),
            Some(b'(') => lexer.skip_value()?,
            _ => break,
        }
    }

    Ok(numbers)
}

/// Reads text until CRLF or end of input.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    String::from_utf8_lossy(lexer.read_until(|_| false)).into_owned()
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

    #[test]
    fn test_uidvalidity_code() {
        let mut lexer = Lexer::new(b"[UIDVALIDITY 3857529045] ok");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::UidValidity(3857529045)
        );
    }

    #[test]
    fn test_capability_code() {
        let mut lexer = Lexer::new(b"[CAPABILITY IMAP4rev1 AUTH=PLAIN] done");
        let ResponseCode::Capability(caps) = parse_response_code(&mut lexer).unwrap() else {
            panic!("expected capability code");
        };
        assert!(caps.contains(&Capability::IMAP4REV1));
        assert!(caps.supports_auth("plain"));
    }

    #[test]
    fn test_permanent_flags_with_wildcard() {
        let mut lexer = Lexer::new(b"[PERMANENTFLAGS (\\Deleted \\Seen \\*)]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::PermanentFlags(vec![
                "\\Deleted".to_string(),
                "\\Seen".to_string(),
                "\\*".to_string()
            ])
        );
    }

    #[test]
    fn test_copyuid() {
        let mut lexer = Lexer::new(b"[COPYUID 38505 304,319:320 3956:3958]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::CopyUid {
                uid_validity: 38505,
                source: "304,319:320".to_string(),
                destination: "3956:3958".to_string(),
            }
        );
    }

    #[test]
    fn test_referral() {
        let mut lexer = Lexer::new(b"[REFERRAL imap://user@other.example.com/]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Referral("imap://user@other.example.com/".to_string())
        );
    }

    #[test]
    fn test_unknown_code() {
        let mut lexer = Lexer::new(b"[x-gm-thing 1 2]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Other {
                name: "X-GM-THING".to_string(),
                text: Some("1 2".to_string()),
            }
        );
        let mut lexer = Lexer::new(b"[CLOSED]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Other {
                name: "CLOSED".to_string(),
                text: None,
            }
        );
    }

    #[test]
    fn test_number_list_skips_modseq() {
        let mut lexer = Lexer::new(b" 2 84 882 (MODSEQ 917162500)\r\n");
        assert_eq!(parse_number_list(&mut lexer).unwrap(), vec![2, 84, 882]);
    }

    #[test]
    fn test_empty_number_list() {
        let mut lexer = Lexer::new(b"\r\n");
        assert!(parse_number_list(&mut lexer).unwrap().is_empty());
    }
}
