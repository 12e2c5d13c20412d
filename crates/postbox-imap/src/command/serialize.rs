//! Command serialization helpers.
//!
//! Commands are rendered into a list of [`Segment`]s: verbatim text runs
//! separated by literal payloads. The transport decides per literal whether
//! to announce it synchronising or not.

use bytes::{BufMut, Bytes, BytesMut};

use super::types::{Argument, FetchAttribute, FetchItems, StoreAction};

/// A piece of a rendered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text written as-is.
    Text(Bytes),
    /// Literal payload; the transport writes the `{n}` announcement.
    Literal {
        /// Raw bytes.
        data: Bytes,
        /// `~{n}` literal8 rather than `{n}`.
        binary: bool,
    },
}

/// How a string argument has to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    Atom,
    Quoted,
    Literal,
}

impl Encoding {
    pub(crate) const fn is_literal(self) -> bool {
        matches!(self, Self::Literal)
    }
}

/// Picks the cheapest encoding that carries `s` exactly.
pub(crate) fn encoding_for(s: &str) -> Encoding {
    if !s.is_empty() && s.bytes().all(is_astring_char) {
        Encoding::Atom
    } else if s.bytes().all(is_quotable) {
        Encoding::Quoted
    } else {
        Encoding::Literal
    }
}

/// ASTRING-CHAR: any CHAR except atom-specials, plus `]`.
const fn is_astring_char(b: u8) -> bool {
    !(matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b >= 0x7F)
}

/// TEXT-CHAR inside a quoted string (7-bit, no CR/LF/NUL).
const fn is_quotable(b: u8) -> bool {
    b != 0 && b != b'\r' && b != b'\n' && b < 0x80
}

/// Accumulates a command's segments.
#[derive(Debug)]
pub(crate) struct Encoder {
    segments: Vec<Segment>,
    text: BytesMut,
}

impl Encoder {
    pub(crate) fn new(tag: &str) -> Self {
        let mut text = BytesMut::with_capacity(64);
        text.put_slice(tag.as_bytes());
        Self {
            segments: Vec::new(),
            text,
        }
    }

    pub(crate) fn raw(&mut self, s: &str) -> &mut Self {
        self.text.put_slice(s.as_bytes());
        self
    }

    pub(crate) fn sp(&mut self) -> &mut Self {
        self.text.put_u8(b' ');
        self
    }

    pub(crate) fn astring(&mut self, s: &str) -> &mut Self {
        match encoding_for(s) {
            Encoding::Atom => self.raw(s),
            Encoding::Quoted => {
                self.text.put_u8(b'"');
                for b in s.bytes() {
                    if b == b'"' || b == b'\\' {
                        self.text.put_u8(b'\\');
                    }
                    self.text.put_u8(b);
                }
                self.text.put_u8(b'"');
                self
            }
            Encoding::Literal => self.literal(Bytes::copy_from_slice(s.as_bytes()), false),
        }
    }

    pub(crate) fn literal(&mut self, data: Bytes, binary: bool) -> &mut Self {
        let text = self.text.split().freeze();
        self.segments.push(Segment::Text(text));
        self.segments.push(Segment::Literal { data, binary });
        self
    }

    pub(crate) fn argument(&mut self, argument: &Argument) -> &mut Self {
        match argument {
            Argument::Atom(s) => self.raw(s),
            Argument::AString(s) => self.astring(s),
            Argument::Literal(data) => self.literal(data.clone(), false),
            Argument::Literal8(data) => self.literal(data.clone(), true),
            Argument::Sequence(set) => self.raw(&set.to_string()),
            Argument::Nil => self.raw("NIL"),
            Argument::List(items) => {
                self.raw("(");
                self.arguments(items);
                self.raw(")")
            }
        }
    }

    /// Space-separated arguments.
    pub(crate) fn arguments(&mut self, items: &[Argument]) -> &mut Self {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sp();
            }
            self.argument(item);
        }
        self
    }

    pub(crate) fn flag_list(&mut self, flags: &[String]) -> &mut Self {
        self.raw("(").raw(&flags.join(" ")).raw(")")
    }

    pub(crate) fn fetch_items(&mut self, items: &FetchItems) -> &mut Self {
        match items {
            FetchItems::All => self.raw("ALL"),
            FetchItems::Full => self.raw("FULL"),
            FetchItems::Fast => self.raw("FAST"),
            FetchItems::Items(attrs) => {
                if let [attr] = attrs.as_slice() {
                    return self.fetch_attribute(attr);
                }
                self.raw("(");
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        self.sp();
                    }
                    self.fetch_attribute(attr);
                }
                self.raw(")")
            }
        }
    }

    pub(crate) fn fetch_attribute(&mut self, attr: &FetchAttribute) -> &mut Self {
        match attr {
            FetchAttribute::Flags => self.raw("FLAGS"),
            FetchAttribute::InternalDate => self.raw("INTERNALDATE"),
            FetchAttribute::Rfc822Size => self.raw("RFC822.SIZE"),
            FetchAttribute::Envelope => self.raw("ENVELOPE"),
            FetchAttribute::BodyStructure => self.raw("BODYSTRUCTURE"),
            FetchAttribute::Uid => self.raw("UID"),
            FetchAttribute::Body {
                section,
                peek,
                partial,
            } => {
                self.raw(if *peek { "BODY.PEEK[" } else { "BODY[" });
                if let Some(s) = section {
                    self.raw(s);
                }
                self.raw("]");
                if let Some((offset, len)) = partial {
                    self.raw(&format!("<{offset}.{len}>"));
                }
                self
            }
        }
    }

    pub(crate) fn store_action(&mut self, action: &StoreAction, silent: bool) -> &mut Self {
        self.raw(action.keyword());
        if silent {
            self.raw(".SILENT");
        }
        self.sp().flag_list(action.flags())
    }

    pub(crate) fn finish(mut self) -> Vec<Segment> {
        self.text.put_slice(b"\r\n");
        let text = self.text.freeze();
        self.segments.push(Segment::Text(text));
        self.segments
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

    fn text(segments: &[Segment]) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(t) => out.extend_from_slice(t),
                Segment::Literal { data, .. } => {
                    out.extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    #[test]
    fn test_encoding_choice() {
        assert_eq!(encoding_for("INBOX"), Encoding::Atom);
        assert_eq!(encoding_for("[Gmail]/Sent"), Encoding::Atom);
        assert_eq!(encoding_for("My Folder"), Encoding::Quoted);
        assert_eq!(encoding_for(""), Encoding::Quoted);
        assert_eq!(encoding_for("a\"b"), Encoding::Quoted);
        assert_eq!(encoding_for("line\r\nbreak"), Encoding::Literal);
        assert_eq!(encoding_for("Entwürfe"), Encoding::Literal);
    }

    #[test]
    fn test_quoted_escapes() {
        let mut enc = Encoder::new("0001");
        enc.sp().raw("LOGIN").sp().astring("user").sp().astring("pa\"ss\\word");
        let segments = enc.finish();
        assert_eq!(text(&segments), b"0001 LOGIN user \"pa\\\"ss\\\\word\"\r\n");
    }

    #[test]
    fn test_literal_splits_segments() {
        let mut enc = Encoder::new("0002");
        enc.sp().raw("SELECT").sp().astring("Entwürfe");
        let segments = enc.finish();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text(Bytes::from_static(b"0002 SELECT ")));
        assert!(matches!(&segments[1], Segment::Literal { data, binary: false } if data.len() == 9));
        assert_eq!(segments[2], Segment::Text(Bytes::from_static(b"\r\n")));
    }

    #[test]
    fn test_fetch_partial_body() {
        let mut enc = Encoder::new("0003");
        enc.sp().fetch_items(&FetchItems::Items(vec![
            FetchAttribute::Rfc822Size,
            FetchAttribute::Body {
                section: None,
                peek: true,
                partial: Some((0, 16)),
            },
        ]));
        assert_eq!(text(&enc.finish()), b"0003 (RFC822.SIZE BODY.PEEK[]<0.16>)\r\n");
    }

    #[test]
    fn test_store_action() {
        let mut enc = Encoder::new("0004");
        enc.sp().store_action(&StoreAction::AddFlags(vec!["\\Deleted".to_string()]), true);
        assert_eq!(text(&enc.finish()), b"0004 +FLAGS.SILENT (\\Deleted)\r\n");
    }
}
