//! Command-related type definitions.

use bytes::Bytes;

use crate::types::SequenceSet;

/// A single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Sent verbatim.
    Atom(String),
    /// Sent as an atom, quoted string or literal, whichever the content allows.
    AString(String),
    /// Always sent as a literal.
    Literal(Bytes),
    /// Sent as a `~{n}` literal (requires the BINARY capability).
    Literal8(Bytes),
    /// A sequence set, rendered compactly.
    Sequence(SequenceSet),
    /// Parenthesised list of arguments.
    List(Vec<Argument>),
    /// `NIL`.
    Nil,
}

impl Argument {
    /// Verbatim atom argument.
    #[must_use]
    pub fn atom(s: impl Into<String>) -> Self {
        Self::Atom(s.into())
    }

    /// String argument, encoded as needed.
    #[must_use]
    pub fn astring(s: impl Into<String>) -> Self {
        Self::AString(s.into())
    }

    pub(crate) fn contains_literal(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Literal8(_) => true,
            Self::AString(s) => super::serialize::encoding_for(s).is_literal(),
            Self::List(items) => items.iter().any(Self::contains_literal),
            Self::Atom(_) | Self::Sequence(_) | Self::Nil => false,
        }
    }
}

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// `ALL` macro (FLAGS INTERNALDATE RFC822.SIZE ENVELOPE).
    All,
    /// `FULL` macro (ALL plus BODY).
    Full,
    /// `FAST` macro (FLAGS INTERNALDATE RFC822.SIZE).
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier; `None` addresses the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial range as `(offset, length)`.
        partial: Option<(u64, u64)>,
    },
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<String>),
    /// Add flags.
    AddFlags(Vec<String>),
    /// Remove flags.
    RemoveFlags(Vec<String>),
}

impl StoreAction {
    pub(crate) const fn keyword(&self) -> &'static str {
        match self {
            Self::SetFlags(_) => "FLAGS",
            Self::AddFlags(_) => "+FLAGS",
            Self::RemoveFlags(_) => "-FLAGS",
        }
    }

    pub(crate) fn flags(&self) -> &[String] {
        match self {
            Self::SetFlags(f) | Self::AddFlags(f) | Self::RemoveFlags(f) => f,
        }
    }
}

/// SEARCH criteria, kept as a flat argument list.
///
/// String values are encoded per argument, so criteria with 8-bit text are
/// sent as literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    keys: Vec<Argument>,
}

impl SearchCriteria {
    /// Matches every message.
    #[must_use]
    pub fn all() -> Self {
        Self::default().key("ALL")
    }

    /// Appends a bare search key such as `SEEN` or `DELETED`.
    #[must_use]
    pub fn key(mut self, key: &str) -> Self {
        self.keys.push(Argument::atom(key));
        self
    }

    /// Appends a key taking a string value, e.g. `SUBJECT "hello"`.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.keys.push(Argument::atom(key));
        self.keys.push(Argument::astring(value));
        self
    }

    /// Appends `HEADER <field> <value>`.
    #[must_use]
    pub fn header(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.push(Argument::atom("HEADER"));
        self.keys.push(Argument::astring(field));
        self.keys.push(Argument::astring(value));
        self
    }

    /// Restricts to a UID set.
    #[must_use]
    pub fn uid(mut self, set: SequenceSet) -> Self {
        self.keys.push(Argument::atom("UID"));
        self.keys.push(Argument::Sequence(set));
        self
    }

    /// Restricts to a sequence set (`$` included).
    #[must_use]
    pub fn sequence(mut self, set: SequenceSet) -> Self {
        self.keys.push(Argument::Sequence(set));
        self
    }

    /// Appends messages newer than the given RFC 3501 date (`1-Feb-2024`).
    #[must_use]
    pub fn since(self, date: &str) -> Self {
        self.key("SINCE").key(date)
    }

    /// Returns true if any key has to be sent as a literal.
    #[must_use]
    pub fn requires_literal(&self) -> bool {
        self.keys.iter().any(Argument::contains_literal)
    }

    pub(crate) fn arguments(&self) -> &[Argument] {
        &self.keys
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_literal() {
        let ascii = SearchCriteria::all().with_value("SUBJECT", "weekly report");
        assert!(!ascii.requires_literal());

        let utf8 = SearchCriteria::default().with_value("SUBJECT", "Wochenbericht für März");
        assert!(utf8.requires_literal());
    }

    #[test]
    fn test_store_action_keyword() {
        let action = StoreAction::AddFlags(vec!["\\Seen".to_string()]);
        assert_eq!(action.keyword(), "+FLAGS");
        assert_eq!(action.flags(), ["\\Seen".to_string()]);
    }
}
