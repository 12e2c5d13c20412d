//! Parsed server data.

use bytes::Bytes;

use crate::types::{CapabilitySet, ResponseCode, Status};

/// Untagged server data.
///
/// The kinds the session engine acts on are decoded; everything else is
/// carried as [`UntaggedResponse::Other`] with its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`.
    Condition {
        /// Status keyword.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(CapabilitySet),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* n EXPUNGE`.
    Expunge(u32),
    /// `* n FETCH (...)`.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Decoded data items.
        items: Vec<FetchItem>,
    },
    /// `* SEARCH ...`.
    Search(Vec<u32>),
    /// `* SORT ...`.
    Sort(Vec<u32>),
    /// `* FLAGS (...)`.
    Flags(Vec<String>),
    /// LIST, STATUS, NAMESPACE, ID, THREAD, ESEARCH and anything unknown.
    Other {
        /// Response keyword, upper-cased.
        keyword: String,
        /// Leading message number, for `* n KEYWORD` forms.
        number: Option<u32>,
        /// Remaining bytes after the keyword, without the trailing CRLF.
        raw: Bytes,
    },
}

impl UntaggedResponse {
    /// Returns the response keyword.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Condition { status, .. } => status.as_str(),
            Self::Capability(_) => "CAPABILITY",
            Self::Exists(_) => "EXISTS",
            Self::Recent(_) => "RECENT",
            Self::Expunge(_) => "EXPUNGE",
            Self::Fetch { .. } => "FETCH",
            Self::Search(_) => "SEARCH",
            Self::Sort(_) => "SORT",
            Self::Flags(_) => "FLAGS",
            Self::Other { keyword, .. } => keyword,
        }
    }
}

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// UID.
    Uid(u32),
    /// RFC822.SIZE.
    Rfc822Size(u64),
    /// FLAGS.
    Flags(Vec<String>),
    /// `BODY[section]<origin>` or `BINARY[section]<origin>` payload.
    Body {
        /// Section specifier between the brackets, upper-cased.
        section: String,
        /// Partial origin, when the server echoed one.
        origin: Option<u64>,
        /// Payload; `None` for NIL.
        data: Option<Bytes>,
    },
    /// Any other item (ENVELOPE, BODYSTRUCTURE, INTERNALDATE, ...).
    Other {
        /// Item name, upper-cased.
        name: String,
        /// Raw value bytes.
        raw: Bytes,
    },
}
