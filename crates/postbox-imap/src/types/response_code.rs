//! Response codes.

use std::fmt;

use super::CapabilitySet;

/// Bracketed response code attached to a status response.
///
/// These provide additional information about command completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY list sent inline.
    Capability(CapabilitySet),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<String>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// APPENDUID (UIDPLUS): UID assigned to an appended message.
    AppendUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u32,
        /// Assigned UID set, as sent.
        uids: String,
    },
    /// COPYUID (UIDPLUS): UIDs of copied messages.
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u32,
        /// Source UID set, as sent.
        source: String,
        /// Destination UID set, as sent.
        destination: String,
    },
    /// UIDNOTSTICKY (UIDPLUS).
    UidNotSticky,
    /// REFERRAL (RFC 2221) with the referred URL.
    Referral(String),
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED (RFC 5530).
    AuthorizationFailed,
    /// EXPIRED (RFC 5530).
    Expired,
    /// UNAVAILABLE (RFC 5530).
    Unavailable,
    /// INUSE (RFC 5530).
    InUse,
    /// NOTSAVED (RFC 5182): the search result variable was not set.
    NotSaved,
    /// Any other code, with its optional argument text.
    Other {
        /// Code keyword, as sent.
        name: String,
        /// Raw argument text.
        text: Option<String>,
    },
}

impl ResponseCode {
    /// Returns the wire keyword of this code.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::Capability(_) => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::AppendUid { .. } => "APPENDUID",
            Self::CopyUid { .. } => "COPYUID",
            Self::UidNotSticky => "UIDNOTSTICKY",
            Self::Referral(_) => "REFERRAL",
            Self::AuthenticationFailed => "AUTHENTICATIONFAILED",
            Self::AuthorizationFailed => "AUTHORIZATIONFAILED",
            Self::Expired => "EXPIRED",
            Self::Unavailable => "UNAVAILABLE",
            Self::InUse => "INUSE",
            Self::NotSaved => "NOTSAVED",
            Self::Other { name, .. } => name,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.keyword())?;
        match self {
            Self::Capability(caps) => {
                for cap in caps {
                    write!(f, " {cap}")?;
                }
            }
            Self::PermanentFlags(flags) => write!(f, " ({})", flags.join(" "))?,
            Self::UidNext(n) | Self::UidValidity(n) | Self::Unseen(n) => write!(f, " {n}")?,
            Self::AppendUid { uid_validity, uids } => write!(f, " {uid_validity} {uids}")?,
            Self::CopyUid {
                uid_validity,
                source,
                destination,
            } => write!(f, " {uid_validity} {source} {destination}")?,
            Self::Referral(url) => write!(f, " {url}")?,
            Self::Other {
                text: Some(text), ..
            } => write!(f, " {text}")?,
            _ => {}
        }
        f.write_str("]")
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

    #[test]
    fn keyword() {
        assert_eq!(ResponseCode::TryCreate.keyword(), "TRYCREATE");
        assert_eq!(ResponseCode::ReadOnly.keyword(), "READ-ONLY");
        let other = ResponseCode::Other {
            name: "X-GM-THING".to_string(),
            text: None,
        };
        assert_eq!(other.keyword(), "X-GM-THING");
    }

    #[test]
    fn display_with_arguments() {
        assert_eq!(ResponseCode::UidValidity(3857529045).to_string(), "[UIDVALIDITY 3857529045]");
        let caps: CapabilitySet = [Capability::IMAP4REV1, Capability::STARTTLS]
            .into_iter()
            .collect();
        assert_eq!(
            ResponseCode::Capability(caps).to_string(),
            "[CAPABILITY IMAP4rev1 STARTTLS]"
        );
        assert_eq!(
            ResponseCode::PermanentFlags(vec!["\\Seen".to_string(), "\\*".to_string()])
                .to_string(),
            "[PERMANENTFLAGS (\\Seen \\*)]"
        );
    }

    #[test]
    fn copy_uid() {
        let code = ResponseCode::CopyUid {
            uid_validity: 38505,
            source: "304,319:320".to_string(),
            destination: "3956:3958".to_string(),
        };
        assert_eq!(code.to_string(), "[COPYUID 38505 304,319:320 3956:3958]");
    }
}
