//! IMAP command builder.
//!
//! A [`Command`] is rendered against a tag into a [`CommandLine`], the
//! segment list the transport writes.

mod serialize;
mod tag_generator;
mod types;

use bytes::Bytes;

use crate::types::SequenceSet;

pub use serialize::Segment;
pub use tag_generator::TagGenerator;
pub use types::{Argument, FetchAttribute, FetchItems, SearchCriteria, StoreAction};

use serialize::Encoder;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// ID command (RFC 2971). `None` sends `ID NIL`.
    Id {
        /// Client identification field/value pairs.
        parameters: Option<Vec<(String, String)>>,
    },

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Base64 initial response (SASL-IR); `=` for an empty one.
        initial_response: Option<String>,
    },

    // Authenticated State Commands
    /// NAMESPACE command.
    Namespace,
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Status items to request, e.g. `MESSAGES`.
        items: Vec<String>,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Flags to set.
        flags: Vec<String>,
        /// Message data.
        message: Bytes,
        /// Send the message as literal8 (BINARY).
        binary: bool,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// UNSELECT command.
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (UIDPLUS).
    UidExpunge {
        /// UIDs to expunge.
        uids: SequenceSet,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Charset, when criteria carry non-ASCII text.
        charset: Option<String>,
        /// Save the result as `$` (SEARCHRES).
        save: bool,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: SequenceSet,
        /// Items to fetch.
        items: FetchItems,
    },
    /// STORE command.
    Store {
        /// Sequence set.
        sequence: SequenceSet,
        /// Store action.
        action: StoreAction,
        /// Silent mode (no FETCH response).
        silent: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: SequenceSet,
        /// Target mailbox.
        mailbox: String,
    },
    /// SORT command (RFC 5256).
    Sort {
        /// Sort criteria, e.g. `REVERSE DATE`.
        criteria: Vec<String>,
        /// Charset of the search criteria.
        charset: String,
        /// Search criteria.
        search: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// THREAD command (RFC 5256).
    Thread {
        /// Threading algorithm.
        algorithm: String,
        /// Charset of the search criteria.
        charset: String,
        /// Search criteria.
        search: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// Any other command, sent as verb plus arguments.
    Raw {
        /// Command verb, e.g. `GETQUOTAROOT`.
        verb: String,
        /// Arguments.
        arguments: Vec<Argument>,
    },
}

/// A command rendered against its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// The command tag.
    pub tag: String,
    /// Verb, for logging.
    pub verb: String,
    /// Wire segments.
    pub segments: Vec<Segment>,
    /// Arguments must not be logged.
    pub sensitive: bool,
}

impl CommandLine {
    /// Returns true if any segment is a literal.
    #[must_use]
    pub fn has_literals(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Literal { .. }))
    }

    /// Returns true if any segment is a literal8.
    #[must_use]
    pub fn has_binary_literals(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Literal { binary: true, .. }))
    }
}

fn uid_prefix(uid: bool) -> &'static str {
    if uid { "UID " } else { "" }
}

impl Command {
    /// Returns the command verb as sent on the wire.
    #[must_use]
    pub fn verb(&self) -> String {
        let verb = match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Id { .. } => "ID",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Namespace => "NAMESPACE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::List { .. } => "LIST",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid, .. } => return format!("{}SEARCH", uid_prefix(*uid)),
            Self::Fetch { sequence, .. } => {
                return format!("{}FETCH", uid_prefix(sequence.is_uid()));
            }
            Self::Store { sequence, .. } => {
                return format!("{}STORE", uid_prefix(sequence.is_uid()));
            }
            Self::Copy { sequence, .. } => {
                return format!("{}COPY", uid_prefix(sequence.is_uid()));
            }
            Self::Sort { uid, .. } => return format!("{}SORT", uid_prefix(*uid)),
            Self::Thread { uid, .. } => return format!("{}THREAD", uid_prefix(*uid)),
            Self::Raw { verb, .. } => verb.as_str(),
        };
        verb.to_string()
    }

    /// Returns true if the command carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Renders the command with the given tag.
    #[must_use]
    pub fn to_line(&self, tag: &str) -> CommandLine {
        let verb = self.verb();
        let mut enc = Encoder::new(tag);
        enc.sp().raw(&verb);

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Close
            | Self::Unselect
            | Self::Expunge => {}

            Self::Id { parameters } => {
                enc.sp();
                match parameters {
                    Some(params) => {
                        enc.raw("(");
                        for (i, (key, value)) in params.iter().enumerate() {
                            if i > 0 {
                                enc.sp();
                            }
                            enc.astring(key).sp().astring(value);
                        }
                        enc.raw(")");
                    }
                    None => {
                        enc.raw("NIL");
                    }
                }
            }

            Self::Login { username, password } => {
                enc.sp().astring(username).sp().astring(password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                enc.sp().raw(mechanism);
                if let Some(resp) = initial_response {
                    enc.sp().raw(resp);
                }
            }

            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox } => {
                enc.sp().astring(mailbox);
            }

            Self::List { reference, pattern } => {
                enc.sp().astring(reference).sp().astring(pattern);
            }

            Self::Status { mailbox, items } => {
                enc.sp().astring(mailbox).sp().raw("(").raw(&items.join(" ")).raw(")");
            }

            Self::Append {
                mailbox,
                flags,
                message,
                binary,
            } => {
                enc.sp().astring(mailbox).sp();
                if !flags.is_empty() {
                    enc.flag_list(flags).sp();
                }
                enc.literal(message.clone(), *binary);
            }

            Self::UidExpunge { uids } => {
                enc.sp().raw(&uids.to_string());
            }

            Self::Search {
                criteria,
                charset,
                save,
                ..
            } => {
                if *save {
                    enc.sp().raw("RETURN (SAVE)");
                }
                if let Some(charset) = charset {
                    enc.sp().raw("CHARSET").sp().astring(charset);
                }
                enc.sp().arguments(criteria.arguments());
            }

            Self::Fetch { sequence, items } => {
                enc.sp().raw(&sequence.to_string()).sp().fetch_items(items);
            }

            Self::Store {
                sequence,
                action,
                silent,
            } => {
                enc.sp()
                    .raw(&sequence.to_string())
                    .sp()
                    .store_action(action, *silent);
            }

            Self::Copy { sequence, mailbox } => {
                enc.sp().raw(&sequence.to_string()).sp().astring(mailbox);
            }

            Self::Sort {
                criteria,
                charset,
                search,
                ..
            } => {
                enc.sp()
                    .raw("(")
                    .raw(&criteria.join(" "))
                    .raw(")")
                    .sp()
                    .astring(charset)
                    .sp()
                    .arguments(search.arguments());
            }

            Self::Thread {
                algorithm,
                charset,
                search,
                ..
            } => {
                enc.sp()
                    .raw(algorithm)
                    .sp()
                    .astring(charset)
                    .sp()
                    .arguments(search.arguments());
            }

            Self::Raw { arguments, .. } => {
                if !arguments.is_empty() {
                    enc.sp().arguments(arguments);
                }
            }
        }

        CommandLine {
            tag: tag.to_string(),
            verb,
            segments: enc.finish(),
            sensitive: self.is_sensitive(),
        }
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

    fn render(command: &Command, tag: &str) -> String {
        let line = command.to_line(tag);
        let mut out = String::new();
        for segment in &line.segments {
            match segment {
                Segment::Text(t) => out.push_str(std::str::from_utf8(t).unwrap()),
                Segment::Literal { data, binary } => {
                    let prefix = if *binary { "~" } else { "" };
                    out.push_str(&format!("{prefix}{{{}}}\r\n", data.len()));
                    out.push_str(&String::from_utf8_lossy(data));
                }
            }
        }
        out
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(render(&Command::Capability, "0000"), "0000 CAPABILITY\r\n");
        assert_eq!(render(&Command::Noop, "000a"), "000a NOOP\r\n");
        assert_eq!(render(&Command::Close, "0001"), "0001 CLOSE\r\n");
    }

    #[test]
    fn test_select_quotes_mailbox() {
        let cmd = Command::Examine {
            mailbox: "Sent Items".to_string(),
        };
        assert_eq!(render(&cmd, "0002"), "0002 EXAMINE \"Sent Items\"\r\n");
    }

    #[test]
    fn test_uid_fetch() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::uid_single(1).unwrap(),
            items: FetchItems::Items(vec![
                FetchAttribute::Rfc822Size,
                FetchAttribute::Body {
                    section: None,
                    peek: true,
                    partial: Some((16, 16)),
                },
            ]),
        };
        assert_eq!(
            render(&cmd, "0003"),
            "0003 UID FETCH 1 (RFC822.SIZE BODY.PEEK[]<16.16>)\r\n"
        );
    }

    #[test]
    fn test_search_save_with_charset() {
        let cmd = Command::Search {
            criteria: SearchCriteria::default().key("UNSEEN").with_value("FROM", "alice"),
            charset: Some("UTF-8".to_string()),
            save: true,
            uid: true,
        };
        assert_eq!(
            render(&cmd, "0004"),
            "0004 UID SEARCH RETURN (SAVE) CHARSET UTF-8 UNSEEN FROM alice\r\n"
        );
    }

    #[test]
    fn test_append_literal() {
        let cmd = Command::Append {
            mailbox: "INBOX".to_string(),
            flags: vec!["\\Seen".to_string()],
            message: Bytes::from_static(b"Subject: hi\r\n\r\nbody"),
            binary: false,
        };
        let line = cmd.to_line("0005");
        assert!(line.has_literals());
        assert!(!line.has_binary_literals());
        assert_eq!(
            render(&cmd, "0005"),
            "0005 APPEND INBOX (\\Seen) {19}\r\nSubject: hi\r\n\r\nbody\r\n"
        );
    }

    #[test]
    fn test_login_is_sensitive() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        let line = cmd.to_line("0006");
        assert!(line.sensitive);
        assert_eq!(line.verb, "LOGIN");
    }

    #[test]
    fn test_copy_uses_saved_result() {
        let cmd = Command::Copy {
            sequence: SequenceSet::uid_saved_result(),
            mailbox: "Archive".to_string(),
        };
        assert_eq!(render(&cmd, "0007"), "0007 UID COPY $ Archive\r\n");
    }

    #[test]
    fn test_raw_command() {
        let cmd = Command::Raw {
            verb: "GETQUOTAROOT".to_string(),
            arguments: vec![Argument::astring("INBOX")],
        };
        assert_eq!(render(&cmd, "0008"), "0008 GETQUOTAROOT INBOX\r\n");
    }

    #[test]
    fn test_id_nil() {
        assert_eq!(render(&Command::Id { parameters: None }, "0009"), "0009 ID NIL\r\n");
    }
}
