//! Mailbox selection state.

use super::ResponseCode;

/// State of the mailbox selected by SELECT or EXAMINE.
///
/// Counters are kept current by untagged responses as they arrive, whichever
/// command is outstanding at the time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxSelection {
    /// Mailbox name, as requested.
    pub name: String,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// First unseen message sequence number.
    pub unseen: Option<u32>,
    /// Flags defined for this mailbox.
    pub flags: Vec<String>,
    /// Flags that can be permanently stored.
    pub permanent_flags: Vec<String>,
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
}

impl MailboxSelection {
    /// Creates an empty context for a mailbox about to be selected.
    #[must_use]
    pub fn new(name: impl Into<String>, read_only: bool) -> Self {
        Self {
            name: name.into(),
            read_only,
            ..Self::default()
        }
    }

    /// Returns true if this context refers to `name` opened in the given mode.
    ///
    /// `INBOX` is matched case-insensitively, other names exactly.
    #[must_use]
    pub fn is_same(&self, name: &str, read_only: bool) -> bool {
        self.read_only == read_only && mailbox_names_equal(&self.name, name)
    }

    /// Applies a response code seen while this mailbox is selected.
    pub fn apply_code(&mut self, code: &ResponseCode) {
        match code {
            ResponseCode::UidValidity(v) => self.uid_validity = Some(*v),
            ResponseCode::UidNext(n) => self.uid_next = Some(*n),
            ResponseCode::Unseen(n) => self.unseen = Some(*n),
            ResponseCode::PermanentFlags(flags) => self.permanent_flags.clone_from(flags),
            ResponseCode::ReadOnly => self.read_only = true,
            ResponseCode::ReadWrite => self.read_only = false,
            _ => {}
        }
    }

    /// Applies an untagged EXPUNGE.
    pub const fn expunged(&mut self) {
        self.exists = self.exists.saturating_sub(1);
    }
}

/// Compares mailbox names, treating `INBOX` case-insensitively.
#[must_use]
pub fn mailbox_names_equal(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case("INBOX") {
        b.eq_ignore_ascii_case("INBOX")
    } else {
        a == b
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_same_inbox_case() {
        let selection = MailboxSelection::new("INBOX", false);
        assert!(selection.is_same("inbox", false));
        assert!(!selection.is_same("inbox", true));
    }

    #[test]
    fn test_is_same_other_names_exact() {
        let selection = MailboxSelection::new("Archive", true);
        assert!(selection.is_same("Archive", true));
        assert!(!selection.is_same("archive", true));
    }

    #[test]
    fn test_apply_code() {
        let mut selection = MailboxSelection::new("INBOX", false);
        selection.apply_code(&ResponseCode::UidValidity(42));
        selection.apply_code(&ResponseCode::ReadOnly);
        selection.apply_code(&ResponseCode::PermanentFlags(vec!["\\Seen".to_string()]));
        assert_eq!(selection.uid_validity, Some(42));
        assert!(selection.read_only);
        assert_eq!(selection.permanent_flags, vec!["\\Seen".to_string()]);
    }

    #[test]
    fn test_expunged_saturates() {
        let mut selection = MailboxSelection::new("INBOX", false);
        selection.expunged();
        assert_eq!(selection.exists, 0);
    }
}
