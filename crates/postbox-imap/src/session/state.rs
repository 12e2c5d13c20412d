//! Session states.

use std::fmt;

use crate::command::Command;

/// Lifecycle state of a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport attached, waiting for the server greeting. The connect
    /// itself happens in [`Session::connect`](super::Session::connect)
    /// before a session exists.
    AwaitingGreeting,
    /// Learning what the server supports.
    NegotiatingCapabilities,
    /// STARTTLS in progress.
    UpgradingTls,
    /// Credentials exchange in progress.
    Authenticating,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    MailboxSelected,
    /// LOGOUT sent.
    LoggingOut,
}

impl SessionState {
    /// Returns true once the session has logged in.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::MailboxSelected)
    }

    /// Returns true while a transport is attached.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns true if `command` may be sent in this state.
    #[must_use]
    pub const fn permits(self, command: &Command) -> bool {
        match command {
            Command::Capability | Command::Noop | Command::Id { .. } | Command::Raw { .. } => {
                matches!(
                    self,
                    Self::NegotiatingCapabilities
                        | Self::UpgradingTls
                        | Self::Authenticating
                        | Self::Authenticated
                        | Self::MailboxSelected
                )
            }
            Command::Logout => self.is_connected() && !matches!(self, Self::AwaitingGreeting),
            Command::StartTls => matches!(self, Self::UpgradingTls),
            Command::Login { .. } | Command::Authenticate { .. } => {
                matches!(self, Self::Authenticating)
            }
            Command::Namespace
            | Command::Select { .. }
            | Command::Examine { .. }
            | Command::Create { .. }
            | Command::Delete { .. }
            | Command::List { .. }
            | Command::Status { .. }
            | Command::Append { .. } => self.is_authenticated(),
            Command::Close
            | Command::Unselect
            | Command::Expunge
            | Command::UidExpunge { .. }
            | Command::Search { .. }
            | Command::Fetch { .. }
            | Command::Store { .. }
            | Command::Copy { .. }
            | Command::Sort { .. }
            | Command::Thread { .. } => matches!(self, Self::MailboxSelected),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingGreeting => "awaiting greeting",
            Self::NegotiatingCapabilities => "negotiating capabilities",
            Self::UpgradingTls => "upgrading to TLS",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::MailboxSelected => "mailbox selected",
            Self::LoggingOut => "logging out",
        };
        f.write_str(name)
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
    use crate::command::{FetchItems, SearchCriteria};
    use crate::types::SequenceSet;

    #[test]
    fn test_fetch_requires_selection() {
        let fetch = Command::Fetch {
            sequence: SequenceSet::all(),
            items: FetchItems::Fast,
        };
        assert!(!SessionState::Authenticated.permits(&fetch));
        assert!(SessionState::MailboxSelected.permits(&fetch));
    }

    #[test]
    fn test_select_requires_authentication() {
        let select = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert!(!SessionState::Authenticating.permits(&select));
        assert!(SessionState::Authenticated.permits(&select));
        assert!(SessionState::MailboxSelected.permits(&select));
    }

    #[test]
    fn test_login_only_while_authenticating() {
        let login = Command::Login {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(SessionState::Authenticating.permits(&login));
        assert!(!SessionState::Authenticated.permits(&login));
    }

    #[test]
    fn test_nothing_permitted_when_disconnected() {
        for command in [
            Command::Noop,
            Command::Logout,
            Command::Search {
                criteria: SearchCriteria::all(),
                charset: None,
                save: false,
                uid: false,
            },
        ] {
            assert!(!SessionState::Disconnected.permits(&command));
        }
    }

    #[test]
    fn test_logout_permitted_while_logging_out() {
        assert!(SessionState::LoggingOut.permits(&Command::Logout));
        assert!(!SessionState::LoggingOut.permits(&Command::Noop));
    }

    #[test]
    fn test_connected_until_disconnected() {
        assert!(SessionState::AwaitingGreeting.is_connected());
        assert!(SessionState::LoggingOut.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::MailboxSelected.to_string(), "mailbox selected");
    }
}
