//! Mailbox selection.

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::connection::Transport;
use crate::types::{Capability, MailboxSelection};
use crate::{Error, Result};

use super::{Session, SessionState};

impl<S: Transport> Session<S> {
    /// Selects `name` with SELECT, or EXAMINE when `read_only`.
    ///
    /// Re-selecting the mailbox already open in the same mode only sends a
    /// NOOP to pick up pending updates. Selecting anything else first
    /// closes the current mailbox.
    ///
    /// # Errors
    ///
    /// `RequestCanceled` before authentication; `ProtocolError` if the
    /// server refuses, leaving the session authenticated with no mailbox.
    pub fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<&MailboxSelection> {
        if self.stream.is_none() {
            return Err(Self::not_connected());
        }
        if !self.state.is_authenticated() {
            return Err(Error::RequestCanceled(format!(
                "Cannot select a mailbox while {}",
                self.state
            )));
        }

        let same = self.state == SessionState::MailboxSelected
            && self
                .selection
                .as_ref()
                .is_some_and(|s| s.is_same(name, read_only));

        if same {
            debug!(mailbox = name, "mailbox already selected, probing with NOOP");
            self.execute(&Command::Noop)?;
        } else {
            if self.state == SessionState::MailboxSelected {
                self.close_mailbox_lenient()?;
            }
            self.open_mailbox(name, read_only)?;
        }

        self.selection
            .as_ref()
            .ok_or_else(|| Error::Unknown("Selection lost".to_string()))
    }

    fn open_mailbox(&mut self, name: &str, read_only: bool) -> Result<()> {
        let command = if read_only {
            Command::Examine {
                mailbox: name.to_string(),
            }
        } else {
            Command::Select {
                mailbox: name.to_string(),
            }
        };

        // Untagged data of the SELECT lands in the new context.
        self.selection = Some(MailboxSelection::new(name, read_only));
        match self.execute(&command) {
            Ok(_) => {
                self.state = SessionState::MailboxSelected;
                if let Some(selection) = &self.selection {
                    info!(
                        mailbox = name,
                        read_only = selection.read_only,
                        exists = selection.exists,
                        uid_validity = ?selection.uid_validity,
                        "mailbox selected"
                    );
                }
                Ok(())
            }
            Err(e) => {
                self.selection = None;
                if self.state == SessionState::MailboxSelected {
                    self.state = SessionState::Authenticated;
                }
                Err(e)
            }
        }
    }

    /// CLOSE during a switch; a refusal is logged and the switch goes on.
    fn close_mailbox_lenient(&mut self) -> Result<()> {
        match self.close_mailbox() {
            Ok(()) => Ok(()),
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "CLOSE failed, selecting anyway");
                self.selection = None;
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Closes the selected mailbox with CLOSE, expunging deleted messages
    /// unless it was opened read-only.
    ///
    /// # Errors
    ///
    /// `RequestCanceled` when no mailbox is selected.
    pub fn close_mailbox(&mut self) -> Result<()> {
        self.execute(&Command::Close)?;
        self.selection = None;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Leaves the selected mailbox without expunging (UNSELECT).
    ///
    /// # Errors
    ///
    /// `Unsupported` if the server does not advertise UNSELECT.
    pub fn unselect_mailbox(&mut self) -> Result<()> {
        if !self.capabilities.contains(&Capability::UNSELECT) {
            return Err(Error::Unsupported(
                "Server does not advertise UNSELECT".to_string(),
            ));
        }
        self.execute(&Command::Unselect)?;
        self.selection = None;
        self.state = SessionState::Authenticated;
        Ok(())
    }
}
