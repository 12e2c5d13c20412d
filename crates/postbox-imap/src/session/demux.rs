//! Command issuance and response demultiplexing.
//!
//! Exactly one command is outstanding at a time. Untagged data is applied to
//! session state as it arrives and collected for that command; its tagged
//! completion ends the exchange.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::command::{Command, CommandLine, Segment};
use crate::connection::{LiteralMode, Transport};
use crate::parser::{FetchItem, Response, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

use super::Session;

/// Handle for an issued command; redeem it with [`Session::complete`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending command must be completed"]
pub struct PendingCommand {
    tag: String,
    verb: String,
}

impl PendingCommand {
    /// The command tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The command verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }
}

/// Tagged completion status, code and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Completion {
    status: Status,
    code: Option<ResponseCode>,
    text: String,
}

/// Result of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The command tag.
    pub tag: String,
    /// Completion status.
    pub status: Status,
    /// Response code of the tagged completion.
    pub code: Option<ResponseCode>,
    /// Text of the tagged completion.
    pub text: String,
    /// Untagged data received while the command was outstanding.
    pub responses: Vec<UntaggedResponse>,
}

impl CommandOutcome {
    /// Returns true if the command completed with `OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Converts a `NO`/`BAD` completion into [`Error::Protocol`].
    ///
    /// # Errors
    ///
    /// Returns the protocol error for any non-`OK` status.
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Protocol {
                status: self.status,
                code: self.code,
                text: self.text,
            })
        }
    }

    /// Numbers from SEARCH responses.
    #[must_use]
    pub fn search_results(&self) -> Vec<u32> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Search(n) => Some(n.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Numbers from SORT responses.
    #[must_use]
    pub fn sort_results(&self) -> Vec<u32> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Sort(n) => Some(n.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// FETCH responses as `(sequence number, items)`.
    pub fn fetches(&self) -> impl Iterator<Item = (u32, &[FetchItem])> {
        self.responses.iter().filter_map(|r| match r {
            UntaggedResponse::Fetch { seq, items } => Some((*seq, items.as_slice())),
            _ => None,
        })
    }

    /// Raw bytes of untagged responses with the given keyword.
    pub fn raw<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Bytes> + 'a {
        self.responses.iter().filter_map(move |r| match r {
            UntaggedResponse::Other { keyword: k, raw, .. } if k.eq_ignore_ascii_case(keyword) => {
                Some(raw)
            }
            _ => None,
        })
    }
}

impl<S: Transport> Session<S> {
    /// Sends `command` and returns a handle for its completion.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if another command is pending or the session is
    ///   disconnected; nothing is sent.
    /// - `RequestCanceled` if the current state does not permit the command.
    /// - `Unsupported` if the command needs a literal form the server lacks.
    pub fn issue(&mut self, command: &Command) -> Result<PendingCommand> {
        if let Some(tag) = &self.pending {
            return Err(Error::InvalidOperation(format!(
                "Command {tag} is still pending"
            )));
        }
        if self.stream.is_none() {
            return Err(Self::not_connected());
        }
        if self.closing {
            self.teardown();
            return Err(Error::connect("Server closed the connection"));
        }
        if !self.state.permits(command) {
            return Err(Error::RequestCanceled(format!(
                "{} is not permitted while {}",
                command.verb(),
                self.state
            )));
        }

        let tag = self.tags.next_tag();
        let line = command.to_line(&tag);
        self.check_literals(&line)?;

        debug!(tag = %line.tag, verb = %line.verb, "sending command");
        self.pending = Some(tag.clone());
        let result = self.write_command(&line);
        self.guard(result)?;

        Ok(PendingCommand {
            tag,
            verb: line.verb,
        })
    }

    /// Waits for the tagged completion of `pending`.
    ///
    /// A `NO` or `BAD` completion is returned as an outcome, not an error;
    /// see [`CommandOutcome::into_result`].
    ///
    /// # Errors
    ///
    /// Transport failures, malformed data, an unexpected continuation, or a
    /// completion carrying a different tag. All of these tear the session
    /// down.
    pub fn complete(&mut self, pending: PendingCommand) -> Result<CommandOutcome> {
        self.complete_with(pending, |text| {
            Err(Error::Unknown(format!("Unexpected continuation request: {text}")))
        })
    }

    /// Issues `command`, waits for completion and converts `NO`/`BAD` into
    /// [`Error::Protocol`].
    ///
    /// # Errors
    ///
    /// As for [`issue`](Self::issue), [`complete`](Self::complete) and
    /// [`CommandOutcome::into_result`].
    pub fn execute(&mut self, command: &Command) -> Result<CommandOutcome> {
        let pending = self.issue(command)?;
        self.complete(pending)?.into_result()
    }

    /// Like [`complete`](Self::complete), answering each continuation request
    /// with the line `on_continuation` returns.
    pub(crate) fn complete_with<F>(
        &mut self,
        pending: PendingCommand,
        mut on_continuation: F,
    ) -> Result<CommandOutcome>
    where
        F: FnMut(&str) -> Result<String>,
    {
        if self.pending.as_deref() != Some(pending.tag.as_str()) {
            return Err(Error::InvalidOperation(format!(
                "Command {} is not the outstanding command",
                pending.tag
            )));
        }

        let result = self.await_completion(&pending.tag, &mut on_continuation);
        let completion = self.guard(result)?;

        self.pending = None;
        if let Some(code) = &completion.code {
            self.apply_code(code);
        }
        if completion.status != Status::Ok {
            debug!(tag = %pending.tag, status = %completion.status, text = %completion.text, "command failed");
        }

        Ok(CommandOutcome {
            tag: pending.tag,
            status: completion.status,
            code: completion.code,
            text: completion.text,
            responses: std::mem::take(&mut self.collected),
        })
    }

    fn await_completion(
        &mut self,
        tag: &str,
        on_continuation: &mut dyn FnMut(&str) -> Result<String>,
    ) -> Result<Completion> {
        if let Some(completion) = self.early_completion.take() {
            return Ok(completion);
        }

        loop {
            match self.read_response()? {
                Response::Untagged(response) => self.accept_untagged(response),
                Response::Continuation { text } => {
                    let reply = on_continuation(&text)?;
                    let framed = self.stream.as_mut().ok_or_else(Self::not_connected)?;
                    framed.write(reply.as_bytes());
                    framed.write(b"\r\n");
                    framed.flush()?;
                }
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } => {
                    if got != tag {
                        return Err(Error::Unknown(format!(
                            "Completion for unknown tag {got} while {tag} is outstanding"
                        )));
                    }
                    return Ok(Completion { status, code, text });
                }
            }
        }
    }

    fn check_literals(&self, line: &CommandLine) -> Result<()> {
        if line.has_binary_literals() && !self.capabilities.contains(&Capability::BINARY) {
            return Err(Error::Unsupported(format!(
                "{} needs literal8 but the server does not advertise BINARY",
                line.verb
            )));
        }
        if line.has_literals()
            && self.config.literal_mode == LiteralMode::RequireNonSynchronizing
            && !self.capabilities.contains(&Capability::LITERAL_PLUS)
        {
            return Err(Error::Unsupported(format!(
                "{} needs a literal but the server does not advertise LITERAL+",
                line.verb
            )));
        }
        Ok(())
    }

    fn non_synchronizing(&self) -> bool {
        self.config.literal_mode != LiteralMode::Synchronizing
            && self.capabilities.contains(&Capability::LITERAL_PLUS)
    }

    fn write_command(&mut self, line: &CommandLine) -> Result<()> {
        let non_sync = self.non_synchronizing();

        for segment in &line.segments {
            let framed = self.stream.as_mut().ok_or_else(Self::not_connected)?;
            match segment {
                Segment::Text(text) => framed.write(text),
                Segment::Literal { data, binary } => {
                    let header = format!(
                        "{}{{{}{}}}\r\n",
                        if *binary { "~" } else { "" },
                        data.len(),
                        if non_sync { "+" } else { "" }
                    );
                    framed.write(header.as_bytes());
                    if !non_sync {
                        framed.flush()?;
                        if !self.await_continuation(&line.tag)? {
                            return Ok(());
                        }
                    }
                    trace!(len = data.len(), "literal");
                    let framed = self.stream.as_mut().ok_or_else(Self::not_connected)?;
                    framed.write(data);
                }
            }
        }

        let framed = self.stream.as_mut().ok_or_else(Self::not_connected)?;
        framed.flush()
    }

    /// Waits for `+` after a synchronising literal announcement. Returns
    /// false if the command completed instead.
    fn await_continuation(&mut self, tag: &str) -> Result<bool> {
        loop {
            match self.read_response()? {
                Response::Continuation { .. } => return Ok(true),
                Response::Untagged(response) => self.accept_untagged(response),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    self.early_completion = Some(Completion { status, code, text });
                    return Ok(false);
                }
                Response::Tagged { tag: got, .. } => {
                    return Err(Error::Unknown(format!(
                        "Completion for unknown tag {got} while {tag} is outstanding"
                    )));
                }
            }
        }
    }

    /// Tears the session down on fatal errors.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(error = %e, "aborting session");
                self.teardown();
            }
        }
        result
    }

    fn accept_untagged(&mut self, response: UntaggedResponse) {
        self.apply_untagged(&response);
        self.collected.push(response);
    }

    /// Applies untagged data to session and mailbox state.
    fn apply_untagged(&mut self, response: &UntaggedResponse) {
        match response {
            UntaggedResponse::Condition { status, code, text } => {
                if let Some(code) = code {
                    if matches!(code, ResponseCode::Alert) {
                        warn!(alert = %text, "server alert");
                    }
                    self.apply_code(code);
                }
                if *status == Status::Bye {
                    info!(text = %text, "server is closing the connection");
                    self.closing = true;
                }
            }
            UntaggedResponse::Capability(caps) => self.capabilities = caps.clone(),
            UntaggedResponse::Exists(n) => {
                if let Some(selection) = self.selection.as_mut() {
                    selection.exists = *n;
                }
            }
            UntaggedResponse::Recent(n) => {
                if let Some(selection) = self.selection.as_mut() {
                    selection.recent = *n;
                }
            }
            UntaggedResponse::Expunge(_) => {
                if let Some(selection) = self.selection.as_mut() {
                    selection.expunged();
                }
            }
            UntaggedResponse::Flags(flags) => {
                if let Some(selection) = self.selection.as_mut() {
                    selection.flags.clone_from(flags);
                }
            }
            UntaggedResponse::Fetch { .. }
            | UntaggedResponse::Search(_)
            | UntaggedResponse::Sort(_)
            | UntaggedResponse::Other { .. } => {}
        }
    }

    fn apply_code(&mut self, code: &ResponseCode) {
        match code {
            ResponseCode::Capability(caps) => self.capabilities = caps.clone(),
            _ => {
                if let Some(selection) = self.selection.as_mut() {
                    selection.apply_code(code);
                }
            }
        }
    }
}
