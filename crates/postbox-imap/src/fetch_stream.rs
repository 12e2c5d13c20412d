//! Block-wise reading of large message bodies.
//!
//! [`PartialFetchStream`] exposes one body section as [`Read`] + [`Seek`],
//! fetching it in fixed-size `BODY[section]<offset.size>` blocks so that only
//! one block is held in memory.

use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::command::{Command, FetchAttribute, FetchItems};
use crate::connection::{ImapStream, Transport};
use crate::parser::FetchItem;
use crate::session::Session;
use crate::types::{SequenceSet, Status};
use crate::{Error, ErrorKind, Result};

/// Reads one body section of one message in blocks.
///
/// The stream exclusively borrows its session; no other command can be
/// issued until it is dropped or closed.
pub struct PartialFetchStream<'a, S: Transport = ImapStream> {
    session: &'a mut Session<S>,
    message: SequenceSet,
    section: Option<String>,
    block_size: u32,
    peek: bool,
    uid_validity: Option<u32>,
    position: u64,
    block_start: u64,
    block: Bytes,
    known_length: Option<u64>,
    size_requested: bool,
}

impl<S: Transport> std::fmt::Debug for PartialFetchStream<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialFetchStream")
            .field("message", &self.message.to_string())
            .field("section", &self.section)
            .field("position", &self.position)
            .field("known_length", &self.known_length)
            .finish_non_exhaustive()
    }
}

impl<S: Transport> Session<S> {
    /// Opens a stream over `BODY[section]` of one message in the selected
    /// mailbox. `None` addresses the whole message.
    ///
    /// `message` must denote a single sequence number or UID; a UID set
    /// makes the stream use `UID FETCH`. Block size and peek come from the
    /// session configuration.
    ///
    /// # Errors
    ///
    /// `RequestCanceled` without a selected mailbox, `InvalidArgument` if
    /// `message` is not a single number.
    pub fn open_fetch_stream(
        &mut self,
        message: &SequenceSet,
        section: Option<&str>,
    ) -> Result<PartialFetchStream<'_, S>> {
        if self.selection().is_none() {
            return Err(Error::RequestCanceled(
                "No mailbox is selected".to_string(),
            ));
        }
        if message.to_number().is_err() {
            return Err(Error::InvalidArgument(format!(
                "'{message}' does not address a single message"
            )));
        }
        let block_size = self.config().fetch_block_size.max(1);
        let peek = self.config().fetch_peek;
        Ok(PartialFetchStream {
            session: self,
            message: message.clone(),
            section: section.filter(|s| !s.is_empty()).map(str::to_string),
            block_size,
            peek,
            uid_validity: None,
            position: 0,
            block_start: 0,
            block: Bytes::new(),
            known_length: None,
            size_requested: false,
        })
    }
}

impl<'a, S: Transport> PartialFetchStream<'a, S> {
    /// Pins the UIDVALIDITY the message address belongs to. Every block
    /// fetch then fails with `RequestCanceled` if the selected mailbox
    /// reports a different one.
    #[must_use]
    pub const fn with_uid_validity(mut self, uid_validity: u32) -> Self {
        self.uid_validity = Some(uid_validity);
        self
    }

    /// Overrides the configured block size.
    #[must_use]
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Total length, once the server has revealed it.
    #[must_use]
    pub const fn length(&self) -> Option<u64> {
        self.known_length
    }

    /// Current read position.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// The addressed message.
    #[must_use]
    pub const fn message(&self) -> &SequenceSet {
        &self.message
    }

    /// Releases the buffer. Without keep-alive the mailbox is closed and the
    /// session logged out.
    ///
    /// # Errors
    ///
    /// Returns the CLOSE or LOGOUT failure.
    pub fn close(self) -> Result<()> {
        let session = self.session;
        if session.config().keep_alive {
            return Ok(());
        }
        let closed = if session.selection().is_some() {
            session.close_mailbox()
        } else {
            Ok(())
        };
        let logged_out = session.logout();
        closed.and(logged_out)
    }

    /// Gives the session back, releasing the buffer.
    pub fn into_session(self) -> &'a mut Session<S> {
        self.session
    }

    fn covers(&self, position: u64) -> bool {
        position >= self.block_start && position - self.block_start < self.block.len() as u64
    }

    fn at_end(&self) -> bool {
        self.known_length.is_some_and(|len| self.position >= len)
    }

    fn check_uid_validity(&self) -> Result<()> {
        let Some(pinned) = self.uid_validity else {
            return Ok(());
        };
        let current = self.session.selection().and_then(|s| s.uid_validity);
        if current == Some(pinned) {
            Ok(())
        } else {
            Err(Error::RequestCanceled(format!(
                "UIDVALIDITY changed: expected {pinned}, mailbox reports {current:?}"
            )))
        }
    }

    /// Fetches the block starting at the current position.
    fn fetch_block(&mut self) -> Result<()> {
        self.check_uid_validity()?;

        let offset = self.position;
        let mut attributes = Vec::with_capacity(2);
        if self.section.is_none() && !self.size_requested {
            attributes.push(FetchAttribute::Rfc822Size);
            self.size_requested = true;
        }
        attributes.push(FetchAttribute::Body {
            section: self.section.clone(),
            peek: self.peek,
            partial: Some((offset, u64::from(self.block_size))),
        });

        trace!(message = %self.message, offset, size = self.block_size, "fetching block");
        let outcome = self.session.execute(&Command::Fetch {
            sequence: self.message.clone(),
            items: FetchItems::Items(attributes),
        })?;

        let wanted = self
            .section
            .as_deref()
            .unwrap_or_default()
            .to_ascii_uppercase();
        let number = self.message.to_number()?;
        let uid = self.message.is_uid();

        let mut size = None;
        let mut body = None;
        for (seq, items) in outcome.fetches() {
            if !addresses(seq, items, number, uid) {
                continue;
            }
            for item in items {
                match item {
                    FetchItem::Rfc822Size(n) => size = Some(*n),
                    FetchItem::Body {
                        section,
                        origin,
                        data,
                    } if *section == wanted => body = Some((*origin, data.clone())),
                    _ => {}
                }
            }
        }

        if let (Some(n), None) = (size, &self.section) {
            self.known_length = Some(n);
        }

        let Some((origin, data)) = body else {
            return Err(Error::Protocol {
                status: Status::No,
                code: None,
                text: format!("FETCH returned no body for message {}", self.message),
            });
        };
        if origin.unwrap_or(offset) != offset {
            return Err(Error::Unknown(format!(
                "Server returned block at origin {origin:?}, requested {offset}"
            )));
        }
        let data = data.unwrap_or_default();

        // An empty block past offset 0 may follow a seek beyond the end.
        let short = (data.len() as u64) < u64::from(self.block_size);
        if short && (offset == 0 || !data.is_empty()) && self.known_length.is_none() {
            self.known_length = Some(offset + data.len() as u64);
        }
        debug!(offset, len = data.len(), "block received");
        self.block_start = offset;
        self.block = data;
        Ok(())
    }
}

/// Whether a FETCH response is about the addressed message.
fn addresses(seq: u32, items: &[FetchItem], number: u32, uid: bool) -> bool {
    if !uid {
        return seq == number;
    }
    let reported = items.iter().find_map(|item| match item {
        FetchItem::Uid(u) => Some(*u),
        _ => None,
    });
    reported.is_none_or(|u| u == number)
}

fn into_io(error: Error) -> io::Error {
    let kind = match error.kind() {
        ErrorKind::Timeout => io::ErrorKind::TimedOut,
        ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
        ErrorKind::Unsupported => io::ErrorKind::Unsupported,
        ErrorKind::ConnectFailure => io::ErrorKind::ConnectionAborted,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, error)
}

impl<S: Transport> Read for PartialFetchStream<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() && !self.at_end() {
            if !self.covers(self.position) {
                self.fetch_block().map_err(into_io)?;
                if !self.covers(self.position) {
                    break;
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            let start = (self.position - self.block_start) as usize;
            let available = &self.block[start..];
            let n = available.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&available[..n]);
            filled += n;
            self.position += n as u64;
        }
        Ok(filled)
    }
}

impl<S: Transport> Seek for PartialFetchStream<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => {
                let Some(len) = self.known_length else {
                    return Err(into_io(Error::Unsupported(
                        "Stream length is not known yet".to_string(),
                    )));
                };
                i128::from(len) + i128::from(delta)
            }
        };
        let target = u64::try_from(target).map_err(|_| {
            into_io(Error::InvalidArgument(format!(
                "Cannot seek to position {target}"
            )))
        })?;

        if !self.covers(target) {
            self.block = Bytes::new();
            self.block_start = target;
        }
        self.position = target;
        Ok(target)
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

    #[test]
    fn test_addresses_by_sequence_number() {
        assert!(addresses(4, &[], 4, false));
        assert!(!addresses(5, &[FetchItem::Uid(4)], 4, false));
    }

    #[test]
    fn test_addresses_by_uid() {
        assert!(addresses(1, &[FetchItem::Uid(900)], 900, true));
        assert!(!addresses(1, &[FetchItem::Uid(901)], 900, true));
        // Servers that omit UID are trusted.
        assert!(addresses(1, &[FetchItem::Rfc822Size(3)], 900, true));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = into_io(Error::Unsupported("x".to_string()));
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        let inner = err.get_ref().unwrap().downcast_ref::<Error>().unwrap();
        assert_eq!(inner.kind(), ErrorKind::Unsupported);
    }
}
