//! High-level command helpers.
//!
//! Each helper checks what the server advertises, issues one or more
//! commands through [`Session::execute`] and extracts the interesting data.

#![allow(clippy::missing_errors_doc)]

use bytes::Bytes;

use crate::command::{Command, FetchItems, SearchCriteria, StoreAction};
use crate::connection::Transport;
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Capability, ResponseCode, SequenceSet};
use crate::{Error, Result};

use super::Session;

/// Message numbers per command when a set is split.
pub const MAX_SET_CHUNK: usize = 500;

/// Splits enumerable sets into chunks; open sets and `$` go out whole.
fn chunked(sequence: &SequenceSet) -> Vec<SequenceSet> {
    sequence
        .split_into_chunks(MAX_SET_CHUNK)
        .unwrap_or_else(|_| vec![sequence.clone()])
}

type FetchResponses = Vec<(u32, Vec<FetchItem>)>;

fn collect_fetches(responses: Vec<UntaggedResponse>, out: &mut FetchResponses) {
    out.extend(responses.into_iter().filter_map(|r| match r {
        UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
        _ => None,
    }));
}

impl<S: Transport> Session<S> {
    /// NOOP; picks up pending mailbox updates.
    pub fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).map(|_| ())
    }

    /// CREATE.
    pub fn create_mailbox(&mut self, name: &str) -> Result<()> {
        self.execute(&Command::Create {
            mailbox: name.to_string(),
        })
        .map(|_| ())
    }

    /// DELETE.
    pub fn delete_mailbox(&mut self, name: &str) -> Result<()> {
        self.execute(&Command::Delete {
            mailbox: name.to_string(),
        })
        .map(|_| ())
    }

    /// LIST; returns the raw data of each `* LIST` line.
    pub fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<Bytes>> {
        let outcome = self.execute(&Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        })?;
        Ok(outcome.raw("LIST").cloned().collect())
    }

    /// STATUS; returns the raw `* STATUS` data.
    pub fn status(&mut self, mailbox: &str, items: &[&str]) -> Result<Option<Bytes>> {
        let outcome = self.execute(&Command::Status {
            mailbox: mailbox.to_string(),
            items: items.iter().map(|s| (*s).to_string()).collect(),
        })?;
        Ok(outcome.raw("STATUS").next().cloned())
    }

    /// FETCH or UID FETCH, split into chunks for large sets.
    pub fn fetch(&mut self, sequence: &SequenceSet, items: &FetchItems) -> Result<FetchResponses> {
        let mut results = Vec::new();
        for chunk in chunked(sequence) {
            let outcome = self.execute(&Command::Fetch {
                sequence: chunk,
                items: items.clone(),
            })?;
            collect_fetches(outcome.responses, &mut results);
        }
        Ok(results)
    }

    /// STORE or UID STORE, split into chunks for large sets. Returns the
    /// FETCH responses the server sent (none when `silent`).
    pub fn store(
        &mut self,
        sequence: &SequenceSet,
        action: &StoreAction,
        silent: bool,
    ) -> Result<FetchResponses> {
        if self.selection.as_ref().is_some_and(|s| s.read_only) {
            return Err(Error::RequestCanceled(
                "Mailbox is selected read-only".to_string(),
            ));
        }
        let mut results = Vec::new();
        for chunk in chunked(sequence) {
            let outcome = self.execute(&Command::Store {
                sequence: chunk,
                action: action.clone(),
                silent,
            })?;
            collect_fetches(outcome.responses, &mut results);
        }
        Ok(results)
    }

    /// COPY or UID COPY, split into chunks for large sets. Returns the
    /// COPYUID codes the server reported.
    ///
    /// A missing destination fails with `ProtocolError` carrying
    /// `TRYCREATE`; the caller may CREATE it and retry on the same session.
    pub fn copy(&mut self, sequence: &SequenceSet, mailbox: &str) -> Result<Vec<ResponseCode>> {
        let mut codes = Vec::new();
        for chunk in chunked(sequence) {
            let outcome = self.execute(&Command::Copy {
                sequence: chunk,
                mailbox: mailbox.to_string(),
            })?;
            if let Some(code @ ResponseCode::CopyUid { .. }) = outcome.code {
                codes.push(code);
            }
        }
        Ok(codes)
    }

    /// SEARCH or UID SEARCH.
    pub fn search(&mut self, criteria: &SearchCriteria, uid: bool) -> Result<Vec<u32>> {
        self.search_with_charset(criteria, None, uid)
    }

    /// SEARCH with an explicit CHARSET.
    pub fn search_with_charset(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
        uid: bool,
    ) -> Result<Vec<u32>> {
        let outcome = self.execute(&Command::Search {
            criteria: criteria.clone(),
            charset: charset.map(str::to_string),
            save: false,
            uid,
        })?;
        Ok(outcome.search_results())
    }

    /// SEARCH RETURN (SAVE): stores the result server-side as `$`.
    pub fn search_save(&mut self, criteria: &SearchCriteria, uid: bool) -> Result<SequenceSet> {
        if !self.capabilities.contains(&Capability::SEARCHRES) {
            return Err(Error::Unsupported(
                "Server does not advertise SEARCHRES".to_string(),
            ));
        }
        self.execute(&Command::Search {
            criteria: criteria.clone(),
            charset: None,
            save: true,
            uid,
        })?;
        Ok(if uid {
            SequenceSet::uid_saved_result()
        } else {
            SequenceSet::saved_result()
        })
    }

    /// SORT or UID SORT.
    pub fn sort(
        &mut self,
        criteria: &[&str],
        charset: &str,
        search: &SearchCriteria,
        uid: bool,
    ) -> Result<Vec<u32>> {
        if !self.capabilities.contains(&Capability::SORT) {
            return Err(Error::Unsupported("Server does not advertise SORT".to_string()));
        }
        let outcome = self.execute(&Command::Sort {
            criteria: criteria.iter().map(|s| (*s).to_string()).collect(),
            charset: charset.to_string(),
            search: search.clone(),
            uid,
        })?;
        Ok(outcome.sort_results())
    }

    /// THREAD or UID THREAD; returns the raw `* THREAD` data.
    pub fn thread(
        &mut self,
        algorithm: &str,
        charset: &str,
        search: &SearchCriteria,
        uid: bool,
    ) -> Result<Option<Bytes>> {
        if !self
            .capabilities
            .thread_algorithms()
            .any(|a| a.eq_ignore_ascii_case(algorithm))
        {
            return Err(Error::Unsupported(format!(
                "Server does not advertise THREAD={algorithm}"
            )));
        }
        let outcome = self.execute(&Command::Thread {
            algorithm: algorithm.to_string(),
            charset: charset.to_string(),
            search: search.clone(),
            uid,
        })?;
        Ok(outcome.raw("THREAD").next().cloned())
    }

    /// EXPUNGE; returns the expunged sequence numbers in server order.
    pub fn expunge(&mut self) -> Result<Vec<u32>> {
        let outcome = self.execute(&Command::Expunge)?;
        Ok(outcome
            .responses
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Expunge(n) => Some(*n),
                _ => None,
            })
            .collect())
    }

    /// UID EXPUNGE (UIDPLUS).
    pub fn uid_expunge(&mut self, uids: &SequenceSet) -> Result<Vec<u32>> {
        if !self.capabilities.contains(&Capability::UIDPLUS) {
            return Err(Error::Unsupported(
                "Server does not advertise UIDPLUS".to_string(),
            ));
        }
        if !uids.is_uid() {
            return Err(Error::InvalidArgument(
                "UID EXPUNGE takes a UID set".to_string(),
            ));
        }
        let mut expunged = Vec::new();
        for chunk in chunked(uids) {
            let outcome = self.execute(&Command::UidExpunge { uids: chunk })?;
            expunged.extend(outcome.responses.iter().filter_map(|r| match r {
                UntaggedResponse::Expunge(n) => Some(*n),
                _ => None,
            }));
        }
        Ok(expunged)
    }

    /// APPEND with the message as a literal. Returns the APPENDUID code if
    /// the server sent one.
    pub fn append(
        &mut self,
        mailbox: &str,
        flags: &[&str],
        message: Bytes,
    ) -> Result<Option<ResponseCode>> {
        self.append_with(mailbox, flags, message, false)
    }

    /// APPEND, optionally as literal8 (requires BINARY).
    pub fn append_with(
        &mut self,
        mailbox: &str,
        flags: &[&str],
        message: Bytes,
        binary: bool,
    ) -> Result<Option<ResponseCode>> {
        let outcome = self.execute(&Command::Append {
            mailbox: mailbox.to_string(),
            flags: flags.iter().map(|s| (*s).to_string()).collect(),
            message,
            binary,
        })?;
        Ok(match outcome.code {
            Some(code @ ResponseCode::AppendUid { .. }) => Some(code),
            _ => None,
        })
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
    fn test_chunked_splits_large_sets() {
        let set = SequenceSet::uid_set((1..=1200).filter(|n| n % 2 == 0)).unwrap();
        let chunks = chunked(&set);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(SequenceSet::is_uid));
    }

    #[test]
    fn test_chunked_keeps_open_sets_whole() {
        let set = SequenceSet::uid_all_from(10).unwrap();
        assert_eq!(chunked(&set), vec![set.clone()]);
        assert_eq!(chunked(&SequenceSet::saved_result()), vec![SequenceSet::saved_result()]);
    }

    #[test]
    fn test_chunked_contiguous_run_is_one_range() {
        let set = SequenceSet::range(1, 500).unwrap();
        let chunks = chunked(&set);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].to_string(), "1:500");
    }
}
