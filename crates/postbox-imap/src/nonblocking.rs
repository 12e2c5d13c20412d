//! Tokio entry points around the blocking session.
//!
//! Every operation runs on the blocking thread pool via
//! [`tokio::task::spawn_blocking`]. At most one operation may be in flight
//! per [`AsyncSession`]; a second submission fails immediately with
//! `InvalidOperation`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::command::Command;
use crate::connection::{ImapStream, SessionConfig, Transport};
use crate::sasl::{Credentials, SaslMechanism};
use crate::session::{CommandOutcome, Session};
use crate::types::MailboxSelection;
use crate::{Error, Result};

/// Async handle to a [`Session`].
pub struct AsyncSession<S: Transport + 'static = ImapStream> {
    inner: Arc<Mutex<Session<S>>>,
    busy: Arc<AtomicBool>,
}

impl<S: Transport + 'static> Clone for AsyncSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<S: Transport + 'static> std::fmt::Debug for AsyncSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSession")
            .field("busy", &self.busy.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Clears the busy flag when the blocking task ends, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                Error::InvalidOperation("Another operation is already in flight".to_string())
            })?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn join_error(e: JoinError) -> Error {
    Error::Unknown(format!("Blocking task failed: {e}"))
}

impl AsyncSession<ImapStream> {
    /// Connects on the blocking pool. See [`Session::connect`].
    ///
    /// # Errors
    ///
    /// As for [`Session::connect`].
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let session = tokio::task::spawn_blocking(move || Session::connect(config))
            .await
            .map_err(join_error)??;
        Ok(Self::new(session))
    }
}

impl<S: Transport + 'static> AsyncSession<S> {
    /// Wraps an established session.
    #[must_use]
    pub fn new(session: Session<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true while an operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts `f` on the blocking pool and returns its handle.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if another operation is in flight.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime.
    pub fn spawn<T, F>(&self, f: F) -> Result<JoinHandle<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<S>) -> Result<T> + Send + 'static,
    {
        let guard = BusyGuard::acquire(&self.busy)?;
        let inner = Arc::clone(&self.inner);
        Ok(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut session = inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut session)
        }))
    }

    /// Runs `f` on the blocking pool and awaits it.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if another operation is in flight, otherwise
    /// whatever `f` returns.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<S>) -> Result<T> + Send + 'static,
    {
        self.spawn(f)?.await.map_err(join_error)?
    }

    /// Submits `command` now; await the handle for its outcome.
    ///
    /// A NO or BAD completion is returned as an outcome, not an error.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if another operation is in flight.
    pub fn submit(&self, command: Command) -> Result<JoinHandle<Result<CommandOutcome>>> {
        debug!(verb = %command.verb(), "submitting command");
        self.spawn(move |session| {
            let pending = session.issue(&command)?;
            session.complete(pending)
        })
    }

    /// Runs `command` to completion. See [`Session::execute`].
    ///
    /// # Errors
    ///
    /// As for [`Session::execute`], plus `InvalidOperation` if another
    /// operation is in flight.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome> {
        self.run(move |session| session.execute(&command)).await
    }

    /// See [`Session::authenticate`].
    ///
    /// # Errors
    ///
    /// As for [`Session::authenticate`].
    pub async fn authenticate(&self, credentials: Credentials) -> Result<()> {
        self.run(move |session| session.authenticate(&credentials))
            .await
    }

    /// See [`Session::authenticate_mechanism`].
    ///
    /// # Errors
    ///
    /// As for [`Session::authenticate_mechanism`].
    pub async fn authenticate_mechanism(&self, mechanism: Box<dyn SaslMechanism>) -> Result<()> {
        self.run(move |session| session.authenticate_mechanism(mechanism))
            .await
    }

    /// See [`Session::select_mailbox`]. Returns a copy of the selection.
    ///
    /// # Errors
    ///
    /// As for [`Session::select_mailbox`].
    pub async fn select_mailbox(&self, name: &str, read_only: bool) -> Result<MailboxSelection> {
        let name = name.to_string();
        self.run(move |session| session.select_mailbox(&name, read_only).cloned())
            .await
    }

    /// See [`Session::logout`].
    ///
    /// # Errors
    ///
    /// As for [`Session::logout`].
    pub async fn logout(&self) -> Result<()> {
        self.run(Session::<S>::logout).await
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
    use crate::ErrorKind;

    #[test]
    fn test_busy_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = BusyGuard::acquire(&flag).unwrap();
        let err = BusyGuard::acquire(&flag).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&flag).is_ok());
    }
}
