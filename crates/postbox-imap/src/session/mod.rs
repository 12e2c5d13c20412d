//! IMAP session engine.
//!
//! A [`Session`] owns one transport and runs one command at a time. It walks
//! the connection through greeting, capability negotiation, the optional
//! STARTTLS upgrade and authentication, then serves mailbox commands.
//!
//! # Example
//!
//! ```ignore
//! use postbox_imap::{Credentials, Session, SessionConfig};
//!
//! let config = SessionConfig::builder("imap.example.com").build();
//! let mut session = Session::connect(config)?;
//! session.authenticate(&Credentials::password("user", "pass"))?;
//! let inbox = session.select_mailbox("INBOX", true)?;
//! println!("{} messages", inbox.exists);
//! session.logout()?;
//! ```

mod auth;
mod commands;
mod demux;
mod mailbox;
mod state;

pub use demux::{CommandOutcome, PendingCommand};
pub use state::SessionState;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::command::{Command, TagGenerator};
use crate::connection::{FramedStream, ImapStream, Security, SessionConfig, Transport};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, CapabilitySet, MailboxSelection, ResponseCode, Status};
use crate::{Error, Result, connection};

use demux::Completion;

/// A connected IMAP session.
pub struct Session<S: Transport = ImapStream> {
    config: SessionConfig,
    stream: Option<FramedStream<S>>,
    state: SessionState,
    tags: TagGenerator,
    /// Tag of the outstanding command.
    pending: Option<String>,
    /// Completion that arrived while a literal was awaiting `+`.
    early_completion: Option<Completion>,
    /// Untagged data collected for the outstanding command.
    collected: Vec<UntaggedResponse>,
    capabilities: CapabilitySet,
    selection: Option<MailboxSelection>,
    /// The server sent BYE.
    closing: bool,
    namespace: Option<Bytes>,
    server_id: Option<Bytes>,
}

impl<S: Transport> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("selection", &self.selection.as_ref().map(|s| &s.name))
            .finish_non_exhaustive()
    }
}

impl Session<ImapStream> {
    /// Connects to the configured server, reads the greeting, negotiates
    /// capabilities and performs STARTTLS as configured.
    ///
    /// On success the session is ready to authenticate, or already
    /// authenticated if the server sent `PREAUTH`.
    ///
    /// # Errors
    ///
    /// `ConnectFailure` or `Timeout` if the server cannot be reached or
    /// refuses the connection, `SecureChannelFailure` if TLS fails,
    /// `RequestCanceled` if the server does not speak IMAP4rev1.
    pub fn connect(config: SessionConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(Error::InvalidArgument("host must not be empty".to_string()));
        }
        let host = config.host.clone();
        let port = config.effective_port();
        info!(%host, port, security = ?config.security, "connecting");

        let stream = match config.security {
            Security::Implicit => connection::connect_tls(&host, port, config.connect_timeout)?,
            Security::None | Security::StartTls | Security::StartTlsIfAvailable => {
                connection::connect_plain(&host, port, config.connect_timeout)?
            }
        };

        Self::with_stream(config, stream)
    }
}

impl<S: Transport> Session<S> {
    /// Runs the session handshake over an already-connected transport.
    ///
    /// # Errors
    ///
    /// As for [`Session::connect`].
    pub fn with_stream(config: SessionConfig, mut stream: S) -> Result<Self> {
        stream.set_timeout(Some(config.io_timeout))?;
        let io_timeout = config.io_timeout;
        let mut session = Self {
            config,
            stream: Some(FramedStream::new(stream, io_timeout)),
            state: SessionState::AwaitingGreeting,
            tags: TagGenerator::new(),
            pending: None,
            early_completion: None,
            collected: Vec::new(),
            capabilities: CapabilitySet::new(),
            selection: None,
            closing: false,
            namespace: None,
            server_id: None,
        };

        match session.handshake() {
            Ok(()) => Ok(session),
            Err(e) => {
                session.teardown();
                Err(e)
            }
        }
    }

    fn handshake(&mut self) -> Result<()> {
        let preauth = self.read_greeting()?;

        self.state = SessionState::NegotiatingCapabilities;
        if self.capabilities.is_empty() {
            self.refresh_capabilities()?;
        }
        self.require_imap4rev1()?;

        self.negotiate_tls(preauth)?;

        if preauth {
            self.state = SessionState::Authenticated;
            info!(host = %self.config.host, "pre-authenticated by server");
            self.after_login()?;
        } else {
            self.state = SessionState::Authenticating;
        }
        Ok(())
    }

    /// Reads the greeting. Returns true for `PREAUTH`.
    fn read_greeting(&mut self) -> Result<bool> {
        let response = self.read_response()?;
        let Response::Untagged(UntaggedResponse::Condition { status, code, text }) = response
        else {
            return Err(Error::Unknown(format!("Unexpected greeting: {response:?}")));
        };

        match status {
            Status::Ok | Status::PreAuth => {
                if let Some(ResponseCode::Capability(caps)) = code {
                    self.capabilities = caps;
                }
                debug!(greeting = %text, "server greeting");
                Ok(status == Status::PreAuth)
            }
            Status::Bye => {
                let message = match code {
                    Some(ResponseCode::Referral(url)) => {
                        format!("Server refused connection: {text} (referral: {url})")
                    }
                    _ => format!("Server refused connection: {text}"),
                };
                Err(Error::connect(message))
            }
            Status::No | Status::Bad => {
                Err(Error::Unknown(format!("Unexpected greeting status {status}: {text}")))
            }
        }
    }

    fn require_imap4rev1(&self) -> Result<()> {
        if self.capabilities.contains(&Capability::IMAP4REV1) {
            Ok(())
        } else {
            Err(Error::RequestCanceled(
                "Server does not advertise IMAP4rev1".to_string(),
            ))
        }
    }

    fn negotiate_tls(&mut self, preauth: bool) -> Result<()> {
        if self.is_secure() {
            return Ok(());
        }
        let advertised = self.capabilities.contains(&Capability::STARTTLS);

        match self.config.security {
            Security::StartTls if preauth || !advertised => Err(Error::secure_channel(
                "STARTTLS required",
                if preauth {
                    "server pre-authenticated a plaintext connection"
                } else {
                    "server does not advertise STARTTLS"
                },
            )),
            Security::StartTls => self.start_tls(),
            Security::StartTlsIfAvailable if advertised && !preauth => self.start_tls(),
            Security::StartTlsIfAvailable => {
                warn!(host = %self.config.host, "continuing without TLS");
                Ok(())
            }
            Security::None | Security::Implicit => Ok(()),
        }
    }

    fn start_tls(&mut self) -> Result<()> {
        self.state = SessionState::UpgradingTls;
        info!(host = %self.config.host, "upgrading connection with STARTTLS");

        let result = self.upgrade_stream();
        if let Err(e) = result {
            self.teardown();
            return Err(match e {
                Error::SecureChannelFailure { .. } => e,
                other => Error::secure_channel("STARTTLS failed", other),
            });
        }

        // Capabilities learned in plaintext are discarded.
        self.capabilities = CapabilitySet::new();
        self.state = SessionState::NegotiatingCapabilities;
        self.refresh_capabilities()?;
        self.require_imap4rev1()
    }

    fn upgrade_stream(&mut self) -> Result<()> {
        self.execute(&Command::StartTls)?;

        let framed = self.stream.take().ok_or_else(Self::not_connected)?;
        if framed.has_buffered_input() {
            return Err(Error::secure_channel(
                "STARTTLS failed",
                "server sent data before the TLS handshake",
            ));
        }
        let mut stream = framed.into_inner().start_tls(&self.config.host)?;
        stream.set_timeout(Some(self.config.io_timeout))?;
        self.stream = Some(FramedStream::new(stream, self.config.io_timeout));
        Ok(())
    }

    /// Re-issues CAPABILITY and replaces the cached set.
    ///
    /// # Errors
    ///
    /// Fails if the command fails.
    pub fn refresh_capabilities(&mut self) -> Result<&CapabilitySet> {
        let outcome = self.execute(&Command::Capability)?;
        if !outcome
            .responses
            .iter()
            .any(|r| matches!(r, UntaggedResponse::Capability(_)))
        {
            return Err(Error::Unknown(
                "CAPABILITY completed without capability data".to_string(),
            ));
        }
        Ok(&self.capabilities)
    }

    /// Closes the session: LOGOUT, then tear down the transport.
    ///
    /// A connection the server already closed is torn down without sending
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns the LOGOUT failure, after tearing down regardless.
    pub fn logout(&mut self) -> Result<()> {
        if self.stream.is_none() {
            self.state = SessionState::Disconnected;
            return Ok(());
        }
        if self.closing || self.pending.is_some() {
            self.teardown();
            return Ok(());
        }

        self.state = SessionState::LoggingOut;
        let result = self.execute(&Command::Logout);
        self.teardown();
        result.map(|_| ())
    }

    /// Drops the transport without a LOGOUT.
    pub(crate) fn teardown(&mut self) {
        if let Some(framed) = self.stream.take() {
            let mut stream = framed.into_inner();
            if let Err(e) = stream.shutdown() {
                debug!(error = %e, "shutdown failed");
            }
            info!(host = %self.config.host, "disconnected");
        }
        self.state = SessionState::Disconnected;
        self.pending = None;
        self.early_completion = None;
        self.collected.clear();
        self.selection = None;
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the server's capabilities as last reported.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns true if the server advertises `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<&MailboxSelection> {
        self.selection.as_ref()
    }

    /// Returns true if the channel is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|framed| framed.get_ref().is_secure())
    }

    /// Returns true while a transport is attached.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true if the server announced it is closing the connection.
    #[must_use]
    pub const fn is_closing(&self) -> bool {
        self.closing
    }

    /// Raw NAMESPACE data, when the server supports it.
    #[must_use]
    pub const fn namespace(&self) -> Option<&Bytes> {
        self.namespace.as_ref()
    }

    /// Raw ID data returned by the server.
    #[must_use]
    pub const fn server_id(&self) -> Option<&Bytes> {
        self.server_id.as_ref()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> Option<&S> {
        self.stream.as_ref().map(FramedStream::get_ref)
    }

    fn not_connected() -> Error {
        Error::InvalidOperation("Session is not connected".to_string())
    }

    fn read_response(&mut self) -> Result<Response> {
        let framed = self.stream.as_mut().ok_or_else(Self::not_connected)?;
        let raw = framed.read_response()?;
        ResponseParser::parse(&raw)
    }
}
