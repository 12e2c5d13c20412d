//! # postbox-imap
//!
//! A blocking IMAP4rev1 (RFC 3501) client session engine with a thin tokio
//! wrapper.
//!
//! ## Features
//!
//! - **One command in flight**: a [`Session`] issues a command, collects the
//!   untagged data that arrives for it and matches the tagged completion
//! - **Handshake**: greeting, capability negotiation, `STARTTLS` or implicit
//!   TLS via rustls, `PREAUTH` and `BYE` greetings
//! - **Authentication**: SASL `PLAIN`, `LOGIN`, `ANONYMOUS`, `XOAUTH2` and
//!   `OAUTHBEARER` with `SASL-IR`, falling back through mechanisms and to
//!   `LOGIN`
//! - **Literals**: synchronising `{n}`, `LITERAL+` `{n+}` and `BINARY`
//!   `~{n}` literals in both directions
//! - **Partial fetch**: [`PartialFetchStream`] reads a body section block by
//!   block through `Read + Seek`
//! - **Sequence sets**: set algebra with compact rendering and chunking
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::io::Read;
//! use postbox_imap::{Credentials, SequenceSet, Session, SessionConfig};
//!
//! fn main() -> postbox_imap::Result<()> {
//!     let config = SessionConfig::builder("imap.example.com").build();
//!     let mut session = Session::connect(config)?;
//!     session.authenticate(&Credentials::password("user@example.com", "password"))?;
//!
//!     let inbox = session.select_mailbox("INBOX", true)?;
//!     println!("Messages: {}", inbox.exists);
//!
//!     let uid = SequenceSet::uid_single(42)?;
//!     let mut body = Vec::new();
//!     session.open_fetch_stream(&uid, None)?.read_to_end(&mut body)?;
//!
//!     session.logout()
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! AwaitingGreeting → NegotiatingCapabilities ⇄ UpgradingTls
//!                              │
//!                              ▼
//!                       Authenticating → Authenticated ⇄ MailboxSelected
//!                                             │
//!                                             ▼
//!                                        LoggingOut → Disconnected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command builders and wire rendering
//! - [`connection`]: configuration, transports and response framing
//! - [`parser`]: response parser
//! - [`sasl`]: SASL mechanisms and credentials
//! - [`session`]: the session engine
//! - [`types`]: capabilities, response codes, sequence sets, selection state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod fetch_stream;
pub mod nonblocking;
pub mod parser;
pub mod sasl;
pub mod session;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction};
pub use connection::{ImapStream, LiteralMode, Security, SessionConfig, SessionConfigBuilder, Transport};
pub use error::{Error, ErrorKind, Result};
pub use fetch_stream::PartialFetchStream;
pub use nonblocking::AsyncSession;
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use sasl::{Credentials, SaslMechanism};
pub use session::{CommandOutcome, PendingCommand, Session, SessionState};
pub use types::{Capability, CapabilitySet, MailboxSelection, ResponseCode, SequenceSet, Status};

/// IMAP protocol version spoken.
pub const IMAP_VERSION: &str = "IMAP4rev1";
