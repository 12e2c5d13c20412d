//! Connection layer: configuration, byte streams and IMAP framing.

mod config;
mod framed;
mod stream;

pub use config::{
    Defaults, LiteralMode, Security, SessionConfig, SessionConfigBuilder, defaults, set_defaults,
    update_defaults,
};
pub use framed::{FramedStream, MAX_LINE_LENGTH, MAX_LITERAL_SIZE};
pub use stream::{ImapStream, Transport, connect_plain, connect_tls, create_tls_config};
