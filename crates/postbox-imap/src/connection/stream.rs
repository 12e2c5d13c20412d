//! Stream types for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use crate::{Error, Result, error::is_timeout};

/// A byte stream the session can drive.
///
/// Implemented by [`ImapStream`] for real connections and by scripted
/// streams in tests.
pub trait Transport: Read + Write + Send + Sized {
    /// Returns true if the channel is encrypted.
    fn is_secure(&self) -> bool;

    /// Upgrades the channel to TLS after a successful STARTTLS.
    ///
    /// The handshake completes before this returns. On failure the stream
    /// is consumed.
    fn start_tls(self, host: &str) -> Result<Self>;

    /// Sets the read and write timeout.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Shuts the connection down.
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(tcp) => f.debug_tuple("Plain").field(tcp).finish(),
            Self::Tls(tls) => f.debug_tuple("Tls").field(&tls.sock).finish(),
        }
    }
}

impl ImapStream {
    /// Returns the underlying TCP stream.
    #[must_use]
    pub fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(tls) => &tls.sock,
        }
    }
}

impl Read for ImapStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for ImapStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

impl Transport for ImapStream {
    fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    fn start_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => tls_handshake(host, tcp),
            Self::Tls(_) => Err(Error::InvalidOperation(
                "Stream is already TLS".to_string(),
            )),
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let tcp = self.tcp();
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        if let Self::Tls(tls) = self {
            tls.conn.send_close_notify();
            // Best effort; the peer may already be gone.
            let _ = tls.conn.complete_io(&mut tls.sock);
        }
        match self.tcp().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// Creates a TLS client configuration with the webpki root certificates.
#[must_use]
pub fn create_tls_config() -> Arc<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

fn tls_handshake(host: &str, mut tcp: TcpStream) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::secure_channel(format!("Invalid server name {host}"), e))?;
    let mut conn = ClientConnection::new(create_tls_config(), server_name)
        .map_err(|e| Error::secure_channel("TLS setup failed", e))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)
            .map_err(|e| Error::secure_channel("TLS handshake failed", e))?;
    }

    Ok(ImapStream::Tls(Box::new(StreamOwned::new(conn, tcp))))
}

/// Opens a TCP connection bounded by `timeout`, trying each resolved
/// address in turn.
fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs = (host, port).to_socket_addrs().map_err(|e| Error::ConnectFailure {
        message: format!("Cannot resolve {host}:{port}"),
        source: Some(e),
    })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => {
                tcp.set_nodelay(true)?;
                return Ok(tcp);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) if is_timeout(&e) => Error::Timeout(timeout),
        Some(e) => Error::ConnectFailure {
            message: format!("Cannot connect to {host}:{port}"),
            source: Some(e),
        },
        None => Error::connect(format!("No addresses for {host}:{port}")),
    })
}

/// Connects to a server with TLS from the start.
pub fn connect_tls(host: &str, port: u16, timeout: Duration) -> Result<ImapStream> {
    let tcp = connect_tcp(host, port, timeout)?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;
    tls_handshake(host, tcp)
}

/// Connects to a server without TLS (for STARTTLS or testing).
pub fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<ImapStream> {
    Ok(ImapStream::Plain(connect_tcp(host, port, timeout)?))
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
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn test_create_tls_config() {
        let config = create_tls_config();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn test_connect_plain_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = connect_plain("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert!(!stream.is_secure());
    }

    #[test]
    fn test_connect_refused_is_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = connect_plain("127.0.0.1", port, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConnectFailure);
    }

    #[test]
    fn test_invalid_server_name_is_secure_channel_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let tcp = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let err = ImapStream::Plain(tcp).start_tls("bad host name!").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SecureChannelFailure);
    }
}
