//! Session configuration.
//!
//! A [`SessionConfig`] is an explicit value handed to the session. Values not
//! set on the builder are taken from the process-wide [`Defaults`].

use std::sync::{LazyLock, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext and require a STARTTLS upgrade (port 143).
    StartTls,
    /// TLS from the start (port 993).
    Implicit,
    /// Upgrade with STARTTLS when the server advertises it (port 143).
    #[default]
    StartTlsIfAvailable,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls | Self::StartTlsIfAvailable => 143,
            Self::Implicit => 993,
        }
    }
}

/// How literals are announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralMode {
    /// Always `{n}` and wait for the server's `+`.
    Synchronizing,
    /// `{n+}` when `LITERAL+` is advertised, `{n}` otherwise.
    #[default]
    PreferNonSynchronizing,
    /// Only `{n+}`; commands with literals fail against servers without
    /// `LITERAL+`.
    RequireNonSynchronizing,
}

/// Process-wide defaults applied to new configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Keep the session open when a fetch stream is closed.
    pub keep_alive: bool,
    /// Open mailboxes with EXAMINE.
    pub read_only: bool,
    /// Upgrade with STARTTLS when available.
    pub tls_if_available: bool,
    /// Fetch with `BODY.PEEK` so `\Seen` is not set.
    pub fetch_peek: bool,
    /// Permit plaintext credentials over an insecure channel.
    pub allow_insecure_login: bool,
    /// TCP connect bound.
    pub connect_timeout: Duration,
    /// Per-read and per-write bound.
    pub io_timeout: Duration,
    /// Bytes per partial fetch.
    pub fetch_block_size: u32,
    /// Preferred SASL mechanisms; empty means engine order.
    pub sasl_mechanisms: Vec<String>,
    /// Literal announcement mode.
    pub literal_mode: LiteralMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            keep_alive: true,
            read_only: false,
            tls_if_available: true,
            fetch_peek: true,
            allow_insecure_login: false,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(300),
            fetch_block_size: 10240,
            sasl_mechanisms: Vec::new(),
            literal_mode: LiteralMode::default(),
        }
    }
}

static DEFAULTS: LazyLock<RwLock<Defaults>> = LazyLock::new(|| RwLock::new(Defaults::default()));

/// Returns a snapshot of the process-wide defaults.
#[must_use]
pub fn defaults() -> Defaults {
    DEFAULTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the process-wide defaults.
pub fn set_defaults(defaults: Defaults) {
    *DEFAULTS.write().unwrap_or_else(PoisonError::into_inner) = defaults;
}

/// Modifies the process-wide defaults in place.
pub fn update_defaults(f: impl FnOnce(&mut Defaults)) {
    f(&mut DEFAULTS.write().unwrap_or_else(PoisonError::into_inner));
}

/// IMAP session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; the security mode's default when unset.
    pub port: Option<u16>,
    /// Security mode.
    pub security: Security,
    /// TCP connect bound.
    pub connect_timeout: Duration,
    /// Per-read and per-write bound.
    pub io_timeout: Duration,
    /// Keep the session open when a fetch stream is closed.
    pub keep_alive: bool,
    /// Open mailboxes with EXAMINE.
    pub read_only: bool,
    /// Fetch with `BODY.PEEK`.
    pub fetch_peek: bool,
    /// Bytes per partial fetch.
    pub fetch_block_size: u32,
    /// Permit plaintext credentials over an insecure channel.
    pub allow_insecure_login: bool,
    /// Literal announcement mode.
    pub literal_mode: LiteralMode,
    /// Mechanisms to try, in order; empty means engine order.
    pub sasl_mechanisms: Vec<String>,
    /// Fields sent with `ID` when the server advertises it.
    pub client_id: Option<Vec<(String, String)>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_defaults(String::new(), &defaults())
    }
}

impl SessionConfig {
    /// Creates a configuration for `host` from the current defaults.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::from_defaults(host.into(), &defaults())
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(host)
    }

    fn from_defaults(host: String, d: &Defaults) -> Self {
        Self {
            host,
            port: None,
            security: if d.tls_if_available {
                Security::StartTlsIfAvailable
            } else {
                Security::None
            },
            connect_timeout: d.connect_timeout,
            io_timeout: d.io_timeout,
            keep_alive: d.keep_alive,
            read_only: d.read_only,
            fetch_peek: d.fetch_peek,
            fetch_block_size: d.fetch_block_size,
            allow_insecure_login: d.allow_insecure_login,
            literal_mode: d.literal_mode,
            sasl_mechanisms: d.sasl_mechanisms.clone(),
            client_id: None,
        }
    }

    /// Returns the port to connect to.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: SessionConfig::new(host),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the read/write timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Keeps the session open when a fetch stream is closed.
    #[must_use]
    pub const fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Opens mailboxes read-only.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Uses `BODY.PEEK` for fetches.
    #[must_use]
    pub const fn fetch_peek(mut self, peek: bool) -> Self {
        self.config.fetch_peek = peek;
        self
    }

    /// Sets the partial-fetch block size.
    #[must_use]
    pub const fn fetch_block_size(mut self, size: u32) -> Self {
        self.config.fetch_block_size = size;
        self
    }

    /// Permits plaintext credentials over an insecure channel.
    #[must_use]
    pub const fn allow_insecure_login(mut self, allow: bool) -> Self {
        self.config.allow_insecure_login = allow;
        self
    }

    /// Sets the literal announcement mode.
    #[must_use]
    pub const fn literal_mode(mut self, mode: LiteralMode) -> Self {
        self.config.literal_mode = mode;
        self
    }

    /// Pins the SASL mechanisms to try, in order.
    #[must_use]
    pub fn sasl_mechanisms<I, S>(mut self, mechanisms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sasl_mechanisms = mechanisms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the fields sent with `ID`.
    #[must_use]
    pub fn client_id(mut self, fields: Vec<(String, String)>) -> Self {
        self.config.client_id = Some(fields);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::StartTlsIfAvailable.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_defaults_values() {
        let d = Defaults::default();
        assert!(d.keep_alive);
        assert!(!d.read_only);
        assert!(d.tls_if_available);
        assert!(d.fetch_peek);
        assert!(!d.allow_insecure_login);
        assert_eq!(d.connect_timeout, Duration::from_secs(30));
        assert_eq!(d.io_timeout, Duration::from_secs(300));
        assert_eq!(d.fetch_block_size, 10240);
        assert!(d.sasl_mechanisms.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder("imap.example.com")
            .security(Security::Implicit)
            .fetch_block_size(16)
            .keep_alive(false)
            .sasl_mechanisms(["PLAIN", "LOGIN"])
            .build();

        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.effective_port(), 993);
        assert_eq!(config.fetch_block_size, 16);
        assert!(!config.keep_alive);
        assert_eq!(config.sasl_mechanisms, vec!["PLAIN", "LOGIN"]);
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = SessionConfig::builder("localhost")
            .security(Security::Implicit)
            .port(1993)
            .build();
        assert_eq!(config.effective_port(), 1993);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"host": "mail.example.org", "security": "implicit", "read_only": true}"#,
        )
        .unwrap();
        assert_eq!(config.host, "mail.example.org");
        assert_eq!(config.security, Security::Implicit);
        assert!(config.read_only);
        assert_eq!(config.effective_port(), 993);
        assert_eq!(config.literal_mode, LiteralMode::PreferNonSynchronizing);
    }

    #[test]
    fn test_update_defaults_applies_to_new_configs() {
        let before = defaults();
        update_defaults(|d| d.fetch_block_size = 4096);
        let config = SessionConfig::new("h");
        set_defaults(before.clone());

        assert_eq!(config.fetch_block_size, 4096);
        assert_eq!(defaults(), before);
    }
}
