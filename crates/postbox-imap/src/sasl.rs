//! SASL authentication mechanisms.
//!
//! Implements:
//! - PLAIN (RFC 4616)
//! - LOGIN (draft-murchison-sasl-login)
//! - CRAM-MD5 (RFC 2195)
//! - ANONYMOUS (RFC 4505)
//! - OAUTHBEARER (RFC 7628)
//! - XOAUTH2 (Google/Microsoft proprietary)
//!
//! Mechanisms produce raw bytes; the session base64-encodes them on the wire.
//! Callers can drive their own [`SaslMechanism`] through
//! [`Session::authenticate_mechanism`](crate::Session::authenticate_mechanism).

use std::fmt;
use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;

/// Mechanisms the engine implements, in the order tried when the caller
/// pins none.
pub const SUPPORTED_MECHANISMS: &[&str] = &[
    "OAUTHBEARER",
    "XOAUTH2",
    "CRAM-MD5",
    "PLAIN",
    "LOGIN",
    "ANONYMOUS",
];

/// Credentials offered to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password.
    Password {
        /// Authentication identity.
        username: String,
        /// Password.
        password: String,
    },
    /// `OAuth2` bearer token.
    OAuth2 {
        /// User the token was issued for.
        username: String,
        /// Access token.
        token: String,
    },
    /// Anonymous access with optional trace information (usually an email
    /// address).
    Anonymous {
        /// Trace information.
        trace: String,
    },
}

impl Credentials {
    /// Username/password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `OAuth2` credentials.
    #[must_use]
    pub fn oauth2(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self::OAuth2 {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Anonymous credentials.
    #[must_use]
    pub fn anonymous(trace: impl Into<String>) -> Self {
        Self::Anonymous {
            trace: trace.into(),
        }
    }

    /// Returns the user name, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Password { username, .. } | Self::OAuth2 { username, .. } => Some(username),
            Self::Anonymous { .. } => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::OAuth2 { username, .. } => f
                .debug_struct("OAuth2")
                .field("username", username)
                .field("token", &"<redacted>")
                .finish(),
            Self::Anonymous { trace } => f.debug_struct("Anonymous").field("trace", trace).finish(),
        }
    }
}

/// A client-side SASL exchange.
pub trait SaslMechanism: Send {
    /// Mechanism name as sent in `AUTHENTICATE`.
    fn name(&self) -> &'static str;

    /// True if the mechanism exposes the password to the channel.
    fn is_plaintext(&self) -> bool {
        false
    }

    /// Response sent before any challenge, for client-first mechanisms.
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Answers a decoded server challenge. `None` cancels the exchange.
    fn respond(&mut self, challenge: &[u8]) -> Option<Vec<u8>>;
}

/// Builds the mechanism `name` for `credentials`, if the engine implements
/// it and the credentials fit.
#[must_use]
pub fn mechanism_for(name: &str, credentials: &Credentials) -> Option<Box<dyn SaslMechanism>> {
    let upper = name.to_ascii_uppercase();
    match (upper.as_str(), credentials) {
        ("PLAIN", Credentials::Password { username, password }) => {
            Some(Box::new(Plain::new(username, password)))
        }
        ("LOGIN", Credentials::Password { username, password }) => {
            Some(Box::new(Login::new(username, password)))
        }
        ("CRAM-MD5", Credentials::Password { username, password }) => {
            Some(Box::new(CramMd5::new(username, password)))
        }
        ("ANONYMOUS", Credentials::Anonymous { trace }) => Some(Box::new(Anonymous::new(trace))),
        ("XOAUTH2", Credentials::OAuth2 { username, token }) => {
            Some(Box::new(XOAuth2::new(username, token)))
        }
        ("OAUTHBEARER", Credentials::OAuth2 { username, token }) => {
            Some(Box::new(OAuthBearer::new(username, token)))
        }
        _ => None,
    }
}

/// Base64-encodes a response; an empty response is sent as an empty line.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes a base64 challenge. Whitespace-only text is an empty challenge.
///
/// # Errors
///
/// Returns an error if the challenge is not valid base64.
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(Vec::new())
    } else {
        STANDARD.decode(text)
    }
}

/// PLAIN: `\0<username>\0<password>` sent as the initial response.
pub struct Plain {
    message: Option<Vec<u8>>,
}

impl Plain {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            message: Some(format!("\0{username}\0{password}").into_bytes()),
        }
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn is_plaintext(&self) -> bool {
        true
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.message.take()
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        self.message.take()
    }
}

/// LOGIN: username then password, one per challenge.
pub struct Login {
    answers: std::vec::IntoIter<Vec<u8>>,
}

impl Login {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            answers: vec![username.as_bytes().to_vec(), password.as_bytes().to_vec()].into_iter(),
        }
    }
}

impl SaslMechanism for Login {
    fn name(&self) -> &'static str {
        "LOGIN"
    }

    fn is_plaintext(&self) -> bool {
        true
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        self.answers.next()
    }
}

/// CRAM-MD5: `<username> <hex HMAC-MD5(password, challenge)>`, answered
/// once to the server's timestamp challenge.
pub struct CramMd5 {
    username: String,
    password: String,
    answered: bool,
}

impl CramMd5 {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            answered: false,
        }
    }
}

impl SaslMechanism for CramMd5 {
    fn name(&self) -> &'static str {
        "CRAM-MD5"
    }

    fn respond(&mut self, challenge: &[u8]) -> Option<Vec<u8>> {
        if std::mem::replace(&mut self.answered, true) {
            return None;
        }
        let mut mac = Hmac::<Md5>::new_from_slice(self.password.as_bytes()).ok()?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();

        let mut response = format!("{} ", self.username);
        for byte in digest {
            let _ = write!(response, "{byte:02x}");
        }
        Some(response.into_bytes())
    }
}

/// ANONYMOUS: trace information as the initial response.
pub struct Anonymous {
    trace: Option<Vec<u8>>,
}

impl Anonymous {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(trace: &str) -> Self {
        Self {
            trace: Some(trace.as_bytes().to_vec()),
        }
    }
}

impl SaslMechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.trace.take()
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        self.trace.take()
    }
}

/// XOAUTH2: `user=<user>\x01auth=Bearer <token>\x01\x01`.
///
/// A failure arrives as a challenge carrying a JSON error; the client
/// answers it with an empty response and the server then completes with
/// `NO`.
pub struct XOAuth2 {
    message: Option<Vec<u8>>,
}

impl XOAuth2 {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(user: &str, token: &str) -> Self {
        Self {
            message: Some(format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes()),
        }
    }
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &'static str {
        "XOAUTH2"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.message.take()
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        Some(self.message.take().unwrap_or_default())
    }
}

/// OAUTHBEARER: `n,a=<user>,\x01auth=Bearer <token>\x01\x01`.
pub struct OAuthBearer {
    message: Option<Vec<u8>>,
}

impl OAuthBearer {
    /// Creates the mechanism.
    #[must_use]
    pub fn new(user: &str, token: &str) -> Self {
        Self {
            message: Some(format!("n,a={user},\x01auth=Bearer {token}\x01\x01").into_bytes()),
        }
    }
}

impl SaslMechanism for OAuthBearer {
    fn name(&self) -> &'static str {
        "OAUTHBEARER"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.message.take()
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        // After an error challenge the client sends a lone %x01.
        Some(self.message.take().unwrap_or_else(|| vec![0x01]))
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
    fn test_plain_initial_response() {
        let mut plain = Plain::new("user@example.com", "password123");
        let response = plain.initial_response().unwrap();
        assert_eq!(response, b"\0user@example.com\0password123");
        assert_eq!(encode(&response), "AHVzZXJAZXhhbXBsZS5jb20AcGFzc3dvcmQxMjM=");
        assert!(plain.initial_response().is_none());
    }

    #[test]
    fn test_plain_without_sasl_ir_answers_first_challenge() {
        let mut plain = Plain::new("u", "p");
        assert_eq!(plain.respond(b"").unwrap(), b"\0u\0p");
        assert!(plain.respond(b"").is_none());
    }

    #[test]
    fn test_login_steps() {
        let mut login = Login::new("alice", "s3cret");
        assert!(login.initial_response().is_none());
        assert_eq!(login.respond(b"Username:").unwrap(), b"alice");
        assert_eq!(login.respond(b"Password:").unwrap(), b"s3cret");
        assert!(login.respond(b"More?").is_none());
    }

    #[test]
    fn test_xoauth2_format() {
        let mut mech = XOAuth2::new("user@example.com", "token123");
        let response = mech.initial_response().unwrap();
        assert_eq!(response, b"user=user@example.com\x01auth=Bearer token123\x01\x01");
        assert_eq!(
            encode(&response),
            "dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuMTIzAQE="
        );
        // Error challenge is acknowledged with an empty response.
        assert_eq!(mech.respond(b"{\"status\":\"401\"}").unwrap(), b"");
    }

    #[test]
    fn test_oauthbearer_format() {
        let mut mech = OAuthBearer::new("user@example.com", "token123");
        assert_eq!(
            mech.initial_response().unwrap(),
            b"n,a=user@example.com,\x01auth=Bearer token123\x01\x01"
        );
        assert_eq!(mech.respond(b"{}").unwrap(), vec![0x01]);
    }

    #[test]
    fn test_mechanism_for_matches_credentials() {
        let password = Credentials::password("u", "p");
        let oauth = Credentials::oauth2("u", "t");
        let anonymous = Credentials::anonymous("guest@example.com");

        assert_eq!(mechanism_for("plain", &password).unwrap().name(), "PLAIN");
        assert_eq!(mechanism_for("LOGIN", &password).unwrap().name(), "LOGIN");
        assert!(mechanism_for("XOAUTH2", &password).is_none());
        assert_eq!(mechanism_for("xoauth2", &oauth).unwrap().name(), "XOAUTH2");
        assert_eq!(mechanism_for("OAUTHBEARER", &oauth).unwrap().name(), "OAUTHBEARER");
        assert_eq!(mechanism_for("ANONYMOUS", &anonymous).unwrap().name(), "ANONYMOUS");
        assert_eq!(mechanism_for("cram-md5", &password).unwrap().name(), "CRAM-MD5");
        assert!(mechanism_for("CRAM-MD5", &oauth).is_none());
        assert!(mechanism_for("DIGEST-MD5", &password).is_none());
    }

    #[test]
    fn test_cram_md5_rfc2195_example() {
        let mut mech = CramMd5::new("tim", "tanstaaftanstaaf");
        assert!(mech.initial_response().is_none());
        let challenge = decode("PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+").unwrap();
        assert_eq!(challenge, b"<1896.697170952@postoffice.reston.mci.net>");

        let response = mech.respond(&challenge).unwrap();
        assert_eq!(response, b"tim b913a602c7eda7a495b4e6e7334d3890");
        assert_eq!(
            encode(&response),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
        );
        assert!(mech.respond(&challenge).is_none());
    }

    #[test]
    fn test_plaintext_flags() {
        assert!(Plain::new("u", "p").is_plaintext());
        assert!(Login::new("u", "p").is_plaintext());
        assert!(!XOAuth2::new("u", "t").is_plaintext());
        assert!(!Anonymous::new("x").is_plaintext());
        assert!(!CramMd5::new("u", "p").is_plaintext());
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("VXNlcm5hbWU6").unwrap(), b"Username:");
        assert!(decode("").unwrap().is_empty());
        assert!(decode("!!").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::password("alice", "hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
