//! Server capabilities.
//!
//! Capabilities are case-insensitive atoms. [`Capability`] wraps the atom
//! text and compares with ASCII case folding; well-known names are exposed
//! as associated constants.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A server capability atom such as `IMAP4rev1` or `AUTH=PLAIN`.
#[derive(Debug, Clone)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// `IMAP4rev1` (RFC 3501).
    pub const IMAP4REV1: Self = Self::from_static("IMAP4rev1");
    /// `STARTTLS` (RFC 3501).
    pub const STARTTLS: Self = Self::from_static("STARTTLS");
    /// `LOGINDISABLED` (RFC 3501).
    pub const LOGINDISABLED: Self = Self::from_static("LOGINDISABLED");
    /// `LITERAL+` (RFC 7888).
    pub const LITERAL_PLUS: Self = Self::from_static("LITERAL+");
    /// `BINARY` (RFC 3516).
    pub const BINARY: Self = Self::from_static("BINARY");
    /// `UIDPLUS` (RFC 4315).
    pub const UIDPLUS: Self = Self::from_static("UIDPLUS");
    /// `SEARCHRES` (RFC 5182).
    pub const SEARCHRES: Self = Self::from_static("SEARCHRES");
    /// `SASL-IR` (RFC 4959).
    pub const SASL_IR: Self = Self::from_static("SASL-IR");
    /// `NAMESPACE` (RFC 2342).
    pub const NAMESPACE: Self = Self::from_static("NAMESPACE");
    /// `ID` (RFC 2971).
    pub const ID: Self = Self::from_static("ID");
    /// `UNSELECT` (RFC 3691).
    pub const UNSELECT: Self = Self::from_static("UNSELECT");
    /// `SORT` (RFC 5256).
    pub const SORT: Self = Self::from_static("SORT");
    /// `ESEARCH` (RFC 4731).
    pub const ESEARCH: Self = Self::from_static("ESEARCH");

    /// Prefix of SASL mechanism capabilities.
    pub const AUTH_PREFIX: &'static str = "AUTH=";
    /// Prefix of THREAD algorithm capabilities.
    pub const THREAD_PREFIX: &'static str = "THREAD=";

    /// Creates a capability from a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a capability from any string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Creates the `AUTH=<mechanism>` capability.
    #[must_use]
    pub fn auth(mechanism: &str) -> Self {
        Self::new(format!("{}{mechanism}", Self::AUTH_PREFIX))
    }

    /// Returns the atom text as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the mechanism name if this is an `AUTH=` capability.
    #[must_use]
    pub fn auth_mechanism(&self) -> Option<&str> {
        strip_prefix_ignore_case(&self.0, Self::AUTH_PREFIX)
    }

    /// Returns the algorithm name if this is a `THREAD=` capability.
    #[must_use]
    pub fn thread_algorithm(&self) -> Option<&str> {
        strip_prefix_ignore_case(&self.0, Self::THREAD_PREFIX)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The set of capabilities a server advertised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns true if the capability is present.
    #[must_use]
    pub fn contains(&self, capability: &Capability) -> bool {
        self.0.iter().any(|c| c == capability)
    }

    /// Returns true if the server advertised `AUTH=<mechanism>`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth_mechanisms()
            .any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Iterates the advertised SASL mechanism names in server order.
    pub fn auth_mechanisms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(Capability::auth_mechanism)
    }

    /// Iterates the advertised THREAD algorithms.
    pub fn thread_algorithms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(Capability::thread_algorithm)
    }

    /// Adds a capability if not already present.
    pub fn insert(&mut self, capability: Capability) {
        if !self.contains(&capability) {
            self.0.push(capability);
        }
    }

    /// Iterates the capabilities.
    pub fn iter(&self) -> std::slice::Iter<'_, Capability> {
        self.0.iter()
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no capabilities are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CapabilitySet {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
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
    use std::collections::HashSet;

    use super::*;

    fn set(atoms: &[&str]) -> CapabilitySet {
        atoms.iter().map(|a| Capability::from(*a)).collect()
    }

    #[test]
    fn test_case_insensitive_equality() {
        assert_eq!(Capability::new("imap4REV1"), Capability::IMAP4REV1);
        assert_ne!(Capability::new("IMAP4rev2"), Capability::IMAP4REV1);
    }

    #[test]
    fn test_hash_agrees_with_eq() {
        let mut seen = HashSet::new();
        seen.insert(Capability::new("literal+"));
        assert!(seen.contains(&Capability::LITERAL_PLUS));
    }

    #[test]
    fn test_auth_mechanisms() {
        let caps = set(&["IMAP4rev1", "AUTH=PLAIN", "auth=xoauth2", "IDLE"]);
        let mechs: Vec<_> = caps.auth_mechanisms().collect();
        assert_eq!(mechs, vec!["PLAIN", "xoauth2"]);
        assert!(caps.supports_auth("XOAUTH2"));
        assert!(!caps.supports_auth("CRAM-MD5"));
    }

    #[test]
    fn test_thread_algorithms() {
        let caps = set(&["THREAD=REFERENCES", "THREAD=ORDEREDSUBJECT"]);
        let algs: Vec<_> = caps.thread_algorithms().collect();
        assert_eq!(algs, vec!["REFERENCES", "ORDEREDSUBJECT"]);
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut caps = set(&["IMAP4rev1"]);
        caps.insert(Capability::new("imap4rev1"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_auth_constructor() {
        assert_eq!(Capability::auth("PLAIN").as_str(), "AUTH=PLAIN");
        assert_eq!(Capability::auth("PLAIN").auth_mechanism(), Some("PLAIN"));
        assert_eq!(Capability::IMAP4REV1.auth_mechanism(), None);
    }
}
