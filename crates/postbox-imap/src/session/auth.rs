//! Authentication: mechanism selection, SASL exchanges and LOGIN.

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::connection::Transport;
use crate::error::ErrorKind;
use crate::parser::UntaggedResponse;
use crate::sasl::{self, Credentials, SUPPORTED_MECHANISMS, SaslMechanism};
use crate::types::{Capability, ResponseCode};
use crate::{Error, Result};

use super::{CommandOutcome, Session, SessionState};

/// One way of presenting credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    /// `AUTHENTICATE <mechanism>`.
    Sasl(String),
    /// The LOGIN command.
    Login { username: String, password: String },
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Self::Sasl(name) => name,
            Self::Login { .. } => "LOGIN command",
        }
    }
}

impl<S: Transport> Session<S> {
    /// Authenticates with the mechanisms and insecure-login policy from the
    /// session configuration.
    ///
    /// # Errors
    ///
    /// As for [`authenticate_with`](Self::authenticate_with).
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let mechanisms = self.config.sasl_mechanisms.clone();
        let allow_insecure = self.config.allow_insecure_login;
        self.authenticate_with(credentials, &mechanisms, allow_insecure)
    }

    /// Authenticates, trying each applicable mechanism in turn.
    ///
    /// With `allowed_mechanisms` non-empty, only those are tried, in that
    /// order and only when advertised. Otherwise advertised mechanisms the
    /// engine implements are tried first, then the LOGIN command if the
    /// server permits it. Plaintext mechanisms are skipped over an insecure
    /// channel unless `allow_insecure` is set.
    ///
    /// # Errors
    ///
    /// `RequestCanceled` if no mechanism applies; otherwise the failure of
    /// the last candidate tried.
    pub fn authenticate_with(
        &mut self,
        credentials: &Credentials,
        allowed_mechanisms: &[String],
        allow_insecure: bool,
    ) -> Result<()> {
        if !self.needs_authentication()? {
            return Ok(());
        }

        let candidates = self.auth_candidates(credentials, allowed_mechanisms, allow_insecure);
        if candidates.is_empty() {
            return Err(Error::RequestCanceled(
                "No authentication mechanism available".to_string(),
            ));
        }

        let mut last_error = None;
        for candidate in candidates {
            debug!(mechanism = candidate.name(), "trying authentication");
            match self.try_candidate(&candidate, credentials) {
                Ok(code) => {
                    let user = credentials.username().unwrap_or("anonymous");
                    return self.finish_login(code.as_ref(), user, candidate.name());
                }
                Err(e) if e.kind() == ErrorKind::ProtocolError => {
                    warn!(mechanism = candidate.name(), error = %e, "authentication rejected");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::RequestCanceled("No authentication mechanism succeeded".to_string())
        }))
    }

    /// Authenticates with a caller-supplied mechanism. The server must
    /// advertise `AUTH=<name>`; no fallback is attempted.
    ///
    /// # Errors
    ///
    /// `Unsupported` if the mechanism is not advertised, `RequestCanceled`
    /// for a plaintext mechanism on an insecure channel without
    /// `allow_insecure_login`, `ProtocolError` if the server rejects it.
    pub fn authenticate_mechanism(
        &mut self,
        mut mechanism: Box<dyn SaslMechanism>,
    ) -> Result<()> {
        if !self.needs_authentication()? {
            return Ok(());
        }
        let name = mechanism.name();
        if !self.capabilities.supports_auth(name) {
            return Err(Error::Unsupported(format!(
                "Server does not advertise AUTH={name}"
            )));
        }
        if mechanism.is_plaintext() && !(self.config.allow_insecure_login || self.is_secure()) {
            return Err(Error::RequestCanceled(format!(
                "{name} would expose credentials on an insecure channel"
            )));
        }

        debug!(mechanism = name, "trying caller-supplied mechanism");
        let outcome = self.sasl_exchange(mechanism.as_mut())?;
        self.finish_login(outcome.code.as_ref(), "caller-supplied", name)
    }

    /// False when already authenticated; an error outside the
    /// authenticating state.
    fn needs_authentication(&self) -> Result<bool> {
        if self.state.is_authenticated() {
            debug!("already authenticated");
            return Ok(false);
        }
        if self.stream.is_none() {
            return Err(Self::not_connected());
        }
        if self.state != SessionState::Authenticating {
            return Err(Error::RequestCanceled(format!(
                "Cannot authenticate while {}",
                self.state
            )));
        }
        Ok(true)
    }

    fn finish_login(
        &mut self,
        code: Option<&ResponseCode>,
        user: &str,
        mechanism: &str,
    ) -> Result<()> {
        self.state = SessionState::Authenticated;
        info!(host = %self.config.host, user, mechanism, "authenticated");
        if !matches!(code, Some(ResponseCode::Capability(_))) {
            self.refresh_capabilities()?;
        }
        self.after_login()
    }

    fn auth_candidates(
        &self,
        credentials: &Credentials,
        allowed_mechanisms: &[String],
        allow_insecure: bool,
    ) -> Vec<Candidate> {
        let plaintext_ok = allow_insecure || self.is_secure();
        let login_enabled = !self.capabilities.contains(&Capability::LOGINDISABLED);

        let names: Vec<String> = if allowed_mechanisms.is_empty() {
            SUPPORTED_MECHANISMS
                .iter()
                .map(|name| (*name).to_string())
                .collect()
        } else {
            allowed_mechanisms.to_vec()
        };

        let mut candidates = Vec::new();
        let mut login_command = false;
        for name in &names {
            let Some(mechanism) = sasl::mechanism_for(name, credentials) else {
                continue;
            };
            if mechanism.is_plaintext() && !plaintext_ok {
                debug!(mechanism = name.as_str(), "skipping plaintext mechanism on insecure channel");
                continue;
            }
            if self.capabilities.supports_auth(name) {
                candidates.push(Candidate::Sasl(mechanism.name().to_string()));
            } else if name.eq_ignore_ascii_case("LOGIN") {
                // A pinned LOGIN without AUTH=LOGIN means the LOGIN command.
                login_command = true;
            }
        }

        if !login_enabled {
            return candidates;
        }

        match credentials {
            Credentials::Password { username, password }
                if plaintext_ok && (login_command || allowed_mechanisms.is_empty()) =>
            {
                candidates.push(Candidate::Login {
                    username: username.clone(),
                    password: password.clone(),
                });
            }
            Credentials::Anonymous { trace } if !self.capabilities.supports_auth("ANONYMOUS") => {
                candidates.push(Candidate::Login {
                    username: "anonymous".to_string(),
                    password: trace.clone(),
                });
            }
            _ => {}
        }

        candidates
    }

    /// Runs one candidate; returns the tagged OK's response code.
    fn try_candidate(
        &mut self,
        candidate: &Candidate,
        credentials: &Credentials,
    ) -> Result<Option<ResponseCode>> {
        let outcome = match candidate {
            Candidate::Login { username, password } => self.execute(&Command::Login {
                username: username.clone(),
                password: password.clone(),
            })?,
            Candidate::Sasl(name) => {
                let mut mechanism = sasl::mechanism_for(name, credentials).ok_or_else(|| {
                    Error::Unsupported(format!("Mechanism {name} is not implemented"))
                })?;
                self.sasl_exchange(mechanism.as_mut())?
            }
        };
        Ok(outcome.code)
    }

    /// `AUTHENTICATE` driven by `mechanism`, with the initial response
    /// inlined under SASL-IR. A challenge the mechanism cannot answer is
    /// cancelled with `*`.
    fn sasl_exchange(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<CommandOutcome> {
        let initial = mechanism.initial_response();
        let (inline, mut deferred) = if self.capabilities.contains(&Capability::SASL_IR) {
            let inline = initial.map(|r| {
                if r.is_empty() {
                    "=".to_string()
                } else {
                    sasl::encode(&r)
                }
            });
            (inline, None)
        } else {
            (None, initial)
        };

        let pending = self.issue(&Command::Authenticate {
            mechanism: mechanism.name().to_string(),
            initial_response: inline,
        })?;
        let outcome = self.complete_with(pending, |text| {
            if let Some(first) = deferred.take() {
                return Ok(sasl::encode(&first));
            }
            let reply = sasl::decode(text)
                .ok()
                .and_then(|challenge| mechanism.respond(&challenge));
            Ok(reply.map_or_else(|| "*".to_string(), |r| sasl::encode(&r)))
        })?;
        outcome.into_result()
    }

    /// NAMESPACE and ID, when advertised.
    pub(super) fn after_login(&mut self) -> Result<()> {
        if self.capabilities.contains(&Capability::NAMESPACE) {
            match self.execute(&Command::Namespace) {
                Ok(outcome) => self.namespace = outcome.raw("NAMESPACE").next().cloned(),
                Err(e) if e.kind() == ErrorKind::ProtocolError => {
                    warn!(error = %e, "NAMESPACE failed");
                }
                Err(e) => return Err(e),
            }
        }

        if self.capabilities.contains(&Capability::ID) {
            let parameters = self.config.client_id.clone();
            match self.execute(&Command::Id { parameters }) {
                Ok(outcome) => {
                    self.server_id = outcome.responses.into_iter().find_map(|r| match r {
                        UntaggedResponse::Other { keyword, raw, .. } if keyword == "ID" => {
                            Some(raw)
                        }
                        _ => None,
                    });
                }
                Err(e) if e.kind() == ErrorKind::ProtocolError => {
                    warn!(error = %e, "ID failed");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
