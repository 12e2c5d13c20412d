//! `postbox` - stream one message section from an IMAP mailbox to stdout.
//!
//! ```text
//! postbox <uid> [section]
//! ```
//!
//! Connection settings are read from `<config dir>/postbox/settings.json`,
//! or from the file named by `POSTBOX_CONFIG`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use postbox_imap::{AsyncSession, Credentials, SequenceSet, SessionConfig};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Contents of the settings file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    /// Session configuration; unset fields take the library defaults.
    session: SessionConfig,
    /// Login name.
    username: String,
    /// Password; `POSTBOX_PASSWORD` takes precedence.
    password: Option<String>,
    /// OAuth2 access token, used instead of a password when set.
    oauth_token: Option<String>,
    /// Mailbox holding the message.
    mailbox: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            username: String::new(),
            password: None,
            oauth_token: None,
            mailbox: "INBOX".to_string(),
        }
    }
}

impl Settings {
    fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = &self.oauth_token {
            return Ok(Credentials::oauth2(&self.username, token));
        }
        if self.username.is_empty() {
            return Ok(Credentials::anonymous("postbox"));
        }
        let password = std::env::var("POSTBOX_PASSWORD")
            .ok()
            .or_else(|| self.password.clone())
            .context("no password: set POSTBOX_PASSWORD or \"password\" in the settings file")?;
        Ok(Credentials::password(&self.username, password))
    }
}

fn settings_path() -> PathBuf {
    std::env::var_os("POSTBOX_CONFIG").map_or_else(
        || {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("postbox")
                .join("settings.json")
        },
        PathBuf::from,
    )
}

async fn load_settings() -> Result<Settings> {
    let path = settings_path();
    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Positional arguments.
struct Args {
    uid: u32,
    section: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(uid) = args.next() else {
        bail!("usage: postbox <uid> [section]");
    };
    let uid = uid
        .parse()
        .with_context(|| format!("invalid UID {uid:?}"))?;
    Ok(Args {
        uid,
        section: args.next(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbox=info,postbox_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = parse_args()?;
    let settings = load_settings().await?;
    let credentials = settings.credentials()?;
    let read_only = settings.session.read_only;

    info!(host = %settings.session.host, mailbox = %settings.mailbox, uid = args.uid, "starting");

    let session = AsyncSession::connect(settings.session)
        .await
        .context("connecting")?;
    session
        .authenticate(credentials)
        .await
        .context("authenticating")?;
    let selection = session
        .select_mailbox(&settings.mailbox, read_only)
        .await
        .with_context(|| format!("selecting {}", settings.mailbox))?;
    info!(exists = selection.exists, "mailbox open");

    let uid = SequenceSet::uid_single(args.uid)?;
    let section = args.section;
    let copied = session
        .run(move |session| {
            let mut body = session.open_fetch_stream(&uid, section.as_deref())?;
            let mut stdout = io::stdout().lock();
            let copied = io::copy(&mut body, &mut stdout)?;
            stdout.flush()?;
            body.close()?;
            Ok(copied)
        })
        .await
        .context("streaming message")?;
    info!(bytes = copied, "done");

    if session.run(|s| Ok(s.is_connected())).await? {
        session.logout().await.context("logging out")?;
    }
    Ok(())
}
