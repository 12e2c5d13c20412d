//! Session lifecycle tests against a scripted server.

#![allow(clippy::unwrap_used)]

mod common;

use bytes::Bytes;
use common::{MockStream, plain_config, sent};
use postbox_imap::{
    Capability, Command, Credentials, ErrorKind, LiteralMode, ResponseCode, SaslMechanism,
    Security, SequenceSet, Session, SessionConfig, SessionState,
};

const PREAUTH: &str = "* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] welcome back\r\n";

fn preauth_session(script: &str) -> (Session<MockStream>, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
    preauth_session_with(plain_config(), PREAUTH, script)
}

fn preauth_session_with(
    config: SessionConfig,
    greeting: &str,
    script: &str,
) -> (Session<MockStream>, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
    let stream = MockStream::new(&format!("{greeting}{script}"));
    let written = stream.written();
    let session = Session::with_stream(config, stream).unwrap();
    (session, written)
}

#[test]
fn greeting_without_imap4rev1_is_refused() {
    let stream = MockStream::new("* OK [CAPABILITY IMAP2bis] old server\r\n");
    let err = Session::with_stream(plain_config(), stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestCanceled);
}

#[test]
fn capability_is_requested_when_greeting_has_none() {
    let stream = MockStream::new(
        "* OK ready\r\n* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n0000 OK done\r\n",
    );
    let written = stream.written();
    let session = Session::with_stream(plain_config(), stream).unwrap();
    assert_eq!(session.state(), SessionState::Authenticating);
    assert!(session.capabilities().supports_auth("PLAIN"));
    assert_eq!(sent(&written), "0000 CAPABILITY\r\n");
}

#[test]
fn bye_greeting_is_a_connect_failure() {
    let stream = MockStream::new("* BYE [REFERRAL imap://other.example.org/] moved\r\n");
    let err = Session::with_stream(plain_config(), stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailure);
    assert!(err.to_string().contains("imap://other.example.org/"));
}

#[test]
fn preauth_skips_authentication() {
    let (mut session, written) = preauth_session("");
    assert_eq!(session.state(), SessionState::Authenticated);
    session
        .authenticate(&Credentials::password("user", "pass"))
        .unwrap();
    assert!(sent(&written).is_empty());
}

#[test]
fn starttls_upgrade_refreshes_capabilities() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::StartTls)
        .build();
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] hi\r\n\
         0000 OK Begin TLS negotiation now\r\n\
         * CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n\
         0001 OK done\r\n",
    );
    let written = stream.written();
    let session = Session::with_stream(config, stream).unwrap();

    assert!(session.is_secure());
    assert!(session.capabilities().supports_auth("PLAIN"));
    assert!(!session.has_capability(&Capability::STARTTLS));
    assert!(!session.has_capability(&Capability::LOGINDISABLED));
    assert_eq!(sent(&written), "0000 STARTTLS\r\n0001 CAPABILITY\r\n");
}

#[test]
fn starttls_handshake_failure_is_a_secure_channel_failure() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::StartTls)
        .build();
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 STARTTLS] hi\r\n0000 OK Begin TLS\r\n",
    )
    .failing_tls();
    let err = Session::with_stream(config, stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecureChannelFailure);
    assert!(err.is_fatal());
}

#[test]
fn starttls_rejects_data_sent_before_handshake() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::StartTls)
        .build();
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 STARTTLS] hi\r\n\
         0000 OK Begin TLS\r\n\
         * CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n",
    )
    .greedy();
    let err = Session::with_stream(config, stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecureChannelFailure);
}

#[test]
fn required_starttls_must_be_advertised() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::StartTls)
        .build();
    let stream = MockStream::new("* OK [CAPABILITY IMAP4rev1] hi\r\n");
    let written = stream.written();
    let err = Session::with_stream(config, stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecureChannelFailure);
    assert!(sent(&written).is_empty());
}

#[test]
fn opportunistic_tls_continues_in_plaintext() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::StartTlsIfAvailable)
        .build();
    let stream = MockStream::new("* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] hi\r\n");
    let session = Session::with_stream(config, stream).unwrap();
    assert!(!session.is_secure());
    assert_eq!(session.state(), SessionState::Authenticating);
}

#[test]
fn authentication_falls_back_to_next_mechanism() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN AUTH=LOGIN] ready\r\n\
         0000 NO [AUTHENTICATIONFAILED] PLAIN refused\r\n\
         + VXNlcm5hbWU6\r\n\
         + UGFzc3dvcmQ6\r\n\
         0001 OK [CAPABILITY IMAP4rev1 UIDPLUS] logged in\r\n",
    );
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    session
        .authenticate(&Credentials::password("user", "pass"))
        .unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.has_capability(&Capability::UIDPLUS));
    assert_eq!(
        sent(&written),
        "0000 AUTHENTICATE PLAIN AHVzZXIAcGFzcw==\r\n\
         0001 AUTHENTICATE LOGIN\r\n\
         dXNlcg==\r\n\
         cGFzcw==\r\n"
    );
}

#[test]
fn last_authentication_failure_is_reported() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n\
         0000 NO PLAIN refused\r\n\
         0001 NO [AUTHENTICATIONFAILED] bad password\r\n",
    );
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    let err = session
        .authenticate(&Credentials::password("user", "pass"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert_eq!(err.response_code(), Some(&ResponseCode::AuthenticationFailed));
    assert!(err.is_retryable_with_credentials());
    assert_eq!(session.state(), SessionState::Authenticating);
    assert!(sent(&written).ends_with("0001 LOGIN user pass\r\n"));
}

#[test]
fn plaintext_credentials_are_withheld_on_insecure_channel() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::None)
        .build();
    let stream = MockStream::new("* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n");
    let written = stream.written();
    let mut session = Session::with_stream(config, stream).unwrap();
    let err = session
        .authenticate(&Credentials::password("user", "pass"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestCanceled);
    assert!(sent(&written).is_empty());
}

#[test]
fn sasl_without_initial_response_capability_waits_for_challenge() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n\
         + \r\n\
         0000 OK [CAPABILITY IMAP4rev1] welcome\r\n",
    );
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    session
        .authenticate(&Credentials::password("user", "pass"))
        .unwrap();
    assert_eq!(
        sent(&written),
        "0000 AUTHENTICATE PLAIN\r\nAHVzZXIAcGFzcw==\r\n"
    );
}

#[test]
fn cram_md5_answers_the_timestamp_challenge() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 AUTH=CRAM-MD5] ready\r\n\
         + PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n\
         0000 OK [CAPABILITY IMAP4rev1] welcome\r\n",
    );
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    session
        .authenticate(&Credentials::password("tim", "tanstaaftanstaaf"))
        .unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(
        sent(&written),
        "0000 AUTHENTICATE CRAM-MD5\r\n\
         dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n"
    );
}

struct TicketMechanism;

impl SaslMechanism for TicketMechanism {
    fn name(&self) -> &'static str {
        "X-TICKET"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(b"secret".to_vec())
    }

    fn respond(&mut self, _challenge: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

#[test]
fn caller_supplied_mechanism_drives_the_exchange() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=X-TICKET] ready\r\n\
         0000 OK [CAPABILITY IMAP4rev1] welcome\r\n",
    );
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    session
        .authenticate_mechanism(Box::new(TicketMechanism))
        .unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(sent(&written), "0000 AUTHENTICATE X-TICKET c2VjcmV0\r\n");
}

#[test]
fn caller_supplied_mechanism_must_be_advertised() {
    let stream = MockStream::new("* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n");
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    let err = session
        .authenticate_mechanism(Box::new(TicketMechanism))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(session.state(), SessionState::Authenticating);
    assert!(sent(&written).is_empty());
}

#[test]
fn each_synchronizing_literal_waits_for_its_own_continuation() {
    let stream = MockStream::new(
        "* OK [CAPABILITY IMAP4rev1] ready\r\n\
         + go ahead\r\n\
         + go ahead\r\n\
         0000 OK [CAPABILITY IMAP4rev1] welcome\r\n",
    );
    let written = stream.written();
    let continuations = stream.continuations();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();
    session
        .authenticate(&Credentials::password("jürgen", "pässword"))
        .unwrap();

    assert_eq!(
        sent(&written),
        "0000 LOGIN {7}\r\njürgen {9}\r\npässword\r\n"
    );
    assert_eq!(
        *continuations.lock().unwrap(),
        vec![
            "0000 LOGIN {7}\r\n".to_string(),
            "0000 LOGIN {7}\r\njürgen {9}\r\n".to_string(),
        ]
    );
}

#[test]
fn timeout_during_command_tears_session_down() {
    let stream = MockStream::new(PREAUTH).timing_out();
    let written = stream.written();
    let mut session = Session::with_stream(plain_config(), stream).unwrap();

    let err = session.noop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(!session.is_connected());

    let err = session.noop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(sent(&written), "0000 NOOP\r\n");
}

#[test]
fn reselecting_sends_noop_and_switching_closes_first() {
    let (mut session, written) = preauth_session(
        "* 5 EXISTS\r\n\
         * OK [UIDVALIDITY 42] ok\r\n\
         0000 OK [READ-WRITE] selected\r\n\
         * 6 EXISTS\r\n\
         0001 OK noop\r\n\
         0002 OK closed\r\n\
         * 2 EXISTS\r\n\
         0003 OK [READ-WRITE] selected\r\n",
    );

    let inbox = session.select_mailbox("INBOX", false).unwrap();
    assert_eq!(inbox.exists, 5);
    assert_eq!(inbox.uid_validity, Some(42));

    let inbox = session.select_mailbox("inbox", false).unwrap();
    assert_eq!(inbox.exists, 6);

    let archive = session.select_mailbox("Archive", false).unwrap();
    assert_eq!(archive.name, "Archive");
    assert_eq!(archive.exists, 2);
    assert_eq!(session.state(), SessionState::MailboxSelected);

    assert_eq!(
        sent(&written),
        "0000 SELECT INBOX\r\n0001 NOOP\r\n0002 CLOSE\r\n0003 SELECT Archive\r\n"
    );
}

#[test]
fn failed_select_leaves_session_authenticated() {
    let (mut session, _) = preauth_session("0000 NO [NONEXISTENT] no such mailbox\r\n");
    let err = session.select_mailbox("Missing", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert!(!err.is_fatal());
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.selection().is_none());
    assert!(session.is_connected());
}

#[test]
fn second_issue_while_pending_sends_nothing() {
    let (mut session, written) = preauth_session("0000 OK done\r\n");
    let pending = session.issue(&Command::Noop).unwrap();
    let before = sent(&written);

    let err = session.issue(&Command::Noop).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(sent(&written), before);

    let outcome = session.complete(pending).unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.tag, "0000");
}

#[test]
fn commands_are_checked_against_state() {
    let (mut session, written) = preauth_session("");
    let err = session
        .fetch(
            &SequenceSet::single(1).unwrap(),
            &postbox_imap::FetchItems::Fast,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestCanceled);
    assert!(sent(&written).is_empty());
    assert!(session.is_connected());
}

#[test]
fn trycreate_leaves_session_usable() {
    let (mut session, written) = preauth_session(
        "0000 OK [READ-WRITE] selected\r\n\
         0001 NO [TRYCREATE] no such mailbox\r\n\
         0002 OK created\r\n\
         0003 OK [COPYUID 9 1:3 100:102] copied\r\n",
    );
    session.select_mailbox("INBOX", false).unwrap();

    let set = SequenceSet::range(1, 3).unwrap();
    let err = session.copy(&set, "Archive").unwrap_err();
    assert_eq!(err.response_code(), Some(&ResponseCode::TryCreate));

    session.create_mailbox("Archive").unwrap();
    let codes = session.copy(&set, "Archive").unwrap();
    assert_eq!(
        codes,
        vec![ResponseCode::CopyUid {
            uid_validity: 9,
            source: "1:3".to_string(),
            destination: "100:102".to_string(),
        }]
    );
    assert!(sent(&written).ends_with(
        "0001 COPY 1:3 Archive\r\n0002 CREATE Archive\r\n0003 COPY 1:3 Archive\r\n"
    ));
}

#[test]
fn bye_during_command_closes_session() {
    let (mut session, written) = preauth_session("* BYE shutting down\r\n0000 OK noop\r\n");
    session.noop().unwrap();
    assert!(session.is_closing());

    let err = session.noop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailure);
    assert!(!session.is_connected());
    assert_eq!(sent(&written), "0000 NOOP\r\n");
}

#[test]
fn synchronizing_literal_waits_for_continuation() {
    let (mut session, written) = preauth_session("+ ready\r\n0000 OK created\r\n");
    session.create_mailbox("Entwürfe").unwrap();
    assert_eq!(sent(&written), "0000 CREATE {9}\r\nEntwürfe\r\n");
}

#[test]
fn literal_plus_is_used_when_advertised() {
    let (mut session, written) = preauth_session_with(
        plain_config(),
        "* PREAUTH [CAPABILITY IMAP4rev1 LITERAL+] hi\r\n",
        "0000 OK created\r\n",
    );
    session.create_mailbox("Entwürfe").unwrap();
    assert_eq!(sent(&written), "0000 CREATE {9+}\r\nEntwürfe\r\n");
}

#[test]
fn required_non_synchronizing_literal_fails_closed() {
    let config = SessionConfig::builder("mock.example.org")
        .security(Security::None)
        .literal_mode(LiteralMode::RequireNonSynchronizing)
        .build();
    let (mut session, written) = preauth_session_with(config, PREAUTH, "");
    let err = session.create_mailbox("Entwürfe").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(sent(&written).is_empty());
    assert!(session.is_connected());
}

#[test]
fn literal_rejected_before_continuation() {
    let (mut session, written) = preauth_session(
        "0000 NO mailbox name refused\r\n0001 OK noop\r\n",
    );
    let err = session.create_mailbox("Entwürfe").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    session.noop().unwrap();
    assert_eq!(sent(&written), "0000 CREATE {9}\r\n0001 NOOP\r\n");
}

#[test]
fn binary_append_requires_binary_capability() {
    let (mut session, written) = preauth_session("");
    let err = session
        .append_with("INBOX", &[], Bytes::from_static(b"Subject: hi\r\n\r\n\0"), true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(sent(&written).is_empty());
}

#[test]
fn append_reports_appenduid() {
    let (mut session, written) = preauth_session(
        "+ go ahead\r\n0000 OK [APPENDUID 38505 3955] appended\r\n",
    );
    let code = session
        .append("Sent", &["\\Seen"], Bytes::from_static(b"Subject: hi\r\n\r\nbody\r\n"))
        .unwrap();
    assert_eq!(
        code,
        Some(ResponseCode::AppendUid {
            uid_validity: 38505,
            uids: "3955".to_string(),
        })
    );
    assert_eq!(
        sent(&written),
        "0000 APPEND Sent (\\Seen) {21}\r\nSubject: hi\r\n\r\nbody\r\n\r\n"
    );
}

#[test]
fn search_and_expunge_results() {
    let (mut session, written) = preauth_session(
        "0000 OK [READ-WRITE] selected\r\n\
         * SEARCH 2 4 9\r\n\
         0001 OK search done\r\n\
         * 4 EXPUNGE\r\n\
         * 2 EXPUNGE\r\n\
         0002 OK expunged\r\n",
    );
    session.select_mailbox("INBOX", false).unwrap();
    let criteria = postbox_imap::SearchCriteria::default().key("DELETED");
    assert_eq!(session.search(&criteria, true).unwrap(), vec![2, 4, 9]);
    assert_eq!(session.expunge().unwrap(), vec![4, 2]);
    assert!(sent(&written).ends_with("0001 UID SEARCH DELETED\r\n0002 EXPUNGE\r\n"));
}

#[test]
fn search_save_requires_searchres() {
    let (mut session, _) = preauth_session("0000 OK [READ-WRITE] selected\r\n");
    session.select_mailbox("INBOX", false).unwrap();
    let err = session
        .search_save(&postbox_imap::SearchCriteria::all(), true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn logout_disconnects() {
    let (mut session, written) = preauth_session("* BYE logging out\r\n0000 OK bye\r\n");
    session.logout().unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.is_connected());
    assert_eq!(sent(&written), "0000 LOGOUT\r\n");

    let err = session.noop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn server_closing_mid_response_is_fatal() {
    let (mut session, _) = preauth_session("* 3 EXISTS\r\n");
    let err = session.noop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailure);
    assert!(!session.is_connected());
    assert_eq!(session.state(), SessionState::Disconnected);
}
