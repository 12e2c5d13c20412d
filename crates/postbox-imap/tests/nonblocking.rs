//! Async wrapper tests.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::mpsc;

use common::{MockStream, plain_config, sent};
use postbox_imap::{AsyncSession, Command, ErrorKind, Session, SessionState, Status};

fn session(script: &str) -> (AsyncSession<MockStream>, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
    let stream = MockStream::new(&format!(
        "* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n{script}"
    ));
    let written = stream.written();
    let session = Session::with_stream(plain_config(), stream).unwrap();
    (AsyncSession::new(session), written)
}

#[tokio::test]
async fn submit_then_await_outcome() {
    let (session, written) = session("* 4 EXISTS\r\n0000 OK noop done\r\n");
    let handle = session.submit(Command::Noop).unwrap();
    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(outcome.responses.len(), 1);
    assert!(!session.is_busy());
    assert_eq!(sent(&written), "0000 NOOP\r\n");
}

#[tokio::test]
async fn second_submission_while_busy_is_rejected() {
    let (session, written) = session("0000 OK noop done\r\n");
    let (release, wait) = mpsc::channel::<()>();

    let first = session
        .spawn(move |s| {
            wait.recv().unwrap();
            s.noop()
        })
        .unwrap();

    let err = session.submit(Command::Noop).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    release.send(()).unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(sent(&written), "0000 NOOP\r\n");
    assert!(!session.is_busy());
}

#[tokio::test]
async fn no_completion_is_an_outcome_for_submit_and_an_error_for_execute() {
    let (session, _) = session("0000 NO nope\r\n0001 BAD what\r\n");
    let outcome = session.submit(Command::Noop).unwrap().await.unwrap().unwrap();
    assert_eq!(outcome.status, Status::No);

    let err = session.execute(Command::Noop).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolError);
}

#[tokio::test]
async fn select_and_logout() {
    let (session, written) = session(
        "* 9 EXISTS\r\n0000 OK [READ-ONLY] examined\r\n* BYE bye\r\n0001 OK logged out\r\n",
    );
    let selection = session.select_mailbox("INBOX", true).await.unwrap();
    assert_eq!(selection.exists, 9);
    assert!(selection.read_only);

    session.logout().await.unwrap();
    let state = session.run(|s| Ok(s.state())).await.unwrap();
    assert_eq!(state, SessionState::Disconnected);
    assert_eq!(sent(&written), "0000 EXAMINE INBOX\r\n0001 LOGOUT\r\n");
}

#[test]
fn runs_on_a_plain_block_on_runtime() {
    let (session, written) = session("0000 OK noop done\r\n");
    tokio_test::block_on(async {
        tokio_test::assert_ok!(session.execute(Command::Noop).await);
    });
    assert_eq!(sent(&written), "0000 NOOP\r\n");
}
