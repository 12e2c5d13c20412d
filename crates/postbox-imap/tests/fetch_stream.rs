//! Block-wise body streaming against a scripted server.

#![allow(clippy::unwrap_used)]

mod common;

use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use common::{MockStream, sent};
use postbox_imap::{Error, ErrorKind, Security, SequenceSet, Session, SessionConfig};

const GREETING: &str = "* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n";
const EXAMINE_OK: &str = "* 3 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\n0000 OK [READ-ONLY] examined\r\n";

fn config(keep_alive: bool) -> SessionConfig {
    SessionConfig::builder("mock.example.org")
        .security(Security::None)
        .fetch_block_size(16)
        .keep_alive(keep_alive)
        .build()
}

fn selected(script: &str, keep_alive: bool) -> (Session<MockStream>, Arc<Mutex<Vec<u8>>>) {
    let stream = MockStream::new(&format!("{GREETING}{EXAMINE_OK}{script}"));
    let written = stream.written();
    let mut session = Session::with_stream(config(keep_alive), stream).unwrap();
    session.select_mailbox("INBOX", true).unwrap();
    (session, written)
}

fn block(tag: &str, offset: u64, data: &str, size: Option<u64>) -> String {
    let size = size.map(|n| format!("RFC822.SIZE {n} ")).unwrap_or_default();
    format!(
        "* 1 FETCH (UID 5 {size}BODY[]<{offset}> {{{}}}\r\n{data})\r\n{tag} OK done\r\n",
        data.len()
    )
}

const BODY: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCD";

fn forty_byte_script() -> String {
    [
        block("0001", 0, &BODY[..16], Some(40)),
        block("0002", 16, &BODY[16..32], None),
        block("0003", 32, &BODY[32..], None),
    ]
    .concat()
}

fn source_kind(err: &std::io::Error) -> ErrorKind {
    err.get_ref()
        .and_then(|e| e.downcast_ref::<Error>())
        .map(Error::kind)
        .unwrap()
}

#[test]
fn reads_whole_body_in_blocks() {
    let (mut session, written) = selected(&forty_byte_script(), true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let mut body = Vec::new();
    let mut buf = [0u8; 6];
    let mut sizes = Vec::new();
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        if sizes.is_empty() {
            assert_eq!(stream.length(), Some(40));
        }
        sizes.push(n);
        body.extend_from_slice(&buf[..n]);
    }

    assert_eq!(sizes, vec![6, 6, 6, 6, 6, 6, 4]);
    assert_eq!(body, BODY.as_bytes());
    assert_eq!(stream.length(), Some(40));

    let before = sent(&written);
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
    assert_eq!(sent(&written), before);

    assert_eq!(
        before,
        "0000 EXAMINE INBOX\r\n\
         0001 UID FETCH 5 (RFC822.SIZE BODY.PEEK[]<0.16>)\r\n\
         0002 UID FETCH 5 BODY.PEEK[]<16.16>\r\n\
         0003 UID FETCH 5 BODY.PEEK[]<32.16>\r\n"
    );
}

#[test]
fn seek_within_block_does_not_refetch() {
    let (mut session, written) = selected(&block("0001", 0, &BODY[..16], Some(40)), true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"0123");

    assert_eq!(stream.seek(SeekFrom::Start(10)).unwrap(), 10);
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"abcd");

    assert_eq!(stream.seek(SeekFrom::End(-40)).unwrap(), 0);
    assert_eq!(sent(&written).matches("FETCH").count(), 1);
}

#[test]
fn seek_outside_block_refetches_at_new_offset() {
    let script = [
        block("0001", 0, &BODY[..16], Some(40)),
        block("0002", 30, &BODY[30..40], None),
    ]
    .concat();
    let (mut session, written) = selected(&script, true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).unwrap();
    stream.seek(SeekFrom::Current(28)).unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, &BODY.as_bytes()[30..]);
    assert!(sent(&written).ends_with("0002 UID FETCH 5 BODY.PEEK[]<30.16>\r\n"));
}

#[test]
fn seek_errors() {
    let (mut session, _) = selected("", true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let err = stream.seek(SeekFrom::End(0)).unwrap_err();
    assert_eq!(source_kind(&err), ErrorKind::Unsupported);

    let err = stream.seek(SeekFrom::Current(-1)).unwrap_err();
    assert_eq!(err.kind(), IoErrorKind::InvalidInput);
    assert_eq!(source_kind(&err), ErrorKind::InvalidArgument);
}

#[test]
fn section_without_size_ends_on_short_block() {
    let script = "* 1 FETCH (BODY[1.MIME]<0> {5}\r\nhello)\r\n0001 OK done\r\n";
    let (mut session, written) = selected(script, true);
    let seq = SequenceSet::single(1).unwrap();
    let mut stream = session.open_fetch_stream(&seq, Some("1.MIME")).unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    assert_eq!(out, "hello");
    assert_eq!(stream.length(), Some(5));
    assert!(sent(&written).ends_with("0001 FETCH 1 BODY.PEEK[1.MIME]<0.16>\r\n"));
}

#[test]
fn empty_block_after_seeking_past_end_leaves_length_unknown() {
    let script = "* 1 FETCH (BODY[1]<100> \"\")\r\n0001 OK done\r\n\
                  * 1 FETCH (BODY[1]<0> {5}\r\nhello)\r\n0002 OK done\r\n";
    let (mut session, written) = selected(script, true);
    let seq = SequenceSet::single(1).unwrap();
    let mut stream = session.open_fetch_stream(&seq, Some("1")).unwrap();

    stream.seek(SeekFrom::Start(100)).unwrap();
    assert_eq!(stream.read(&mut [0u8; 8]).unwrap(), 0);
    assert_eq!(stream.length(), None);

    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    assert_eq!(out, "hello");
    assert_eq!(stream.length(), Some(5));

    let before = sent(&written);
    assert_eq!(stream.read(&mut [0u8; 8]).unwrap(), 0);
    assert_eq!(sent(&written), before);
    assert_eq!(before.matches("FETCH").count(), 2);
}

#[test]
fn missing_body_is_a_protocol_error() {
    let (mut session, _) = selected("0001 OK nothing found\r\n", true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let err = stream.read(&mut [0u8; 8]).unwrap_err();
    assert_eq!(source_kind(&err), ErrorKind::ProtocolError);
}

#[test]
fn origin_mismatch_is_unknown_error() {
    let (mut session, _) = selected(&block("0001", 8, &BODY[8..24], None), true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();

    let err = stream.read(&mut [0u8; 8]).unwrap_err();
    assert_eq!(source_kind(&err), ErrorKind::UnknownError);
}

#[test]
fn pinned_uid_validity_mismatch_cancels() {
    let (mut session, written) = selected("", true);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session
        .open_fetch_stream(&uid, None)
        .unwrap()
        .with_uid_validity(8);

    let err = stream.read(&mut [0u8; 8]).unwrap_err();
    assert_eq!(source_kind(&err), ErrorKind::RequestCanceled);
    assert!(!sent(&written).contains("FETCH"));
}

#[test]
fn requires_single_message_and_selection() {
    let stream = MockStream::new(GREETING);
    let mut session = Session::with_stream(config(true), stream).unwrap();
    let uid = SequenceSet::uid_single(5).unwrap();
    let err = session.open_fetch_stream(&uid, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestCanceled);

    let (mut session, _) = selected("", true);
    let range = SequenceSet::uid_range(5, 9).unwrap();
    let err = session.open_fetch_stream(&range, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn close_without_keep_alive_logs_out() {
    let script = format!(
        "{}0002 OK closed\r\n* BYE bye\r\n0003 OK logged out\r\n",
        block("0001", 0, &BODY[..16], Some(40))
    );
    let (mut session, written) = selected(&script, false);
    let uid = SequenceSet::uid_single(5).unwrap();
    let mut stream = session.open_fetch_stream(&uid, None).unwrap();
    stream.read_exact(&mut [0u8; 4]).unwrap();
    stream.close().unwrap();

    assert!(!session.is_connected());
    assert!(sent(&written).ends_with("0002 CLOSE\r\n0003 LOGOUT\r\n"));
}

#[test]
fn close_with_keep_alive_keeps_session() {
    let (mut session, written) = selected("", true);
    let uid = SequenceSet::uid_single(5).unwrap();
    session.open_fetch_stream(&uid, None).unwrap().close().unwrap();
    assert!(session.is_connected());
    assert_eq!(sent(&written), "0000 EXAMINE INBOX\r\n");
}
