//! Cursor scans and pub/sub handoff against a scripted server.

mod common;

use common::{Action, MockServer, HELLO_REPLY};
use nuncio::{Session, Value};
use std::time::Duration;

#[test]
fn scan_yields_every_element_across_pages() {
    let server = MockServer::start(vec![
        Action::Recv,
        Action::Send(HELLO_REPLY),
        Action::Recv,
        Action::Send(b"*2\r\n$2\r\n42\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n"),
        Action::Recv,
        // A cursor of "00" is not the terminator: comparison is textual.
        Action::Send(b"*2\r\n$2\r\n00\r\n*1\r\n$1\r\nc\r\n"),
        Action::Recv,
        Action::Send(b"*2\r\n$1\r\n0\r\n*1\r\n$1\r\nd\r\n"),
    ]);

    let mut session = Session::new(server.config());
    let elements: Vec<Value> = session
        .scan("SCAN", &["MATCH", "*"])
        .collect::<nuncio::Result<_>>()
        .unwrap();

    assert_eq!(
        elements,
        vec![
            Value::Bulk("a".into()),
            Value::Bulk("b".into()),
            Value::Bulk("c".into()),
            Value::Bulk("d".into()),
        ]
    );

    let received = server.finish();
    assert_eq!(received[1], vec!["SCAN", "0", "MATCH", "*"]);
    assert_eq!(received[2], vec!["SCAN", "42", "MATCH", "*"]);
    assert_eq!(received[3], vec!["SCAN", "00", "MATCH", "*"]);
}

#[test]
fn scan_handles_an_empty_keyspace() {
    let server = MockServer::start(vec![
        Action::Recv,
        Action::Send(HELLO_REPLY),
        Action::Recv,
        Action::Send(b"*2\r\n$1\r\n0\r\n*0\r\n"),
    ]);

    let mut session = Session::new(server.config());
    let elements: Vec<Value> = session
        .scan("SCAN", &[] as &[&str])
        .collect::<nuncio::Result<_>>()
        .unwrap();
    assert!(elements.is_empty());

    server.finish();
}

#[test]
fn scan_key_places_the_key_before_the_cursor() {
    let server = MockServer::start(vec![
        Action::Recv,
        Action::Send(HELLO_REPLY),
        Action::Recv,
        Action::Send(b"*2\r\n$1\r\n0\r\n*2\r\n$5\r\nfield\r\n$5\r\nvalue\r\n"),
    ]);

    let mut session = Session::new(server.config());
    let elements: Vec<Value> = session
        .scan_key("HSCAN", "myhash", &["COUNT", "100"])
        .collect::<nuncio::Result<_>>()
        .unwrap();

    assert_eq!(elements.len(), 2);

    let received = server.finish();
    assert_eq!(received[1], vec!["HSCAN", "myhash", "0", "COUNT", "100"]);
}

#[test]
fn pubsub_handoff_moves_the_stream() {
    let server = MockServer::start(vec![
        Action::Recv,
        Action::Send(HELLO_REPLY),
        Action::Recv,
        Action::Pause(Duration::from_millis(60)),
        Action::Send(b">3\r\n$9\r\nsubscribe\r\n$3\r\nfoo\r\n:1\r\n"),
        Action::Pause(Duration::from_millis(30)),
        Action::Send(b">3\r\n$7\r\nmessage\r\n$3\r\nfoo\r\n$5\r\nhello\r\n"),
    ]);

    let mut session = Session::new(server.config());
    let mut pubsub = session.pubsub().unwrap();

    // The session no longer holds a stream.
    assert!(!session.is_connected());

    pubsub.call(&["SUBSCRIBE", "foo"]).unwrap();

    // An idle channel inside the deadline yields no event and does not
    // close the stream.
    assert!(pubsub
        .next_event(Some(Duration::from_millis(10)))
        .unwrap()
        .is_none());

    // An unbounded wait still receives the pending confirmation...
    let event = pubsub.next_event(None).unwrap().unwrap();
    match event {
        Value::Push(ref items) => assert_eq!(items[0].as_str(), Some("subscribe")),
        other => panic!("expected a push event, got {other:?}"),
    }

    // ...and the published message after it.
    let event = pubsub.next_event(None).unwrap().unwrap();
    match event {
        Value::Push(ref items) => {
            assert_eq!(items[0].as_str(), Some("message"));
            assert_eq!(items[1].as_str(), Some("foo"));
            assert_eq!(items[2].as_str(), Some("hello"));
        }
        other => panic!("expected the published message, got {other:?}"),
    }

    let received = server.finish();
    assert_eq!(received[1], vec!["SUBSCRIBE", "foo"]);
}

#[test]
fn session_reopens_after_handoff() {
    let server = MockServer::start_sessions(vec![
        vec![Action::Recv, Action::Send(HELLO_REPLY)],
        vec![
            Action::Recv,
            Action::Send(HELLO_REPLY),
            Action::Recv,
            Action::Send(b"+PONG\r\n"),
        ],
    ]);

    let mut session = Session::new(server.config());
    let _pubsub = session.pubsub().unwrap();

    // The next use opens a fresh transport and re-handshakes.
    assert_eq!(session.call(&["PING"]).unwrap().as_str(), Some("PONG"));

    let received = server.finish();
    assert_eq!(received.len(), 3);
    assert_eq!(received[1], vec!["HELLO", "3"]);
}
