//! Tests for byte-stream channels
//!
//! These tests verify:
//! - Server-role channels announce themselves on accept
//! - Inbound framing over a real socket, with arbitrary chunking
//! - Send terminator handling and send atomicity under concurrency
//! - Close idempotence and the single disconnect notification
//! - Callback failures stay contained

mod common;

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use commlink::{
    ChannelHandle, CommClient, CommError, Config, FnHandler, LinkEvent, Terminator,
};

use common::*;

// =============================================================================
// Connect / Framing Tests
// =============================================================================

#[test]
fn test_accepted_channel_fires_connect() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let _remote = raw_connect(server.local_addr());

    let (unit_id, event) = recorded.expect_event();
    assert_eq!(unit_id, "1");
    assert_eq!(event, LinkEvent::Connected);

    let channel = server.channel("1").unwrap();
    assert!(channel.is_connected());
    assert_eq!(channel.terminator(), &Terminator::line());
}

#[test]
fn test_chunked_input_is_framed() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let mut remote = raw_connect(server.local_addr());
    recorded.expect_event();

    for chunk in [&b"hel"[..], b"lo\nwor", b"ld", b"\n\n", b"tail"] {
        remote.write_all(chunk).unwrap();
        remote.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let messages: Vec<Bytes> = (0..3).map(|_| recorded.expect_message().1).collect();
    assert_eq!(
        messages,
        vec![
            Bytes::from_static(b"hello"),
            Bytes::from_static(b"world"),
            Bytes::from_static(b""),
        ]
    );
    // "tail" never got its terminator
    assert!(recorded.messages.recv_timeout(QUIET).is_err());
}

#[test]
fn test_no_terminator_delivers_chunks() {
    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let (recorder, recorded) = Recorder::new();
    let server = commlink::CommServer::bind(
        &reactor.handle,
        localhost(),
        Terminator::none(),
        recorder,
        &config,
    )
    .unwrap();

    let mut remote = raw_connect(server.local_addr());
    recorded.expect_event();
    remote.write_all(b"no framing\n").unwrap();

    let mut received = Vec::new();
    while received.len() < b"no framing\n".len() {
        received.extend_from_slice(&recorded.expect_message().1);
    }
    assert_eq!(received, b"no framing\n");
}

// =============================================================================
// Send Tests
// =============================================================================

#[test]
fn test_send_appends_terminator_once() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let mut remote = raw_connect(server.local_addr());
    recorded.expect_event();
    let channel = server.channel("1").unwrap();

    channel.send(b"ping", true).unwrap();
    channel.send(b"pong\n", true).unwrap();
    channel.send(b"raw", false).unwrap();
    channel.send_str("text").unwrap();

    let expected = b"ping\npong\nrawtext\n";
    assert_eq!(read_exact_len(&mut remote, expected.len()), expected);
}

#[test]
fn test_concurrent_sends_do_not_interleave() {
    const PER_THREAD: usize = 200;
    const LEN: usize = 2000;

    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let (server_recorder, server_recorded) = Recorder::new();
    let server = start_server(&reactor, server_recorder, &config);

    let client = Arc::new(
        CommClient::connect(
            &reactor.handle,
            server.local_addr(),
            Terminator::line(),
            "writer",
            Arc::new(FnHandler::new()),
            &config,
        )
        .unwrap(),
    );
    server_recorded.expect_event();

    let writers: Vec<_> = [b'a', b'b', b'c']
        .into_iter()
        .map(|fill| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let payload = vec![fill; LEN];
                for _ in 0..PER_THREAD {
                    client.send(&payload, true).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    for _ in 0..3 * PER_THREAD {
        let (_, message) = server_recorded.expect_message();
        assert_eq!(message.len(), LEN);
        let first = message[0];
        assert!(
            message.iter().all(|&b| b == first),
            "message mixes bytes from different senders"
        );
    }
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_twice_notifies_once() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let mut remote = raw_connect(server.local_addr());
    recorded.expect_event();
    let channel = server.channel("1").unwrap();

    channel.close();
    channel.close();

    assert_eq!(recorded.expect_event(), ("1".to_string(), LinkEvent::Disconnected));
    recorded.assert_no_event();

    assert!(!channel.is_connected());
    assert!(peer_closed(&mut remote));
    assert!(wait_until(|| server.channel("1").is_none()));
}

#[test]
fn test_send_on_closed_channel_fails() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let _remote = raw_connect(server.local_addr());
    recorded.expect_event();
    let channel = server.channel("1").unwrap();
    channel.close();
    recorded.expect_event();

    match channel.send(b"late", true) {
        Err(CommError::Transmission(_)) => {}
        other => panic!("Expected transmission error, got {:?}", other),
    }
}

#[test]
fn test_remote_close_fires_disconnect() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let remote = raw_connect(server.local_addr());
    recorded.expect_event();
    drop(remote);

    assert_eq!(recorded.expect_event(), ("1".to_string(), LinkEvent::Disconnected));
    recorded.assert_no_event();
    assert!(wait_until(|| server.connection_count() == 0));
}

#[test]
fn test_close_flushes_queued_data() {
    let reactor = TestReactor::start(&Config::default());
    let (recorder, recorded) = Recorder::new();
    let server = start_server(&reactor, recorder, &Config::default());

    let mut remote = raw_connect(server.local_addr());
    recorded.expect_event();
    let channel = server.channel("1").unwrap();

    channel.send_str("bye").unwrap();
    channel.close();

    assert_eq!(read_exact_len(&mut remote, 4), b"bye\n");
    assert!(peer_closed(&mut remote));
}

// =============================================================================
// Callback Isolation Tests
// =============================================================================

#[test]
fn test_failing_handler_does_not_break_channel() {
    let (tx, rx) = crossbeam::channel::unbounded();
    let handler = FnHandler::new().on_message(move |_channel: &ChannelHandle, message: Bytes| {
        match &message[..] {
            b"error" => Err("handler refused".into()),
            b"panic" => panic!("handler bug"),
            _ => {
                tx.send(message)?;
                Ok(())
            }
        }
    });

    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let server = start_server(&reactor, Arc::new(handler), &config);

    let mut remote = raw_connect(server.local_addr());
    remote.write_all(b"error\npanic\nstill alive\n").unwrap();

    let message = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(&message[..], b"still alive");
    assert_eq!(server.connection_count(), 1);
}

#[test]
fn test_failing_event_callback_still_tracks_channel() {
    let handler = FnHandler::new().on_event(|_channel, _event| Err("nope".into()));

    let config = Config::default();
    let reactor = TestReactor::start(&config);
    let server = start_server(&reactor, Arc::new(handler), &config);

    let remote = raw_connect(server.local_addr());
    assert!(wait_until(|| server.connection_count() == 1));

    drop(remote);
    assert!(wait_until(|| server.connection_count() == 0));
}
