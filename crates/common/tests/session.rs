//! Integration tests for the chat session read and write loops

mod common;

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use ::common::chat::{event_channel, CloseReason, Session, SessionEvent, SessionState};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use self::common::{frame, start_session, wait_for, TIMEOUT};

#[tokio::test]
async fn test_received_message_is_reported() {
    let mut harness = start_session("alice");
    assert_eq!(
        harness.next_event().await,
        SessionEvent::Started {
            peer: "remote".to_string()
        }
    );

    harness.remote_send(&frame("bob", "hello\n")).await;
    assert_eq!(
        harness.next_event().await,
        SessionEvent::Received {
            sender: "bob".to_string(),
            text: "hello\n".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let mut harness = start_session("alice");

    harness.remote_send(b"not-json\n").await;
    let dropped = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::FrameDropped { .. })
    })
    .await;
    assert!(matches!(dropped, SessionEvent::FrameDropped { .. }));

    harness.remote_send(&frame("bob", "still here\n")).await;
    let received = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Received { .. })
    })
    .await;
    assert_eq!(
        received,
        SessionEvent::Received {
            sender: "bob".to_string(),
            text: "still here\n".to_string()
        }
    );
    assert_eq!(harness.handle.state(), SessionState::Active);
}

#[tokio::test]
async fn test_blank_line_is_suppressed() {
    let mut harness = start_session("alice");

    harness.remote_send(&frame("bob", "\n")).await;
    harness.remote_send(&frame("bob", "after\n")).await;

    let received = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Received { .. })
    })
    .await;
    assert_eq!(
        received,
        SessionEvent::Received {
            sender: "bob".to_string(),
            text: "after\n".to_string()
        }
    );
}

#[tokio::test]
async fn test_empty_text_ends_conversation() {
    let mut harness = start_session("alice");

    harness
        .remote_send(b"{\"Username\":\"bob\",\"Message\":\"\"}\n")
        .await;

    let closed = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Closed { .. })
    })
    .await;
    assert_eq!(
        closed,
        SessionEvent::Closed {
            peer: "remote".to_string(),
            reason: CloseReason::PeerEnded
        }
    );

    let reason = tokio::time::timeout(TIMEOUT, harness.handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::PeerEnded);
}

#[tokio::test]
async fn test_stream_end_is_a_disconnect() {
    let common::SessionHarness {
        handle,
        remote_reader,
        remote_writer,
        input: _input,
        shutdown: _shutdown,
        ..
    } = start_session("alice");

    drop(remote_reader);
    drop(remote_writer);

    let reason = tokio::time::timeout(TIMEOUT, handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::Disconnected);
}

#[tokio::test]
async fn test_outgoing_frames_keep_input_order() {
    let mut harness = start_session("alice");

    for line in ["a\n", "b\n", "c\n"] {
        harness.type_line(line).await;
    }

    assert_eq!(harness.remote_recv().await, frame("alice", "a\n"));
    assert_eq!(harness.remote_recv().await, frame("alice", "b\n"));
    assert_eq!(harness.remote_recv().await, frame("alice", "c\n"));
}

#[tokio::test]
async fn test_sent_lines_are_reported() {
    let mut harness = start_session("alice");
    harness.type_line("hi\n").await;

    let sent = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Sent { .. })
    })
    .await;
    assert_eq!(
        sent,
        SessionEvent::Sent {
            text: "hi\n".to_string()
        }
    );
}

#[tokio::test]
async fn test_shutdown_says_goodbye() {
    let mut harness = start_session("alice");
    harness.shutdown.send(()).unwrap();

    let farewell = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Farewell { .. })
    })
    .await;
    assert_eq!(
        farewell,
        SessionEvent::Farewell {
            name: "alice".to_string()
        }
    );

    let reason = tokio::time::timeout(TIMEOUT, harness.handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::Shutdown);
}

#[tokio::test]
async fn test_local_input_end_keeps_reading() {
    let mut harness = start_session("alice");
    let (closed_input, _) = mpsc::channel(1);
    // dropping the only sender ends the input stream
    harness.input = closed_input;

    assert_eq!(harness.remote_recv().await, frame("alice", ""));
    // then our half of the stream is finished
    assert!(harness.remote_recv().await.is_empty());

    harness.remote_send(&frame("bob", "are you there?\n")).await;
    let received = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Received { .. } | SessionEvent::Closed { .. })
    })
    .await;
    assert_eq!(
        received,
        SessionEvent::Received {
            sender: "bob".to_string(),
            text: "are you there?\n".to_string()
        }
    );
    assert_eq!(harness.handle.state(), SessionState::Active);

    harness.remote_send(&frame("bob", "")).await;
    let reason = tokio::time::timeout(TIMEOUT, harness.handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::PeerEnded);
}

#[tokio::test]
async fn test_unterminated_frame_at_end_is_a_disconnect() {
    let mut harness = start_session("alice");

    harness
        .remote_send(b"{\"Username\":\"bob\",\"Message\":\"partial\"}")
        .await;
    harness.remote_writer.shutdown().await.unwrap();

    let event = wait_for(&mut harness.events, |e| {
        matches!(e, SessionEvent::Received { .. } | SessionEvent::Closed { .. })
    })
    .await;
    assert_eq!(
        event,
        SessionEvent::Closed {
            peer: "remote".to_string(),
            reason: CloseReason::Disconnected
        }
    );
}

#[tokio::test]
async fn test_external_close_wins_once() {
    let harness = start_session("alice");
    assert!(harness.handle.close(CloseReason::Shutdown));
    assert!(!harness.handle.close(CloseReason::Disconnected));

    let reason = tokio::time::timeout(TIMEOUT, harness.handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::Shutdown);
}

/// Writer whose first write fails; later writes land in `written`
struct FlakyWriter {
    failures_left: usize,
    written: Arc<Mutex<Vec<u8>>>,
}

impl AsyncWrite for FlakyWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "flaky")));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_failed_send_keeps_write_loop_alive() {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = FlakyWriter {
        failures_left: 1,
        written: written.clone(),
    };
    // reader that never yields data
    let (reader, _reader_peer) = tokio::io::duplex(1024);

    let (input_tx, input_rx) = mpsc::channel(4);
    let (events_tx, mut events) = event_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let handle =
        Session::new("alice", "remote", events_tx, shutdown_rx).spawn(reader, writer, input_rx);

    input_tx.send("lost\n".to_string()).await.unwrap();
    let failed = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::SendFailed { .. } | SessionEvent::Sent { .. })
    })
    .await;
    assert!(matches!(failed, SessionEvent::SendFailed { .. }));
    // a prompt follows every attempt
    let prompt = tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prompt, SessionEvent::Prompt);

    input_tx.send("kept\n".to_string()).await.unwrap();
    let sent = wait_for(&mut events, |e| matches!(e, SessionEvent::Sent { .. })).await;
    assert_eq!(
        sent,
        SessionEvent::Sent {
            text: "kept\n".to_string()
        }
    );

    assert_eq!(*written.lock().unwrap(), frame("alice", "kept\n"));
    assert_eq!(handle.state(), SessionState::Active);
}

/// Writer that never accepts a byte
struct StalledWriter;

impl AsyncWrite for StalledWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

#[tokio::test]
async fn test_stalled_stream_does_not_hold_up_close() {
    let (reader, _reader_peer) = tokio::io::duplex(1024);
    let (input_tx, input_rx) = mpsc::channel::<String>(1);
    let (events_tx, _events) = event_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = Session::new("alice", "remote", events_tx, shutdown_rx).spawn(
        reader,
        StalledWriter,
        input_rx,
    );

    // input ends while the end-of-conversation frame cannot be written
    drop(input_tx);
    handle.close(CloseReason::Shutdown);

    let reason = tokio::time::timeout(TIMEOUT, handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::Shutdown);
}
