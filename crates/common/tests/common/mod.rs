//! Shared test utilities for chat session integration tests
#![allow(dead_code)]

use std::time::Duration;

use common::chat::{event_channel, EventReceiver, Session, SessionEvent, SessionHandle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A session wired to an in-memory duplex stream. The test plays the
///  remote peer through `remote_reader` / `remote_writer`.
pub struct SessionHarness {
    pub handle: SessionHandle,
    pub input: mpsc::Sender<String>,
    pub events: EventReceiver,
    pub shutdown: watch::Sender<()>,
    pub remote_reader: BufReader<ReadHalf<DuplexStream>>,
    pub remote_writer: WriteHalf<DuplexStream>,
}

pub fn start_session(local_name: &str) -> SessionHarness {
    let (local, remote) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(local);
    let (remote_reader, remote_writer) = tokio::io::split(remote);

    let (input_tx, input_rx) = mpsc::channel(16);
    let (events_tx, events_rx) = event_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let handle = Session::new(local_name, "remote", events_tx, shutdown_rx)
        .spawn(reader, writer, input_rx);

    SessionHarness {
        handle,
        input: input_tx,
        events: events_rx,
        shutdown: shutdown_tx,
        remote_reader: BufReader::new(remote_reader),
        remote_writer,
    }
}

impl SessionHarness {
    /// Write raw bytes as the remote peer
    pub async fn remote_send(&mut self, bytes: &[u8]) {
        self.remote_writer.write_all(bytes).await.unwrap();
        self.remote_writer.flush().await.unwrap();
    }

    /// Read one raw frame (delimiter included) as the remote peer;
    ///  empty means the local side finished the stream
    pub async fn remote_recv(&mut self) -> Vec<u8> {
        let mut frame = Vec::new();
        tokio::time::timeout(TIMEOUT, self.remote_reader.read_until(b'\n', &mut frame))
            .await
            .expect("timed out reading frame")
            .unwrap();
        frame
    }

    /// Next event that isn't a prompt redraw
    pub async fn next_event(&mut self) -> SessionEvent {
        next_event(&mut self.events).await
    }

    pub async fn type_line(&self, line: &str) {
        self.input.send(line.to_string()).await.unwrap();
    }
}

pub async fn next_event(events: &mut EventReceiver) -> SessionEvent {
    loop {
        let event = tokio::time::timeout(TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed");
        if event != SessionEvent::Prompt {
            return event;
        }
    }
}

/// Skip events until one matches
pub async fn wait_for<F>(events: &mut EventReceiver, mut matches: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}

pub fn frame(sender: &str, text: &str) -> Vec<u8> {
    common::chat::ChatMessage::new(sender, text).encode().unwrap()
}
