use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use super::event::{CloseReason, EventSender, SessionEvent};
use super::input::InputSource;
use super::message::{ChatMessage, CodecError, FRAME_DELIMITER};

/// How long a closing write loop waits for the stream to drain
const FINISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both loops running
    Active,
    /// Close observed, loops winding down
    Closing,
    /// Stream released; terminal
    Closed,
}

/// Idempotent, shareable close trigger for a session.
///
/// The first `close` wins and fixes the reason; later calls are no-ops.
#[derive(Debug, Clone)]
pub struct CloseSignal(Arc<watch::Sender<Option<CloseReason>>>);

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self(Arc::new(tx))
    }

    /// Returns true only for the call that actually closed the session
    pub fn close(&self, reason: CloseReason) -> bool {
        self.0.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn reason(&self) -> Option<CloseReason> {
        *self.0.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the session has been closed, with the winning reason
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.0.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            // unreachable while we hold the sender
            Err(_) => None,
        };
        reason.unwrap_or(CloseReason::Disconnected)
    }
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("stream write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A chat session binds one duplex stream to the local display name.
///
/// Spawning it starts a read loop and a write loop as independent tasks.
///  They share nothing but the [`CloseSignal`]; either side closing (or a
///  process shutdown) winds both down.
#[derive(Debug, Clone)]
pub struct Session {
    local_name: String,
    peer: String,
    events: EventSender,
    shutdown: watch::Receiver<()>,
}

impl Session {
    pub fn new(
        local_name: impl Into<String>,
        peer: impl Into<String>,
        events: EventSender,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            peer: peer.into(),
            events,
            shutdown,
        }
    }

    pub fn spawn<R, W, I>(self, reader: R, writer: W, input: I) -> SessionHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        I: InputSource,
    {
        let close = CloseSignal::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Active);

        tracing::info!(peer = %self.peer, "chat session started");
        emit(
            &self.events,
            SessionEvent::Started {
                peer: self.peer.clone(),
            },
        );
        emit(&self.events, SessionEvent::Prompt);

        let read_task = tokio::spawn(read_loop(
            reader,
            self.local_name.clone(),
            self.events.clone(),
            self.shutdown.clone(),
            close.clone(),
        ));
        let write_task = tokio::spawn(write_loop(
            writer,
            input,
            self.local_name.clone(),
            self.events.clone(),
            close.clone(),
        ));

        let supervisor_close = close.clone();
        let peer = self.peer.clone();
        let events = self.events;
        let task = tokio::spawn(async move {
            let reason = supervisor_close.closed().await;
            let _ = state_tx.send(SessionState::Closing);
            tracing::debug!(peer = %peer, %reason, "chat session closing");

            for (name, result) in [("read", read_task.await), ("write", write_task.await)] {
                if let Err(e) = result {
                    tracing::error!(peer = %peer, "{} loop failed: {}", name, e);
                }
            }

            let _ = state_tx.send(SessionState::Closed);
            tracing::info!(peer = %peer, %reason, "chat session closed");
            emit(&events, SessionEvent::Closed { peer, reason });
            reason
        });

        SessionHandle {
            peer: self.peer,
            close,
            state: state_rx,
            task,
        }
    }
}

/// Owner's view of a running session
#[derive(Debug)]
pub struct SessionHandle {
    peer: String,
    close: CloseSignal,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<CloseReason>,
}

impl SessionHandle {
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn close(&self, reason: CloseReason) -> bool {
        self.close.close(reason)
    }

    /// Wait until both loops have stopped and the stream is released
    pub async fn join(self) -> Result<CloseReason, JoinError> {
        self.task.await
    }
}

fn emit(events: &EventSender, event: SessionEvent) {
    // a missing renderer must not stop the session
    let _ = events.send(event);
}

enum ReadStep {
    Shutdown,
    Closed,
    Frame(std::io::Result<usize>),
}

async fn read_loop<R>(
    reader: R,
    local_name: String,
    events: EventSender,
    mut shutdown: watch::Receiver<()>,
    close: CloseSignal,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();

    loop {
        frame.clear();
        let step = tokio::select! {
            biased;
            Ok(()) = shutdown.changed() => ReadStep::Shutdown,
            _ = close.closed() => ReadStep::Closed,
            result = reader.read_until(FRAME_DELIMITER, &mut frame) => ReadStep::Frame(result),
        };

        match step {
            ReadStep::Shutdown => {
                emit(
                    &events,
                    SessionEvent::Farewell {
                        name: local_name.clone(),
                    },
                );
                close.close(CloseReason::Shutdown);
                return;
            }
            ReadStep::Closed => return,
            ReadStep::Frame(Ok(0)) => {
                tracing::debug!("stream reached its end");
                close.close(CloseReason::Disconnected);
                return;
            }
            ReadStep::Frame(Err(e)) => {
                tracing::debug!("stream read failed: {}", e);
                close.close(CloseReason::Disconnected);
                return;
            }
            ReadStep::Frame(Ok(_)) => {
                let Some(bytes) = frame.strip_suffix(&[FRAME_DELIMITER]) else {
                    tracing::debug!(len = frame.len(), "stream ended inside a frame");
                    close.close(CloseReason::Disconnected);
                    return;
                };
                match ChatMessage::decode(bytes) {
                    Err(e) => {
                        tracing::warn!("dropping frame: {}", e);
                        emit(
                            &events,
                            SessionEvent::FrameDropped {
                                reason: e.to_string(),
                            },
                        );
                    }
                    Ok(message) if message.is_end_of_conversation() => {
                        tracing::debug!(sender = %message.sender, "peer ended the conversation");
                        close.close(CloseReason::PeerEnded);
                        return;
                    }
                    Ok(message) if message.is_blank_line() => {}
                    Ok(message) => {
                        emit(
                            &events,
                            SessionEvent::Received {
                                sender: message.sender,
                                text: message.text,
                            },
                        );
                        emit(&events, SessionEvent::Prompt);
                    }
                }
            }
        }
    }
}

async fn write_loop<W, I>(
    mut writer: W,
    mut input: I,
    local_name: String,
    events: EventSender,
    close: CloseSignal,
) where
    W: AsyncWrite + Unpin,
    I: InputSource,
{
    loop {
        let line = tokio::select! {
            biased;
            _ = close.closed() => break,
            line = input.next_line() => line,
        };

        let Some(line) = line else {
            // only our half ends; the read loop keeps showing what the peer sends
            tracing::debug!("local input closed, ending conversation");
            let farewell = ChatMessage::new(local_name.as_str(), "");
            let send = tokio::time::timeout(FINISH_TIMEOUT, send_frame(&mut writer, &farewell));
            tokio::select! {
                biased;
                _ = close.closed() => {}
                result = send => {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::debug!("could not send end of conversation: {}", e),
                        Err(_) => tracing::debug!("timed out sending end of conversation"),
                    }
                }
            }
            break;
        };

        let message = ChatMessage::new(local_name.as_str(), line);
        let result = tokio::select! {
            biased;
            _ = close.closed() => break,
            result = send_frame(&mut writer, &message) => result,
        };

        match result {
            Ok(()) => emit(&events, SessionEvent::Sent { text: message.text }),
            Err(e) => {
                tracing::warn!("could not send message: {}", e);
                emit(
                    &events,
                    SessionEvent::SendFailed {
                        reason: e.to_string(),
                    },
                );
            }
        }
        emit(&events, SessionEvent::Prompt);
    }

    match tokio::time::timeout(FINISH_TIMEOUT, writer.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("could not finish stream: {}", e),
        Err(_) => tracing::debug!("timed out finishing stream"),
    }
}

async fn send_frame<W>(writer: &mut W, message: &ChatMessage) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    // unbuffered: a failed frame is dropped, never resent with the next one
    let frame = message.encode()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
