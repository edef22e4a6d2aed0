use std::fmt;

use tokio::sync::mpsc;

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The process was asked to stop
    Shutdown,
    /// The peer sent an empty message
    PeerEnded,
    /// The stream failed or reached its end
    Disconnected,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Shutdown => "shutdown",
            CloseReason::PeerEnded => "peer ended the conversation",
            CloseReason::Disconnected => "peer disconnected",
        };
        f.write_str(s)
    }
}

/// Everything a session reports to whoever draws the console.
///
/// These carry no formatting; the renderer decides what the user sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A role finished setting up; shown once per process
    Welcome { name: String },
    Started { peer: String },
    Received { sender: String, text: String },
    Sent { text: String },
    SendFailed { reason: String },
    FrameDropped { reason: String },
    /// Time to re-draw the input prompt
    Prompt,
    Farewell { name: String },
    Closed { peer: String, reason: CloseReason },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
