use std::time::Duration;

use futures::future::BoxFuture;
use iroh::endpoint::Connection;
use iroh::protocol::{AcceptError, ProtocolHandler};

use crate::chat::{ChatMessage, CloseReason, Session, SessionHandle};

use super::ChatContext;

/// How long a finished session keeps its connection open so the last
///  frames can drain before we close it ourselves
const LINGER: Duration = Duration::from_secs(3);

/// Application-level close code sent with our QUIC close frame
const CLOSE_CODE: u32 = 0;

/// Responder side of the chat protocol: every inbound connection gets one
///  bidirectional stream and one chat session.
#[derive(Debug, Clone)]
pub struct ChatProtocol {
    context: ChatContext,
}

impl ChatProtocol {
    pub fn new(context: ChatContext) -> Self {
        Self { context }
    }
}

// Implement the iroh protocol handler trait
// This allows the router to accept connections for the chat protocol
impl ProtocolHandler for ChatProtocol {
    #[allow(refining_impl_trait)]
    fn accept(&self, conn: Connection) -> BoxFuture<'static, Result<(), AcceptError>> {
        let context = self.context.clone();
        Box::pin(async move {
            let remote = conn
                .remote_node_id()
                .map(|id| id.fmt_short().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            tracing::debug!(peer = %remote, "new connection");

            let (send, recv) = conn.accept_bi().await.map_err(|e| {
                tracing::error!(peer = %remote, "failed to accept bidirectional stream: {}", e);
                AcceptError::from(e)
            })?;
            tracing::debug!(peer = %remote, "bidirectional stream accepted");

            let session = Session::new(
                context.local_name(),
                remote.as_str(),
                context.events(),
                context.shutdown(),
            )
            .spawn(recv, send, context.subscribe_input());

            let reason = finish(session).await;
            release(&conn, reason).await;
            Ok(())
        })
    }
}

/// Opening handshake for an initiator: a blank-line frame. It forces the
///  stream open on the responder and is never displayed there.
pub(crate) fn hello(local_name: &str) -> ChatMessage {
    ChatMessage::new(local_name, "\n")
}

/// Wait for a session to end, whatever happened to its tasks
pub(crate) async fn finish(session: SessionHandle) -> CloseReason {
    let peer = session.peer().to_string();
    match session.join().await {
        Ok(reason) => reason,
        Err(e) => {
            tracing::error!(peer = %peer, "chat session task failed: {}", e);
            CloseReason::Disconnected
        }
    }
}

/// Give the remote a moment to hang up first, then close the connection
pub(crate) async fn release(conn: &Connection, reason: CloseReason) {
    if tokio::time::timeout(LINGER, conn.closed()).await.is_err() {
        conn.close(CLOSE_CODE.into(), reason.to_string().as_bytes());
    }
}
