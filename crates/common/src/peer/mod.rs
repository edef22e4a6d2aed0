use std::time::Duration;

use iroh::endpoint::Connection;
use iroh::protocol::Router;
use tokio::sync::broadcast;
use tokio::sync::watch::Receiver as WatchReceiver;
use tokio::task::JoinSet;

mod directory;
mod node;
mod protocol;

pub use directory::{DialAddress, DialAddressError, PeerDirectory, RemotePeer, ResolvedPeer, Role};
pub use node::{Node, NodeBuilder};
pub use protocol::ChatProtocol;

use crate::chat::{CloseReason, EventSender, Session, SessionEvent, SessionHandle};
use crate::crypto::KeyError;

// Re-export iroh types for convenience
pub use iroh::{NodeAddr, NodeId};

/// Upper bound on waiting for sessions to wind down at shutdown
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("no usable dial address for peer '{0}'")]
    UnknownPeer(String),
    #[error("failed to connect to peer '{peer}': {source}")]
    Connect {
        peer: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to open chat stream with peer '{peer}': {source}")]
    Stream {
        peer: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to bind endpoint: {0}")]
    Bind(#[source] BoxError),
    #[error("identity error: {0}")]
    Identity(#[from] KeyError),
}

/// Everything a chat session needs from the process around it.
///
/// Built once at startup and cloned into every session. Input is held as a
///  receiver so that dropping the producer ends input for every session.
#[derive(Debug)]
pub struct ChatContext {
    local_name: String,
    protocol: String,
    input: broadcast::Receiver<String>,
    events: EventSender,
    shutdown: WatchReceiver<()>,
}

impl Clone for ChatContext {
    fn clone(&self) -> Self {
        Self {
            local_name: self.local_name.clone(),
            protocol: self.protocol.clone(),
            input: self.input.resubscribe(),
            events: self.events.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl ChatContext {
    pub fn new(
        local_name: impl Into<String>,
        protocol: impl Into<String>,
        input: broadcast::Receiver<String>,
        events: EventSender,
        shutdown: WatchReceiver<()>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            protocol: protocol.into(),
            input,
            events,
            shutdown,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Protocol identifier, also used as the ALPN
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn alpn(&self) -> Vec<u8> {
        self.protocol.as_bytes().to_vec()
    }

    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn shutdown(&self) -> WatchReceiver<()> {
        self.shutdown.clone()
    }

    /// A fresh view of operator input for one more session; sees lines
    ///  sent from now on
    pub fn subscribe_input(&self) -> broadcast::Receiver<String> {
        self.input.resubscribe()
    }

    fn welcome(&self) {
        let _ = self.events.send(SessionEvent::Welcome {
            name: self.local_name.clone(),
        });
    }
}

/// A running chat node in one of its two roles
#[derive(Debug)]
pub struct Chat {
    role: Role,
    node: Node,
    router: Option<Router>,
    sessions: JoinSet<CloseReason>,
}

impl Chat {
    /// Take the role the directory implies and start chatting
    pub async fn start(node: Node, directory: &PeerDirectory, context: ChatContext) -> Self {
        match directory.role() {
            Role::Responder => start_responder(node, context),
            Role::Initiator => start_initiator(node, directory, context).await,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Number of initiator sessions still running
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Wait for sessions to observe the shutdown signal, then tear down
    ///  the router and the endpoint.
    pub async fn shutdown(mut self) {
        let drain = async {
            while let Some(result) = self.sessions.join_next().await {
                if let Err(e) = result {
                    tracing::error!("chat session task failed: {}", e);
                }
            }
        };
        if tokio::time::timeout(SESSION_DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("sessions did not finish in time, aborting");
            self.sessions.abort_all();
        }

        if let Some(router) = self.router.take() {
            if let Err(e) = router.shutdown().await {
                tracing::error!("failed to shut down router: {}", e);
            }
        }
        self.node.close().await;
        tracing::info!("chat node stopped");
    }
}

/// Accept chat streams from anyone speaking our protocol
pub fn start_responder(node: Node, context: ChatContext) -> Chat {
    context.welcome();
    tracing::info!(protocol = %context.protocol(), "bootstrapping stream handler");

    let alpn = context.alpn();
    let router = Router::builder(node.endpoint().clone())
        .accept(alpn, ChatProtocol::new(context))
        .spawn();

    Chat {
        role: Role::Responder,
        node,
        router: Some(router),
        sessions: JoinSet::new(),
    }
}

/// Dial every configured peer; the ones that fail are logged and skipped
pub async fn start_initiator(node: Node, directory: &PeerDirectory, context: ChatContext) -> Chat {
    let mut sessions = JoinSet::new();

    for peer in directory.peers() {
        match dial(&node, peer, &context).await {
            Ok((conn, session)) => {
                sessions.spawn(async move {
                    let reason = protocol::finish(session).await;
                    protocol::release(&conn, reason).await;
                    reason
                });
            }
            Err(e) => tracing::error!("skipping peer: {}", e),
        }
    }

    context.welcome();

    Chat {
        role: Role::Initiator,
        node,
        router: None,
        sessions,
    }
}

/// Resolve, connect, open a stream and start a session on it
pub async fn dial(
    node: &Node,
    peer: &RemotePeer,
    context: &ChatContext,
) -> Result<(Connection, SessionHandle), BootstrapError> {
    let resolved = peer
        .resolve()
        .ok_or_else(|| BootstrapError::UnknownPeer(peer.name.clone()))?;
    tracing::info!(
        peer = %resolved.name,
        node_id = %resolved.node_id,
        "remote peer with addresses {:?} added",
        resolved.node_addr.direct_addresses().collect::<Vec<_>>()
    );

    let conn = node
        .endpoint()
        .connect(resolved.node_addr.clone(), &context.alpn())
        .await
        .map_err(|e| BootstrapError::Connect {
            peer: resolved.name.clone(),
            source: e.into(),
        })?;

    let (mut send, recv) = conn.open_bi().await.map_err(|e| BootstrapError::Stream {
        peer: resolved.name.clone(),
        source: e.into(),
    })?;

    let hello = protocol::hello(context.local_name())
        .encode()
        .map_err(|e| BootstrapError::Stream {
            peer: resolved.name.clone(),
            source: e.into(),
        })?;
    send.write_all(&hello)
        .await
        .map_err(|e| BootstrapError::Stream {
            peer: resolved.name.clone(),
            source: e.into(),
        })?;

    tracing::info!(peer = %resolved.name, node_id = %resolved.node_id, "successfully connected");

    let session = Session::new(
        context.local_name(),
        resolved.name.as_str(),
        context.events(),
        context.shutdown(),
    )
    .spawn(recv, send, context.subscribe_input());

    Ok((conn, session))
}
