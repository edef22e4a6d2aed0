use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use iroh::{NodeAddr, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DialAddressError {
    #[error("empty dial address")]
    Empty,
    #[error("invalid node id '{0}'")]
    NodeId(String),
    #[error("invalid socket address '{0}'")]
    SocketAddr(String),
}

/// One configured way to reach a peer: `<node-id>` or `<node-id>@<socket-addr>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialAddress {
    pub node_id: NodeId,
    pub direct: Option<SocketAddr>,
}

impl FromStr for DialAddress {
    type Err = DialAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DialAddressError::Empty);
        }

        let (node, direct) = match s.split_once('@') {
            Some((node, addr)) => {
                let addr = addr
                    .parse::<SocketAddr>()
                    .map_err(|_| DialAddressError::SocketAddr(addr.to_string()))?;
                (node, Some(addr))
            }
            None => (s, None),
        };

        let node_id = node
            .parse::<NodeId>()
            .map_err(|_| DialAddressError::NodeId(node.to_string()))?;

        Ok(DialAddress { node_id, direct })
    }
}

impl fmt::Display for DialAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direct {
            Some(addr) => write!(f, "{}@{}", self.node_id, addr),
            None => write!(f, "{}", self.node_id),
        }
    }
}

/// A statically configured remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePeer {
    /// Label used in the transcript and logs
    pub name: String,
    #[serde(rename = "dialAddrs", default)]
    pub dial_addrs: Vec<String>,
}

/// A remote peer whose dial addresses yielded a stable identity
#[derive(Debug, Clone)]
pub struct ResolvedPeer {
    pub name: String,
    pub node_id: NodeId,
    pub node_addr: NodeAddr,
}

impl RemotePeer {
    pub fn new(name: impl Into<String>, dial_addrs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            dial_addrs,
        }
    }

    /// Parse every dial address, dropping (and logging) the ones that don't.
    pub fn addresses(&self) -> Vec<DialAddress> {
        self.dial_addrs
            .iter()
            .filter_map(|raw| match raw.parse::<DialAddress>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(peer = %self.name, address = %raw, "ignoring dial address: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Identity of this peer: the node id of the first valid dial address.
    ///
    /// Direct addresses are gathered from every valid entry that names the
    ///  same node. `None` means the peer cannot be dialed at all.
    pub fn resolve(&self) -> Option<ResolvedPeer> {
        let addresses = self.addresses();
        let node_id = addresses.first()?.node_id;

        let mut direct = Vec::new();
        for addr in &addresses {
            if addr.node_id != node_id {
                tracing::warn!(
                    peer = %self.name,
                    address = %addr,
                    "dial address names a different node than {}, ignoring",
                    node_id
                );
                continue;
            }
            if let Some(socket) = addr.direct {
                if !direct.contains(&socket) {
                    direct.push(socket);
                }
            }
        }

        Some(ResolvedPeer {
            name: self.name.clone(),
            node_id,
            node_addr: NodeAddr::from_parts(node_id, None, direct),
        })
    }
}

/// Which side of the conversation this process takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No configured peers: wait for them to dial in
    Responder,
    /// Dial every configured peer
    Initiator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Responder => f.write_str("responder"),
            Role::Initiator => f.write_str("initiator"),
        }
    }
}

/// Immutable list of configured remote peers
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Vec<RemotePeer>,
}

impl PeerDirectory {
    pub fn new(peers: Vec<RemotePeer>) -> Self {
        Self { peers }
    }

    pub fn peers(&self) -> &[RemotePeer] {
        &self.peers
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Decided once from configuration
    pub fn role(&self) -> Role {
        if self.peers.is_empty() {
            Role::Responder
        } else {
            Role::Initiator
        }
    }
}
