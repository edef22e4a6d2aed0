use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4};

use iroh::discovery::pkarr::dht::DhtDiscovery;
use iroh::{Endpoint, NodeId, RelayMode};

use crate::identity::Identity;

use super::BootstrapError;

#[derive(Default)]
pub struct NodeBuilder {
    /// the identity of the node; its transport key becomes the endpoint key
    identity: Option<Identity>,
    /// addresses to listen on, the first of each family is used
    ///  if none are set, an ephemeral IPv4 port will be used
    listen_addrs: Vec<SocketAddr>,
    /// skip relays and DHT publishing, direct addresses only
    local_only: bool,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn listen_addrs(mut self, addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.listen_addrs = addrs.into_iter().collect();
        self
    }

    pub fn local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    pub async fn build(self) -> Result<Node, BootstrapError> {
        let identity = match self.identity {
            Some(identity) => identity,
            None => Identity::generate()?,
        };
        let transport_key = identity.transport_key().clone();

        let v4 = self.listen_addrs.iter().find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4),
            SocketAddr::V6(_) => None,
        });
        let v6 = self.listen_addrs.iter().find_map(|addr| match addr {
            SocketAddr::V6(v6) => Some(*v6),
            SocketAddr::V4(_) => None,
        });
        // nothing configured: ephemeral IPv4 port
        let v4 = match (v4, v6) {
            (None, None) => Some(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            (v4, _) => v4,
        };

        let mut builder = Endpoint::builder().secret_key(transport_key.clone());

        if self.local_only {
            builder = builder.relay_mode(RelayMode::Disabled);
        } else {
            // setup our discovery mechanism for our node
            let mainline_discovery = DhtDiscovery::builder()
                .secret_key(transport_key)
                .build()
                .map_err(|e| BootstrapError::Bind(e.into()))?;
            builder = builder.discovery(mainline_discovery);
        }

        if let Some(addr) = v4 {
            builder = builder.bind_addr_v4(addr);
        }
        if let Some(addr) = v6 {
            builder = builder.bind_addr_v6(addr);
        }

        let endpoint = builder
            .bind()
            .await
            .map_err(|e| BootstrapError::Bind(e.into()))?;

        tracing::debug!(node_id = %endpoint.node_id(), "endpoint bound");

        Ok(Node { identity, endpoint })
    }
}

/// A bound transport endpoint together with the identity it speaks for
#[derive(Debug, Clone)]
pub struct Node {
    identity: Identity,
    endpoint: Endpoint,
}

impl Node {
    pub fn builder() -> NodeBuilder {
        NodeBuilder::new()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn node_id(&self) -> NodeId {
        self.endpoint.node_id()
    }

    pub fn bound_sockets(&self) -> Vec<SocketAddr> {
        self.endpoint.bound_sockets().into_iter().collect()
    }

    /// Dial addresses other peers can put in their configuration.
    ///
    /// Wildcard binds are reported on loopback; the bare node id is always
    ///  first and relies on discovery.
    pub fn dial_addrs(&self) -> Vec<String> {
        let node_id = self.node_id();
        let mut addrs = vec![node_id.to_string()];
        addrs.extend(self.bound_sockets().into_iter().map(|mut socket| {
            if socket.ip().is_unspecified() {
                let loopback = match socket.ip() {
                    IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                    IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
                };
                socket.set_ip(loopback);
            }
            format!("{}@{}", node_id, socket)
        }));
        addrs
    }

    pub async fn close(&self) {
        self.endpoint.close().await;
    }
}
