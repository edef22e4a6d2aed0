use clap::Args;

use common::identity::{KeyOrigin, KeyStoreError};

use crate::config::{Config, ConfigError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Display name shown to other peers
    #[arg(long)]
    pub name: String,

    /// Address to listen on, repeatable (default: ephemeral port on all interfaces)
    #[arg(long = "listen")]
    pub listen_addrs: Vec<String>,

    /// Peer to dial on start, as `<name>=<dial address>`; repeatable
    #[arg(long = "peer", value_parser = parse_peer)]
    pub peers: Vec<(String, String)>,

    /// Directory for the private key (default: ~/.peerchat)
    #[arg(long)]
    pub key_dir: Option<String>,
}

fn parse_peer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, addr)) if !name.is_empty() && !addr.is_empty() => {
            Ok((name.to_string(), addr.to_string()))
        }
        _ => Err(format!("expected <name>=<dial address>, got '{}'", raw)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    Config(#[from] ConfigError),
    #[error("init failed: {0}")]
    KeyStore(#[from] KeyStoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let listen_addrs = if self.listen_addrs.is_empty() {
            vec!["0.0.0.0:0".to_string()]
        } else {
            self.listen_addrs.clone()
        };

        let mut config = Config::starter(self.name.clone(), listen_addrs);
        if let Some(dir) = &self.key_dir {
            config.private_key.dir = dir.clone();
        }
        if !self.peers.is_empty() {
            let mut peers: Vec<common::peer::RemotePeer> = Vec::new();
            for (name, addr) in &self.peers {
                match peers.iter_mut().find(|peer| &peer.name == name) {
                    Some(peer) => peer.dial_addrs.push(addr.clone()),
                    None => peers.push(common::peer::RemotePeer::new(
                        name.clone(),
                        vec![addr.clone()],
                    )),
                }
            }
            config.remote_peers = Some(peers);
        }

        config.create(ctx.config_path())?;

        let store = config.key_store()?;
        let (identity, origin) = store.load_or_generate()?;
        let key_status = match origin {
            KeyOrigin::Generated => "generated",
            KeyOrigin::Loaded => "existing",
        };

        let output = format!(
            "Initialized peerchat config at: {}\n\
             - Key ({}): {}\n\
             - Name: {}\n\
             - Protocol: {}\n\
             - Role: {}\n\
             - Node id: {}\n\
             - Peer id: {}",
            ctx.config_path().display(),
            key_status,
            store.path().display(),
            config.name,
            config.protocol(),
            config.directory().role(),
            identity.node_id(),
            identity.peer_id(),
        );

        Ok(output)
    }
}
