use clap::Args;

use common::identity::{Identity as PeerIdentity, IdentityForms, KeyStoreError};

use crate::config::ConfigError;

/// Print the public forms of the stored identity
#[derive(Args, Debug, Clone)]
pub struct Identity {
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity: {0}")]
    Config(#[from] ConfigError),
    #[error("identity: {0}; run `peerchat init` or `peerchat chat` to create one")]
    KeyStore(#[from] KeyStoreError),
    #[error("identity: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Identity {
    type Error = IdentityError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ctx.load_config()?;
        let secret = config.key_store()?.load()?;
        let forms = PeerIdentity::from_secret(secret).forms();

        if self.json {
            return Ok(serde_json::to_string_pretty(&forms)?);
        }
        Ok(render_forms(&forms))
    }
}

pub fn render_forms(forms: &IdentityForms) -> String {
    format!(
        "Pubkey Info\n\
         X: {}\n\
         Y: {}\n\
         Uncompressed: {}\n\
         Compressed: {}\n\
         Protobuf: {}\n\
         Peer ID (hex): {}\n\
         Peer ID: {}\n\
         Node ID: {}",
        forms.x,
        forms.y,
        forms.uncompressed,
        forms.compressed,
        forms.protobuf,
        forms.peer_id_hex,
        forms.peer_id_base58,
        forms.node_id
    )
}
