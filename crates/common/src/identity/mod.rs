//! Durable peer identity
//!
//! [`Identity`] bundles a secret key with everything derived from it;
//! [`KeyStore`] decides, once per process start, whether that key is loaded
//! from disk or generated and persisted.

mod store;

use iroh::NodeId;
use serde::Serialize;

use crate::crypto::{KeyError, PeerId, PublicKey, SecretKey};

pub use store::{KeyOrigin, KeyStore, KeyStoreError};

/// A peer's identity: the secret key plus its derived, immutable views.
///
/// Cheap to clone and never mutated after construction, so it can be shared
/// by read-only reference across sessions.
#[derive(Clone, Debug)]
pub struct Identity {
    secret: SecretKey,
    public: PublicKey,
    peer_id: PeerId,
    transport_key: iroh::SecretKey,
}

impl Identity {
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public();
        let peer_id = public.peer_id();
        let transport_key = secret.transport_key();
        Self {
            secret,
            public,
            peer_id,
            transport_key,
        }
    }

    pub fn generate() -> Result<Self, KeyError> {
        SecretKey::generate().map(Self::from_secret)
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Key used to authenticate the iroh endpoint
    pub fn transport_key(&self) -> &iroh::SecretKey {
        &self.transport_key
    }

    /// Node id other peers dial; the native text form of this identity
    pub fn node_id(&self) -> NodeId {
        self.transport_key.public()
    }

    /// Every external text representation of this identity
    pub fn forms(&self) -> IdentityForms {
        let (x, y) = self.public.coordinates();
        IdentityForms {
            x: hex::encode(x),
            y: hex::encode(y),
            uncompressed: hex::encode(self.public.to_uncompressed()),
            compressed: hex::encode(self.public.to_compressed()),
            protobuf: hex::encode(self.public.to_protobuf()),
            peer_id_hex: self.peer_id.to_hex(),
            peer_id_base58: self.peer_id.to_base58(),
            node_id: self.node_id().to_string(),
        }
    }
}

/// Diagnostic text forms of an identity. Output only, never re-parsed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdentityForms {
    pub x: String,
    pub y: String,
    pub uncompressed: String,
    pub compressed: String,
    pub protobuf: String,
    pub peer_id_hex: String,
    pub peer_id_base58: String,
    pub node_id: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_forms_are_consistent() {
        let identity = Identity::generate().unwrap();
        let forms = identity.forms();

        assert_eq!(forms.uncompressed, format!("04{}{}", forms.x, forms.y));
        assert_eq!(forms.protobuf, format!("08021221{}", forms.compressed));
        assert_eq!(forms.peer_id_hex, format!("0025{}", forms.protobuf));
        assert_eq!(forms.peer_id_base58, identity.peer_id().to_string());
        assert_eq!(forms.node_id, identity.node_id().to_string());
    }

    #[test]
    fn test_same_secret_same_identity() {
        let identity = Identity::generate().unwrap();
        let again = Identity::from_secret(identity.secret().clone());
        assert_eq!(identity.forms(), again.forms());
    }
}
