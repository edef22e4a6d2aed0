use std::fmt;
use std::str::FromStr;

use super::keys::{KeyError, PublicKey};

/// Multihash code for the identity "hash" (the digest is the input itself)
pub const IDENTITY_MULTIHASH_CODE: u8 = 0x00;
/// Length of a protobuf-wrapped compressed secp256k1 public key
pub const ENVELOPE_LEN: u8 = 0x25;

/// Content-derived handle for a peer identity
///
/// Layout: `0x00 0x25 <protobuf-wrapped public key>`, i.e. an identity
/// multihash over the public key envelope. Displayed in base58.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    pub fn from_public_key(key: &PublicKey) -> Self {
        let envelope = key.to_protobuf();
        let mut bytes = Vec::with_capacity(2 + envelope.len());
        bytes.push(IDENTITY_MULTIHASH_CODE);
        bytes.push(ENVELOPE_LEN);
        bytes.extend_from_slice(&envelope);
        PeerId(bytes)
    }

    /// Parse raw identifier bytes, checking the prefix and the wrapped key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        match bytes {
            [IDENTITY_MULTIHASH_CODE, ENVELOPE_LEN, envelope @ ..]
                if envelope.len() == ENVELOPE_LEN as usize =>
            {
                // validate that the envelope carries a real key
                PublicKey::from_protobuf(envelope)?;
                Ok(PeerId(bytes.to_vec()))
            }
            _ => Err(KeyError::Format("invalid peer id prefix or length".to_string())),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The public key this identifier wraps
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_protobuf(&self.0[2..])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_base58())
    }
}

impl FromStr for PeerId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::Format(format!("peer id base58 decode error: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}
