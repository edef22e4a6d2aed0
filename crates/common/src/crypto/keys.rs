use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use prost::Message;
use sha2::{Digest, Sha256};

use super::peer_id::PeerId;

/// Size of a secp256k1 private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of a SEC1 compressed secp256k1 point in bytes
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
/// Size of a SEC1 uncompressed secp256k1 point in bytes
pub const UNCOMPRESSED_PUBLIC_KEY_SIZE: usize = 65;

/// Domain tag mixed into the transport key derivation so the
///  transport key never equals a hash of the bare scalar.
const TRANSPORT_KEY_DOMAIN: &[u8] = b"peerchat/transport-key/v1";

/// How many fresh draws to attempt before giving up on the entropy source.
const MAX_GENERATE_ATTEMPTS: usize = 8;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("malformed key: {0}")]
    Format(String),
}

/// Key types understood by the public key envelope.
///  Values match the libp2p `KeyType` enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum KeyType {
    Rsa = 0,
    Ed25519 = 1,
    Secp256k1 = 2,
    Ecdsa = 3,
}

/// Protobuf envelope wrapping a public key:
///  `0x08 <key type> 0x12 <len> <key bytes>`
#[derive(Clone, PartialEq, prost::Message)]
struct PublicKeyEnvelope {
    #[prost(enumeration = "KeyType", tag = "1")]
    key_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    data: Vec<u8>,
}

/// Public half of a peer identity
///
/// A secp256k1 point. It has three canonical external encodings:
/// - raw X/Y coordinates (see [`PublicKey::coordinates`])
/// - a SEC1 compressed point (see [`PublicKey::to_compressed`])
/// - a protobuf envelope carrying the key type and the compressed point
///   (see [`PublicKey::to_protobuf`])
#[derive(Clone)]
pub struct PublicKey(VerifyingKey);

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        PublicKey(key)
    }
}

impl PublicKey {
    /// Parse a public key from SEC1 bytes (compressed or uncompressed)
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::Format("invalid secp256k1 point".to_string()))
    }

    /// Parse a public key from its compressed hex form
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)
            .map_err(|e| KeyError::Format(format!("public key hex decode error: {}", e)))?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Compressed SEC1 encoding (`0x02`/`0x03` prefix + X)
    pub fn to_compressed(&self) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Uncompressed SEC1 encoding (`0x04` prefix + X + Y)
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Affine X and Y coordinates, big-endian
    pub fn coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let uncompressed = self.to_uncompressed();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&uncompressed[1..33]);
        y.copy_from_slice(&uncompressed[33..65]);
        (x, y)
    }

    /// Compressed point as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Protobuf envelope: key type `Secp256k1` plus the compressed point
    pub fn to_protobuf(&self) -> Vec<u8> {
        PublicKeyEnvelope {
            key_type: KeyType::Secp256k1 as i32,
            data: self.to_compressed().to_vec(),
        }
        .encode_to_vec()
    }

    /// Parse a protobuf envelope produced by [`PublicKey::to_protobuf`]
    pub fn from_protobuf(bytes: &[u8]) -> Result<Self, KeyError> {
        let envelope = PublicKeyEnvelope::decode(bytes)
            .map_err(|e| KeyError::Format(format!("public key envelope decode error: {}", e)))?;
        if envelope.key_type != KeyType::Secp256k1 as i32 {
            return Err(KeyError::Format(format!(
                "unsupported key type {} in envelope",
                envelope.key_type
            )));
        }
        Self::from_sec1_bytes(&envelope.data)
    }

    /// Content-derived peer identifier for this key
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(self)
    }
}

/// Secret half of a peer identity
///
/// A secp256k1 signing scalar. This is the only irreplaceable piece of state a
/// peer owns: everything else (public key, peer identifier, transport node id)
/// is derived from it deterministically.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
/// let hex = secret_key.to_hex();
/// let recovered = SecretKey::from_hex(&hex)?;
/// assert_eq!(secret_key.public(), recovered.public());
/// ```
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl SecretKey {
    /// Generate a new random secret key from the operating system's entropy source
    ///
    /// Draws that fall outside the curve order are rejected and redrawn.
    pub fn generate() -> Result<Self, KeyError> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mut bytes = [0u8; PRIVATE_KEY_SIZE];
            getrandom::getrandom(&mut bytes).map_err(|e| KeyError::Entropy(e.to_string()))?;
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return Ok(Self(key));
            }
        }
        Err(KeyError::Entropy(
            "no valid scalar produced by entropy source".to_string(),
        ))
    }

    /// Reconstruct a secret key from its raw 32-byte scalar
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(KeyError::Format(format!(
                "invalid private key size, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| KeyError::Format("scalar out of range for secp256k1".to_string()))
    }

    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)
            .map_err(|e| KeyError::Format(format!("private key hex decode error: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        let mut out = [0u8; PRIVATE_KEY_SIZE];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    /// Convert secret key to lowercase hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().clone())
    }

    /// Derive the Ed25519 key used to authenticate the iroh transport
    ///
    /// SHA-256 over a fixed domain tag and the scalar, so the same identity
    /// always yields the same transport node id.
    pub fn transport_key(&self) -> iroh::SecretKey {
        let digest: [u8; 32] = Sha256::new()
            .chain_update(TRANSPORT_KEY_DOMAIN)
            .chain_update(self.to_bytes())
            .finalize()
            .into();
        iroh::SecretKey::from_bytes(&digest)
    }
}
