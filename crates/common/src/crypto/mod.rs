//! Cryptographic identity for peerchat
//!
//! - **Identity**: a secp256k1 keypair (`SecretKey`/`PublicKey`) is the durable
//!   identity of a peer. It is generated once and persisted by the
//!   [`crate::identity::KeyStore`].
//! - **Peer identifier**: [`PeerId`] is an identity multihash over the
//!   protobuf-wrapped public key, rendered in base58.
//! - **Transport key**: the Ed25519 key that authenticates the iroh endpoint is
//!   derived from the secp256k1 scalar, so one key file defines the whole peer.

mod keys;
mod peer_id;

pub use keys::{
    KeyError, KeyType, PublicKey, SecretKey, COMPRESSED_PUBLIC_KEY_SIZE, PRIVATE_KEY_SIZE,
    UNCOMPRESSED_PUBLIC_KEY_SIZE,
};
pub use peer_id::PeerId;
