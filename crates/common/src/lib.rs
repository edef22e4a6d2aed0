/**
 * Chat sessions over a duplex byte stream.
 *  - Wire framing for a single chat line
 *  - Read and write loops with an idempotent close
 *  - Session events, free of any rendering
 */
pub mod chat;
/**
 * Cryptographic types and operations.
 *  - secp256k1 public and private keys
 *  - Peer identifiers derived from the public key
 */
pub mod crypto;
/**
 * Durable identity: a key that is generated once,
 *  persisted, and loaded on every later start.
 */
pub mod identity;
/**
 * Networking layer implementation.
 *  The static peer directory, the iroh endpoint,
 *  and the responder / initiator bootstrap.
 */
pub mod peer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::chat::{ChatMessage, CloseReason, Session, SessionEvent};
    pub use crate::crypto::{PeerId, PublicKey, SecretKey};
    pub use crate::identity::{Identity, KeyStore};
    pub use crate::peer::{Chat, ChatContext, Node, PeerDirectory, RemotePeer, Role};
    pub use crate::version::build_info;
}
