pub mod chat;
pub mod identity;
pub mod init;
pub mod version;

pub use chat::Chat;
pub use identity::Identity;
pub use init::Init;
pub use version::Version;
