pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Chat, Identity, Init, Version};
