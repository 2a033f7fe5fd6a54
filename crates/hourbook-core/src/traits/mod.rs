//! Collaborator contracts. Implementations live outside the core.

pub mod platform;
pub mod store;

pub use platform::ChatPlatform;
pub use store::{EventStore, ScoreStore};
