//! # Hourbook Core
//!
//! Shared vocabulary for every Hourbook crate: the event data model,
//! typed interactions, configuration, the error taxonomy and the two
//! collaborator contracts (chat platform + persistence).

pub mod config;
pub mod error;
pub mod interaction;
pub mod traits;
pub mod types;

pub use config::HourbookConfig;
pub use error::{HourbookError, Result};
