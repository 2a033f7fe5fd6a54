//! # Hourbook Channels
//!
//! Plumbing between the chat platform and the workflows:
//! - `collector`: predicate-filtered, timeout-bound interaction subscriptions
//! - `confirm`: Yes/No prompt guarding a destructive action
//! - `services`: the shared collaborator bundle handed to every handler
//! - `local`: in-process [`ChatPlatform`](hourbook_core::traits::ChatPlatform)
//!   used by tests and the replay harness

pub mod collector;
pub mod confirm;
pub mod local;
pub mod services;

pub use collector::{InteractionHub, Subscription};
pub use confirm::Resolution;
pub use local::LocalPlatform;
pub use services::Services;
