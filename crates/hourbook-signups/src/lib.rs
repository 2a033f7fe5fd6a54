//! # Hourbook Signups
//!
//! Everything that reads or writes an event artifact: the text codec,
//! the reaction roster, the gardener roll and the announce / manual /
//! edit / cancel workflows.

pub mod announce;
pub mod cancel;
pub mod codec;
pub mod edit;
pub mod gardener;
pub mod guard;
pub mod roster;

#[cfg(test)]
mod testkit;

pub use gardener::{GardenerRoller, RollOutcome};
pub use guard::ArtifactGuard;
