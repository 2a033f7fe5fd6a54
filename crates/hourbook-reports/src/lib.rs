//! # Hourbook Reports
//!
//! The concurrent hour report and the prediction leaderboard, both browsed
//! through button-driven page sessions, plus scoreboard maintenance.

pub mod aggregator;
pub mod leaderboard;
pub mod pages;
pub mod report;
pub mod scores;

pub use aggregator::{Aggregate, Partition, PartitionKey, ReportRequest};
pub use pages::{Navigation, Page, PageSet, SessionSummary};

#[cfg(test)]
mod testkit;
