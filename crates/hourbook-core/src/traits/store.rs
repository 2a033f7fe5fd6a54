//! Persistence collaborator contracts.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Category, DateRange, EventKey, EventRecord, MessageId, RankedScore, StoredEvent, UserId,
};

/// Assignment storage. Failures surface as `HourbookError::Persistence`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one assignment. An `artifact` already present in the store
    /// yields `HourbookError::Conflict` and writes nothing.
    async fn create_event(
        &self,
        record: &EventRecord,
        assignee: UserId,
        artifact: Option<MessageId>,
    ) -> Result<i64>;

    /// Delete matching rows, returning how many were removed.
    async fn delete_event(&self, key: &EventKey) -> Result<usize>;

    async fn events_for_identity(&self, id: UserId, range: DateRange) -> Result<Vec<StoredEvent>>;

    async fn events_for_category(
        &self,
        category: Category,
        range: DateRange,
    ) -> Result<Vec<StoredEvent>>;
}

/// Prediction scoreboard storage.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Ranked rows, best first. `None` ranks the sum over every game.
    async fn leaderboard(&self, game: Option<Category>) -> Result<Vec<RankedScore>>;

    async fn add_score(&self, member: UserId, game: Category, delta: i64) -> Result<()>;

    /// Add `delta` for every member in one transaction. Returns how many
    /// distinct members were credited.
    async fn award(&self, members: &[UserId], game: Category, delta: i64) -> Result<usize>;

    /// Clear one game's board, or every board for `None`. Returns rows removed.
    async fn reset(&self, game: Option<Category>) -> Result<usize>;
}
