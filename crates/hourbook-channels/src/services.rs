//! Collaborator bundle shared by every handler.

use hourbook_core::config::{HourbookConfig, Timeouts};
use hourbook_core::traits::{ChatPlatform, EventStore, ScoreStore};
use std::sync::Arc;

use crate::collector::InteractionHub;

/// Everything a workflow needs, constructed once at startup and cloned
/// into each detached task.
#[derive(Clone)]
pub struct Services {
    pub platform: Arc<dyn ChatPlatform>,
    pub events: Arc<dyn EventStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub hub: InteractionHub,
    pub config: Arc<HourbookConfig>,
    pub timeouts: Timeouts,
}

impl Services {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        events: Arc<dyn EventStore>,
        scores: Arc<dyn ScoreStore>,
        config: HourbookConfig,
    ) -> Self {
        let timeouts = Timeouts::from(&config.timeouts);
        Self {
            platform,
            events,
            scores,
            hub: InteractionHub::new(),
            config: Arc::new(config),
            timeouts,
        }
    }

    /// Override every wait bound (tests, replay).
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
