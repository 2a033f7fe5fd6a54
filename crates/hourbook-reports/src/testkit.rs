//! Shared fixtures for this crate's tests.

use async_trait::async_trait;
use hourbook_channels::local::PlatformCall;
use hourbook_channels::{LocalPlatform, Services};
use hourbook_core::HourbookConfig;
use hourbook_core::config::{GardenerEntry, Timeouts};
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Command, Interaction, InteractionKind, InteractionResponse};
use hourbook_core::traits::EventStore;
use hourbook_core::types::{
    Category, ChannelId, Component, DateRange, EventKey, EventRecord, MessageId, MessageRef,
    StoredEvent, UserId,
};
use hourbook_db::SqliteStore;
use std::sync::Arc;
use std::time::Duration;

pub const BOT: UserId = UserId(1);
pub const REQUESTER: UserId = UserId(7);
pub const N1K: UserId = UserId(293360731867316225);
pub const KIT: UserId = UserId(204923365205475329);
pub const CHANNEL: ChannelId = ChannelId(10);

/// 2024-03-01T00:00:00Z
pub const MARCH_1: i64 = 1_709_251_200;
pub const HOUR: i64 = 3600;
pub const DAY: i64 = 86_400;

pub fn config() -> HourbookConfig {
    let mut config = HourbookConfig::default();
    config.gardeners = vec![
        GardenerEntry { id: N1K, label: "N1k".into() },
        GardenerEntry { id: KIT, label: "Kit".into() },
    ];
    config
}

pub struct Harness {
    pub platform: Arc<LocalPlatform>,
    pub store: Arc<SqliteStore>,
    pub services: Services,
}

pub fn harness(timeout: Duration) -> Harness {
    let platform = Arc::new(LocalPlatform::new(BOT));
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let services = Services::new(platform.clone(), store.clone(), store.clone(), config())
        .with_timeouts(Timeouts::uniform(timeout));
    Harness {
        platform,
        store,
        services,
    }
}

/// Same as [`harness`] but event reads go through `events`.
pub fn harness_with_events(timeout: Duration, events: Arc<dyn EventStore>) -> Harness {
    let mut h = harness(timeout);
    h.services.events = events;
    h
}

pub fn command(command: Command) -> Interaction {
    Interaction {
        id: "cmd".into(),
        user: REQUESTER,
        channel: CHANNEL,
        message: None,
        kind: InteractionKind::Command(command),
    }
}

/// Components of the most recent response or message that had any.
pub fn last_components(platform: &LocalPlatform) -> (Option<MessageRef>, Vec<Component>) {
    platform
        .calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            PlatformCall::Respond {
                response: InteractionResponse::Message(m),
                ..
            } if !m.components.is_empty() => Some((None, m.components.clone())),
            PlatformCall::CreateMessage { target, message } if !message.components.is_empty() => {
                Some((Some(*target), message.components.clone()))
            }
            _ => None,
        })
        .unwrap_or_default()
}

pub async fn record(
    store: &SqliteStore,
    gardener: UserId,
    category: Category,
    name: &str,
    at: i64,
    hours: u32,
) {
    store
        .create_event(&EventRecord::new(category, name, at, hours), gardener, None)
        .await
        .unwrap();
}

/// Event store whose reads fail or stall for selected partitions.
pub struct FlakyStore {
    pub inner: Arc<SqliteStore>,
    pub failing_identity: Option<UserId>,
    pub stalled_category: Option<Category>,
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn create_event(
        &self,
        record: &EventRecord,
        assignee: UserId,
        artifact: Option<MessageId>,
    ) -> Result<i64> {
        self.inner.create_event(record, assignee, artifact).await
    }

    async fn delete_event(&self, key: &EventKey) -> Result<usize> {
        self.inner.delete_event(key).await
    }

    async fn events_for_identity(&self, id: UserId, range: DateRange) -> Result<Vec<StoredEvent>> {
        if self.failing_identity == Some(id) {
            return Err(HourbookError::Persistence("disk I/O error".into()));
        }
        self.inner.events_for_identity(id, range).await
    }

    async fn events_for_category(
        &self,
        category: Category,
        range: DateRange,
    ) -> Result<Vec<StoredEvent>> {
        if self.stalled_category == Some(category) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.events_for_category(category, range).await
    }
}
