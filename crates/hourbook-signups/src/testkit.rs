//! Shared fixtures for this crate's tests.

use async_trait::async_trait;
use hourbook_channels::local::PlatformCall;
use hourbook_channels::{LocalPlatform, Services};
use hourbook_core::config::{GardenerEntry, Timeouts};
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Command, Interaction, InteractionKind, InteractionResponse};
use hourbook_core::traits::EventStore;
use hourbook_core::types::{
    Category, ChannelId, Component, DateRange, EventKey, EventRecord, MessageId, MessageRef,
    StoredEvent, UserId,
};
use hourbook_core::HourbookConfig;
use hourbook_db::SqliteStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const BOT: UserId = UserId(1);
pub const REQUESTER: UserId = UserId(7);
pub const N1K: UserId = UserId(293360731867316225);
pub const KIT: UserId = UserId(204923365205475329);
pub const CHANNEL: ChannelId = ChannelId(10);

pub fn config() -> HourbookConfig {
    let mut config = HourbookConfig::default();
    config.gardener_role = Some(720253636797530203);
    config.gardeners = vec![
        GardenerEntry { id: N1K, label: "N1k".into() },
        GardenerEntry { id: KIT, label: "Kit".into() },
    ];
    config
}

pub struct Harness {
    pub platform: Arc<LocalPlatform>,
    pub store: Arc<SqliteStore>,
    pub counting: Arc<CountingStore>,
    pub services: Services,
}

pub fn harness(timeout: Duration) -> Harness {
    harness_with(timeout, false)
}

/// `failing` makes every event write fail with a persistence error.
pub fn harness_with(timeout: Duration, failing: bool) -> Harness {
    let platform = Arc::new(LocalPlatform::new(BOT));
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let counting = Arc::new(CountingStore {
        inner: store.clone(),
        writes: AtomicUsize::new(0),
        failing,
    });
    let services = Services::new(platform.clone(), counting.clone(), store.clone(), config())
        .with_timeouts(Timeouts::uniform(timeout));
    Harness {
        platform,
        store,
        counting,
        services,
    }
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

pub fn component(user: UserId, message: Option<MessageRef>, kind: InteractionKind) -> Interaction {
    Interaction {
        id: format!("component-{}", user),
        user,
        channel: CHANNEL,
        message,
        kind,
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

pub fn all_time() -> DateRange {
    DateRange::new(i64::MIN, i64::MAX)
}

pub async fn stored_for(store: &SqliteStore, user: UserId) -> Vec<StoredEvent> {
    store.events_for_identity(user, all_time()).await.unwrap()
}

/// Event store wrapper counting writes, optionally failing them.
pub struct CountingStore {
    inner: Arc<SqliteStore>,
    writes: AtomicUsize,
    failing: bool,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for CountingStore {
    async fn create_event(
        &self,
        record: &EventRecord,
        assignee: UserId,
        artifact: Option<MessageId>,
    ) -> Result<i64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(HourbookError::Persistence("database is locked".into()));
        }
        self.inner.create_event(record, assignee, artifact).await
    }

    async fn delete_event(&self, key: &EventKey) -> Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(HourbookError::Persistence("database is locked".into()));
        }
        self.inner.delete_event(key).await
    }

    async fn events_for_identity(&self, id: UserId, range: DateRange) -> Result<Vec<StoredEvent>> {
        self.inner.events_for_identity(id, range).await
    }

    async fn events_for_category(
        &self,
        category: Category,
        range: DateRange,
    ) -> Result<Vec<StoredEvent>> {
        self.inner.events_for_category(category, range).await
    }
}
