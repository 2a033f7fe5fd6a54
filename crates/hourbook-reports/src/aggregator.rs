//! Report aggregation.
//!
//! One query task per partition, all started at once. Results travel over
//! a channel sized to the partition count; the channel is drained only
//! after every task has finished, then grouped in registry order.

use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use hourbook_core::HourbookConfig;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::traits::EventStore;
use hourbook_core::types::{Category, DateRange, ReportDimension, StoredEvent, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub dimension: ReportDimension,
    pub range: DateRange,
}

impl ReportRequest {
    /// Range from command dates: `start` at midnight UTC up to the end of
    /// `end` (inclusive), or up to `now` when no end is given.
    pub fn from_dates(
        dimension: ReportDimension,
        start: NaiveDate,
        end: Option<NaiveDate>,
        now: i64,
    ) -> Result<Self> {
        let from = midnight(start);
        let until = match end {
            Some(end) => {
                let next = end
                    .succ_opt()
                    .ok_or_else(|| HourbookError::parse("end_date", "date out of range"))?;
                midnight(next)
            }
            None => now,
        };
        if until <= from {
            return Err(HourbookError::parse(
                "end_date",
                "the end of the report must be after its start",
            ));
        }
        Ok(Self {
            dimension,
            range: DateRange::new(from, until),
        })
    }
}

fn midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Key of one independently queried partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    Identity(UserId),
    Category(Category),
}

impl PartitionKey {
    /// Stable string form, used in navigation button ids.
    pub fn as_key(&self) -> String {
        match self {
            PartitionKey::Identity(id) => id.to_string(),
            PartitionKey::Category(c) => c.token().to_string(),
        }
    }
}

/// Records of one partition grouped by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub key: PartitionKey,
    pub label: String,
    pub buckets: BTreeMap<Category, Vec<StoredEvent>>,
    pub total_hours: u64,
}

impl Partition {
    fn from_events(key: PartitionKey, label: String, events: Vec<StoredEvent>) -> Self {
        let mut buckets: BTreeMap<Category, Vec<StoredEvent>> = BTreeMap::new();
        let mut total_hours = 0u64;
        for event in events {
            total_hours += u64::from(event.record.duration_hours);
            buckets.entry(event.record.category).or_default().push(event);
        }
        Self {
            key,
            label,
            buckets,
            total_hours,
        }
    }

    pub fn bucket(&self, category: Category) -> &[StoredEvent] {
        self.buckets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Grouped report data in deterministic partition order.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub request: ReportRequest,
    pub partitions: Vec<Partition>,
    /// Labels of partitions whose query failed or timed out.
    pub skipped: Vec<String>,
}

impl Aggregate {
    pub fn total_hours(&self) -> u64 {
        self.partitions.iter().map(|p| p.total_hours).sum()
    }

    pub fn partition(&self, key: PartitionKey) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.key == key)
    }
}

/// Partitions in report order: registry order for identities, decode
/// priority order for categories.
fn partition_keys(
    config: &HourbookConfig,
    dimension: ReportDimension,
) -> Vec<(PartitionKey, String)> {
    match dimension {
        ReportDimension::ByIdentity => config
            .gardeners
            .iter()
            .map(|g| (PartitionKey::Identity(g.id), g.label.clone()))
            .collect(),
        ReportDimension::ByCategory => Category::ALL
            .into_iter()
            .map(|c| (PartitionKey::Category(c), c.token().to_string()))
            .collect(),
    }
}

async fn query(
    events: &dyn EventStore,
    key: PartitionKey,
    range: DateRange,
) -> Result<Vec<StoredEvent>> {
    match key {
        PartitionKey::Identity(id) => events.events_for_identity(id, range).await,
        PartitionKey::Category(c) => events.events_for_category(c, range).await,
    }
}

/// Query every partition concurrently and group the results.
///
/// A partition whose query fails or exceeds `query_timeout` is logged and
/// left out; the rest of the report is still produced.
pub async fn aggregate(
    events: Arc<dyn EventStore>,
    config: &HourbookConfig,
    request: ReportRequest,
    query_timeout: Duration,
) -> Aggregate {
    let keys = partition_keys(config, request.dimension);
    let (tx, mut rx) = mpsc::channel(keys.len().max(1));

    let tasks: Vec<_> = keys
        .iter()
        .cloned()
        .map(|(key, label)| {
            let tx = tx.clone();
            let events = Arc::clone(&events);
            tokio::spawn(async move {
                let lookup = query(events.as_ref(), key, request.range);
                let result = match tokio::time::timeout(query_timeout, lookup).await {
                    Ok(result) => result,
                    Err(_) => Err(HourbookError::Timeout(format!("Report query for {label}"))),
                };
                // Capacity equals the task count, so this never waits.
                let _ = tx.send((key, label, result)).await;
            })
        })
        .collect();
    drop(tx);

    for joined in join_all(tasks).await {
        if let Err(e) = joined {
            tracing::error!("❌ Report partition task aborted: {e}");
        }
    }

    let mut done: HashMap<PartitionKey, Partition> = HashMap::with_capacity(keys.len());
    while let Some((key, label, result)) = rx.recv().await {
        match result {
            Ok(events) => {
                done.insert(key, Partition::from_events(key, label, events));
            }
            Err(e) => tracing::warn!("⚠️ Report partition {label} skipped: {e}"),
        }
    }

    let skipped: Vec<String> = keys
        .iter()
        .filter(|(key, _)| !done.contains_key(key))
        .map(|(_, label)| label.clone())
        .collect();
    let partitions: Vec<Partition> = keys
        .iter()
        .filter_map(|(key, _)| done.remove(key))
        .collect();
    tracing::info!(
        "📊 Report aggregated: {} partition(s), {} skipped, {} hour(s)",
        partitions.len(),
        skipped.len(),
        partitions.iter().map(|p| p.total_hours).sum::<u64>()
    );
    Aggregate {
        request,
        partitions,
        skipped,
    }
}
