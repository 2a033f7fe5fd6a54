//! Hour reports: aggregate, render one invoice page per gardener (or one
//! combined page per game), then hand the pages to a keyed page session.

use chrono::{DateTime, NaiveDate, Utc};
use hourbook_channels::Services;
use hourbook_core::HourbookConfig;
use hourbook_core::error::Result;
use hourbook_core::interaction::{DATE_FORMAT, Interaction};
use hourbook_core::types::{Category, DateRange, ReportDimension, StoredEvent};
use tokio::task::JoinHandle;

use crate::aggregator::{self, Aggregate, Partition, ReportRequest};
use crate::pages::{self, Navigation, Page, PageSet, SessionSummary};

const NO_DATA: &str = "No report data could be loaded, please try again";

fn month_of(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%B").to_string())
        .unwrap_or_else(|| "?".into())
}

/// `**March - April**`, using the last second inside the range as its end.
fn month_span(range: DateRange) -> String {
    format!(
        "**{} - {}**",
        month_of(range.start),
        month_of(range.end.saturating_sub(1))
    )
}

fn event_line(event: &StoredEvent) -> String {
    let date = DateTime::from_timestamp(event.record.scheduled_time, 0)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| event.record.scheduled_time.to_string());
    format!(
        "{} at {} - {} hours",
        event.record.name, date, event.record.duration_hours
    )
}

/// One gardener's invoice. Every category section is present, empty or not.
pub fn invoice_page(partition: &Partition, range: DateRange) -> Page {
    let mut content = format!("# {}'s Invoice\n{}\n", partition.label, month_span(range));
    for category in Category::ALL {
        content.push_str(&format!("\n# {}\n", category.token()));
        for event in partition.bucket(category) {
            content.push_str(&event_line(event));
            content.push('\n');
        }
    }
    content.push_str(&format!("\n**Total: {}**", partition.total_hours));
    Page::new(partition.key.as_key(), partition.label.clone(), content)
}

/// Every category partition on one page, each line naming its gardener.
pub fn game_page(aggregate: &Aggregate, config: &HourbookConfig) -> Page {
    let mut content = format!("# Game Report\n{}\n", month_span(aggregate.request.range));
    for partition in &aggregate.partitions {
        content.push_str(&format!("\n# {}\n", partition.label));
        for event in partition.buckets.values().flatten() {
            let gardener = config
                .gardener_label(event.assignee)
                .map(str::to_string)
                .unwrap_or_else(|| event.assignee.mention());
            content.push_str(&format!("{} ({gardener})\n", event_line(event)));
        }
        content.push_str(&format!("Subtotal: {} hours\n", partition.total_hours));
    }
    content.push_str(&format!("\n**Total: {}**", aggregate.total_hours()));
    Page::new("game", "Game", content)
}

/// Render an aggregate into browsable pages. The first page is the
/// default view.
pub fn report_pages(aggregate: &Aggregate, config: &HourbookConfig) -> PageSet {
    if aggregate.partitions.is_empty() {
        return PageSet::new(vec![Page::new("empty", "Empty", NO_DATA)]);
    }
    let pages = match aggregate.request.dimension {
        ReportDimension::ByIdentity => aggregate
            .partitions
            .iter()
            .map(|p| invoice_page(p, aggregate.request.range))
            .collect(),
        ReportDimension::ByCategory => vec![game_page(aggregate, config)],
    };
    PageSet::new(pages)
}

/// Handle the report command: aggregate now, then browse for the report
/// session bound.
pub async fn open_report(
    services: &Services,
    requester: &Interaction,
    dimension: ReportDimension,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<JoinHandle<SessionSummary>> {
    let request = ReportRequest::from_dates(dimension, start, end, Utc::now().timestamp())?;
    let aggregate = aggregator::aggregate(
        services.events.clone(),
        &services.config,
        request,
        services.timeouts.query,
    )
    .await;
    let pages = report_pages(&aggregate, &services.config);
    pages::open_session(
        services,
        requester,
        pages,
        Navigation::Keyed,
        services.timeouts.report_session,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::PartitionKey;
    use crate::testkit::{self, DAY, HOUR, KIT, MARCH_1, N1K, REQUESTER};
    use hourbook_channels::local::PlatformCall;
    use hourbook_core::interaction::{Command, InteractionKind, InteractionResponse};
    use hourbook_core::types::{Component, MessageRef};
    use std::time::Duration;

    fn march() -> ReportRequest {
        ReportRequest {
            dimension: ReportDimension::ByIdentity,
            range: DateRange::new(MARCH_1, MARCH_1 + 31 * DAY),
        }
    }

    async fn seeded() -> testkit::Harness {
        let h = testkit::harness(Duration::from_millis(200));
        testkit::record(&h.store, N1K, Category::Dota, "Scrim", MARCH_1 + HOUR, 2).await;
        testkit::record(&h.store, N1K, Category::Dota, "Finals", MARCH_1 + DAY, 3).await;
        testkit::record(&h.store, KIT, Category::Cs, "Pugs", MARCH_1 + 2 * DAY, 4).await;
        h
    }

    #[tokio::test]
    async fn test_invoice_page_lists_bucket_and_total() {
        let h = seeded().await;
        let agg = aggregator::aggregate(
            h.services.events.clone(),
            &h.services.config,
            march(),
            Duration::from_secs(5),
        )
        .await;
        let n1k = agg.partition(PartitionKey::Identity(N1K)).unwrap();
        let page = invoice_page(n1k, agg.request.range);

        assert!(page.content.starts_with("# N1k's Invoice\n**March - March**\n"));
        assert!(page.content.contains(
            "# Dota\nScrim at 01-03-2024 - 2 hours\nFinals at 02-03-2024 - 3 hours\n"
        ));
        assert!(page.content.contains("\n# CS\n\n# MLBB\n"));
        assert!(page.content.ends_with("**Total: 5**"));
        assert_eq!(page.key, N1K.to_string());
    }

    #[tokio::test]
    async fn test_game_page_combines_partitions() {
        let h = seeded().await;
        let request = ReportRequest {
            dimension: ReportDimension::ByCategory,
            ..march()
        };
        let agg = aggregator::aggregate(
            h.services.events.clone(),
            &h.services.config,
            request,
            Duration::from_secs(5),
        )
        .await;
        let pages = report_pages(&agg, &h.services.config);
        assert_eq!(pages.len(), 1);
        let content = &pages.current().content;
        assert!(content.starts_with("# Game Report\n"));
        assert!(content.contains("Pugs at 03-03-2024 - 4 hours (Kit)\nSubtotal: 4 hours\n"));
        assert!(content.contains("# Dota\n"));
        assert!(content.ends_with("**Total: 9**"));
    }

    #[test]
    fn test_empty_aggregate_renders_notice() {
        let agg = Aggregate {
            request: march(),
            partitions: Vec::new(),
            skipped: vec!["N1k".into(), "Kit".into()],
        };
        let pages = report_pages(&agg, &testkit::config());
        assert_eq!(pages.current().content, NO_DATA);
    }

    #[tokio::test]
    async fn test_report_session_navigates_by_gardener_key() {
        let h = seeded().await;
        let requester = testkit::command(Command::Report {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: Some(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()),
            dimension: ReportDimension::ByIdentity,
        });
        let handle = open_report(
            &h.services,
            &requester,
            ReportDimension::ByIdentity,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31),
        )
        .await
        .unwrap();

        let (_, components) = testkit::last_components(&h.platform);
        let labels: Vec<_> = components
            .iter()
            .map(|c| match c {
                Component::Button { label, disabled, .. } => (label.clone(), *disabled),
                _ => (String::new(), false),
            })
            .collect();
        assert_eq!(
            labels,
            vec![("N1k".to_string(), true), ("Kit".to_string(), false)]
        );
        assert!(h.platform.sent_contents()[0].starts_with("# N1k's Invoice"));

        let press = Interaction {
            id: "press".into(),
            user: REQUESTER,
            channel: testkit::CHANNEL,
            message: Some(MessageRef::new(testkit::CHANNEL.0, 1000)),
            kind: InteractionKind::Button {
                custom_id: components[1].custom_id().to_string(),
            },
        };
        assert_eq!(h.services.hub.publish(&press), 1);

        let summary = handle.await.unwrap();
        assert_eq!(summary.presses, 1);
        assert_eq!(summary.final_index, 1);
        let turned = h.platform.calls().into_iter().find_map(|c| match c {
            PlatformCall::Respond {
                response: InteractionResponse::Update(m),
                ..
            } => Some(m),
            _ => None,
        });
        let turned = turned.unwrap();
        assert!(turned.content.starts_with("# Kit's Invoice"));
        assert!(turned.content.ends_with("**Total: 4**"));
    }

    #[tokio::test]
    async fn test_reversed_dates_fail_before_any_reply() {
        let h = seeded().await;
        let requester = testkit::command(Command::Show {
            game: None,
            user: None,
        });
        let err = open_report(
            &h.services,
            &requester,
            ReportDimension::ByIdentity,
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1),
        )
        .await
        .unwrap_err();
        assert!(err.user_message().contains("end_date"));
        assert!(h.platform.calls().is_empty());
    }
}
