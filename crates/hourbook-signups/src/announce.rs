//! Event creation: the announcement modal and the manual assignment.

use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionKind, InteractionResponse};
use hourbook_core::types::{
    Category, EventRecord, MessageRef, Modal, ModalField, OutgoingMessage, ScheduledEvent,
    SelectOption, UserId,
};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::task::JoinHandle;

use crate::codec;

const MODAL_PREFIX: &str = "event_modal";
pub const MODAL_TIMEOUT_NOTICE: &str = "Modal timed out. Please try again.";

/// How a detached announcement or manual entry ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Artifact posted, open for sign-ups.
    Announced(MessageRef),
    /// Assignment written directly.
    Recorded { event_id: i64, message: MessageRef },
    Failed(String),
    TimedOut,
}

fn event_modal(custom_id: String) -> Modal {
    let text = |id: &str, label: &str, placeholder: &str| ModalField::Text {
        custom_id: id.into(),
        label: label.into(),
        placeholder: placeholder.into(),
        required: true,
    };
    Modal {
        custom_id,
        title: "Event Modal".into(),
        fields: vec![
            ModalField::Select {
                custom_id: "event_type".into(),
                label: "Event Type".into(),
                options: Category::ALL
                    .iter()
                    .map(|c| SelectOption {
                        label: c.token().into(),
                        value: c.token().into(),
                    })
                    .collect(),
            },
            text("event_name", "Event Name", "OG vs <opp team name>"),
            text("event_time", "Event Schedule", "Insert unix time from hammertime here"),
            text("event_duration", "Event duration", "How many hours is this event"),
        ],
    }
}

/// Build a record from the modal's fields.
pub fn parse_submission(fields: &BTreeMap<String, String>) -> Result<EventRecord> {
    let field = |key: &'static str, name: &'static str| {
        fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HourbookError::parse(name, "field is required"))
    };
    let category: Category = field("event_type", "category")?.parse()?;
    let name = field("event_name", "name")?;
    let time = field("event_time", "time")?
        .parse::<i64>()
        .map_err(|_| HourbookError::parse("time", "not a valid unix time"))?;
    let hours = field("event_duration", "hours")?
        .parse::<u32>()
        .map_err(|_| HourbookError::parse("hours", "not a whole number of hours"))?;

    let record = EventRecord::new(category, name, time, hours);
    codec::validate(&record)?;
    Ok(record)
}

/// Full artifact text: role ping, the three anchors, sign-up instructions.
pub fn announcement_text(services: &Services, record: &EventRecord) -> String {
    let config = &services.config;
    let header = config
        .gardener_role
        .map(|role| format!("Hey <@&{role}>\n\n"))
        .unwrap_or_default();
    format!(
        "{header}{}\nPlease react with {} to sign up!.",
        codec::encode(record),
        config.markers.signup_display
    )
}

/// `/event`: open the modal, then post the artifact from the submission.
pub async fn open_announcement(
    services: &Services,
    requester: &Interaction,
) -> Result<JoinHandle<AnnounceOutcome>> {
    with_modal(services, requester, |services, submission, fields| async move {
        let record = match parse_submission(&fields) {
            Ok(record) => record,
            Err(e) => return reject(&services, &submission, e).await,
        };
        match announce(&services, &submission, &record).await {
            Ok(artifact) => AnnounceOutcome::Announced(artifact),
            Err(e) => reject(&services, &submission, e).await,
        }
    })
    .await
}

/// `/manual`: same modal, but the gardener is known and the event is
/// written straight away.
pub async fn open_manual(
    services: &Services,
    requester: &Interaction,
    gardener: UserId,
) -> Result<JoinHandle<AnnounceOutcome>> {
    if services.config.gardener_label(gardener).is_none() {
        return Err(HourbookError::UnknownCandidate(gardener));
    }
    with_modal(services, requester, move |services, submission, fields| async move {
        let record = match parse_submission(&fields) {
            Ok(record) => record,
            Err(e) => return reject(&services, &submission, e).await,
        };
        match record_manual(&services, &submission, &record, gardener).await {
            Ok((event_id, message)) => AnnounceOutcome::Recorded { event_id, message },
            Err(e) => reject(&services, &submission, e).await,
        }
    })
    .await
}

async fn with_modal<H, F>(
    services: &Services,
    requester: &Interaction,
    on_submit: H,
) -> Result<JoinHandle<AnnounceOutcome>>
where
    H: FnOnce(Services, Interaction, BTreeMap<String, String>) -> F + Send + 'static,
    F: Future<Output = AnnounceOutcome> + Send + 'static,
{
    let token = uuid::Uuid::new_v4().simple().to_string();
    let custom_id = format!("{MODAL_PREFIX}:{token}");
    services
        .platform
        .respond(requester, InteractionResponse::Modal(event_modal(custom_id.clone())))
        .await?;

    let owner = requester.user;
    let submit_services = services.clone();
    let timeout_services = services.clone();
    let requester = requester.clone();

    Ok(services.hub.wait_for(
        move |i: &Interaction| {
            i.user == owner
                && matches!(&i.kind, InteractionKind::ModalSubmit { custom_id: id, .. } if *id == custom_id)
        },
        services.timeouts.modal,
        move |submission| async move {
            let fields = match &submission.kind {
                InteractionKind::ModalSubmit { fields, .. } => fields.clone(),
                _ => BTreeMap::new(),
            };
            on_submit(submit_services, submission, fields).await
        },
        move || async move {
            let notice = OutgoingMessage::ephemeral(MODAL_TIMEOUT_NOTICE);
            if let Err(e) = timeout_services
                .platform
                .respond(&requester, InteractionResponse::Message(notice))
                .await
            {
                tracing::warn!("⚠️ Failed to send modal timeout notice: {e}");
            }
            AnnounceOutcome::TimedOut
        },
    ))
}

async fn reject(services: &Services, submission: &Interaction, e: HourbookError) -> AnnounceOutcome {
    tracing::warn!("⚠️ Event submission rejected: {e}");
    let text = e.user_message();
    if let Err(e) = services
        .platform
        .respond(submission, InteractionResponse::Message(OutgoingMessage::ephemeral(&text)))
        .await
    {
        tracing::warn!("⚠️ Failed to report rejected submission: {e}");
    }
    AnnounceOutcome::Failed(text)
}

async fn announce(
    services: &Services,
    submission: &Interaction,
    record: &EventRecord,
) -> Result<MessageRef> {
    let platform = services.platform.as_ref();
    let message = OutgoingMessage {
        content: announcement_text(services, record),
        mention_roles: services.config.gardener_role.into_iter().collect(),
        ..Default::default()
    };
    let artifact = platform.create_message(submission.channel, message).await?;
    tracing::info!(
        "📣 Announced {} - {} as {}",
        record.category,
        record.name,
        artifact.id
    );

    if let Err(e) = platform
        .add_reaction(&artifact, &services.config.markers.signup)
        .await
    {
        tracing::warn!("⚠️ Failed to add sign-up marker to {}: {e}", artifact.id);
    }
    schedule(services, record).await;
    acknowledge(services, submission, "Event announced").await;
    Ok(artifact)
}

async fn record_manual(
    services: &Services,
    submission: &Interaction,
    record: &EventRecord,
    gardener: UserId,
) -> Result<(i64, MessageRef)> {
    let event_id = services.events.create_event(record, gardener, None).await?;
    tracing::info!(
        "✅ Manual event {event_id} ({} - {}) recorded for {gardener}",
        record.category,
        record.name
    );
    let text = format!("{}\nGardener: {}", codec::encode(record), gardener.mention());
    let message = services
        .platform
        .create_message(submission.channel, OutgoingMessage::text(text))
        .await?;
    schedule(services, record).await;
    acknowledge(services, submission, "Hours added to the database").await;
    Ok((event_id, message))
}

/// Mirror the event as a platform scheduled event, when a venue is configured.
async fn schedule(services: &Services, record: &EventRecord) {
    let Some(venue) = services.config.venue(record.category) else {
        tracing::debug!("No venue configured for {}, skipping scheduled event", record.category);
        return;
    };
    let event = ScheduledEvent {
        name: format!("{} - {}", record.category, record.name),
        start_time: record.scheduled_time,
        venue: venue.clone(),
    };
    if let Err(e) = services.platform.create_scheduled_event(event).await {
        tracing::warn!("⚠️ Failed to create scheduled event: {e}");
    }
}

async fn acknowledge(services: &Services, submission: &Interaction, text: &str) {
    if let Err(e) = services
        .platform
        .respond(submission, InteractionResponse::Message(OutgoingMessage::ephemeral(text)))
        .await
    {
        tracing::warn!("⚠️ Failed to acknowledge submission: {e}");
    }
}
