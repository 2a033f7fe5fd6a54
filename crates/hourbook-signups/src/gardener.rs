//! Gardener assignment: resolve one assignee per artifact, exactly once.

use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionKind, InteractionResponse};
use hourbook_core::types::{Component, EventKey, Message, MessageRef, OutgoingMessage, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::codec;
use crate::guard::ArtifactGuard;
use crate::roster;

pub const PROCESSED_NOTICE: &str = "This message has been processed for signups";
const IN_PROGRESS_NOTICE: &str = "This message is already being processed for signups";
const MENU_PROMPT: &str = "Select the gardener working this event";
const MARK_FAILED_NOTICE: &str =
    "Could not mark the message as processed, nothing was saved. Please roll again";

/// How a detached roll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollOutcome {
    Assigned { gardener: UserId, event_id: i64 },
    /// The selection arrived but the assignment was not recorded.
    Failed(String),
    TimedOut,
}

/// Runs gardener rolls. Clones share the per-artifact guard.
#[derive(Clone)]
pub struct GardenerRoller {
    services: Services,
    guard: ArtifactGuard,
}

impl GardenerRoller {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            guard: ArtifactGuard::new(),
        }
    }

    pub fn guard(&self) -> &ArtifactGuard {
        &self.guard
    }

    /// Check preconditions, post the candidate menu and resolve the
    /// selection in the background.
    ///
    /// Errors are terminal for this invocation and nothing has been
    /// written when one is returned.
    pub async fn roll(
        &self,
        requester: &Interaction,
        target: &Message,
    ) -> Result<JoinHandle<RollOutcome>> {
        let markers = &self.services.config.markers;
        if roster::is_processed(target, &markers.processed) {
            return Err(HourbookError::Conflict(PROCESSED_NOTICE.into()));
        }

        let artifact = target.reference;
        let lease = self
            .guard
            .try_acquire(artifact.id)
            .ok_or_else(|| HourbookError::Conflict(IN_PROGRESS_NOTICE.into()))?;

        let platform = self.services.platform.as_ref();
        // The command payload may predate a roll that finished meanwhile.
        let current = platform.get_message(&artifact).await?;
        if roster::is_processed(&current, &markers.processed) {
            return Err(HourbookError::Conflict(PROCESSED_NOTICE.into()));
        }

        let candidates = self.candidates(&artifact).await?;

        let token = uuid::Uuid::new_v4().simple().to_string();
        let custom_id = format!("gardener:{token}");
        let menu = OutgoingMessage::ephemeral(MENU_PROMPT).with_components(vec![
            Component::UserSelect {
                custom_id: custom_id.clone(),
                placeholder: MENU_PROMPT.into(),
                options: candidates.clone(),
            },
        ]);
        platform
            .respond(requester, InteractionResponse::Message(menu))
            .await?;

        tracing::info!(
            "🎲 Gardener roll for {} started with {} candidate(s)",
            artifact.id,
            candidates.len()
        );

        let lease = Arc::new(lease);
        let held_for_timeout = Arc::clone(&lease);
        let owner = requester.user;
        let services = self.services.clone();
        let timeout_services = self.services.clone();
        let requester = requester.clone();

        Ok(self.services.hub.wait_for(
            move |i: &Interaction| i.user == owner && i.custom_id() == Some(custom_id.as_str()),
            self.services.timeouts.selection,
            move |selection| async move {
                let _lease = lease;
                resolve(&services, selection, artifact, &candidates).await
            },
            move || async move {
                let _lease = held_for_timeout;
                tracing::info!("⏰ Gardener selection for {} timed out", artifact.id);
                let notice = OutgoingMessage::ephemeral("Gardener selection timed out.");
                if let Err(e) = timeout_services
                    .platform
                    .respond(&requester, InteractionResponse::Message(notice))
                    .await
                {
                    tracing::warn!("⚠️ Failed to send selection timeout notice: {e}");
                }
                RollOutcome::TimedOut
            },
        ))
    }

    /// Roster mapped through the registry. One unregistered member
    /// rejects the whole roll.
    async fn candidates(&self, artifact: &MessageRef) -> Result<Vec<(UserId, String)>> {
        let members = roster::roster(
            self.services.platform.as_ref(),
            artifact,
            &self.services.config.markers.signup,
        )
        .await?;
        if members.is_empty() {
            return Err(HourbookError::NoSignups(
                "No one has signed up for this event yet".into(),
            ));
        }
        members
            .into_iter()
            .map(|id| {
                self.services
                    .config
                    .gardener_label(id)
                    .map(|label| (id, label.to_string()))
                    .ok_or(HourbookError::UnknownCandidate(id))
            })
            .collect()
    }
}

async fn resolve(
    services: &Services,
    selection: Interaction,
    artifact: MessageRef,
    candidates: &[(UserId, String)],
) -> RollOutcome {
    let chosen = match &selection.kind {
        InteractionKind::UserSelect { users, .. } => users.first().copied(),
        _ => None,
    };
    let result = match chosen {
        Some(gardener) if candidates.iter().any(|(id, _)| *id == gardener) => {
            assign(services, artifact, gardener)
                .await
                .map(|event_id| (gardener, event_id))
        }
        Some(other) => Err(HourbookError::UnknownCandidate(other)),
        None => Err(HourbookError::parse("values", "no gardener selected")),
    };

    let (text, outcome) = match result {
        Ok((gardener, event_id)) => (
            "Hours added to the database".to_string(),
            RollOutcome::Assigned { gardener, event_id },
        ),
        Err(e) => {
            tracing::warn!("⚠️ Gardener roll for {} failed: {e}", artifact.id);
            let text = e.user_message();
            (text.clone(), RollOutcome::Failed(text))
        }
    };
    if let Err(e) = services
        .platform
        .respond(&selection, InteractionResponse::Update(OutgoingMessage::ephemeral(text)))
        .await
    {
        tracing::warn!("⚠️ Failed to update gardener menu: {e}");
    }
    outcome
}

/// Persist first, mark processed second, announce last. A row whose
/// artifact cannot be marked is deleted again.
async fn assign(services: &Services, artifact: MessageRef, gardener: UserId) -> Result<i64> {
    let platform = services.platform.as_ref();
    // The current text is authoritative: edits may have happened since the roll started.
    let message = platform.get_message(&artifact).await?;
    let record = codec::decode(&message.content)?;
    let event_id = services
        .events
        .create_event(&record, gardener, Some(artifact.id))
        .await?;
    tracing::info!(
        "✅ Event {event_id} ({} - {}) assigned to {gardener}",
        record.category,
        record.name
    );

    if let Err(e) = platform
        .add_reaction(&artifact, &services.config.markers.processed)
        .await
    {
        tracing::error!(
            "❌ Failed to mark {} as processed, rolling back event {event_id}: {e}",
            artifact.id
        );
        let rollback = services
            .events
            .delete_event(&EventKey::Artifact(artifact.id))
            .await;
        return Err(match rollback {
            Ok(_) => HourbookError::Conflict(MARK_FAILED_NOTICE.into()),
            Err(err) => {
                tracing::error!("❌ Rollback of event {event_id} failed: {err}");
                HourbookError::Conflict(format!(
                    "Hours were saved as event {event_id} but the message could not be marked, \
                     ask an admin to remove the entry"
                ))
            }
        });
    }

    let confirmation = format!(
        "{}\nGardener: {}\nSignups: message {}",
        codec::encode(&record),
        gardener.mention(),
        artifact.id
    );
    if let Err(e) = platform
        .create_message(artifact.channel, OutgoingMessage::text(confirmation))
        .await
    {
        tracing::warn!("⚠️ Failed to post assignment confirmation: {e}");
    }
    Ok(event_id)
}
