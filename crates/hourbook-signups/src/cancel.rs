//! Cancel a processed sign-up: confirm, delete the assignment, unmark.

use hourbook_channels::confirm::{self, Resolution};
use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::Interaction;
use hourbook_core::types::{EventKey, Message, MessageRef};
use tokio::task::JoinHandle;

use crate::codec;
use crate::roster;

pub const CANCEL_QUESTION: &str = "Are you sure you want to cancel signups for this event?";

/// Ask for confirmation, then remove the assignment recorded for `target`.
pub async fn cancel_signup(
    services: &Services,
    requester: &Interaction,
    target: &Message,
) -> Result<JoinHandle<Resolution>> {
    if !roster::is_processed(target, &services.config.markers.processed) {
        return Err(HourbookError::Conflict(
            "This message has not been processed for signups yet".into(),
        ));
    }
    let action_services = services.clone();
    let artifact = target.reference;
    confirm::present(services, requester, CANCEL_QUESTION, move || async move {
        remove_assignment(&action_services, artifact).await
    })
    .await
}

/// Delete first; the processed marker only goes once the row is gone.
async fn remove_assignment(services: &Services, artifact: MessageRef) -> Result<String> {
    let mut deleted = services
        .events
        .delete_event(&EventKey::Artifact(artifact.id))
        .await?;
    if deleted == 0 {
        // Rows written before artifacts were keyed: one unkeyed row with this record.
        let message = services.platform.get_message(&artifact).await?;
        let record = codec::decode(&message.content)?;
        deleted = services.events.delete_event(&EventKey::Record(record)).await?;
    }
    tracing::info!("🗑️ Cancelled signups for {} ({deleted} row(s) removed)", artifact.id);

    if let Err(e) = services
        .platform
        .remove_reaction(&artifact, &services.config.markers.processed)
        .await
    {
        tracing::warn!("⚠️ Failed to remove processed marker from {}: {e}", artifact.id);
    }

    Ok(if deleted == 0 {
        "No recorded hours were found for this event".to_string()
    } else {
        "Signups for this event have been cancelled".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;
    use hourbook_channels::local::PlatformCall;
    use hourbook_core::interaction::{Command, InteractionKind, InteractionResponse};
    use hourbook_core::traits::EventStore;
    use hourbook_core::types::{Category, EventRecord};
    use std::time::Duration;

    fn processed_artifact(h: &Harness, record: &EventRecord) -> Message {
        let msg = h.platform.seed_message(CHANNEL, BOT, &codec::encode(record));
        h.platform.react(&msg.reference, "OGwecoo", BOT);
        h.platform.message(msg.reference.id).unwrap()
    }

    fn press_yes(h: &Harness) {
        let (_, components) = last_components(&h.platform);
        let yes = components[0].custom_id().to_string();
        h.services.hub.publish(&component(
            REQUESTER,
            None,
            InteractionKind::Button { custom_id: yes },
        ));
    }

    fn cancel_command(target: &Message) -> Interaction {
        command(Command::CancelSignup {
            target: target.clone(),
        })
    }

    #[tokio::test]
    async fn test_cancel_deletes_and_unmarks() {
        let h = harness(Duration::from_secs(5));
        let record = EventRecord::new(Category::Cs, "OG vs G2", 100, 2);
        let target = processed_artifact(&h, &record);
        h.store
            .create_event(&record, N1K, Some(target.reference.id))
            .await
            .unwrap();

        let handle = cancel_signup(&h.services, &cancel_command(&target), &target)
            .await
            .unwrap();
        assert!(h.platform.sent_contents().iter().any(|c| c == CANCEL_QUESTION));
        press_yes(&h);

        assert_eq!(handle.await.unwrap(), Resolution::Confirmed);
        assert!(stored_for(&h.store, N1K).await.is_empty());
        let msg = h.platform.message(target.reference.id).unwrap();
        assert!(!roster::is_processed(&msg, "OGwecoo"));
    }

    #[tokio::test]
    async fn test_cancel_falls_back_to_record_match() {
        let h = harness(Duration::from_secs(5));
        let record = EventRecord::new(Category::Hok, "OG vs Falcons", 100, 2);
        let target = processed_artifact(&h, &record);
        h.store.create_event(&record, KIT, None).await.unwrap();

        let handle = cancel_signup(&h.services, &cancel_command(&target), &target)
            .await
            .unwrap();
        press_yes(&h);
        handle.await.unwrap();
        assert!(stored_for(&h.store, KIT).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_leaves_other_artifacts_rows() {
        let h = harness(Duration::from_secs(5));
        let record = EventRecord::new(Category::Dota, "OG vs Envy", 100, 3);
        let first = processed_artifact(&h, &record);
        let second = processed_artifact(&h, &record);
        h.store
            .create_event(&record, KIT, Some(second.reference.id))
            .await
            .unwrap();

        let handle = cancel_signup(&h.services, &cancel_command(&first), &first)
            .await
            .unwrap();
        press_yes(&h);
        assert_eq!(handle.await.unwrap(), Resolution::Confirmed);

        let kept = stored_for(&h.store, KIT).await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].artifact, Some(second.reference.id));
        assert!(h.platform.calls().iter().any(|c| matches!(
            c,
            PlatformCall::Respond { response: InteractionResponse::Update(m), .. }
                if m.content == "No recorded hours were found for this event"
        )));
    }

    #[tokio::test]
    async fn test_unprocessed_artifact_conflicts() {
        let h = harness(Duration::from_secs(5));
        let target = h.platform.seed_message(CHANNEL, BOT, "Event: CS - x");
        let err = cancel_signup(&h.services, &cancel_command(&target), &target)
            .await
            .unwrap_err();
        assert!(matches!(err, HourbookError::Conflict(_)));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_marker() {
        let h = harness_with(Duration::from_secs(5), true);
        let record = EventRecord::new(Category::Cs, "OG vs G2", 100, 2);
        let target = processed_artifact(&h, &record);

        let handle = cancel_signup(&h.services, &cancel_command(&target), &target)
            .await
            .unwrap();
        press_yes(&h);
        assert_eq!(handle.await.unwrap(), Resolution::Confirmed);
        assert!(!h.platform.calls().iter().any(|c| matches!(c, PlatformCall::RemoveReaction { .. })));
        let msg = h.platform.message(target.reference.id).unwrap();
        assert!(roster::is_processed(&msg, "OGwecoo"));
    }
}
