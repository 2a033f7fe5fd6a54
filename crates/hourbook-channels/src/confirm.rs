//! Yes/No confirmation guarding a destructive action.

use hourbook_core::error::Result;
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::types::{ButtonStyle, Component, MessageRef, OutgoingMessage};
use std::future::Future;
use tokio::task::JoinHandle;

use crate::services::Services;

/// Terminal state of one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    Declined,
    Expired,
}

const CONFIRM_PREFIX: &str = "confirm";

/// Post a two-button prompt for `requester` and resolve it in the
/// background.
///
/// Only presses of this prompt's buttons by the requester are observed,
/// and only the first one. On confirm, `action` runs and its outcome
/// (success text or error) replaces the prompt; nothing is retried.
/// Declining or letting the prompt expire never runs `action`.
pub async fn present<A, F>(
    services: &Services,
    requester: &Interaction,
    question: &str,
    action: A,
) -> Result<JoinHandle<Resolution>>
where
    A: FnOnce() -> F + Send + 'static,
    F: Future<Output = Result<String>> + Send + 'static,
{
    let token = uuid::Uuid::new_v4().simple().to_string();
    let yes_id = format!("{CONFIRM_PREFIX}:{token}:yes");
    let no_id = format!("{CONFIRM_PREFIX}:{token}:no");

    let prompt = OutgoingMessage {
        content: question.to_string(),
        components: vec![
            Component::button(yes_id.clone(), "Yes", ButtonStyle::Danger),
            Component::button(no_id, "No", ButtonStyle::Secondary),
        ],
        ephemeral: true,
        mention_roles: Vec::new(),
    };
    let scope = format!("{CONFIRM_PREFIX}:{token}:");
    let owner = requester.user;
    // Registered before the prompt goes out so an immediate press is kept.
    let subscription = services.hub.subscribe(move |i: &Interaction| {
        i.user == owner && i.custom_id().is_some_and(|id| id.starts_with(&scope))
    });

    let prompt_ref = services
        .platform
        .respond(requester, InteractionResponse::Message(prompt))
        .await?;

    let platform = services.platform.clone();
    let expiry_platform = services.platform.clone();

    tracing::debug!("❓ Confirmation {token} presented to {owner}");

    Ok(subscription.wait(
        services.timeouts.confirm,
        move |press: Interaction| async move {
            let (resolution, text) = if press.custom_id() == Some(yes_id.as_str()) {
                let text = match action().await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("⚠️ Confirmed action failed: {e}");
                        e.user_message()
                    }
                };
                (Resolution::Confirmed, text)
            } else {
                (Resolution::Declined, "Cancelled, nothing was changed.".to_string())
            };
            if let Err(e) = platform
                .respond(&press, InteractionResponse::Update(OutgoingMessage::ephemeral(text)))
                .await
            {
                tracing::warn!("⚠️ Failed to update confirmation prompt: {e}");
            }
            resolution
        },
        move || async move {
            expire(expiry_platform.as_ref(), prompt_ref).await;
            Resolution::Expired
        },
    ))
}

async fn expire(platform: &dyn hourbook_core::traits::ChatPlatform, prompt: Option<MessageRef>) {
    let Some(prompt) = prompt else {
        return;
    };
    let notice = OutgoingMessage::ephemeral("Confirmation timed out, nothing was changed.");
    if let Err(e) = platform.update_message(&prompt, notice).await {
        tracing::warn!("⚠️ Failed to expire confirmation prompt: {e}");
    }
}
