//! Chat platform collaborator.

use async_trait::async_trait;

use crate::error::Result;
use crate::interaction::{Interaction, InteractionResponse};
use crate::types::{ChannelId, Message, MessageRef, OutgoingMessage, ScheduledEvent, UserId};

/// Everything Hourbook needs from the chat platform's REST surface.
///
/// Every failure is reported as `HourbookError::ExternalApi`.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform name for logs.
    fn name(&self) -> &str;

    /// The bot's own identity, excluded from every roster.
    fn self_id(&self) -> UserId;

    async fn create_message(&self, channel: ChannelId, message: OutgoingMessage)
        -> Result<MessageRef>;

    async fn update_message(&self, target: &MessageRef, message: OutgoingMessage) -> Result<()>;

    async fn delete_message(&self, target: &MessageRef) -> Result<()>;

    async fn get_message(&self, target: &MessageRef) -> Result<Message>;

    /// Add the bot's own reaction.
    async fn add_reaction(&self, target: &MessageRef, marker: &str) -> Result<()>;

    /// Remove the bot's own reaction.
    async fn remove_reaction(&self, target: &MessageRef, marker: &str) -> Result<()>;

    /// Every identity that applied `marker`, the bot included.
    async fn list_reactions(&self, target: &MessageRef, marker: &str) -> Result<Vec<UserId>>;

    /// Answer an interaction. Returns the created message for
    /// [`InteractionResponse::Message`].
    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<Option<MessageRef>>;

    /// Member display name from the local cache, without any request.
    fn cached_display_name(&self, user: UserId) -> Option<String>;

    /// Guild member display name.
    async fn fetch_member_name(&self, user: UserId) -> Result<String>;

    /// Bare user name, for identities that left the guild.
    async fn fetch_user_name(&self, user: UserId) -> Result<String>;

    async fn create_scheduled_event(&self, event: ScheduledEvent) -> Result<()>;
}
