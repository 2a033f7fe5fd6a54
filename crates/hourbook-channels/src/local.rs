//! In-process chat platform.
//!
//! Keeps messages and reactions in memory and records every call, so
//! workflows can be driven end to end without a gateway connection.

use async_trait::async_trait;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::traits::ChatPlatform;
use hourbook_core::types::{
    ChannelId, Message, MessageId, MessageRef, OutgoingMessage, Reaction, ScheduledEvent, UserId,
    marker_name,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    CreateMessage { target: MessageRef, message: OutgoingMessage },
    UpdateMessage { target: MessageRef, message: OutgoingMessage },
    DeleteMessage(MessageRef),
    GetMessage(MessageRef),
    AddReaction { target: MessageRef, marker: String },
    RemoveReaction { target: MessageRef, marker: String },
    ListReactions { target: MessageRef, marker: String },
    Respond { interaction: String, response: InteractionResponse },
    FetchMemberName(UserId),
    FetchUserName(UserId),
    CreateScheduledEvent(ScheduledEvent),
}

impl PlatformCall {
    /// Operation name, as accepted by [`LocalPlatform::fail_on`].
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateMessage { .. } => "create_message",
            Self::UpdateMessage { .. } => "update_message",
            Self::DeleteMessage(_) => "delete_message",
            Self::GetMessage(_) => "get_message",
            Self::AddReaction { .. } => "add_reaction",
            Self::RemoveReaction { .. } => "remove_reaction",
            Self::ListReactions { .. } => "list_reactions",
            Self::Respond { .. } => "respond",
            Self::FetchMemberName(_) => "fetch_member_name",
            Self::FetchUserName(_) => "fetch_user_name",
            Self::CreateScheduledEvent(_) => "create_scheduled_event",
        }
    }

    /// Whether the call changes platform state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::GetMessage(_)
                | Self::ListReactions { .. }
                | Self::FetchMemberName(_)
                | Self::FetchUserName(_)
        )
    }

    /// One transcript line.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateMessage { target, message } => {
                format!("create_message #{} -> {}: {}", target.channel, target.id, summary(message))
            }
            Self::UpdateMessage { target, message } => {
                format!("update_message {}: {}", target.id, summary(message))
            }
            Self::DeleteMessage(target) => format!("delete_message {}", target.id),
            Self::GetMessage(target) => format!("get_message {}", target.id),
            Self::AddReaction { target, marker } => format!("add_reaction {} {marker}", target.id),
            Self::RemoveReaction { target, marker } => {
                format!("remove_reaction {} {marker}", target.id)
            }
            Self::ListReactions { target, marker } => {
                format!("list_reactions {} {marker}", target.id)
            }
            Self::Respond { interaction, response } => {
                let body = match response {
                    InteractionResponse::Message(m) => format!("message {}", summary(m)),
                    InteractionResponse::Update(m) => format!("update {}", summary(m)),
                    InteractionResponse::Modal(modal) => {
                        format!("modal '{}' ({})", modal.title, modal.custom_id)
                    }
                };
                format!("respond {interaction}: {body}")
            }
            Self::FetchMemberName(user) => format!("fetch_member_name {user}"),
            Self::FetchUserName(user) => format!("fetch_user_name {user}"),
            Self::CreateScheduledEvent(event) => {
                format!("create_scheduled_event '{}' at {}", event.name, event.start_time)
            }
        }
    }
}

fn summary(message: &OutgoingMessage) -> String {
    let mut out = format!("{:?}", message.content);
    if !message.components.is_empty() {
        let ids: Vec<_> = message.components.iter().map(|c| c.custom_id()).collect();
        out.push_str(&format!(" [{}]", ids.join(", ")));
    }
    if message.ephemeral {
        out.push_str(" (ephemeral)");
    }
    out
}

#[derive(Debug, Clone)]
struct StoredMessage {
    channel: ChannelId,
    author: UserId,
    content: String,
    /// Marker name → identities, in reaction order.
    reactions: BTreeMap<String, Vec<UserId>>,
}

#[derive(Default)]
struct LocalState {
    messages: HashMap<MessageId, StoredMessage>,
    calls: Vec<PlatformCall>,
    cached_names: HashMap<UserId, String>,
    member_names: HashMap<UserId, String>,
    user_names: HashMap<UserId, String>,
    failing: HashSet<&'static str>,
    last_prompt: Option<Prompt>,
}

/// The most recent set of interactive ids handed to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Component custom ids in display order, or the modal's custom id.
    pub custom_ids: Vec<String>,
    /// Message carrying the components; `None` for modals.
    pub message: Option<MessageRef>,
}

/// In-memory [`ChatPlatform`].
pub struct LocalPlatform {
    self_id: UserId,
    next_id: AtomicU64,
    state: Mutex<LocalState>,
}

impl LocalPlatform {
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            next_id: AtomicU64::new(1_000),
            state: Mutex::new(LocalState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a call, failing it if its operation was marked with `fail_on`.
    fn record(&self, call: PlatformCall) -> Result<()> {
        let op = call.op();
        let mut state = self.state();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(HourbookError::ExternalApi(format!("{op} failed")));
        }
        Ok(())
    }

    /// Place a message authored by someone else.
    pub fn seed_message(&self, channel: ChannelId, author: UserId, content: &str) -> Message {
        let id = self.next_message_id();
        self.state().messages.insert(
            id,
            StoredMessage {
                channel,
                author,
                content: content.to_string(),
                reactions: BTreeMap::new(),
            },
        );
        Message {
            reference: MessageRef { channel, id },
            author,
            content: content.to_string(),
            reactions: Vec::new(),
        }
    }

    /// A member applies a reaction.
    pub fn react(&self, target: &MessageRef, marker: &str, user: UserId) {
        if let Some(msg) = self.state().messages.get_mut(&target.id) {
            let users = msg.reactions.entry(marker_name(marker).to_string()).or_default();
            if !users.contains(&user) {
                users.push(user);
            }
        }
    }

    /// Current snapshot of a message.
    pub fn message(&self, id: MessageId) -> Option<Message> {
        let state = self.state();
        state.messages.get(&id).map(|m| snapshot(id, m))
    }

    pub fn set_cached_name(&self, user: UserId, name: &str) {
        self.state().cached_names.insert(user, name.to_string());
    }

    pub fn set_member_name(&self, user: UserId, name: &str) {
        self.state().member_names.insert(user, name.to_string());
    }

    pub fn set_user_name(&self, user: UserId, name: &str) {
        self.state().user_names.insert(user, name.to_string());
    }

    /// Make every later call of `op` fail with `ExternalApi`.
    pub fn fail_on(&self, op: &'static str) {
        self.state().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// Calls recorded so far, removing them.
    pub fn take_calls(&self) -> Vec<PlatformCall> {
        std::mem::take(&mut self.state().calls)
    }

    /// Ids offered by the latest message-with-components or modal.
    pub fn last_prompt(&self) -> Option<Prompt> {
        self.state().last_prompt.clone()
    }

    /// Every message body sent through `create_message` or a message response.
    pub fn sent_contents(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::CreateMessage { message, .. }
                | PlatformCall::Respond {
                    response: InteractionResponse::Message(message),
                    ..
                } => Some(message.content.clone()),
                _ => None,
            })
            .collect()
    }
}

fn prompt_of(message: &OutgoingMessage, at: Option<MessageRef>) -> Prompt {
    Prompt {
        custom_ids: message
            .components
            .iter()
            .map(|c| c.custom_id().to_string())
            .collect(),
        message: at,
    }
}

fn snapshot(id: MessageId, m: &StoredMessage) -> Message {
    Message {
        reference: MessageRef {
            channel: m.channel,
            id,
        },
        author: m.author,
        content: m.content.clone(),
        reactions: m
            .reactions
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(marker, users)| Reaction {
                marker: marker.clone(),
                count: users.len() as u32,
            })
            .collect(),
    }
}

#[async_trait]
impl ChatPlatform for LocalPlatform {
    fn name(&self) -> &str {
        "local"
    }

    fn self_id(&self) -> UserId {
        self.self_id
    }

    async fn create_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageRef> {
        let target = MessageRef {
            channel,
            id: self.next_message_id(),
        };
        self.record(PlatformCall::CreateMessage {
            target,
            message: message.clone(),
        })?;
        let mut state = self.state();
        if !message.components.is_empty() {
            state.last_prompt = Some(prompt_of(&message, Some(target)));
        }
        state.messages.insert(
            target.id,
            StoredMessage {
                channel,
                author: self.self_id,
                content: message.content,
                reactions: BTreeMap::new(),
            },
        );
        Ok(target)
    }

    async fn update_message(&self, target: &MessageRef, message: OutgoingMessage) -> Result<()> {
        self.record(PlatformCall::UpdateMessage {
            target: *target,
            message: message.clone(),
        })?;
        match self.state().messages.get_mut(&target.id) {
            Some(stored) => {
                stored.content = message.content;
                Ok(())
            }
            None => Err(HourbookError::ExternalApi(format!("Unknown message {}", target.id))),
        }
    }

    async fn delete_message(&self, target: &MessageRef) -> Result<()> {
        self.record(PlatformCall::DeleteMessage(*target))?;
        self.state().messages.remove(&target.id);
        Ok(())
    }

    async fn get_message(&self, target: &MessageRef) -> Result<Message> {
        self.record(PlatformCall::GetMessage(*target))?;
        self.message(target.id)
            .ok_or_else(|| HourbookError::ExternalApi(format!("Unknown message {}", target.id)))
    }

    async fn add_reaction(&self, target: &MessageRef, marker: &str) -> Result<()> {
        self.record(PlatformCall::AddReaction {
            target: *target,
            marker: marker.to_string(),
        })?;
        if !self.state().messages.contains_key(&target.id) {
            return Err(HourbookError::ExternalApi(format!("Unknown message {}", target.id)));
        }
        self.react(target, marker, self.self_id);
        Ok(())
    }

    async fn remove_reaction(&self, target: &MessageRef, marker: &str) -> Result<()> {
        self.record(PlatformCall::RemoveReaction {
            target: *target,
            marker: marker.to_string(),
        })?;
        let self_id = self.self_id;
        if let Some(msg) = self.state().messages.get_mut(&target.id)
            && let Some(users) = msg.reactions.get_mut(marker_name(marker))
        {
            users.retain(|u| *u != self_id);
        }
        Ok(())
    }

    async fn list_reactions(&self, target: &MessageRef, marker: &str) -> Result<Vec<UserId>> {
        self.record(PlatformCall::ListReactions {
            target: *target,
            marker: marker.to_string(),
        })?;
        let state = self.state();
        let msg = state
            .messages
            .get(&target.id)
            .ok_or_else(|| HourbookError::ExternalApi(format!("Unknown message {}", target.id)))?;
        Ok(msg
            .reactions
            .get(marker_name(marker))
            .cloned()
            .unwrap_or_default())
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<Option<MessageRef>> {
        self.record(PlatformCall::Respond {
            interaction: interaction.id.clone(),
            response: response.clone(),
        })?;
        match response {
            InteractionResponse::Message(message) => {
                let target = MessageRef {
                    channel: interaction.channel,
                    id: self.next_message_id(),
                };
                let mut state = self.state();
                if !message.components.is_empty() {
                    state.last_prompt = Some(prompt_of(&message, Some(target)));
                }
                state.messages.insert(
                    target.id,
                    StoredMessage {
                        channel: interaction.channel,
                        author: self.self_id,
                        content: message.content,
                        reactions: BTreeMap::new(),
                    },
                );
                Ok(Some(target))
            }
            InteractionResponse::Update(message) => {
                let target = interaction.message.ok_or_else(|| {
                    HourbookError::ExternalApi("Interaction has no message to update".into())
                })?;
                if let Some(stored) = self.state().messages.get_mut(&target.id) {
                    stored.content = message.content;
                }
                Ok(None)
            }
            InteractionResponse::Modal(modal) => {
                self.state().last_prompt = Some(Prompt {
                    custom_ids: vec![modal.custom_id],
                    message: None,
                });
                Ok(None)
            }
        }
    }

    fn cached_display_name(&self, user: UserId) -> Option<String> {
        self.state().cached_names.get(&user).cloned()
    }

    async fn fetch_member_name(&self, user: UserId) -> Result<String> {
        self.record(PlatformCall::FetchMemberName(user))?;
        self.state()
            .member_names
            .get(&user)
            .cloned()
            .ok_or_else(|| HourbookError::ExternalApi(format!("Unknown member {user}")))
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String> {
        self.record(PlatformCall::FetchUserName(user))?;
        self.state()
            .user_names
            .get(&user)
            .cloned()
            .ok_or_else(|| HourbookError::ExternalApi(format!("Unknown user {user}")))
    }

    async fn create_scheduled_event(&self, event: ScheduledEvent) -> Result<()> {
        self.record(PlatformCall::CreateScheduledEvent(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourbook_core::types::{ButtonStyle, Component};

    #[tokio::test]
    async fn test_reactions_and_snapshot() {
        let platform = LocalPlatform::new(UserId(1));
        let msg = platform.seed_message(ChannelId(5), UserId(2), "hello");
        platform.react(&msg.reference, "OGpeepoYes:730890894814740541", UserId(3));
        platform.add_reaction(&msg.reference, "OGpeepoYes").await.unwrap();

        let users = platform
            .list_reactions(&msg.reference, "OGpeepoYes:730890894814740541")
            .await
            .unwrap();
        assert_eq!(users, vec![UserId(3), UserId(1)]);

        platform.remove_reaction(&msg.reference, "OGpeepoYes").await.unwrap();
        let snap = platform.get_message(&msg.reference).await.unwrap();
        assert_eq!(snap.reactions[0].count, 1);
    }

    #[tokio::test]
    async fn test_fail_on_records_and_fails() {
        let platform = LocalPlatform::new(UserId(1));
        platform.fail_on("create_message");
        let err = platform
            .create_message(ChannelId(5), OutgoingMessage::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, HourbookError::ExternalApi(_)));
        assert_eq!(platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_last_prompt_tracks_components_and_modals() {
        let platform = LocalPlatform::new(UserId(1));
        assert!(platform.last_prompt().is_none());

        let prompt = OutgoingMessage::ephemeral("sure?").with_components(vec![
            Component::button("confirm:t:yes", "Yes", ButtonStyle::Danger),
            Component::button("confirm:t:no", "No", ButtonStyle::Secondary),
        ]);
        let at = platform
            .create_message(ChannelId(5), prompt)
            .await
            .unwrap();
        let last = platform.last_prompt().unwrap();
        assert_eq!(last.custom_ids, vec!["confirm:t:yes", "confirm:t:no"]);
        assert_eq!(last.message, Some(at));

        // Plain messages leave the prompt alone.
        platform
            .create_message(ChannelId(5), OutgoingMessage::text("hi"))
            .await
            .unwrap();
        assert_eq!(platform.last_prompt().unwrap().message, Some(at));
    }

    #[tokio::test]
    async fn test_update_unknown_message_fails() {
        let platform = LocalPlatform::new(UserId(1));
        let result = platform
            .update_message(&MessageRef::new(5, 404), OutgoingMessage::text("x"))
            .await;
        assert!(result.is_err());
    }
}
