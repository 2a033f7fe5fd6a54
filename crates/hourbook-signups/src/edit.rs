//! In-place artifact edits.
//!
//! Each requested field is re-located through its anchor and only the
//! anchored substring is replaced. If any requested anchor is missing the
//! artifact is left untouched.

use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::types::{MessageId, MessageRef, OutgoingMessage};

use crate::codec;

/// Requested changes. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventEdit {
    pub name: Option<String>,
    pub time: Option<i64>,
    pub hours: Option<u32>,
}

impl EventEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.time.is_none() && self.hours.is_none()
    }
}

/// Apply an edit to artifact text, returning the new text and one
/// `old -> new` line per changed field.
pub fn apply(text: &str, edit: &EventEdit) -> Result<(String, Vec<String>)> {
    let mut text = text.to_string();
    let mut changes = Vec::new();

    if let Some(name) = &edit.name {
        let name = name.trim();
        codec::validate_name(name, codec::category_of(&text))?;
        let (updated, old) = codec::replace_name(&text, name)?;
        changes.push(format!("{old} -> {name}"));
        text = updated;
    }
    if let Some(time) = edit.time {
        let (updated, old) = codec::replace_time(&text, time)?;
        changes.push(format!("<t:{old}:F> -> <t:{time}:F>"));
        text = updated;
    }
    if let Some(hours) = edit.hours {
        let (updated, old) = codec::replace_hours(&text, hours)?;
        changes.push(format!("{old} -> {hours} hours"));
        text = updated;
    }
    Ok((text, changes))
}

/// `/edit`: rewrite the artifact `message` in the requester's channel and
/// reply with a summary.
pub async fn edit_event(
    services: &Services,
    requester: &Interaction,
    message: MessageId,
    edit: &EventEdit,
) -> Result<String> {
    if edit.is_empty() {
        return Err(HourbookError::parse(
            "options",
            "provide at least one of new_name, new_time or new_duration",
        ));
    }
    let platform = services.platform.as_ref();
    let target = MessageRef {
        channel: requester.channel,
        id: message,
    };
    let current = platform.get_message(&target).await?;
    let (text, changes) = apply(&current.content, edit)?;

    platform
        .update_message(&target, OutgoingMessage::text(text))
        .await?;
    tracing::info!("✏️ Edited artifact {message}: {}", changes.join(", "));

    let reply = format!("Updated event details: \n{}", changes.join("\n"));
    platform
        .respond(requester, InteractionResponse::Message(OutgoingMessage::text(&reply)))
        .await?;
    Ok(reply)
}
