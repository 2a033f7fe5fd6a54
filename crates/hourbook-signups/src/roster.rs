//! Sign-up tracking from reaction markers.

use hourbook_core::error::Result;
use hourbook_core::traits::ChatPlatform;
use hourbook_core::types::{Message, MessageRef, UserId};

/// Identities that applied `marker` to the artifact, in reaction order,
/// without the bot itself. Always read fresh from the platform.
pub async fn roster(
    platform: &dyn ChatPlatform,
    artifact: &MessageRef,
    marker: &str,
) -> Result<Vec<UserId>> {
    let me = platform.self_id();
    let mut members: Vec<UserId> = Vec::new();
    for user in platform.list_reactions(artifact, marker).await? {
        if user != me && !members.contains(&user) {
            members.push(user);
        }
    }
    tracing::debug!("📋 Roster for {}: {} member(s)", artifact.id, members.len());
    Ok(members)
}

/// Whether the artifact already carries the processed marker.
pub fn is_processed(message: &Message, processed_marker: &str) -> bool {
    message.has_marker(processed_marker)
}
