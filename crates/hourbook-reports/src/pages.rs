//! Paginated view controller.
//!
//! A [`PageSet`] is an ordered list of pre-rendered pages with a cursor.
//! [`open_session`] posts the current page with navigation buttons and
//! keeps serving presses until the session deadline, then strips the
//! buttons.

use hourbook_channels::Services;
use hourbook_core::error::Result;
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::types::{ButtonStyle, Component, MessageRef, OutgoingMessage};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const NEXT: &str = "next";
const PREV: &str = "prev";
const EMPTY_PAGE: &str = "Nothing to show.";

/// One rendered page. `key` identifies it for keyed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub key: String,
    pub label: String,
    pub content: String,
}

impl Page {
    pub fn new(key: impl Into<String>, label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Ordered pages plus the index currently shown. Never empty.
#[derive(Debug, Clone)]
pub struct PageSet {
    pages: Vec<Page>,
    current: usize,
}

impl PageSet {
    pub fn new(pages: Vec<Page>) -> Self {
        let pages = if pages.is_empty() {
            vec![Page::new("empty", "Empty", EMPTY_PAGE)]
        } else {
            pages
        };
        Self { pages, current: 0 }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current(&self) -> &Page {
        &self.pages[self.current]
    }

    /// Advance, wrapping from the last page to the first.
    pub fn next(&mut self) -> &Page {
        self.current = (self.current + 1) % self.pages.len();
        self.current()
    }

    /// Step back, wrapping from the first page to the last.
    pub fn prev(&mut self) -> &Page {
        self.current = (self.current + self.pages.len() - 1) % self.pages.len();
        self.current()
    }

    /// Jump to the page with `key`. Unknown keys leave the cursor alone.
    pub fn select(&mut self, key: &str) -> Option<&Page> {
        let idx = self.pages.iter().position(|p| p.key == key)?;
        self.current = idx;
        Some(self.current())
    }
}

/// Which buttons a session renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Previous / next with wraparound.
    Sequential,
    /// One button per page key; the current page's button is disabled.
    Keyed,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Presses served before the deadline.
    pub presses: usize,
    /// Page index shown when the session closed.
    pub final_index: usize,
}

/// Render the current page with buttons scoped to `token`.
pub fn render(pages: &PageSet, navigation: Navigation, token: &str) -> OutgoingMessage {
    let message = OutgoingMessage::ephemeral(pages.current().content.clone());
    if pages.len() < 2 {
        return message;
    }
    let components = match navigation {
        Navigation::Sequential => vec![
            Component::button(format!("nav:{token}:{PREV}"), "⏮️", ButtonStyle::Secondary),
            Component::button(format!("nav:{token}:{NEXT}"), "⏭️", ButtonStyle::Secondary),
        ],
        Navigation::Keyed => pages
            .pages()
            .iter()
            .enumerate()
            .map(|(i, page)| Component::Button {
                custom_id: format!("nav:{token}:page:{}", page.key),
                label: page.label.clone(),
                style: ButtonStyle::Secondary,
                disabled: i == pages.index(),
            })
            .collect(),
    };
    message.with_components(components)
}

/// Apply one button press to the cursor. Returns false for ids this
/// session does not understand.
fn apply(pages: &mut PageSet, token: &str, custom_id: &str) -> bool {
    let Some(action) = custom_id
        .strip_prefix("nav:")
        .and_then(|rest| rest.strip_prefix(token))
        .and_then(|rest| rest.strip_prefix(':'))
    else {
        return false;
    };
    match action {
        NEXT => {
            pages.next();
            true
        }
        PREV => {
            pages.prev();
            true
        }
        other => other
            .strip_prefix("page:")
            .is_some_and(|key| pages.select(key).is_some()),
    }
}

/// Post the first page as the reply to `requester` and serve navigation
/// presses from the requester until `session` elapses.
///
/// Single-page sets are posted without buttons and finish immediately.
pub async fn open_session(
    services: &Services,
    requester: &Interaction,
    mut pages: PageSet,
    navigation: Navigation,
    session: Duration,
) -> Result<JoinHandle<SessionSummary>> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let prefix = format!("nav:{token}:");
    let owner = requester.user;
    // Subscribed before the reply goes out so an early press is not lost.
    let mut subscription = services
        .hub
        .subscribe(move |i: &Interaction| {
            i.user == owner && i.custom_id().is_some_and(|id| id.starts_with(&prefix))
        });

    let first = render(&pages, navigation, &token);
    let posted = services
        .platform
        .respond(requester, InteractionResponse::Message(first))
        .await?;

    if pages.len() < 2 {
        subscription.cancel();
        return Ok(tokio::spawn(async move {
            SessionSummary {
                presses: 0,
                final_index: pages.index(),
            }
        }));
    }

    tracing::debug!("📖 Page session {token} opened with {} page(s)", pages.len());
    let services = services.clone();
    Ok(tokio::spawn(async move {
        let deadline = Instant::now() + session;
        let mut presses = 0;
        while let Some(press) = subscription.next_before(deadline).await {
            let Some(custom_id) = press.custom_id() else {
                continue;
            };
            if !apply(&mut pages, &token, custom_id) {
                tracing::debug!("📖 Ignoring unknown navigation id {custom_id}");
                continue;
            }
            presses += 1;
            let update = render(&pages, navigation, &token);
            if let Err(e) = services
                .platform
                .respond(&press, InteractionResponse::Update(update))
                .await
            {
                tracing::warn!("⚠️ Failed to turn page: {e}");
            }
        }
        subscription.cancel();
        strip_buttons(&services, posted, &pages).await;
        tracing::debug!("📖 Page session {token} closed after {presses} press(es)");
        SessionSummary {
            presses,
            final_index: pages.index(),
        }
    }))
}

async fn strip_buttons(services: &Services, posted: Option<MessageRef>, pages: &PageSet) {
    let Some(target) = posted else {
        return;
    };
    let frozen = OutgoingMessage::ephemeral(pages.current().content.clone());
    if let Err(e) = services.platform.update_message(&target, frozen).await {
        tracing::warn!("⚠️ Failed to remove navigation buttons: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, REQUESTER};
    use hourbook_channels::local::PlatformCall;
    use hourbook_core::interaction::{Command, InteractionKind};
    use hourbook_core::types::UserId;

    fn three() -> PageSet {
        PageSet::new(vec![
            Page::new("a", "A", "page a"),
            Page::new("b", "B", "page b"),
            Page::new("c", "C", "page c"),
        ])
    }

    fn press(user: UserId, message: Option<MessageRef>, custom_id: String) -> Interaction {
        Interaction {
            id: format!("press-{custom_id}"),
            user,
            channel: testkit::CHANNEL,
            message,
            kind: InteractionKind::Button { custom_id },
        }
    }

    fn token_of(components: &[Component]) -> String {
        let id = components[0].custom_id();
        id.split(':').nth(1).unwrap().to_string()
    }

    #[test]
    fn test_wraparound_both_directions() {
        let mut pages = three();
        assert_eq!(pages.prev().key, "c");
        assert_eq!(pages.next().key, "a");
        pages.next();
        pages.next();
        assert_eq!(pages.index(), 2);
        assert_eq!(pages.next().key, "a");
    }

    #[test]
    fn test_select_by_key() {
        let mut pages = three();
        assert_eq!(pages.select("c").map(|p| p.key.as_str()), Some("c"));
        assert!(pages.select("zzz").is_none());
        assert_eq!(pages.index(), 2);
    }

    #[test]
    fn test_empty_set_has_placeholder() {
        let pages = PageSet::new(Vec::new());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.current().content, EMPTY_PAGE);
    }

    #[test]
    fn test_keyed_render_disables_current() {
        let mut pages = three();
        pages.select("b");
        let message = render(&pages, Navigation::Keyed, "t");
        let disabled: Vec<_> = message
            .components
            .iter()
            .map(|c| match c {
                Component::Button { disabled, .. } => *disabled,
                _ => false,
            })
            .collect();
        assert_eq!(disabled, vec![false, true, false]);
        assert_eq!(message.components[1].custom_id(), "nav:t:page:b");
    }

    #[test]
    fn test_single_page_has_no_buttons() {
        let pages = PageSet::new(vec![Page::new("only", "Only", "x")]);
        assert!(render(&pages, Navigation::Sequential, "t").components.is_empty());
    }

    #[test]
    fn test_apply_rejects_foreign_token() {
        let mut pages = three();
        assert!(!apply(&mut pages, "t", "nav:other:next"));
        assert!(!apply(&mut pages, "t", "nav:t:page:zzz"));
        assert!(apply(&mut pages, "t", "nav:t:prev"));
        assert_eq!(pages.current().key, "c");
    }

    #[tokio::test]
    async fn test_session_serves_presses_then_strips_buttons() {
        let h = testkit::harness(Duration::from_millis(200));
        let requester = testkit::command(Command::Show {
            game: None,
            user: None,
        });
        let handle = open_session(
            &h.services,
            &requester,
            three(),
            Navigation::Sequential,
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        let (_, components) = testkit::last_components(&h.platform);
        let token = token_of(&components);

        let at = Some(MessageRef::new(testkit::CHANNEL.0, 1000));
        // A stranger's press is not delivered to this session.
        assert_eq!(
            h.services
                .hub
                .publish(&press(UserId(99), at, format!("nav:{token}:next"))),
            0
        );
        assert_eq!(
            h.services
                .hub
                .publish(&press(REQUESTER, at, format!("nav:{token}:prev"))),
            1
        );

        let summary = handle.await.unwrap();
        assert_eq!(summary.presses, 1);
        assert_eq!(summary.final_index, 2);
        assert_eq!(h.services.hub.active(), 0);

        let last = h.platform.calls().into_iter().last().unwrap();
        match last {
            PlatformCall::UpdateMessage { message, .. } => {
                assert_eq!(message.content, "page c");
                assert!(message.components.is_empty());
            }
            other => panic!("expected buttons to be stripped, got {}", other.describe()),
        }
    }

    #[tokio::test]
    async fn test_single_page_session_finishes_immediately() {
        let h = testkit::harness(Duration::from_secs(5));
        let requester = testkit::command(Command::Show {
            game: None,
            user: None,
        });
        let pages = PageSet::new(vec![Page::new("only", "Only", "x")]);
        let handle = open_session(
            &h.services,
            &requester,
            pages,
            Navigation::Keyed,
            Duration::from_secs(600),
        )
        .await
        .unwrap();
        assert_eq!(handle.await.unwrap().presses, 0);
        assert_eq!(h.services.hub.active(), 0);
    }
}
