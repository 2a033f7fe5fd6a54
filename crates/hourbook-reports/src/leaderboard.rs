//! Prediction leaderboard browsing.
//!
//! The ranked result set is read once and rendered into fixed-size pages
//! up front; page turns never re-query.

use futures::future::join_all;
use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::traits::ChatPlatform;
use hourbook_core::types::{Category, OutgoingMessage, RankedScore, UserId};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::task::JoinHandle;

use crate::pages::{self, Navigation, Page, PageSet, SessionSummary};

pub const UNKNOWN_USER: &str = "Unknown User";
const NAME_LIMIT: usize = 12;
const NAME_KEEP: usize = 9;

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Rank")]
    rank: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Score")]
    score: i64,
}

/// Names longer than 12 characters keep their first 9 plus `...`.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_LIMIT {
        let head: String = name.chars().take(NAME_KEEP).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

/// Display name via the member cache, then a member fetch, then a bare
/// user fetch, then [`UNKNOWN_USER`].
pub async fn resolve_name(platform: &dyn ChatPlatform, user: UserId) -> String {
    if let Some(name) = platform.cached_display_name(user) {
        return truncate_name(&name);
    }
    match platform.fetch_member_name(user).await {
        Ok(name) => return truncate_name(&name),
        Err(e) => tracing::debug!("🔎 Member lookup for {user} failed: {e}"),
    }
    match platform.fetch_user_name(user).await {
        Ok(name) => truncate_name(&name),
        Err(e) => {
            tracing::debug!("🔎 User lookup for {user} failed: {e}");
            UNKNOWN_USER.to_string()
        }
    }
}

fn board_name(game: Option<Category>) -> &'static str {
    game.map(|g| g.token()).unwrap_or("Global")
}

async fn ranked(services: &Services, game: Option<Category>) -> Result<Vec<RankedScore>> {
    tokio::time::timeout(services.timeouts.query, services.scores.leaderboard(game))
        .await
        .map_err(|_| HourbookError::Timeout("Leaderboard query".into()))?
}

/// Render the whole leaderboard into pages of `pages.page_size` rows.
pub async fn leaderboard_pages(services: &Services, game: Option<Category>) -> Result<PageSet> {
    let scores = ranked(services, game).await?;
    let title = format!("{} Prediction Leaderboard", board_name(game));
    if scores.is_empty() {
        let content = format!("{title}\nNo predictions have been scored yet.");
        return Ok(PageSet::new(vec![Page::new("1", "1", content)]));
    }

    let page_size = services.config.pages.page_size.max(1);
    let total = scores.len().div_ceil(page_size);
    let platform = services.platform.as_ref();
    let mut pages = Vec::with_capacity(total);
    for (i, chunk) in scores.chunks(page_size).enumerate() {
        let names = join_all(chunk.iter().map(|s| resolve_name(platform, s.member))).await;
        let rows: Vec<Row> = chunk
            .iter()
            .zip(names)
            .map(|(score, name)| Row {
                rank: score.position,
                name,
                score: score.score,
            })
            .collect();
        let table = Table::new(rows).with(Style::markdown()).to_string();
        let number = (i + 1).to_string();
        let content = format!("{title}\n```\n{table}\n```\nPage {number}/{total}");
        pages.push(Page::new(number.clone(), number, content));
    }
    tracing::debug!(
        "🏆 {} leaderboard rendered: {} row(s), {} page(s)",
        board_name(game),
        scores.len(),
        total
    );
    Ok(PageSet::new(pages))
}

/// Handle `/show` without a member: browse the leaderboard.
pub async fn show_leaderboard(
    services: &Services,
    requester: &Interaction,
    game: Option<Category>,
) -> Result<JoinHandle<SessionSummary>> {
    let pages = leaderboard_pages(services, game).await?;
    pages::open_session(
        services,
        requester,
        pages,
        Navigation::Sequential,
        services.timeouts.leaderboard_session,
    )
    .await
}

/// One member's score and rank on a board.
pub async fn standing_text(
    services: &Services,
    game: Option<Category>,
    member: UserId,
) -> Result<String> {
    let scores = ranked(services, game).await?;
    let text = match scores.iter().find(|s| s.member == member) {
        Some(entry) => {
            let board = match game {
                Some(g) => g.token().to_string(),
                None => "global".to_string(),
            };
            format!(
                "The {board} prediction score for {} is {}, ranked at {}",
                member.mention(),
                entry.score,
                entry.position
            )
        }
        None => format!(
            "{} isn't found on the {} scoreboard",
            member.mention(),
            board_name(game)
        ),
    };
    Ok(text)
}

/// Handle `/show` with a member: reply with their standing.
pub async fn show_standing(
    services: &Services,
    requester: &Interaction,
    game: Option<Category>,
    member: UserId,
) -> Result<()> {
    let text = standing_text(services, game, member).await?;
    services
        .platform
        .respond(requester, InteractionResponse::Message(OutgoingMessage::ephemeral(text)))
        .await?;
    Ok(())
}
