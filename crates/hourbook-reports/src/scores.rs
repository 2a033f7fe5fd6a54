//! Prediction scoreboard maintenance: crediting members and clearing boards.

use hourbook_channels::{Resolution, Services, confirm};
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Interaction, InteractionResponse};
use hourbook_core::types::{Category, OutgoingMessage, UserId};
use tokio::task::JoinHandle;

fn board_label(game: Option<Category>) -> &'static str {
    game.map(|g| g.token()).unwrap_or("global")
}

/// Handle `/add`: credit `points` to every listed member on `game`'s board.
///
/// All members are credited in one write; a failed write credits nobody.
pub async fn add_scores(
    services: &Services,
    requester: &Interaction,
    game: Category,
    members: &[UserId],
    points: i64,
) -> Result<usize> {
    let credited = tokio::time::timeout(
        services.timeouts.query,
        services.scores.award(members, game, points),
    )
    .await
    .map_err(|_| HourbookError::Timeout("Scoreboard update".into()))??;

    tracing::info!(
        "🎯 {} credited {points} on {} for {credited} member(s)",
        requester.user,
        game.token()
    );
    let text = format!(
        "Added {points} point(s) for {credited} member(s) to the {} scoreboard",
        game.token()
    );
    services
        .platform
        .respond(requester, InteractionResponse::Message(OutgoingMessage::ephemeral(text)))
        .await?;
    Ok(credited)
}

/// Handle `/reset`: ask the requester to confirm, then clear the board.
pub async fn reset_scores(
    services: &Services,
    requester: &Interaction,
    game: Option<Category>,
) -> Result<JoinHandle<Resolution>> {
    let board = board_label(game);
    let question = format!("Are you sure you want to reset the {board} prediction leaderboard?");
    let scores = services.scores.clone();
    let limit = services.timeouts.query;
    confirm::present(services, requester, &question, move || async move {
        let removed = tokio::time::timeout(limit, scores.reset(game))
            .await
            .map_err(|_| HourbookError::Timeout("Scoreboard reset".into()))??;
        tracing::info!("🧹 {board} leaderboard reset, {removed} row(s) removed");
        Ok(format!("The {board} prediction leaderboard was reset successfully"))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, REQUESTER};
    use hourbook_channels::local::PlatformCall;
    use hourbook_core::interaction::{Command, InteractionKind};
    use hourbook_core::traits::ScoreStore;
    use hourbook_core::types::MessageRef;
    use std::time::Duration;

    fn press(custom_id: String) -> Interaction {
        Interaction {
            id: "press".into(),
            user: REQUESTER,
            channel: testkit::CHANNEL,
            message: Some(MessageRef::new(testkit::CHANNEL.0, 1000)),
            kind: InteractionKind::Button { custom_id },
        }
    }

    fn updates(h: &testkit::Harness) -> Vec<String> {
        h.platform
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Respond {
                    response: InteractionResponse::Update(m),
                    ..
                } => Some(m.content),
                _ => None,
            })
            .collect()
    }

    async fn scores(h: &testkit::Harness, game: Option<Category>) -> Vec<(u64, i64)> {
        h.store
            .leaderboard(game)
            .await
            .unwrap()
            .iter()
            .map(|r| (r.member.0, r.score))
            .collect()
    }

    #[tokio::test]
    async fn test_add_credits_each_member_once() {
        let h = testkit::harness(Duration::from_secs(5));
        let members = [UserId(42), UserId(43), UserId(42)];
        let requester = testkit::command(Command::AddScore {
            game: Category::Cs,
            members: members.to_vec(),
            points: 2,
        });
        let credited = add_scores(&h.services, &requester, Category::Cs, &members, 2)
            .await
            .unwrap();
        assert_eq!(credited, 2);
        assert_eq!(scores(&h, Some(Category::Cs)).await, vec![(42, 2), (43, 2)]);
        assert_eq!(
            h.platform.sent_contents(),
            vec!["Added 2 point(s) for 2 member(s) to the CS scoreboard".to_string()]
        );
    }

    #[tokio::test]
    async fn test_confirmed_reset_clears_only_that_board() {
        let h = testkit::harness(Duration::from_secs(5));
        h.store.add_score(UserId(1), Category::Dota, 5).await.unwrap();
        h.store.add_score(UserId(1), Category::Mlbb, 3).await.unwrap();
        let requester = testkit::command(Command::ResetScores {
            game: Some(Category::Dota),
        });

        let handle = reset_scores(&h.services, &requester, Some(Category::Dota))
            .await
            .unwrap();
        let (_, components) = testkit::last_components(&h.platform);
        assert_eq!(h.services.hub.publish(&press(components[0].custom_id().to_string())), 1);

        assert_eq!(handle.await.unwrap(), Resolution::Confirmed);
        assert!(scores(&h, Some(Category::Dota)).await.is_empty());
        assert_eq!(scores(&h, Some(Category::Mlbb)).await, vec![(1, 3)]);
        assert_eq!(
            updates(&h),
            vec!["The Dota prediction leaderboard was reset successfully".to_string()]
        );
    }

    #[tokio::test]
    async fn test_declined_reset_keeps_scores() {
        let h = testkit::harness(Duration::from_secs(5));
        h.store.add_score(UserId(1), Category::Hok, 5).await.unwrap();
        let requester = testkit::command(Command::ResetScores { game: None });

        let handle = reset_scores(&h.services, &requester, None).await.unwrap();
        assert!(
            h.platform.sent_contents()[0]
                .contains("reset the global prediction leaderboard")
        );
        let (_, components) = testkit::last_components(&h.platform);
        h.services.hub.publish(&press(components[1].custom_id().to_string()));

        assert_eq!(handle.await.unwrap(), Resolution::Declined);
        assert_eq!(scores(&h, None).await, vec![(1, 5)]);
    }
}
