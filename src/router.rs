//! Interaction dispatcher.
//!
//! Commands are routed to their workflow; every component interaction is
//! published to the collector hub, where whichever waits are scoped to it
//! pick it up. A handler never blocks on a user: waits run detached.

use hourbook_channels::Services;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::interaction::{Command, Interaction, InteractionKind, InteractionResponse};
use hourbook_core::types::OutgoingMessage;
use hourbook_reports::{leaderboard, report, scores};
use hourbook_signups::edit::EventEdit;
use hourbook_signups::{GardenerRoller, announce, cancel, edit};
use std::fmt::Debug;
use tokio::task::JoinHandle;

/// What handling one interaction left behind.
#[derive(Debug)]
pub enum Dispatched {
    /// A detached wait is running.
    Background(JoinHandle<()>),
    /// A component, delivered to this many waits.
    Delivered(usize),
    /// Answered inline.
    Done,
}

/// Routes decoded interactions. Clones share the hub and the artifact guard.
#[derive(Clone)]
pub struct Router {
    services: Services,
    roller: GardenerRoller,
}

impl Router {
    pub fn new(services: Services) -> Self {
        let roller = GardenerRoller::new(services.clone());
        Self { services, roller }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn handle(&self, interaction: Interaction) -> Dispatched {
        let command = match &interaction.kind {
            InteractionKind::Command(command) => command.clone(),
            _ => {
                let delivered = self.services.hub.publish(&interaction);
                if delivered == 0 {
                    tracing::debug!(
                        "📭 No active wait for {} from {}",
                        interaction.custom_id().unwrap_or("?"),
                        interaction.user
                    );
                }
                return Dispatched::Delivered(delivered);
            }
        };

        match self.run(&interaction, command).await {
            Ok(Some(handle)) => Dispatched::Background(handle),
            Ok(None) => Dispatched::Done,
            Err(e) => {
                tracing::warn!("⚠️ Command from {} failed: {e}", interaction.user);
                self.reply_error(&interaction, &e).await;
                Dispatched::Done
            }
        }
    }

    async fn run(
        &self,
        interaction: &Interaction,
        command: Command,
    ) -> Result<Option<JoinHandle<()>>> {
        let services = &self.services;
        let handle = match command {
            Command::Event => detach(
                "announce",
                announce::open_announcement(services, interaction).await?,
            ),
            Command::Manual { gardener } => detach(
                "manual",
                announce::open_manual(services, interaction, gardener).await?,
            ),
            Command::Edit {
                message,
                name,
                time,
                hours,
            } => {
                let changes = EventEdit { name, time, hours };
                edit::edit_event(services, interaction, message, &changes).await?;
                return Ok(None);
            }
            Command::RollGardener { target } => {
                detach("roll", self.roller.roll(interaction, &target).await?)
            }
            Command::CancelSignup { target } => {
                detach("cancel", cancel::cancel_signup(services, interaction, &target).await?)
            }
            Command::Report {
                start,
                end,
                dimension,
            } => detach(
                "report",
                report::open_report(services, interaction, dimension, start, end).await?,
            ),
            Command::Show {
                game,
                user: Some(member),
            } => {
                leaderboard::show_standing(services, interaction, game, member).await?;
                return Ok(None);
            }
            Command::Show { game, user: None } => detach(
                "leaderboard",
                leaderboard::show_leaderboard(services, interaction, game).await?,
            ),
            Command::AddScore {
                game,
                members,
                points,
            } => {
                scores::add_scores(services, interaction, game, &members, points).await?;
                return Ok(None);
            }
            Command::ResetScores { game } => detach(
                "reset",
                scores::reset_scores(services, interaction, game).await?,
            ),
        };
        Ok(Some(handle))
    }

    async fn reply_error(&self, interaction: &Interaction, error: &HourbookError) {
        let reply = OutgoingMessage::ephemeral(error.user_message());
        if let Err(e) = self
            .services
            .platform
            .respond(interaction, InteractionResponse::Message(reply))
            .await
        {
            tracing::error!("❌ Failed to report error to {}: {e}", interaction.user);
        }
    }
}

/// Log a workflow's outcome once its wait finishes.
fn detach<T>(workflow: &'static str, handle: JoinHandle<T>) -> JoinHandle<()>
where
    T: Debug + Send + 'static,
{
    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => tracing::info!("🏁 {workflow} finished: {outcome:?}"),
            Err(e) => tracing::error!("❌ {workflow} task failed: {e}"),
        }
    })
}
