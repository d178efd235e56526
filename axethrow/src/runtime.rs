//! Runtime glue.
//!
//! The `Runtime` owns the [`GameContext`], the session orchestrator and the
//! setup wizard, and routes host interactions and chat commands to them.

use std::sync::Arc;

use axethrow_core::Leaderboard;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{AxethrowError, ConfigError};
use crate::host::{Command, GameContext, HostMessage, Interaction};
use crate::observability::Event;
use crate::session::SessionOrchestrator;
use crate::setup::{SetupOutcome, SetupWizard};
use crate::tracking::{EntityFeed, EntitySource};

/// Whispered when a speaker lacks the trusted role.
pub const NO_PERMISSION: &str = "You do not have permission to use this command.";

/// Whispered when setup is requested during a game.
pub const SETUP_WHILE_RUNNING: &str = "Axe throw can't be set up while a game is in session.";

const PLACEMENTS: [&str; 5] = [
    r#"<size="26"><color="ffff22">1st</></>"#,
    r#"<size="24"><color="aaaaaa">2nd</></>"#,
    r#"<size="22"><color="bb6622">3rd</></>"#,
    r#"<size="20"><color="555555">4th</></>"#,
    r#"<size="20"><color="555555">5th</></>"#,
];

/// The game runtime.
pub struct Runtime {
    ctx: GameContext,
    orchestrator: Arc<SessionOrchestrator>,
    wizard: SetupWizard,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a runtime whose sessions track projectiles through `source`.
    #[must_use]
    pub fn new(ctx: GameContext, source: Arc<dyn EntitySource>) -> Self {
        let orchestrator = SessionOrchestrator::new(ctx.clone(), source);
        Self {
            ctx,
            orchestrator,
            wizard: SetupWizard::new(),
        }
    }

    /// Creates a runtime that tracks projectiles over the context's console.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the entity class does not form a
    /// valid query pattern.
    pub fn with_console_feed(ctx: GameContext) -> Result<Self, AxethrowError> {
        let feed = EntityFeed::new(Arc::clone(&ctx.console), &ctx.config.feed).map_err(|e| {
            ConfigError::InvalidValue {
                field: "feed.entity_class".to_string(),
                value: ctx.config.feed.entity_class.clone(),
                expected: format!("a name usable in a console query ({e})"),
            }
        })?;
        Ok(Self::new(ctx, Arc::new(feed)))
    }

    /// Returns the session orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<SessionOrchestrator> {
        &self.orchestrator
    }

    /// Returns the setup wizard.
    #[must_use]
    pub const fn wizard(&self) -> &SetupWizard {
        &self.wizard
    }

    /// Applies the storage start-up options.
    ///
    /// Resets the leaderboard when configured to, then loads the saved
    /// calibration when cache loading is on.
    ///
    /// # Errors
    ///
    /// Returns a store error if the saved calibration cannot be read.
    pub async fn initialize(&self) -> Result<(), AxethrowError> {
        let storage = self.ctx.config.storage;

        if storage.reset_leaderboard {
            info!("resetting leaderboard");
            if let Err(e) = self.ctx.store.set_leaderboard(&Leaderboard::new()).await {
                warn!(error = %e, "failed to reset leaderboard");
            }
        }

        if storage.load_cache {
            let calibration = self.ctx.store.calibration().await?;
            if calibration.is_some() {
                info!("loaded saved calibration");
            } else {
                debug!("no saved calibration");
            }
            self.orchestrator.set_calibration(calibration).await;
        }

        Ok(())
    }

    /// Dispatches one inbound host message.
    pub async fn handle_message(&self, message: HostMessage) {
        match message {
            HostMessage::Interact(interaction) => self.handle_interaction(&interaction).await,
            HostMessage::Command(command) => self.handle_command(&command).await,
        }
    }

    /// Routes a brick interaction to the wizard or the orchestrator.
    pub async fn handle_interaction(&self, interaction: &Interaction) {
        match self.wizard.handle(&self.ctx, interaction).await {
            SetupOutcome::Ignored => {}
            SetupOutcome::Advanced { next } => {
                debug!(player = %interaction.player, ?next, "setup advanced");
                return;
            }
            SetupOutcome::Completed(calibration) => {
                self.orchestrator.set_calibration(Some(calibration)).await;
                return;
            }
        }

        if interaction.signal == self.ctx.config.signals.start {
            self.orchestrator.trigger(&interaction.player).await;
        } else {
            trace!(signal = %interaction.signal, "interaction ignored");
        }
    }

    /// Handles a chat command.
    pub async fn handle_command(&self, command: &Command) {
        let names = &self.ctx.config.commands;
        let speaker = command.speaker.as_str();

        if command.name == names.setup {
            if !self.is_trusted(command) {
                debug!(speaker, "setup refused, missing trusted role");
                self.ctx.tell(speaker, NO_PERMISSION).await;
            } else if self.orchestrator.is_running().await {
                debug!(speaker, "setup refused, session running");
                self.ctx.tell(speaker, SETUP_WHILE_RUNNING).await;
            } else {
                self.wizard.begin(&self.ctx, speaker).await;
            }
        } else if command.name == names.personal_best {
            let lines = match self.ctx.store.leaderboard().await {
                Ok(leaderboard) => personal_best_lines(&leaderboard, speaker),
                Err(e) => {
                    warn!(speaker, error = %e, "failed to read leaderboard");
                    return;
                }
            };
            self.ctx.tell_lines(speaker, &lines).await;
        } else if command.name == names.top {
            let lines = match self.ctx.store.leaderboard().await {
                Ok(leaderboard) => top_lines(&leaderboard),
                Err(e) => {
                    warn!(speaker, error = %e, "failed to read leaderboard");
                    return;
                }
            };
            self.ctx.tell_lines(speaker, &lines).await;
        } else {
            trace!(name = %command.name, "unknown command ignored");
        }
    }

    /// Processes inbound messages until the channel closes or `cancel`
    /// fires, then aborts any running session.
    pub async fn run(&self, mut inbound: mpsc::Receiver<HostMessage>, cancel: CancellationToken) {
        self.ctx.events.emit(Event::RuntimeStarted {
            timestamp: Utc::now(),
            entity_class: self.ctx.config.feed.entity_class.clone(),
            calibrated: self.orchestrator.is_calibrated().await,
        });

        let reason = loop {
            let message = tokio::select! {
                () = cancel.cancelled() => {
                    info!("runtime cancelled");
                    break "cancelled";
                }
                message = inbound.recv() => message,
            };

            let Some(message) = message else {
                debug!("host closed, shutting down");
                break "EOF";
            };

            self.handle_message(message).await;
        };

        self.orchestrator.shutdown().await;

        self.ctx.events.emit(Event::RuntimeStopped {
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.ctx.events.flush();
    }

    fn is_trusted(&self, command: &Command) -> bool {
        self.ctx
            .config
            .trusted_role
            .as_ref()
            .is_none_or(|role| command.roles.iter().any(|r| r == role))
    }
}

/// Lines answering the personal best command.
#[must_use]
pub fn personal_best_lines(leaderboard: &Leaderboard, player: &str) -> Vec<String> {
    vec![leaderboard.best(player).map_or_else(
        || "You haven't played Axe Throw yet.".to_string(),
        |best| format!("Your personal best is <color=\"ffff44\">{best}</> points."),
    )]
}

/// Lines answering the top players command.
#[must_use]
pub fn top_lines(leaderboard: &Leaderboard) -> Vec<String> {
    if leaderboard.is_empty() {
        return vec!["Nobody has played Axe Throw yet. :(".to_string()];
    }

    let mut lines = vec!["Top 5 axe throw players.".to_string()];
    lines.extend(
        leaderboard
            .top(PLACEMENTS.len())
            .into_iter()
            .zip(PLACEMENTS)
            .map(|((player, score), placement)| {
                format!(
                    "{placement} <color=\"ffff77\">{player}</> with <color=\"44ff44\">{score}</> points!"
                )
            }),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_best_lines() {
        let mut leaderboard = Leaderboard::new();
        leaderboard.record("ann", 7);
        assert_eq!(
            personal_best_lines(&leaderboard, "ann"),
            vec![r#"Your personal best is <color="ffff44">7</> points."#]
        );
        assert_eq!(
            personal_best_lines(&leaderboard, "bob"),
            vec!["You haven't played Axe Throw yet."]
        );
    }

    #[test]
    fn test_top_lines_empty() {
        assert_eq!(
            top_lines(&Leaderboard::new()),
            vec!["Nobody has played Axe Throw yet. :("]
        );
    }

    #[test]
    fn test_top_lines_caps_at_five() {
        let mut leaderboard = Leaderboard::new();
        for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            leaderboard.record(name, u32::try_from(i).unwrap() + 1);
        }
        let lines = top_lines(&leaderboard);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Top 5 axe throw players.");
        assert_eq!(
            lines[1],
            r#"<size="26"><color="ffff22">1st</></> <color="ffff77">f</> with <color="44ff44">6</> points!"#
        );
        assert!(lines[5].contains(">b</>"));
    }
}
