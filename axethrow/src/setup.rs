//! Interactive calibration wizard.
//!
//! Three steps, each advanced by the requester clicking a brick that logs
//! the step's signal: the start trigger, the target surface, and the finish
//! position. Interactions from anyone else, or with any other signal, are
//! left for the rest of the runtime.

use axethrow_core::config::SignalConfig;
use axethrow_core::{CalibrationGeometry, Point3, Volume};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::host::{GameContext, Interaction};
use crate::observability::Event;

/// Wizard step waiting for its interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Trigger,
    Surface,
    Finish,
}

/// Result of offering an interaction to the wizard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetupOutcome {
    /// Not for the wizard.
    Ignored,
    /// A step was captured; the wizard now waits for `next`.
    Advanced { next: SetupStep },
    /// The last step was captured.
    Completed(CalibrationGeometry),
}

#[derive(Debug)]
struct Progress {
    requester: String,
    step: SetupStep,
    trigger_position: Option<Point3>,
    target_surface: Option<Volume>,
}

/// Runs one setup at a time. A new [`begin`](Self::begin) restarts it.
#[derive(Debug, Default)]
pub struct SetupWizard {
    progress: Mutex<Option<Progress>>,
}

impl SetupWizard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the wizard for `requester`.
    pub async fn begin(&self, ctx: &GameContext, requester: &str) {
        let mut progress = self.progress.lock().await;
        if let Some(previous) = progress.as_ref() {
            debug!(previous = %previous.requester, requester, "restarting setup");
        }
        *progress = Some(Progress {
            requester: requester.to_string(),
            step: SetupStep::Trigger,
            trigger_position: None,
            target_surface: None,
        });
        ctx.tell_lines(requester, &instructions(SetupStep::Trigger, &ctx.config.signals))
            .await;
    }

    /// Returns the step the wizard waits for, if it is running.
    pub async fn current_step(&self) -> Option<SetupStep> {
        self.progress.lock().await.as_ref().map(|p| p.step)
    }

    /// Offers an interaction to the wizard.
    pub async fn handle(&self, ctx: &GameContext, interaction: &Interaction) -> SetupOutcome {
        let signals = &ctx.config.signals;
        let mut guard = self.progress.lock().await;
        let Some(progress) = guard.as_mut() else {
            return SetupOutcome::Ignored;
        };
        if progress.requester != interaction.player || interaction.signal != signal_for(progress.step, signals) {
            return SetupOutcome::Ignored;
        }

        let player = interaction.player.as_str();
        match progress.step {
            SetupStep::Trigger => {
                progress.trigger_position = Some(interaction.position);
                progress.step = SetupStep::Surface;
            }
            SetupStep::Surface => {
                progress.target_surface =
                    Some(Volume::new(interaction.position, interaction.brick_size));
                progress.step = SetupStep::Finish;
            }
            SetupStep::Finish => {
                let (Some(trigger_position), Some(target_surface)) =
                    (progress.trigger_position, progress.target_surface)
                else {
                    return SetupOutcome::Ignored;
                };
                let calibration = CalibrationGeometry {
                    trigger_position,
                    target_surface,
                    finish_position: interaction.position,
                };
                *guard = None;
                drop(guard);

                match ctx.store.set_calibration(&calibration).await {
                    Ok(()) => {
                        info!(player, "calibration saved");
                        ctx.events.emit(Event::CalibrationSaved {
                            timestamp: Utc::now(),
                            player: player.to_string(),
                        });
                        ctx.tell(player, "Setup complete!").await;
                    }
                    Err(e) => {
                        warn!(player, error = %e, "failed to save calibration");
                        ctx.tell(
                            player,
                            "Setup complete, but the calibration could not be saved and will be lost on restart.",
                        )
                        .await;
                    }
                }
                return SetupOutcome::Completed(calibration);
            }
        }

        let next = progress.step;
        drop(guard);
        ctx.tell_lines(player, &instructions(next, signals)).await;
        SetupOutcome::Advanced { next }
    }
}

fn signal_for(step: SetupStep, signals: &SignalConfig) -> &str {
    match step {
        SetupStep::Trigger => &signals.start,
        SetupStep::Surface => &signals.target,
        SetupStep::Finish => &signals.finish,
    }
}

fn instructions(step: SetupStep, signals: &SignalConfig) -> Vec<String> {
    let (title, place) = match step {
        SetupStep::Trigger => (
            "Setup 1/3",
            "Please place the brick for starting the axe throw game, and give it an interact component.",
        ),
        SetupStep::Surface => (
            "Setup 2/3",
            "Now place the brick for the target surface, it should be a large flat brick that targets can appear on.",
        ),
        SetupStep::Finish => (
            "Setup 3/3",
            "Finally place the brick players are sent to when a game ends.",
        ),
    };
    let log = match step {
        SetupStep::Trigger => format!(
            "It should log to the console '{}'; this will activate the game for players.",
            signals.start
        ),
        _ => format!(
            "It should log to the console '{}'.",
            signal_for(step, signals)
        ),
    };
    vec![
        title.to_string(),
        place.to_string(),
        log,
        "Click the brick to confirm this step is done.".to_string(),
    ]
}
