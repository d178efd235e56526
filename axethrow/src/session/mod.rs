//! Game sessions.
//!
//! The [`SessionOrchestrator`] runs the timed state machine; [`difficulty`]
//! holds the ramp math it uses to pick targets and spawn cadence.

pub mod difficulty;
pub mod orchestrator;
pub mod state;

pub use orchestrator::{
    ALREADY_IN_SESSION, NOT_SET_UP, SessionOrchestrator, SessionStatus, TriggerOutcome,
};
pub use state::{GameSession, Phase, Target, TrajectorySample};
