//! Pipeline Phase Tracking
//!
//! Records the forward-only progress of one `send` invocation. Stages
//! report the phases they enter through [`PhaseObserver`]; the
//! [`PipelineTracker`] keeps the history and refuses to move backwards or
//! past a terminal phase.

use std::fmt;
use std::sync::Mutex;
use tracing::{info, warn};

/// Phase of a `send` pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Validating,
    Depositing,
    Reconciling,
    CreatingTransfer,
    AwaitingEvent,
    Resolving,
    Withdrawing,
    Done,
    /// Terminal failure with the error that caused it
    Failed(String),
}

impl PipelinePhase {
    fn rank(&self) -> u8 {
        match self {
            PipelinePhase::Idle => 0,
            PipelinePhase::Validating => 1,
            PipelinePhase::Depositing => 2,
            PipelinePhase::Reconciling => 3,
            PipelinePhase::CreatingTransfer => 4,
            PipelinePhase::AwaitingEvent => 5,
            PipelinePhase::Resolving => 6,
            PipelinePhase::Withdrawing => 7,
            PipelinePhase::Done | PipelinePhase::Failed(_) => 8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Done | PipelinePhase::Failed(_))
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelinePhase::Idle => f.write_str("idle"),
            PipelinePhase::Validating => f.write_str("validating"),
            PipelinePhase::Depositing => f.write_str("depositing"),
            PipelinePhase::Reconciling => f.write_str("reconciling"),
            PipelinePhase::CreatingTransfer => f.write_str("creating-transfer"),
            PipelinePhase::AwaitingEvent => f.write_str("awaiting-event"),
            PipelinePhase::Resolving => f.write_str("resolving"),
            PipelinePhase::Withdrawing => f.write_str("withdrawing"),
            PipelinePhase::Done => f.write_str("done"),
            PipelinePhase::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Receives phase changes from pipeline stages.
pub trait PhaseObserver: Send + Sync {
    fn on_phase(&self, phase: PipelinePhase);
}

/// Observer for stages invoked outside a tracked pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {
    fn on_phase(&self, _phase: PipelinePhase) {}
}

/// Forward-only phase history of one pipeline run.
#[derive(Debug)]
pub struct PipelineTracker {
    history: Mutex<Vec<PipelinePhase>>,
}

impl PipelineTracker {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(vec![PipelinePhase::Idle]),
        }
    }

    /// Moves to `phase` if it is strictly ahead of the current one.
    ///
    /// # Returns
    ///
    /// * `true` - Transition recorded
    /// * `false` - Transition ignored (backwards, repeated or after a terminal phase)
    pub fn advance(&self, phase: PipelinePhase) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let current = history.last().cloned().unwrap_or(PipelinePhase::Idle);

        if current.is_terminal() || phase.rank() <= current.rank() {
            warn!("Ignoring pipeline transition {} -> {}", current, phase);
            return false;
        }

        info!("Pipeline phase: {} -> {}", current, phase);
        history.push(phase);
        true
    }

    /// Records the terminal failure.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.advance(PipelinePhase::Failed(reason.into()))
    }

    pub fn current(&self) -> PipelinePhase {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
            .unwrap_or(PipelinePhase::Idle)
    }

    /// Every phase entered so far, starting with `Idle`.
    pub fn history(&self) -> Vec<PipelinePhase> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for PipelineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseObserver for PipelineTracker {
    fn on_phase(&self, phase: PipelinePhase) {
        self.advance(phase);
    }
}
