use crate::core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Queued,
    Dispatching,
    Reconciling,
    Scoring,
    Reporting,
    Completed,
    Failed,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: RunStage) -> bool {
        match (self, next) {
            (Self::Queued, Self::Dispatching)
            | (Self::Dispatching, Self::Reconciling)
            | (Self::Reconciling, Self::Scoring)
            | (Self::Scoring, Self::Reporting)
            | (Self::Reporting, Self::Completed) => true,
            (current, Self::Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Dispatching => "dispatching",
            Self::Reconciling => "reconciling",
            Self::Scoring => "scoring",
            Self::Reporting => "reporting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one run, recording every stage it passed through.
#[derive(Debug, Clone)]
pub struct RunState {
    current: RunStage,
    trace: Vec<RunStage>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            current: RunStage::Queued,
            trace: vec![RunStage::Queued],
        }
    }

    pub fn current(&self) -> RunStage {
        self.current
    }

    pub fn trace(&self) -> &[RunStage] {
        &self.trace
    }

    pub fn advance(&mut self, next: RunStage) -> Result<(), AnalysisError> {
        if !self.current.can_transition_to(next) {
            return Err(AnalysisError::unexpected(
                self.current.to_string(),
                format!("invalid stage transition {} -> {}", self.current, next),
            ));
        }
        tracing::debug!(from = %self.current, to = %next, "run stage transition");
        self.current = next;
        self.trace.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless the run already finished.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = RunStage::Failed;
            self.trace.push(RunStage::Failed);
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
