//! Flow execution error types

use action_primitives::ActionError;
use std::path::PathBuf;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// A step's action or expectation did not hold; carries the primitive error
    #[error("Stage '{stage}' failed at step '{step}': {source}")]
    StepFailed {
        stage: String,
        step: String,
        source: ActionError,
    },

    /// Screenshot could not be captured or written
    #[error("Artifact {} could not be saved: {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("Browser session error: {0}")]
    Browser(String),

    /// Fixture or flow definition that can never run
    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),
}

impl FlowError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FlowError::StepFailed { source, .. } if source.is_timeout())
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, FlowError::StepFailed { source, .. } if source.is_assertion())
    }

    /// `(stage, step)` of the failing step, if a step failed.
    pub fn failed_step(&self) -> Option<(&str, &str)> {
        match self {
            FlowError::StepFailed { stage, step, .. } => Some((stage.as_str(), step.as_str())),
            _ => None,
        }
    }
}
