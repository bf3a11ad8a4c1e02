//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Navigation did not reach a ready document in time
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Wait condition not met within its timeout
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Locator did not resolve to a visible element
    #[error("Anchor not found: {0}")]
    AnchorNotFound(String),

    /// Expectation on page state did not hold within its timeout
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Context cancelled while the action was running
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Timeouts and unmet expectations are the two ways a healthy run fails.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_) | ActionError::WaitTimeout(_) | ActionError::AnchorNotFound(_)
        )
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, ActionError::AssertionFailed(_))
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::NavTimeout => ActionError::NavTimeout(err.hint.unwrap_or(message)),
            AdapterErrorKind::TargetNotFound => {
                ActionError::AnchorNotFound(err.hint.unwrap_or(message))
            }
            AdapterErrorKind::CdpIo | AdapterErrorKind::BrowserNotFound => {
                ActionError::CdpIo(message)
            }
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}
