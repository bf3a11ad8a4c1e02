//! Core data types for action primitives

use cdp_adapter::PageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::ActionError;

/// Execution context for action primitives
///
/// Carries the target page, the deadline the action must finish by, a
/// cancellation token and an id used to correlate log lines.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub page: PageId,
    pub deadline: Instant,
    pub cancel_token: CancellationToken,
    pub action_id: String,
}

impl ExecCtx {
    pub fn new(page: PageId, budget: Duration) -> Self {
        Self {
            page,
            deadline: Instant::now() + budget,
            cancel_token: CancellationToken::new(),
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fails fast when the context is already cancelled or past its deadline.
    pub fn ensure_active(&self) -> Result<(), ActionError> {
        if self.is_cancelled() {
            return Err(ActionError::Interrupted("Context cancelled".to_string()));
        }
        if self.is_timeout() {
            return Err(ActionError::WaitTimeout(
                "Context deadline exceeded".to_string(),
            ));
        }
        Ok(())
    }
}

/// Element targeting strategies, modelled on Playwright's locators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Form control associated with a `<label>` or carrying a matching `aria-label`
    Label { text: String, exact: bool },

    /// Explicit or implicit ARIA role, optionally filtered by accessible name
    Role {
        role: String,
        name: Option<String>,
        exact: bool,
    },

    /// Innermost element whose text matches
    Text { content: String, exact: bool },

    /// CSS selector, optionally narrowed to the innermost matches containing `has_text`
    Css {
        selector: String,
        has_text: Option<String>,
    },

    /// CSS selector evaluated inside the element `scope` resolves to
    Within { scope: Box<Locator>, selector: String },
}

impl Locator {
    pub fn label(text: impl Into<String>) -> Self {
        Locator::Label {
            text: text.into(),
            exact: false,
        }
    }

    pub fn label_exact(text: impl Into<String>) -> Self {
        Locator::Label {
            text: text.into(),
            exact: true,
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: Some(name.into()),
            exact: false,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Locator::Text {
            content: content.into(),
            exact: false,
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
            has_text: None,
        }
    }

    pub fn css_has_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
            has_text: Some(text.into()),
        }
    }

    /// `self >> selector`
    pub fn within(self, selector: impl Into<String>) -> Self {
        Locator::Within {
            scope: Box::new(self),
            selector: selector.into(),
        }
    }

    /// Rejects locators that can never match anything.
    pub fn validate(&self) -> Result<(), ActionError> {
        let empty = |value: &str| value.trim().is_empty();
        let problem = match self {
            Locator::Label { text, .. } if empty(text) => Some("label text cannot be empty"),
            Locator::Role { role, .. } if empty(role) => Some("role cannot be empty"),
            Locator::Text { content, .. } if empty(content) => Some("text content cannot be empty"),
            Locator::Css { selector, .. } if empty(selector) => Some("empty CSS selector"),
            Locator::Within { selector, .. } if empty(selector) => Some("empty CSS selector"),
            Locator::Within { scope, .. } => return scope.validate(),
            _ => None,
        };
        match problem {
            Some(reason) => Err(ActionError::AnchorNotFound(format!("{reason}: {self}"))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = |exact: &bool| if *exact { "exact" } else { "partial" };
        match self {
            Locator::Label { text, exact } => write!(f, "label:{}:'{}'", mode(exact), text),
            Locator::Role { role, name, exact } => match name {
                Some(name) => write!(f, "role:{}[name{}'{}']", role, if *exact { "=" } else { "~=" }, name),
                None => write!(f, "role:{}", role),
            },
            Locator::Text { content, exact } => write!(f, "text:{}:'{}'", mode(exact), content),
            Locator::Css { selector, has_text } => match has_text {
                Some(text) => write!(f, "css:{}:has-text('{}')", selector, text),
                None => write!(f, "css:{}", selector),
            },
            Locator::Within { scope, selector } => write!(f, "{} >> css:{}", scope, selector),
        }
    }
}

/// Outcome record of a single primitive invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub ok: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    pub latency_ms: u64,

    /// Text read from the page, for primitives that observe rather than act
    pub observed: Option<String>,
}

impl ActionReport {
    pub fn success(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            observed: None,
        }
    }

    pub fn with_observed(mut self, observed: impl Into<String>) -> Self {
        self.observed = Some(observed.into());
        self
    }
}

/// Wait condition for explicit waits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WaitCondition {
    /// No visible element matches the locator any more
    ElementHidden(Locator),

    /// Current URL matches a `*`/`**`/`?` glob
    UrlMatches(String),
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::ElementHidden(locator) => write!(f, "hidden({locator})"),
            WaitCondition::UrlMatches(glob) => write!(f, "url({glob})"),
        }
    }
}
