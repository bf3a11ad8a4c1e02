//! Core types for scripted flows

use crate::errors::FlowError;
use action_primitives::Locator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Flow definition - named stages run strictly in order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }

    /// Every step in execution order, paired with its stage name.
    pub fn steps(&self) -> impl Iterator<Item = (&str, &FlowStep)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.steps.iter().map(move |step| (stage.name.as_str(), step)))
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.name.trim().is_empty() {
            return Err(FlowError::InvalidFixture("flow name cannot be empty".into()));
        }
        if self.stages.is_empty() {
            return Err(FlowError::InvalidFixture(format!(
                "flow '{}' has no stages",
                self.name
            )));
        }
        for stage in &self.stages {
            if stage.steps.is_empty() {
                return Err(FlowError::InvalidFixture(format!(
                    "stage '{}' of flow '{}' has no steps",
                    stage.name, self.name
                )));
            }
            for step in &stage.steps {
                step.validate().map_err(|err| {
                    FlowError::InvalidFixture(format!("stage '{}': {err}", stage.name))
                })?;
            }
        }
        Ok(())
    }
}

/// A named group of steps, logged as one unit ("Registration", "Logout", ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<FlowStep>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Single scripted action or expectation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Navigate to a path relative to the base URL (or an absolute URL)
    Goto { path: String },

    Fill {
        locator: Locator,
        value: String,
        /// Keep the value out of logs and reports
        #[serde(default)]
        secret: bool,
    },

    Click { locator: Locator },

    WaitForUrl { glob: String, timeout_ms: u64 },

    ExpectVisible { locator: Locator, timeout_ms: u64 },

    /// Wait until no visible element matches, e.g. a nav link after logout
    ExpectHidden { locator: Locator, timeout_ms: u64 },

    ExpectText {
        locator: Locator,
        text: String,
        timeout_ms: u64,
    },
}

impl FlowStep {
    pub fn goto(path: impl Into<String>) -> Self {
        FlowStep::Goto { path: path.into() }
    }

    pub fn fill(locator: Locator, value: impl Into<String>) -> Self {
        FlowStep::Fill {
            locator,
            value: value.into(),
            secret: false,
        }
    }

    pub fn fill_secret(locator: Locator, value: impl Into<String>) -> Self {
        FlowStep::Fill {
            locator,
            value: value.into(),
            secret: true,
        }
    }

    pub fn click(locator: Locator) -> Self {
        FlowStep::Click { locator }
    }

    pub fn wait_for_url(glob: impl Into<String>, timeout_ms: u64) -> Self {
        FlowStep::WaitForUrl {
            glob: glob.into(),
            timeout_ms,
        }
    }

    pub fn expect_visible(locator: Locator, timeout_ms: u64) -> Self {
        FlowStep::ExpectVisible {
            locator,
            timeout_ms,
        }
    }

    pub fn expect_hidden(locator: Locator, timeout_ms: u64) -> Self {
        FlowStep::ExpectHidden {
            locator,
            timeout_ms,
        }
    }

    pub fn expect_text(locator: Locator, text: impl Into<String>, timeout_ms: u64) -> Self {
        FlowStep::ExpectText {
            locator,
            text: text.into(),
            timeout_ms,
        }
    }

    /// Explicit timeout carried by waits and expectations.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            FlowStep::WaitForUrl { timeout_ms, .. }
            | FlowStep::ExpectVisible { timeout_ms, .. }
            | FlowStep::ExpectHidden { timeout_ms, .. }
            | FlowStep::ExpectText { timeout_ms, .. } => Some(*timeout_ms),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), String> {
        let locator = match self {
            FlowStep::Goto { path } if path.trim().is_empty() => {
                return Err("goto path cannot be empty".into())
            }
            FlowStep::WaitForUrl { glob, .. } if glob.trim().is_empty() => {
                return Err("url glob cannot be empty".into())
            }
            FlowStep::Goto { .. } | FlowStep::WaitForUrl { .. } => return Ok(()),
            FlowStep::Fill { locator, .. }
            | FlowStep::Click { locator }
            | FlowStep::ExpectVisible { locator, .. }
            | FlowStep::ExpectHidden { locator, .. }
            | FlowStep::ExpectText { locator, .. } => locator,
        };
        locator.validate().map_err(|err| err.to_string())
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStep::Goto { path } => write!(f, "goto {path}"),
            FlowStep::Fill {
                locator,
                value,
                secret,
            } => {
                if *secret {
                    write!(f, "fill {locator} with ********")
                } else {
                    write!(f, "fill {locator} with '{value}'")
                }
            }
            FlowStep::Click { locator } => write!(f, "click {locator}"),
            FlowStep::WaitForUrl { glob, timeout_ms } => {
                write!(f, "wait for url {glob} ({timeout_ms}ms)")
            }
            FlowStep::ExpectVisible {
                locator,
                timeout_ms,
            } => write!(f, "expect visible {locator} ({timeout_ms}ms)"),
            FlowStep::ExpectHidden {
                locator,
                timeout_ms,
            } => write!(f, "expect hidden {locator} ({timeout_ms}ms)"),
            FlowStep::ExpectText {
                locator,
                text,
                timeout_ms,
            } => write!(f, "expect {locator} to have text '{text}' ({timeout_ms}ms)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
        })
    }
}

/// Step execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub stage: String,
    pub step: String,
    pub outcome: Outcome,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Flow execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub run_id: Uuid,
    pub flow: String,
    pub outcome: Outcome,
    /// Email of the account the run registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Screenshot written at the end of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Uncaught page exceptions and CDP failures seen during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl FlowReport {
    pub fn new(flow: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            flow: flow.into(),
            outcome: Outcome::Failed,
            identity: None,
            steps: Vec::new(),
            failure: None,
            artifact: None,
            page_errors: Vec::new(),
            started_at: now,
            finished_at: now,
            latency_ms: 0,
        }
    }

    pub fn with_identity(mut self, email: impl Into<String>) -> Self {
        self.identity = Some(email.into());
        self
    }

    pub fn record(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn steps_passed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome == Outcome::Passed)
            .count()
    }

    /// Set outcome, finish time and latency
    pub fn finish(mut self, failure: Option<String>) -> Self {
        self.outcome = if failure.is_some() {
            Outcome::Failed
        } else {
            Outcome::Passed
        };
        self.failure = failure;
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flow() -> Flow {
        Flow::new("auth-flow")
            .with_stage(
                Stage::new("Registration")
                    .step(FlowStep::goto("/signup"))
                    .step(FlowStep::fill_secret(Locator::label_exact("Senha"), "password123")),
            )
            .with_stage(Stage::new("Profile").step(FlowStep::wait_for_url("**/opcoes", 10_000)))
    }

    #[test]
    fn steps_iterate_in_stage_order() {
        let flow = sample_flow();
        let stages: Vec<&str> = flow.steps().map(|(stage, _)| stage).collect();
        assert_eq!(stages, vec!["Registration", "Registration", "Profile"]);
        assert_eq!(flow.step_count(), 3);
        assert!(flow.validate().is_ok());
    }

    #[test]
    fn secrets_are_masked_in_descriptions() {
        let step = FlowStep::fill_secret(Locator::label_exact("Senha"), "password123");
        assert_eq!(step.to_string(), "fill label:exact:'Senha' with ********");
        let step = FlowStep::fill(Locator::label("Nome"), "Test User");
        assert_eq!(step.to_string(), "fill label:partial:'Nome' with 'Test User'");
    }

    #[test]
    fn empty_stages_are_rejected() {
        let flow = Flow::new("broken").with_stage(Stage::new("Nothing"));
        assert!(matches!(flow.validate(), Err(FlowError::InvalidFixture(_))));

        let flow = Flow::new("broken").with_stage(Stage::new("Blank").step(FlowStep::click(Locator::text(" "))));
        let err = flow.validate().unwrap_err();
        assert!(err.to_string().contains("stage 'Blank'"));
    }

    #[test]
    fn steps_deserialize_from_yaml() {
        let yaml = r#"
- action: goto
  path: /login
- action: click
  locator: { kind: role, role: button, name: Entrar, exact: false }
- action: expect_text
  locator: { kind: css, selector: p.text-2xl, has_text: null }
  text: "0"
  timeout_ms: 5000
"#;
        let steps: Vec<FlowStep> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(steps[0], FlowStep::goto("/login"));
        assert_eq!(steps[1], FlowStep::click(Locator::role("button", "Entrar")));
        assert_eq!(steps[2].timeout_ms(), Some(5_000));
    }

    #[test]
    fn report_serializes_lowercase_outcome() {
        let mut report = FlowReport::new("internal-pages").with_identity("testuser_1@example.com");
        report.record(StepRecord {
            stage: "Dashboard".into(),
            step: "expect css:p.text-2xl to have text '0' (5000ms)".into(),
            outcome: Outcome::Passed,
            latency_ms: 12,
            observed: Some("0".into()),
            error: None,
        });
        let report = report.finish(None);
        assert!(report.passed());
        assert_eq!(report.steps_passed(), 1);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["outcome"], "passed");
        assert_eq!(value["identity"], "testuser_1@example.com");
        assert!(value.get("failure").is_none());
        assert!(report.to_yaml().unwrap().contains("flow: internal-pages"));
    }
}
