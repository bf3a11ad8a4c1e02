//! L2 Flow Runner - scripted acceptance flows over action primitives
//!
//! Turns fixtures and a fresh test identity into an ordered list of stages
//! (register, profile, logout, login, internal pages), runs them one step at
//! a time and leaves a screenshot behind for every run, passed or failed.

pub mod errors;
pub mod executor;
pub mod fixtures;
pub mod identity;
pub mod scenarios;
pub mod types;

pub use errors::FlowError;
pub use executor::{write_artifact, DefaultFlowExecutor, ExecutorSettings, FlowExecutor, FlowRun};
pub use fixtures::{resolve_url, Fixtures};
pub use identity::TestIdentity;
pub use scenarios::{auth_flow, internal_pages, Scenario, Timeouts};
pub use types::{Flow, FlowReport, FlowStep, Outcome, Stage, StepRecord};
