use anyhow::{Context, Result};
use clap::ValueEnum;
use flow_runner::FlowReport;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

/// Render `value` as JSON/YAML, or through `human` for terminal output.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    human: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Human => human(value),
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("serializing JSON output")?
        }
        OutputFormat::Yaml => serde_yaml::to_string(value).context("serializing YAML output")?,
    })
}

/// One status line plus the details a failed run needs for triage.
pub fn report_summary(report: &FlowReport) -> String {
    let status = if report.passed() { "PASS" } else { "FAIL" };
    let mut out = format!(
        "{status} {} ({}/{} steps, {} ms)",
        report.flow,
        report.steps_passed(),
        report.steps.len(),
        report.latency_ms
    );
    if let Some(identity) = &report.identity {
        let _ = write!(out, "\n  identity: {identity}");
    }
    if let Some(failed) = report.steps.iter().find(|step| step.error.is_some()) {
        let _ = write!(out, "\n  failed:   {} / {}", failed.stage, failed.step);
    }
    if let Some(failure) = &report.failure {
        let _ = write!(out, "\n  error:    {failure}");
    }
    if let Some(artifact) = &report.artifact {
        let _ = write!(out, "\n  artifact: {}", artifact.display());
    }
    for message in &report.page_errors {
        let _ = write!(out, "\n  page:     {message}");
    }
    out
}
