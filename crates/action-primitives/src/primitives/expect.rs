//! Expectations - assertions on what the page renders
//!
//! Both primitives poll until the expectation holds or the timeout elapses.
//! A miss is an `AssertionFailed` carrying the last thing observed, so the
//! failure reads like `expected ... but found '5'`.

use crate::{
    errors::ActionError,
    locator::Resolution,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, Locator},
    waiting::Check,
};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::info;

/// Collapses whitespace runs the same way the locator engine does.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub async fn execute_expect_visible(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    locator: &Locator,
    timeout_ms: u64,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        locator = %locator,
        timeout_ms,
        "Expecting element to be visible"
    );

    locator.validate()?;
    ctx.ensure_active()?;
    let outcome = primitives
        .polling
        .until(ctx, Duration::from_millis(timeout_ms), move || async move {
            Ok::<_, ActionError>(match primitives.resolve_once(ctx, locator).await? {
                Resolution::Found(resolved) => Check::Ready(resolved.text),
                other => Check::Pending(Some(other.observation())),
            })
        })
        .await?;

    let text = outcome.map_err(|stalled| {
        ActionError::AssertionFailed(format!(
            "expected {locator} to be visible {}",
            stalled.describe()
        ))
    })?;
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms).with_observed(text))
}

pub async fn execute_expect_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    locator: &Locator,
    expected: &str,
    timeout_ms: u64,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        locator = %locator,
        expected,
        timeout_ms,
        "Expecting element text"
    );

    locator.validate()?;
    ctx.ensure_active()?;
    let wanted = normalize_text(expected);
    let wanted = wanted.as_str();
    let outcome = primitives
        .polling
        .until(ctx, Duration::from_millis(timeout_ms), move || async move {
            Ok::<_, ActionError>(match primitives.resolve_once(ctx, locator).await? {
                Resolution::Found(resolved) if normalize_text(&resolved.text) == wanted => {
                    Check::Ready(resolved.text)
                }
                other => Check::Pending(Some(other.observation())),
            })
        })
        .await?;

    let text = outcome.map_err(|stalled| {
        ActionError::AssertionFailed(format!(
            "expected {locator} to have text '{wanted}' {}",
            stalled.describe()
        ))
    })?;
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms).with_observed(text))
}
