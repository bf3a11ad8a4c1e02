//! Wait primitive - Explicit waits for various conditions

use crate::{
    errors::ActionError,
    locator::Resolution,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, Locator, WaitCondition},
    url_glob::UrlGlob,
    waiting::{Check, Stalled},
};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Execute wait primitive
///
/// Polls the condition every interval until it holds or `timeout_ms`
/// elapses. A missed deadline is a `WaitTimeout`, never retried.
pub async fn execute_wait(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    condition: &WaitCondition,
    timeout_ms: u64,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        condition = %condition,
        timeout_ms = timeout_ms,
        "Executing wait primitive"
    );

    ctx.ensure_active()?;
    let timeout = Duration::from_millis(timeout_ms);

    let observed = match wait_for_condition(primitives, ctx, condition, timeout).await? {
        Ok(observed) => observed,
        Err(stalled) => {
            warn!(
                target: "action-primitives",
                action_id = %ctx.action_id,
                condition = %condition,
                attempts = stalled.attempts,
                "Wait timed out after {}ms",
                timeout_ms
            );
            return Err(ActionError::WaitTimeout(format!(
                "{condition} not met {}",
                stalled.describe()
            )));
        }
    };
    debug!(target: "action-primitives", "Wait condition met successfully");

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Wait completed successfully"
    );

    let report = ActionReport::success(started_at, latency_ms);
    Ok(match observed {
        Some(observed) => report.with_observed(observed),
        None => report,
    })
}

/// Wait for condition to be met; yields what was observed when it was.
async fn wait_for_condition(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    condition: &WaitCondition,
    timeout: Duration,
) -> Result<Result<Option<String>, Stalled>, ActionError> {
    match condition {
        WaitCondition::ElementHidden(locator) => {
            wait_element_hidden(primitives, ctx, locator, timeout).await
        }
        WaitCondition::UrlMatches(pattern) => {
            wait_url_matches(primitives, ctx, &UrlGlob::new(pattern), timeout).await
        }
    }
}

async fn wait_element_hidden(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    locator: &Locator,
    timeout: Duration,
) -> Result<Result<Option<String>, Stalled>, ActionError> {
    locator.validate()?;
    primitives
        .polling
        .until(ctx, timeout, move || async move {
            Ok::<_, ActionError>(match primitives.resolve_once(ctx, locator).await? {
                found @ Resolution::Found(_) => Check::Pending(Some(found.observation())),
                _ => Check::Ready(None),
            })
        })
        .await
}

async fn wait_url_matches(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    glob: &UrlGlob,
    timeout: Duration,
) -> Result<Result<Option<String>, Stalled>, ActionError> {
    primitives
        .polling
        .until(ctx, timeout, move || async move {
            match primitives.adapter().current_url(ctx.page).await {
                Ok(url) if glob.matches(&url) => Ok(Check::Ready(Some(url))),
                Ok(url) => Ok(Check::Pending(Some(format!("url {url}")))),
                // the old document is gone and the new one has no context yet
                Err(err) if err.is_protocol_error() => Ok(Check::Pending(None)),
                Err(err) => Err(ActionError::from(err)),
            }
        })
        .await
}
