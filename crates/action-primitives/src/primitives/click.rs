//! Click primitive - pointer click on the element a locator resolves to

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, Locator},
};
use cdp_adapter::Cdp;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute click primitive
///
/// Steps:
/// 1. Validate locator and context
/// 2. Wait until the locator resolves to a visible element
/// 3. Dispatch the pointer sequence at the element centre
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    locator: &Locator,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        locator = %locator,
        "Executing click primitive"
    );

    locator.validate()?;
    let resolved = primitives.locate(ctx, locator).await?;
    debug!(
        target: "action-primitives",
        selector = %resolved.selector,
        matches = resolved.matches,
        "Executing CDP click"
    );

    primitives
        .adapter()
        .click(ctx.page, &resolved.selector, ctx.remaining_time())
        .await
        .map_err(|err| match ActionError::from(err) {
            ActionError::AnchorNotFound(detail) => {
                ActionError::AnchorNotFound(format!("{locator}: {detail}"))
            }
            other => other,
        })?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Click completed successfully"
    );

    Ok(ActionReport::success(started_at, latency_ms).with_observed(resolved.text))
}
