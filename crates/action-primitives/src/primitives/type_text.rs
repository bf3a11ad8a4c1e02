//! Fill primitive - replace the value of a form control

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, Locator},
};
use cdp_adapter::Cdp;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute fill primitive
///
/// Resolves the control, focuses it with its current value selected and
/// inserts `value` in one go. An empty value clears the control.
pub async fn execute_fill(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    locator: &Locator,
    value: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    // never log the value itself, passwords go through here
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        locator = %locator,
        text_length = value.chars().count(),
        "Executing fill primitive"
    );

    locator.validate()?;
    let resolved = primitives.locate(ctx, locator).await?;

    debug!(target: "action-primitives", selector = %resolved.selector, "Typing into control");
    primitives
        .adapter()
        .type_text(ctx.page, &resolved.selector, value, ctx.remaining_time())
        .await?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Fill completed successfully"
    );

    Ok(ActionReport::success(started_at, latency_ms))
}

#[cfg(test)]
mod tests {
    use crate::errors::ActionError;
    use crate::primitives::testing::{ctx, fast_primitives};
    use crate::primitives::ActionPrimitives;
    use crate::test_support::{classify, evaluated, Script, Scripted};
    use crate::types::Locator;
    use serde_json::json;

    #[tokio::test]
    async fn fills_the_labelled_control() {
        let transport = Scripted::new(|method, params| match method {
            "Runtime.evaluate" => match classify(params) {
                Script::Locator => evaluated(json!({
                    "status": "ok",
                    "selector": "[data-flowcheck-anchor=\"pw\"]",
                    "count": 2,
                    "text": ""
                })),
                Script::Focus => evaluated(json!({"status": "focused"})),
                _ => evaluated(json!(null)),
            },
            _ => json!({}),
        });
        let (primitives, page) = fast_primitives(transport.clone());

        primitives
            .fill(&ctx(page, 1_000), &Locator::label_exact("Senha"), "password123")
            .await
            .expect("fill");

        let calls = transport.calls();
        let (method, params) = calls.last().unwrap();
        assert_eq!(method, "Input.insertText");
        assert_eq!(params["text"], json!("password123"));
        assert_eq!(
            transport.scripts(),
            vec![Script::Locator, Script::Focus]
        );
    }

    #[tokio::test]
    async fn readonly_control_is_reported() {
        let transport = Scripted::new(|method, params| match method {
            "Runtime.evaluate" => match classify(params) {
                Script::Locator => evaluated(json!({
                    "status": "ok",
                    "selector": "[data-flowcheck-anchor=\"ro\"]",
                    "count": 1,
                    "text": ""
                })),
                Script::Focus => evaluated(json!({"status": "not-editable"})),
                _ => evaluated(json!(null)),
            },
            _ => json!({}),
        });
        let (primitives, page) = fast_primitives(transport.clone());

        let err = primitives
            .fill(&ctx(page, 1_000), &Locator::label("Email"), "x@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Internal(message) if message.contains("not-editable")));
        assert!(!transport.methods().iter().any(|m| m == "Input.insertText"));
    }
}
