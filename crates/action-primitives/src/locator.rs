use crate::{errors::ActionError, types::Locator};
use async_trait::async_trait;
use cdp_adapter::{Cdp, PageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

const ENGINE: &str = include_str!("locator_engine.js");

/// Attribute the resolver tags the chosen element with.
pub const ANCHOR_ATTR: &str = "data-flowcheck-anchor";

/// Resolver responsible for turning a [`Locator`] into a concrete CSS selector
/// that CDP commands can operate on.
#[async_trait]
pub trait AnchorResolver: Send + Sync {
    async fn resolve(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        locator: &Locator,
    ) -> Result<Resolution, ActionError>;
}

/// Element picked by a resolver.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSelector {
    pub selector: String,
    pub page: PageId,
    /// Number of candidates the locator matched, visible or not
    pub matches: u32,
    /// Whitespace-normalised rendered text of the element
    pub text: String,
}

/// Outcome of a single resolution attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Found(ResolvedSelector),
    /// Matches exist but none is visible
    Hidden { matches: u32 },
    Missing,
}

impl Resolution {
    pub fn found(self) -> Option<ResolvedSelector> {
        match self {
            Resolution::Found(resolved) => Some(resolved),
            _ => None,
        }
    }

    /// Short description used in timeout messages.
    pub fn observation(&self) -> String {
        match self {
            Resolution::Found(resolved) => format!("'{}'", resolved.text),
            Resolution::Hidden { matches } => format!("{matches} hidden match(es)"),
            Resolution::Missing => "no matching element".to_string(),
        }
    }
}

/// Default resolver: evaluates the locator engine in the page and tags the
/// first visible match with a one-off token attribute.
#[derive(Clone, Debug)]
pub struct ScriptAnchorResolver {
    attr: String,
}

impl Default for ScriptAnchorResolver {
    fn default() -> Self {
        Self {
            attr: ANCHOR_ATTR.to_string(),
        }
    }
}

#[async_trait]
impl AnchorResolver for ScriptAnchorResolver {
    async fn resolve(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        locator: &Locator,
    ) -> Result<Resolution, ActionError> {
        locator.validate()?;
        let token = Uuid::new_v4().simple().to_string();
        let expression = resolution_script(locator, &self.attr, &token)?;

        let value = match cdp.evaluate_script(page, &expression).await {
            Ok(value) => value,
            // execution context replaced by a navigation in flight
            Err(err) if err.is_protocol_error() => {
                trace!(target: "action-primitives", %locator, %err, "resolution deferred");
                return Ok(Resolution::Missing);
            }
            Err(err) => return Err(err.into()),
        };
        interpret(locator, page, value)
    }
}

/// Builds the self-contained expression that resolves `locator` in the page.
pub fn resolution_script(locator: &Locator, attr: &str, token: &str) -> Result<String, ActionError> {
    Ok(format!(
        "({engine})({query}, {attr}, {token})",
        engine = ENGINE.trim(),
        query = encode(locator)?,
        attr = encode(attr)?,
        token = encode(token)?,
    ))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ActionError> {
    serde_json::to_string(value)
        .map_err(|err| ActionError::Internal(format!("failed to encode locator: {err}")))
}

#[derive(Debug, Deserialize)]
struct EngineReply {
    status: String,
    selector: Option<String>,
    #[serde(default)]
    count: u32,
    text: Option<String>,
    reason: Option<String>,
}

fn interpret(locator: &Locator, page: PageId, value: Value) -> Result<Resolution, ActionError> {
    if value.is_null() {
        return Ok(Resolution::Missing);
    }
    let reply: EngineReply = serde_json::from_value(value)
        .map_err(|err| ActionError::Internal(format!("unexpected locator reply: {err}")))?;
    match reply.status.as_str() {
        "ok" => {
            let selector = reply.selector.ok_or_else(|| {
                ActionError::Internal(format!("locator {locator} resolved without selector"))
            })?;
            Ok(Resolution::Found(ResolvedSelector {
                selector,
                page,
                matches: reply.count,
                text: reply.text.unwrap_or_default(),
            }))
        }
        "hidden" => Ok(Resolution::Hidden {
            matches: reply.count,
        }),
        "not-found" => Ok(Resolution::Missing),
        "invalid" => Err(ActionError::Internal(format!(
            "locator {locator} is invalid: {}",
            reply.reason.unwrap_or_default()
        ))),
        other => Err(ActionError::Internal(format!(
            "locator {locator} returned unknown status '{other}'"
        ))),
    }
}
