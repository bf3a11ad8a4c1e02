//! Flow executor implementation

use crate::errors::FlowError;
use crate::fixtures::resolve_url;
use crate::types::{Flow, FlowReport, FlowStep, Outcome, StepRecord};
use action_primitives::{ActionError, ActionPrimitives, ActionReport, ExecCtx, WaitCondition};
use async_trait::async_trait;
use cdp_adapter::{PageId, ScreenshotOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Flow executor trait
#[async_trait]
pub trait FlowExecutor: Send + Sync {
    /// Run every stage of `flow` against `page`, stopping at the first failure.
    async fn execute(&self, flow: &Flow, page: PageId) -> FlowRun;
}

/// Finished run: the report is always populated, `error` is set on failure.
#[derive(Debug)]
pub struct FlowRun {
    pub report: FlowReport,
    pub error: Option<FlowError>,
}

impl FlowRun {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.report.passed()
    }

    pub fn into_result(self) -> Result<FlowReport, FlowError> {
        match self.error {
            None => Ok(self.report),
            Some(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Origin relative `goto` paths are resolved against
    pub base_url: String,
    /// Budget for locating and acting on an element (fill, click)
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
    pub success_artifact: PathBuf,
    pub error_artifact: PathBuf,
    pub screenshot: ScreenshotOptions,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            action_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            success_artifact: PathBuf::from("verification.png"),
            error_artifact: PathBuf::from("error.png"),
            screenshot: ScreenshotOptions::default(),
        }
    }
}

/// Default flow executor implementation
pub struct DefaultFlowExecutor {
    primitives: Arc<dyn ActionPrimitives>,
    settings: ExecutorSettings,
    cancel: CancellationToken,
}

impl DefaultFlowExecutor {
    pub fn new(primitives: Arc<dyn ActionPrimitives>, settings: ExecutorSettings) -> Self {
        Self {
            primitives,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling `token` interrupts the step in flight.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    fn build_exec_ctx(&self, page: PageId, budget: Duration) -> ExecCtx {
        ExecCtx::new(page, budget).with_cancel_token(self.cancel.child_token())
    }

    fn budget(&self, step: &FlowStep) -> Duration {
        match step {
            FlowStep::Goto { .. } => self.settings.navigation_timeout,
            FlowStep::Fill { .. } | FlowStep::Click { .. } => self.settings.action_timeout,
            _ => step
                .timeout_ms()
                .map(Duration::from_millis)
                .unwrap_or(self.settings.action_timeout),
        }
    }

    async fn execute_step(&self, step: &FlowStep, page: PageId) -> Result<ActionReport, ActionError> {
        let ctx = self.build_exec_ctx(page, self.budget(step));

        match step {
            FlowStep::Goto { path } => {
                let url = resolve_url(&self.settings.base_url, path);
                self.primitives.navigate(&ctx, &url).await
            }
            FlowStep::Fill { locator, value, .. } => self.primitives.fill(&ctx, locator, value).await,
            FlowStep::Click { locator } => self.primitives.click(&ctx, locator).await,
            FlowStep::WaitForUrl { glob, timeout_ms } => {
                self.primitives
                    .wait_for(&ctx, &WaitCondition::UrlMatches(glob.clone()), *timeout_ms)
                    .await
            }
            FlowStep::ExpectVisible {
                locator,
                timeout_ms,
            } => {
                self.primitives
                    .expect_visible(&ctx, locator, *timeout_ms)
                    .await
            }
            FlowStep::ExpectHidden {
                locator,
                timeout_ms,
            } => {
                let condition = WaitCondition::ElementHidden(locator.clone());
                self.primitives.wait_for(&ctx, &condition, *timeout_ms).await
            }
            FlowStep::ExpectText {
                locator,
                text,
                timeout_ms,
            } => {
                self.primitives
                    .expect_text(&ctx, locator, text, *timeout_ms)
                    .await
            }
        }
    }

    async fn run_stages(
        &self,
        flow: &Flow,
        page: PageId,
        report: &mut FlowReport,
    ) -> Result<(), FlowError> {
        for stage in &flow.stages {
            info!(target: "flow-runner", flow = %flow.name, stage = %stage.name, "Stage started");

            for step in &stage.steps {
                let description = step.to_string();
                debug!(target: "flow-runner", stage = %stage.name, step = %description, "Executing step");

                let started = Instant::now();
                let result = self.execute_step(step, page).await;
                let latency_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(action) => report.record(StepRecord {
                        stage: stage.name.clone(),
                        step: description,
                        outcome: Outcome::Passed,
                        latency_ms,
                        observed: action.observed,
                        error: None,
                    }),
                    Err(source) => {
                        report.record(StepRecord {
                            stage: stage.name.clone(),
                            step: description.clone(),
                            outcome: Outcome::Failed,
                            latency_ms,
                            observed: None,
                            error: Some(source.to_string()),
                        });
                        return Err(FlowError::StepFailed {
                            stage: stage.name.clone(),
                            step: description,
                            source,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Screenshot the page into `path`. Not tied to the cancel token, so a
    /// cancelled run still leaves its error artifact behind.
    async fn capture(&self, page: PageId, path: &Path) -> Result<PathBuf, FlowError> {
        let ctx = ExecCtx::new(page, self.settings.action_timeout);
        let bytes = self
            .primitives
            .screenshot(&ctx, &self.settings.screenshot)
            .await
            .map_err(|err| FlowError::Artifact {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        write_artifact(path, &bytes).await?;
        Ok(path.to_path_buf())
    }

    async fn fail(&self, page: PageId, mut report: FlowReport, err: FlowError) -> FlowRun {
        error!(target: "flow-runner", flow = %report.flow, error = %err, "Flow failed");

        match self.capture(page, &self.settings.error_artifact).await {
            Ok(path) => {
                info!(target: "flow-runner", path = %path.display(), "Error screenshot saved");
                report.artifact = Some(path);
            }
            Err(capture_err) => {
                warn!(target: "flow-runner", error = %capture_err, "Could not capture error screenshot");
            }
        }

        FlowRun {
            report: report.finish(Some(err.to_string())),
            error: Some(err),
        }
    }
}

#[async_trait]
impl FlowExecutor for DefaultFlowExecutor {
    async fn execute(&self, flow: &Flow, page: PageId) -> FlowRun {
        let mut report = FlowReport::new(&flow.name);

        if let Err(err) = flow.validate() {
            return FlowRun {
                report: report.finish(Some(err.to_string())),
                error: Some(err),
            };
        }

        info!(
            target: "flow-runner",
            flow = %flow.name,
            stages = flow.stages.len(),
            steps = flow.step_count(),
            "Executing flow"
        );

        if let Err(err) = self.run_stages(flow, page, &mut report).await {
            return self.fail(page, report, err).await;
        }

        match self.capture(page, &self.settings.success_artifact).await {
            Ok(path) => {
                info!(
                    target: "flow-runner",
                    flow = %flow.name,
                    path = %path.display(),
                    "Flow passed"
                );
                report.artifact = Some(path);
                FlowRun {
                    report: report.finish(None),
                    error: None,
                }
            }
            Err(err) => self.fail(page, report, err).await,
        }
    }
}

/// Write `bytes` to `path`, creating parent directories first.
pub async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), FlowError> {
    let artifact_err = |err: std::io::Error| FlowError::Artifact {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(artifact_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(artifact_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;
    use action_primitives::Locator;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every call; fails the first call whose description starts with
    /// `fail_on`.
    #[derive(Default)]
    struct MockActionPrimitives {
        calls: Mutex<Vec<String>>,
        fail_on: Option<(&'static str, ActionError)>,
        screenshot_fails: bool,
    }

    impl MockActionPrimitives {
        fn failing_on(prefix: &'static str, err: ActionError) -> Self {
            Self {
                fail_on: Some((prefix, err)),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn call(&self, ctx: &ExecCtx, call: String) -> Result<ActionReport, ActionError> {
            ctx.ensure_active()?;
            self.calls.lock().unwrap().push(call.clone());
            if let Some((prefix, err)) = &self.fail_on {
                if call.starts_with(prefix) {
                    return Err(err.clone());
                }
            }
            Ok(ActionReport::success(Utc::now(), 1))
        }
    }

    #[async_trait]
    impl ActionPrimitives for MockActionPrimitives {
        async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("navigate {url}"))
        }

        async fn click(&self, ctx: &ExecCtx, locator: &Locator) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("click {locator}"))
        }

        async fn fill(
            &self,
            ctx: &ExecCtx,
            locator: &Locator,
            value: &str,
        ) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("fill {locator}={value}"))
        }

        async fn wait_for(
            &self,
            ctx: &ExecCtx,
            condition: &WaitCondition,
            timeout_ms: u64,
        ) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("wait {condition} {timeout_ms}"))
        }

        async fn read_text(&self, ctx: &ExecCtx, locator: &Locator) -> Result<String, ActionError> {
            self.call(ctx, format!("read {locator}")).map(|_| String::new())
        }

        async fn expect_visible(
            &self,
            ctx: &ExecCtx,
            locator: &Locator,
            timeout_ms: u64,
        ) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("visible {locator} {timeout_ms}"))
        }

        async fn expect_text(
            &self,
            ctx: &ExecCtx,
            locator: &Locator,
            expected: &str,
            timeout_ms: u64,
        ) -> Result<ActionReport, ActionError> {
            self.call(ctx, format!("text {locator}={expected} {timeout_ms}"))
                .map(|report| report.with_observed(expected))
        }

        async fn screenshot(
            &self,
            ctx: &ExecCtx,
            _options: &ScreenshotOptions,
        ) -> Result<Vec<u8>, ActionError> {
            self.calls.lock().unwrap().push("screenshot".into());
            ctx.ensure_active()?;
            if self.screenshot_fails {
                return Err(ActionError::CdpIo("target closed".into()));
            }
            Ok(b"\x89PNG".to_vec())
        }

        async fn current_url(&self, ctx: &ExecCtx) -> Result<String, ActionError> {
            self.call(ctx, "url".into()).map(|_| String::new())
        }
    }

    fn login_flow() -> Flow {
        Flow::new("login")
            .with_stage(
                Stage::new("Login")
                    .step(FlowStep::goto("/login"))
                    .step(FlowStep::fill(Locator::label("Email"), "a@b.c"))
                    .step(FlowStep::click(Locator::role("button", "Entrar")))
                    .step(FlowStep::wait_for_url("**/app", 10_000)),
            )
            .with_stage(
                Stage::new("Dashboard")
                    .step(FlowStep::expect_text(Locator::css("p.text-2xl"), "0", 5_000)),
            )
    }

    fn settings(dir: &Path) -> ExecutorSettings {
        ExecutorSettings {
            base_url: "http://app.test:3000/".into(),
            success_artifact: dir.join("shots/verification.png"),
            error_artifact: dir.join("shots/error.png"),
            ..ExecutorSettings::default()
        }
    }

    #[tokio::test]
    async fn passing_flow_writes_verification_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives::default());
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()));

        let run = executor.execute(&login_flow(), PageId::new()).await;

        assert!(run.passed());
        assert_eq!(run.report.steps.len(), 5);
        assert_eq!(run.report.steps_passed(), 5);
        assert_eq!(run.report.steps[4].observed.as_deref(), Some("0"));
        let artifact = dir.path().join("shots/verification.png");
        assert_eq!(run.report.artifact.as_deref(), Some(artifact.as_path()));
        assert_eq!(std::fs::read(&artifact).unwrap(), b"\x89PNG");
        assert!(!dir.path().join("shots/error.png").exists());

        let calls = primitives.calls();
        assert_eq!(calls[0], "navigate http://app.test:3000/login");
        assert_eq!(calls[3], "wait url(**/app) 10000");
        assert_eq!(calls.last().map(String::as_str), Some("screenshot"));
    }

    #[tokio::test]
    async fn first_failure_stops_the_flow_and_saves_error_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives::failing_on(
            "wait",
            ActionError::WaitTimeout("url(**/app) not met after 10000ms".into()),
        ));
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()));

        let run = executor.execute(&login_flow(), PageId::new()).await;

        assert!(!run.passed());
        assert_eq!(run.report.outcome, Outcome::Failed);
        assert_eq!(run.report.steps.len(), 4);
        assert_eq!(run.report.steps[3].outcome, Outcome::Failed);
        assert!(dir.path().join("shots/error.png").exists());
        assert!(!dir.path().join("shots/verification.png").exists());
        assert!(!primitives.calls().iter().any(|call| call.starts_with("text")));

        let err = run.into_result().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            err.failed_step(),
            Some(("Login", "wait for url **/app (10000ms)"))
        );
    }

    #[tokio::test]
    async fn error_screenshot_failure_keeps_the_original_error() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives {
            screenshot_fails: true,
            ..MockActionPrimitives::failing_on(
                "text",
                ActionError::AssertionFailed("expected '0', got '3'".into()),
            )
        });
        let executor = DefaultFlowExecutor::new(primitives, settings(dir.path()));

        let run = executor.execute(&login_flow(), PageId::new()).await;

        assert!(run.report.artifact.is_none());
        assert!(run
            .report
            .failure
            .as_deref()
            .is_some_and(|failure| failure.contains("Stage 'Dashboard'")));
        assert!(run.into_result().unwrap_err().is_assertion());
    }

    #[tokio::test]
    async fn success_screenshot_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives {
            screenshot_fails: true,
            ..MockActionPrimitives::default()
        });
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()));

        let run = executor.execute(&login_flow(), PageId::new()).await;

        assert_eq!(run.report.steps_passed(), 5);
        assert_eq!(run.report.outcome, Outcome::Failed);
        let calls = primitives.calls();
        assert_eq!(calls.iter().filter(|call| *call == "screenshot").count(), 2);
        assert!(matches!(
            run.into_result(),
            Err(FlowError::Artifact { path, .. }) if path.ends_with("verification.png")
        ));
    }

    #[tokio::test]
    async fn invalid_flow_never_touches_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives::default());
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()));

        let run = executor
            .execute(&Flow::new("empty"), PageId::new())
            .await;

        assert!(primitives.calls().is_empty());
        assert!(matches!(run.error, Some(FlowError::InvalidFixture(_))));
        assert_eq!(run.report.outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn cancelled_run_is_interrupted_but_still_captured() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives::default());
        let token = CancellationToken::new();
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()))
            .with_cancel_token(token.clone());
        token.cancel();

        let run = executor.execute(&login_flow(), PageId::new()).await;

        assert_eq!(primitives.calls(), vec!["screenshot".to_string()]);
        assert!(dir.path().join("shots/error.png").exists());
        assert!(matches!(
            run.error,
            Some(FlowError::StepFailed {
                source: ActionError::Interrupted(_),
                ..
            })
        ));
    }

    #[test]
    fn step_budgets_follow_the_step_kind() {
        let executor = DefaultFlowExecutor::new(
            Arc::new(MockActionPrimitives::default()),
            ExecutorSettings::default(),
        );
        assert_eq!(
            executor.budget(&FlowStep::goto("/signup")),
            Duration::from_secs(30)
        );
        assert_eq!(
            executor.budget(&FlowStep::click(Locator::text("Home"))),
            Duration::from_secs(10)
        );
        assert_eq!(
            executor.budget(&FlowStep::expect_visible(Locator::text("Home"), 5_000)),
            Duration::from_millis(5_000)
        );
    }

    #[tokio::test]
    async fn expect_hidden_waits_for_the_locator_to_disappear() {
        let dir = tempfile::tempdir().unwrap();
        let primitives = Arc::new(MockActionPrimitives::default());
        let executor = DefaultFlowExecutor::new(primitives.clone(), settings(dir.path()));
        let flow = Flow::new("logout").with_stage(
            Stage::new("Logout")
                .step(FlowStep::expect_hidden(Locator::role("link", "Perfil"), 10_000)),
        );

        let run = executor.execute(&flow, PageId::new()).await;

        assert!(run.passed());
        assert_eq!(
            primitives.calls()[0],
            "wait hidden(role:link[name~='Perfil']) 10000"
        );
    }

    #[tokio::test]
    async fn artifacts_in_the_working_directory_need_no_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.png");
        write_artifact(&path, b"png").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"png");
    }
}
