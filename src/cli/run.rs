use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use action_primitives::DefaultActionPrimitives;
use anyhow::{bail, Context, Result};
use clap::Args;
use flow_runner::{
    write_artifact, DefaultFlowExecutor, FlowError, FlowExecutor, FlowReport, FlowRun, Scenario,
    TestIdentity,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{render, report_summary};
use crate::config::Config;
use crate::session::BrowserSession;

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Origin of the application under test
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Bound on URL waits, e.g. `10s` or `1500ms`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Screenshot written when the run passes
    #[arg(long, value_name = "PATH")]
    pub screenshot: Option<PathBuf>,

    /// Screenshot written when the run fails
    #[arg(long, value_name = "PATH")]
    pub error_screenshot: Option<PathBuf>,

    /// Override Chrome/Chromium executable path (defaults to FLOWCHECK_CHROME or system path)
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Attach to an existing Chrome DevTools websocket instead of launching a new instance
    #[arg(long, value_name = "URL")]
    pub ws_url: Option<String>,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,

    /// Write the JSON run report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Flags win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.fixtures.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeouts.wait_ms = timeout.as_millis() as u64;
        }
        if let Some(path) = &self.screenshot {
            config.artifacts.screenshot = path.clone();
        }
        if let Some(path) = &self.error_screenshot {
            config.artifacts.error_screenshot = path.clone();
        }
        if let Some(path) = &self.report {
            config.artifacts.report = Some(path.clone());
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_path = Some(path.clone());
        }
        if let Some(url) = &self.ws_url {
            config.browser.ws_url = Some(url.clone());
        }
        if self.headful {
            config.browser.headless = Some(false);
        }
    }
}

pub async fn cmd_run(scenarios: &[Scenario], args: RunArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().clone();
    args.apply(&mut config);
    config.fixtures.validate()?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing the current step");
                cancel.cancel();
            }
        })
    };

    let tag_artifacts = scenarios.len() > 1;
    let mut reports = Vec::with_capacity(scenarios.len());
    let mut failures = Vec::new();
    for scenario in scenarios {
        let run = run_scenario(*scenario, &config, tag_artifacts, cancel.clone()).await;
        let run = match run {
            Ok(run) => run,
            Err(err) => {
                interrupt.abort();
                return Err(err).with_context(|| format!("scenario {scenario} could not start"));
            }
        };

        println!("{}", render(&run.report, ctx.output(), report_summary)?);
        reports.push(run.report);
        if let Some(err) = run.error {
            failures.push((*scenario, err));
        }
        if cancel.is_cancelled() {
            break;
        }
    }
    interrupt.abort();

    if let Some(path) = &config.artifacts.report {
        write_report(path, &reports).await?;
    }

    match failures.len() {
        0 => Ok(()),
        1 => {
            let (scenario, err) = failures.remove(0);
            Err(anyhow::Error::new(err).context(format!("scenario {scenario} failed")))
        }
        n => {
            let names: Vec<String> = failures.iter().map(|(s, _)| s.to_string()).collect();
            bail!("{n} of {} scenarios failed: {}", reports.len(), names.join(", "))
        }
    }
}

/// One scenario in its own browser session with a freshly generated identity.
pub async fn run_scenario(
    scenario: Scenario,
    config: &Config,
    tag_artifacts: bool,
    cancel: CancellationToken,
) -> Result<FlowRun, FlowError> {
    let identity = TestIdentity::generate_with(&config.fixtures.identity);
    let flow = scenario.build(&config.fixtures, &identity, config.timeouts.scenario());

    let mut settings = config.executor_settings();
    if tag_artifacts {
        settings.success_artifact = tagged(&settings.success_artifact, scenario);
        settings.error_artifact = tagged(&settings.error_artifact, scenario);
    }

    info!(
        scenario = %scenario,
        email = %identity.email,
        base_url = %config.fixtures.base_url,
        "Running scenario"
    );

    let mut run = BrowserSession::scoped(config.cdp_config(), |mut session| async move {
        let primitives = Arc::new(DefaultActionPrimitives::new(Arc::clone(session.adapter())));
        let mut run = DefaultFlowExecutor::new(primitives, settings)
            .with_cancel_token(cancel)
            .execute(&flow, session.page())
            .await;
        run.report.page_errors = session.take_page_errors();
        for message in &run.report.page_errors {
            warn!(scenario = %scenario, %message, "Page error during run");
        }
        run
    })
    .await?;

    run.report.identity = Some(identity.email);
    Ok(run)
}

/// `out/verification.png` becomes `out/verification-auth-flow.png`.
pub fn tagged(path: &Path, scenario: Scenario) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{scenario}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{scenario}"),
    };
    path.with_file_name(name)
}

async fn write_report(path: &Path, reports: &[FlowReport]) -> Result<()> {
    let json = match reports {
        [single] => single.to_json()?,
        many => serde_json::to_string_pretty(many)?,
    };
    write_artifact(path, json.as_bytes())
        .await
        .with_context(|| format!("writing report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}
