//! Runner configuration
//!
//! Loaded from YAML; every section is optional and falls back to the
//! defaults the application ships with. Command-line flags are applied on
//! top by the CLI.

use cdp_adapter::CdpConfig;
use flow_runner::{ExecutorSettings, Fixtures, Timeouts};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fixtures: Fixtures,
    pub timeouts: TimeoutConfig,
    pub artifacts: ArtifactConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// URL waits and post-navigation expectations
    pub wait_ms: u64,
    pub assertion_ms: u64,
    /// Locating and acting on an element
    pub action_ms: u64,
    pub navigation_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let scenario = Timeouts::default();
        Self {
            wait_ms: scenario.wait_ms,
            assertion_ms: scenario.assertion_ms,
            action_ms: 10_000,
            navigation_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn scenario(&self) -> Timeouts {
        Timeouts {
            wait_ms: self.wait_ms,
            assertion_ms: self.assertion_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Full-page screenshot written when a run passes
    pub screenshot: PathBuf,
    pub error_screenshot: PathBuf,
    /// JSON report path; no report file when unset
    pub report: Option<PathBuf>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot: PathBuf::from("verification.png"),
            error_screenshot: PathBuf::from("error.png"),
            report: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    /// Attach to a running browser instead of launching one
    pub ws_url: Option<String>,
    /// Unset keeps the `FLOWCHECK_HEADLESS` / default behaviour
    pub headless: Option<bool>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
}

impl Config {
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            base_url: self.fixtures.base_url.clone(),
            action_timeout: Duration::from_millis(self.timeouts.action_ms),
            navigation_timeout: Duration::from_millis(self.timeouts.navigation_ms),
            success_artifact: self.artifacts.screenshot.clone(),
            error_artifact: self.artifacts.error_screenshot.clone(),
            ..ExecutorSettings::default()
        }
    }

    /// Adapter configuration: environment defaults, then this file's browser section.
    pub fn cdp_config(&self) -> CdpConfig {
        let mut cfg = CdpConfig::default();
        if let Some(path) = &self.browser.chrome_path {
            cfg.executable = path.clone();
        }
        if let Some(url) = &self.browser.ws_url {
            cfg.websocket_url = Some(url.clone());
        }
        if let Some(headless) = self.browser.headless {
            cfg.headless = headless;
        }
        if let Some(width) = self.browser.window_width {
            cfg.window_width = width;
        }
        if let Some(height) = self.browser.window_height {
            cfg.window_height = height;
        }
        cfg.default_deadline_ms = self.timeouts.navigation_ms;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeouts.scenario(), Timeouts::default());
        assert_eq!(config.artifacts.error_screenshot, PathBuf::from("error.png"));
    }

    #[test]
    fn sections_merge_over_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
fixtures:
  base_url: http://staging.local:8080
  texts:
    no_notifications: Sem notificações
timeouts:
  wait_ms: 20000
artifacts:
  screenshot: out/ok.png
browser:
  headless: false
  ws_url: ws://127.0.0.1:9222/devtools/browser/abc
"#,
        )
        .unwrap();

        assert_eq!(config.fixtures.texts.no_notifications, "Sem notificações");
        assert_eq!(config.fixtures.texts.no_routes, "Nenhuma rota encontrada");
        assert_eq!(config.timeouts.wait_ms, 20_000);
        assert_eq!(config.timeouts.assertion_ms, 5_000);

        let settings = config.executor_settings();
        assert_eq!(settings.base_url, "http://staging.local:8080");
        assert_eq!(settings.success_artifact, PathBuf::from("out/ok.png"));
        assert_eq!(settings.navigation_timeout, Duration::from_secs(30));

        let cdp = config.cdp_config();
        assert!(!cdp.headless);
        assert_eq!(
            cdp.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
    }

    #[test]
    fn unknown_timeout_values_are_rejected() {
        let parsed: Result<Config, _> = serde_yaml::from_str("timeouts:\n  wait_ms: soon\n");
        assert!(parsed.is_err());
    }
}
