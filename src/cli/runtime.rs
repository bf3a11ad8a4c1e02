use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// What loading an env file did. Built before logging is up, so the caller
/// logs it once the subscriber is installed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnvFileLoad {
    pub path: PathBuf,
    /// Keys set from the file
    pub applied: Vec<String>,
    /// 1-based numbers of lines without `KEY=VALUE`
    pub skipped_lines: Vec<usize>,
    pub read_error: Option<String>,
}

impl EnvFileLoad {
    pub fn log(&self) {
        if let Some(err) = &self.read_error {
            warn!(path = %self.path.display(), %err, "failed to read local.env overrides");
            return;
        }
        for line in &self.skipped_lines {
            warn!(path = %self.path.display(), line, "invalid local.env entry; skipping");
        }
        info!(
            path = %self.path.display(),
            applied = self.applied.len(),
            "Loaded environment overrides from local.env"
        );
    }
}

/// Loads `config/local.env` into the process environment. Variables already
/// set win over the file.
pub fn load_local_env_overrides() -> Option<EnvFileLoad> {
    load_env_file(Path::new("config/local.env"))
}

/// `None` when the file does not exist.
pub fn load_env_file(path: &Path) -> Option<EnvFileLoad> {
    if !path.exists() {
        return None;
    }

    let mut load = EnvFileLoad {
        path: path.to_path_buf(),
        ..EnvFileLoad::default()
    };
    let contents = match stdfs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            load.read_error = Some(err.to_string());
            return Some(load);
        }
    };

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            load.skipped_lines.push(idx + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, unescape_value(value.trim()));
        load.applied.push(key.to_string());
    }
    Some(load)
}

/// Logs go to stderr so `--output json|yaml` keeps stdout machine readable.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let text = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let structured = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(structured)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    /// `None` when no file was found and defaults are in use
    pub path: Option<PathBuf>,
}

/// Resolution order: `--config`, `./config/flowcheck.yaml`,
/// `<config dir>/flowcheck/config.yaml`, built-in defaults. An explicit
/// `--config` that does not exist is an error.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        }
        None => default_config_path(),
    };

    let Some(config_path) = config_path else {
        info!("No config file found, using built-in fixtures");
        return Ok(LoadedConfig {
            config: Config::default(),
            path: None,
        });
    };

    let content = fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

    info!("Loaded configuration from: {}", config_path.display());
    Ok(LoadedConfig {
        config,
        path: Some(config_path),
    })
}

pub fn parse_config(content: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

fn default_config_path() -> Option<PathBuf> {
    let local_config = PathBuf::from("config/flowcheck.yaml");
    if local_config.exists() {
        return Some(local_config);
    }
    let mut path = dirs::config_dir()?;
    path.push("flowcheck");
    path.push("config.yaml");
    path.exists().then_some(path)
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\t", "\t")
    } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_file_never_overrides_existing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.env");
        stdfs::write(
            &path,
            "# browser\nexport FLOWCHECK_TEST_CHROME=\"/opt/chrome\"\nFLOWCHECK_TEST_HEADLESS='0'\nbroken line\n",
        )
        .unwrap();
        env::set_var("FLOWCHECK_TEST_HEADLESS", "1");
        env::remove_var("FLOWCHECK_TEST_CHROME");

        let load = load_env_file(&path).unwrap();

        assert_eq!(load.applied, vec!["FLOWCHECK_TEST_CHROME".to_string()]);
        assert_eq!(load.skipped_lines, vec![4]);
        assert_eq!(load.read_error, None);
        assert_eq!(env::var("FLOWCHECK_TEST_CHROME").unwrap(), "/opt/chrome");
        assert_eq!(env::var("FLOWCHECK_TEST_HEADLESS").unwrap(), "1");
        env::remove_var("FLOWCHECK_TEST_CHROME");
        env::remove_var("FLOWCHECK_TEST_HEADLESS");
    }

    #[test]
    fn missing_env_file_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_env_file(&dir.path().join("local.env")), None);
    }

    #[tokio::test]
    async fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowcheck.yaml");
        stdfs::write(&path, "fixtures:\n  labels:\n    sign_out: Logout\n").unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.fixtures.labels.sign_out, "Logout");
        assert_eq!(loaded.config.fixtures.labels.sign_in, "Entrar");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = tokio_test::block_on(load_config(Some(&path))).err().unwrap();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn blank_and_invalid_documents() {
        assert_eq!(parse_config("  \n").unwrap(), Config::default());
        assert!(parse_config("fixtures: [1, 2]").is_err());
    }
}
