use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn scenario_flags_parse() {
        let cli = CliArgs::try_parse_from([
            "flowcheck",
            "--output",
            "json",
            "auth-flow",
            "--base-url",
            "http://127.0.0.1:4000",
            "--timeout",
            "15s",
            "--error-screenshot",
            "out/failed.png",
            "--headful",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        let Commands::AuthFlow(args) = cli.command else {
            panic!("expected auth-flow");
        };
        assert_eq!(args.base_url.as_deref(), Some("http://127.0.0.1:4000"));
        assert_eq!(args.timeout, Some(Duration::from_secs(15)));
        assert_eq!(args.error_screenshot, Some(PathBuf::from("out/failed.png")));
        assert!(args.headful);
        assert!(args.screenshot.is_none());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = CliArgs::try_parse_from(["flowcheck", "fixtures", "--config", "ci.yaml", "-d"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Fixtures));
        assert_eq!(cli.config, Some(PathBuf::from("ci.yaml")));
        assert!(cli.debug);
    }

    #[test]
    fn malformed_timeout_is_a_usage_error() {
        let err = CliArgs::try_parse_from(["flowcheck", "all", "--timeout", "soon"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
