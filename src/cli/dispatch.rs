use super::env::CliArgs;
use super::fixtures::cmd_fixtures;
use super::identity::cmd_identity;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;
use flow_runner::Scenario;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::AuthFlow(args) => cmd_run(&[Scenario::AuthFlow], args, ctx).await,
        Commands::InternalPages(args) => cmd_run(&[Scenario::InternalPages], args, ctx).await,
        Commands::All(args) => cmd_run(&Scenario::ALL, args, ctx).await,
        Commands::Identity => cmd_identity(ctx),
        Commands::Fixtures => cmd_fixtures(ctx),
    }
}
