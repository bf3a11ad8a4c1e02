use clap::Subcommand;

use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Register, open the profile, log out, log back in and verify the profile
    AuthFlow(RunArgs),

    /// Register, then check the dashboard stat and the empty internal pages
    InternalPages(RunArgs),

    /// Run every scenario, each in its own browser session
    All(RunArgs),

    /// Print a freshly generated test identity
    Identity,

    /// Print the effective fixtures after merging the config file
    Fixtures,
}
