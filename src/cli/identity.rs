use anyhow::Result;
use flow_runner::TestIdentity;

use super::context::CliContext;
use super::output::render;

pub fn cmd_identity(ctx: &CliContext) -> Result<()> {
    let identity = TestIdentity::generate_with(&ctx.config().fixtures.identity);
    let rendered = render(&identity, ctx.output(), |identity| {
        format!(
            "name:     {}\nemail:    {}\npassword: {}",
            identity.name, identity.email, identity.password
        )
    })?;
    println!("{rendered}");
    Ok(())
}
