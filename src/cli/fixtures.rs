use anyhow::Result;

use super::context::CliContext;
use super::output::{render, OutputFormat};

/// Fixtures are data; the human format prints them as YAML with a source line.
pub fn cmd_fixtures(ctx: &CliContext) -> Result<()> {
    let fixtures = &ctx.config().fixtures;
    if ctx.output() == OutputFormat::Human {
        match ctx.config_path() {
            Some(path) => println!("# fixtures from {}", path.display()),
            None => println!("# built-in fixtures"),
        }
    }
    let format = match ctx.output() {
        OutputFormat::Human => OutputFormat::Yaml,
        other => other,
    };
    let rendered = render(fixtures, format, |_| String::new())?;
    println!("{}", rendered.trim_end());
    fixtures.validate()?;
    Ok(())
}
