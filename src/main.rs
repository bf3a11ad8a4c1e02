use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    flowcheck_cli::cli::app::run().await
}
