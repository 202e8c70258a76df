use anyhow::Result;
use mailroom::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
