use anyhow::Result;
use clap::Parser;
use flare_cli::{init_tracing, run_flarebot, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run_flarebot(cli).await
}
