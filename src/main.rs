use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = serverauth_agent::cli::Cli::parse();
    cli.init_logging();
    cli.run()
}
