use crate::cli::CliContext;
use crate::core::metrics::HostMetrics;
use crate::core::remote::ApiClient;
use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Print the collected fields instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(ctx: &CliContext, args: MonitorArgs) -> Result<()> {
    let (_, config) = ctx.load_config()?;
    let form = HostMetrics::collect().to_form();

    if args.dry_run {
        for (key, value) in &form {
            println!("{} = {}", key, value);
        }
        return Ok(());
    }

    let client = ApiClient::new().context("build HTTP client")?;
    // submission failures are reported but never fail the run
    if let Err(e) = client.submit_metrics(
        &config.base_domain,
        &config.team_api_key,
        &config.server_api_key,
        &form,
    ) {
        warn!(error = %e, "metrics submission failed");
        eprintln!("warning: could not send metrics to ServerAuth: {}", e);
    }
    Ok(())
}
