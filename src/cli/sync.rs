use crate::cli::CliContext;
use crate::core::registry::AccountRegistry;
use anyhow::{bail, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct SyncArgs {}

pub fn run(ctx: &CliContext, _args: SyncArgs) -> Result<()> {
    let provisioner = ctx.provisioner()?;
    let registry = AccountRegistry::load(&ctx.paths.config_toml)?;

    if registry.list().is_empty() {
        println!("No accounts are managed by ServerAuth on this server; nothing to sync.");
        return Ok(());
    }

    let report = provisioner.sync(&registry);
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(synced) => println!(
                "  [OK]   {}: wrote {} bytes to {}",
                outcome.username,
                synced.bytes,
                synced.path.display()
            ),
            Err(e) => eprintln!("  [FAIL] {}: {}", outcome.username, e),
        }
    }

    println!();
    println!(
        "Sync summary: {} synced, {} failed",
        report.synced(),
        report.failed()
    );
    if !report.is_success() {
        bail!(
            "{} of {} accounts failed to sync",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}
