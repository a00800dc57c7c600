use crate::cli::CliContext;
use crate::core::config_store;
use crate::core::identity::{IdentityResolver, SystemResolver};
use crate::core::registry::AccountRegistry;
use crate::models::account::redact;
use anyhow::{bail, Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use serde::Serialize;

fn parse_username(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("username cannot be empty".into());
    }
    if s.contains('/') || s == "." || s == ".." {
        return Err("username cannot contain path separators".into());
    }
    Ok(s.to_string())
}

fn parse_api_key(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("API key cannot be empty".into());
    }
    if trimmed.contains('/') || trimmed.chars().any(char::is_whitespace) {
        return Err("API key cannot contain '/' or whitespace".into());
    }
    Ok(trimmed.to_string())
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// The username of the system account to add to ServerAuth
    #[arg(short, long, value_parser = parse_username)]
    pub username: String,

    /// The account's API key, shown when adding the account in the ServerAuth control panel
    #[arg(short = 'k', long, value_parser = parse_api_key)]
    pub apikey: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// The username of the system account to remove from ServerAuth
    #[arg(short, long, value_parser = parse_username)]
    pub username: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format: table|json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Serialize)]
struct ListItem {
    username: String,
    apikey: String,
    local_user: bool,
    authorized_keys: Option<String>,
}

pub fn run_add(ctx: &CliContext, args: AddArgs) -> Result<()> {
    let provisioner = ctx.provisioner()?;
    let mut registry = AccountRegistry::open_locked(&ctx.paths)?;
    let outcome = provisioner
        .add(&mut registry, &args.username, &args.apikey)
        .with_context(|| format!("add account `{}`", args.username))?;

    println!(
        "Found system user: {}\nSetting up ServerAuth for the account.",
        outcome.identity.username
    );
    if outcome.replaced {
        println!("The account was already registered; its API key has been updated.");
    }
    if outcome.created_ssh_dir {
        println!("Created {}", outcome.identity.ssh_dir().display());
    }
    if let Some(backup) = &outcome.backup {
        println!(
            "An existing authorized_keys file was found. This has been moved to {}",
            backup.display()
        );
    }
    println!("The user was successfully configured and is now managed by ServerAuth.");
    Ok(())
}

pub fn run_remove(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    let provisioner = ctx.provisioner()?;
    let mut registry = AccountRegistry::open_locked(&ctx.paths)?;
    let outcome = provisioner
        .remove(&mut registry, &args.username)
        .with_context(|| format!("remove account `{}`", args.username))?;

    if outcome.removed == 0 {
        println!("`{}` was not managed by ServerAuth; nothing to remove.", args.username);
        return Ok(());
    }
    println!("The selected account has been removed from ServerAuth.");
    println!(
        "{} has been left intact so you can update it manually.",
        outcome.identity.authorized_keys().display()
    );
    Ok(())
}

pub fn run_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    if args.format != "table" && args.format != "json" {
        bail!("invalid format: {} (use table|json)", args.format);
    }

    let file = config_store::load(&ctx.paths.config_toml)?;
    let items: Vec<ListItem> = file
        .accounts
        .iter()
        .map(|account| {
            let identity = SystemResolver.resolve(&account.username).ok().flatten();
            let authorized_keys = identity
                .as_ref()
                .map(|id| id.authorized_keys())
                .filter(|p| p.is_file())
                .map(|p| p.display().to_string());
            ListItem {
                username: account.username.clone(),
                apikey: redact(&account.credential_key),
                local_user: identity.is_some(),
                authorized_keys,
            }
        })
        .collect();

    if args.format == "json" {
        let json = serde_json::to_string_pretty(&items).context("serialize list")?;
        println!("{}", json);
        return Ok(());
    }

    if items.is_empty() {
        println!("No accounts are managed by ServerAuth on this server");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Username").add_attribute(Attribute::Bold),
        Cell::new("API Key").add_attribute(Attribute::Bold),
        Cell::new("Local User").add_attribute(Attribute::Bold),
        Cell::new("authorized_keys").add_attribute(Attribute::Bold),
    ]);
    for item in items {
        table.add_row(vec![
            item.username,
            item.apikey,
            if item.local_user { "yes" } else { "missing" }.to_string(),
            item.authorized_keys.unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}
