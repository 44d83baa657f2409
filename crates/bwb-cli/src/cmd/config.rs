use crate::output::{print_json, print_value};
use anyhow::Context;
use bwb_core::config::{self, Config, EnsureOutcome};
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Create .planning/config.json with defaults unless it exists
    EnsureSection,

    /// Set a dotted key path, e.g. `workflow.research true`
    Set {
        key_path: String,
        value: String,
    },

    /// Show the effective configuration
    Show,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::EnsureSection => ensure_section(root, json),
        ConfigSubcommand::Set { key_path, value } => set(root, &key_path, &value, json),
        ConfigSubcommand::Show => show(root, json),
    }
}

fn ensure_section(root: &Path, json: bool) -> anyhow::Result<()> {
    let outcome = config::ensure_section(root).context("failed to create config")?;
    let label = match outcome {
        EnsureOutcome::Created => "created",
        EnsureOutcome::AlreadyExists => "already_exists",
    };
    let out = serde_json::json!({ "created": outcome == EnsureOutcome::Created, "reason": label });
    print_value(json, &out, label)
}

fn set(root: &Path, key_path: &str, raw: &str, json: bool) -> anyhow::Result<()> {
    let value = config::set_key_path(root, key_path, raw)
        .with_context(|| format!("failed to set '{key_path}'"))?;
    let out = serde_json::json!({ "updated": true, "key": key_path, "value": value });
    print_value(json, &out, format!("{key_path}={value}"))
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }
    println!("model_profile       {}", config.model_profile);
    println!("commit_docs         {}", config.commit_docs);
    println!("search_gitignored   {}", config.search_gitignored);
    println!("fix_max_iterations  {}", config.fix_max_iterations);
    println!("fix_auto_retry      {}", config.fix_auto_retry);
    Ok(())
}
