use crate::output::print_value;
use anyhow::Context;
use bwb_core::{config::Config, paths};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use std::path::Path;

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum TimestampFormat {
    /// RFC 3339 with milliseconds
    #[default]
    Full,
    /// YYYY-MM-DD
    Date,
    /// RFC 3339 to the second with `:` replaced by `-`
    Filename,
}

pub fn generate_slug(text: &str, json: bool) -> anyhow::Result<()> {
    let slug = paths::slugify(text);
    print_value(json, &serde_json::json!({ "slug": slug }), &slug)
}

fn format_timestamp(now: DateTime<Utc>, format: TimestampFormat) -> String {
    match format {
        TimestampFormat::Full => now.to_rfc3339_opts(SecondsFormat::Millis, true),
        TimestampFormat::Date => now.format("%Y-%m-%d").to_string(),
        TimestampFormat::Filename => now.format("%Y-%m-%dT%H-%M-%S").to_string(),
    }
}

pub fn current_timestamp(format: TimestampFormat, json: bool) -> anyhow::Result<()> {
    let stamp = format_timestamp(Utc::now(), format);
    print_value(json, &serde_json::json!({ "timestamp": stamp }), &stamp)
}

pub fn verify_path_exists(root: &Path, target: &str, json: bool) -> anyhow::Result<()> {
    let full = paths::resolve(root, target);
    let kind = std::fs::metadata(&full).ok().map(|m| {
        if m.is_dir() {
            "directory"
        } else if m.is_file() {
            "file"
        } else {
            "other"
        }
    });
    let out = serde_json::json!({ "exists": kind.is_some(), "type": kind });
    print_value(json, &out, kind.is_some())
}

pub fn resolve_model(root: &Path, agent: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root);
    let model = config
        .model_for(agent)
        .with_context(|| format!("cannot resolve a model for '{agent}'"))?;
    let out = serde_json::json!({ "model": model, "profile": config.model_profile });
    print_value(json, &out, model)
}
