use crate::output::{print_json, print_value};
use anyhow::Context;
use bwb_core::{
    frontmatter::{self, Value},
    paths,
    verify::{self, Schema},
};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum FrontmatterSubcommand {
    /// Print a document's metadata block, or one field of it
    Get {
        file: String,
        #[arg(long)]
        field: Option<String>,
    },

    /// Set one field; the value is parsed as JSON when possible
    Set {
        file: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },

    /// Shallow-merge a JSON object into the metadata block
    Merge {
        file: String,
        #[arg(long)]
        data: String,
    },

    /// Check the block against a document schema
    Validate {
        file: String,
        /// plan, summary or validation
        #[arg(long)]
        schema: String,
    },
}

pub fn run(root: &Path, subcmd: FrontmatterSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FrontmatterSubcommand::Get { file, field } => get(root, &file, field.as_deref(), json),
        FrontmatterSubcommand::Set { file, field, value } => {
            set(root, &file, &field, &value, json)
        }
        FrontmatterSubcommand::Merge { file, data } => merge(root, &file, &data, json),
        FrontmatterSubcommand::Validate { file, schema } => validate(root, &file, &schema, json),
    }
}

/// Missing documents and fields are reported in the result, not as failures.
fn get(root: &Path, file: &str, field: Option<&str>, json: bool) -> anyhow::Result<()> {
    let Some((_, fm)) = frontmatter::read(&paths::resolve(root, file)) else {
        let out = serde_json::json!({ "error": "File not found", "path": file });
        return print_value(json, &out, "");
    };
    let Some(key) = field else {
        return print_value(json, &fm, frontmatter::encode(&fm));
    };
    match fm.get(key) {
        Some(value) => {
            let scalar = match value {
                Value::Scalar(s) => s.clone(),
                other => serde_json::to_string(other)?,
            };
            print_value(json, &serde_json::json!({ key: value }), scalar)
        }
        None => {
            let out = serde_json::json!({ "error": "Field not found", "field": key });
            print_value(json, &out, "")
        }
    }
}

fn set(root: &Path, file: &str, field: &str, raw: &str, json: bool) -> anyhow::Result<()> {
    let path = paths::resolve(root, file);
    let stored = frontmatter::set_field(&path, field, raw)
        .with_context(|| format!("failed to set '{field}' in {file}"))?;
    let out = serde_json::json!({ "updated": true, "field": field, "value": stored });
    print_value(json, &out, true)
}

fn merge(root: &Path, file: &str, data: &str, json: bool) -> anyhow::Result<()> {
    let path = paths::resolve(root, file);
    let fields = frontmatter::merge_json(&path, data)
        .with_context(|| format!("failed to merge into {file}"))?;
    let out = serde_json::json!({ "merged": true, "fields": fields });
    print_value(json, &out, true)
}

fn validate(root: &Path, file: &str, schema: &str, json: bool) -> anyhow::Result<()> {
    let schema: Schema = schema.parse()?;
    let report = verify::validate_document(root, file, schema)
        .with_context(|| format!("failed to validate {file}"))?;
    if json {
        return print_json(&report);
    }
    if report.valid {
        println!("valid ({})", report.schema);
    } else {
        println!("missing: {}", report.missing.join(", "));
    }
    Ok(())
}
