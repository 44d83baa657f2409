use crate::output::print_json;
use anyhow::Context;
use bwb_core::digest;
use std::path::Path;

/// `fields` keeps only the named keys (plus `path`).
pub fn summary_extract(
    root: &Path,
    target: &str,
    fields: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let extract = digest::summary_extract(root, target)
        .with_context(|| format!("failed to extract {target}"))?;
    let mut value = serde_json::to_value(&extract)?;
    if let (Some(list), Some(obj)) = (fields, value.as_object_mut()) {
        let keep: Vec<&str> = list.split(',').map(str::trim).collect();
        obj.retain(|k, _| k == "path" || keep.contains(&k.as_str()));
    }
    if json {
        return print_json(&value);
    }
    println!("{}", extract.one_liner.as_deref().unwrap_or(&extract.path));
    Ok(())
}

pub fn history(root: &Path, json: bool) -> anyhow::Result<()> {
    let digest = digest::history_digest(root);
    if json {
        return print_json(&digest);
    }
    for (number, phase) in &digest.phases {
        println!("Phase {number}: {}", phase.name);
        if !phase.provides.is_empty() {
            println!("  provides: {}", phase.provides.join(", "));
        }
    }
    if !digest.tech_stack.is_empty() {
        println!("Tech stack: {}", digest.tech_stack.join(", "));
    }
    println!("{} decision(s)", digest.decisions.len());
    Ok(())
}
