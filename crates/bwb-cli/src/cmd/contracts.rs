use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use bwb_core::contracts;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ContractsSubcommand {
    /// List the FEAT entries of a phase's contracts document
    Analyze {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },
}

#[derive(Subcommand)]
pub enum ValidationSubcommand {
    /// Per-feature level results and gaps from a phase's validation document
    Status {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },
}

pub fn run(root: &Path, subcmd: ContractsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ContractsSubcommand::Analyze { phase } => analyze(root, &phase, json),
    }
}

pub fn run_validation(root: &Path, subcmd: ValidationSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ValidationSubcommand::Status { phase } => validation_status(root, &phase, json),
    }
}

fn analyze(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let analysis = contracts::analyze(root, id)
        .with_context(|| format!("failed to analyze contracts of phase '{id}'"))?;
    if json {
        return print_json(&analysis);
    }
    let rows = analysis
        .features
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.name.clone(),
                f.acceptance.len().to_string(),
                or_dash(f.depends.as_deref()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "ACCEPTANCE", "DEPENDS"], rows);
    Ok(())
}

fn validation_status(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let report = contracts::validation_status(root, id)
        .with_context(|| format!("failed to read validation of phase '{id}'"))?;
    if json {
        return print_json(&report);
    }
    let rows = report
        .features
        .iter()
        .map(|f| {
            let mut row = vec![f.id.clone()];
            row.extend(f.levels.iter().cloned());
            row.push(if f.passed { "pass" } else { "fail" }.to_string());
            row
        })
        .collect();
    print_table(&["FEATURE", "L1", "L2", "L3", "L4", "L5", "L6", "RESULT"], rows);
    println!();
    println!(
        "{}/{} passed, {} gap(s)",
        report.summary.passed, report.summary.total, report.summary.gaps
    );
    for gap in &report.gaps {
        println!("{}: {}", gap.id, gap.title);
    }
    Ok(())
}
