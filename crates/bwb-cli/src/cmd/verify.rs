use crate::output::print_json;
use anyhow::Context;
use bwb_core::verify;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum VerifySubcommand {
    /// Check a plan's metadata and task elements
    PlanStructure { file: String },

    /// Check that every plan of a phase has a summary
    PhaseCompleteness {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },
}

pub fn run(root: &Path, subcmd: VerifySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        VerifySubcommand::PlanStructure { file } => plan_structure(root, &file, json),
        VerifySubcommand::PhaseCompleteness { phase } => phase_completeness(root, &phase, json),
    }
}

fn print_findings(errors: &[String], warnings: &[String]) {
    for e in errors {
        println!("[error] {e}");
    }
    for w in warnings {
        println!("[warning] {w}");
    }
}

fn plan_structure(root: &Path, file: &str, json: bool) -> anyhow::Result<()> {
    let report = verify::verify_plan_structure(root, file)
        .with_context(|| format!("failed to verify {file}"))?;
    if json {
        return print_json(&report);
    }
    println!(
        "{}: {} task(s), {}",
        file,
        report.task_count,
        if report.valid { "valid" } else { "invalid" }
    );
    print_findings(&report.errors, &report.warnings);
    Ok(())
}

fn phase_completeness(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let report = verify::verify_phase_completeness(root, id)
        .with_context(|| format!("failed to verify phase '{id}'"))?;
    if json {
        return print_json(&report);
    }
    println!(
        "Phase {}: {}/{} plans summarized",
        report.phase,
        report.plan_count.saturating_sub(report.incomplete_plans.len()),
        report.plan_count
    );
    print_findings(&report.errors, &report.warnings);
    Ok(())
}
