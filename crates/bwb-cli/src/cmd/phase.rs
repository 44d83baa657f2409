use crate::output::{or_dash, print_json, print_table, print_value};
use anyhow::Context;
use bwb_core::{evidence::ArtifactKind, phase, roadmap};
use clap::{Subcommand, ValueEnum};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PhaseSubcommand {
    /// Append a new integer phase to the roadmap and create its directory
    Add {
        /// Phase description, used as its name and slug
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },

    /// Tick the roadmap checkbox and move the status document to the next phase
    Complete {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },
}

#[derive(Subcommand)]
pub enum PhasesSubcommand {
    /// List phase directories, or artifact files of one type
    List {
        #[arg(long = "type", value_enum)]
        kind: Option<ListKind>,
        /// Restrict artifact listing to one phase
        #[arg(long)]
        phase: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ListKind {
    Plans,
    Summaries,
}

impl From<ListKind> for ArtifactKind {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Plans => ArtifactKind::Plan,
            ListKind::Summaries => ArtifactKind::Summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: PhaseSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PhaseSubcommand::Add { description } => add(root, &description.join(" "), json),
        PhaseSubcommand::Complete { phase } => complete(root, &phase, json),
    }
}

pub fn run_list(root: &Path, subcmd: PhasesSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PhasesSubcommand::List { kind, phase } => list(root, kind, phase.as_deref(), json),
    }
}

// ---------------------------------------------------------------------------
// add / complete
// ---------------------------------------------------------------------------

fn add(root: &Path, description: &str, json: bool) -> anyhow::Result<()> {
    let added = roadmap::add_phase(root, description).context("failed to add phase")?;
    tracing::debug!(directory = %added.directory, "phase added");
    if json {
        return print_json(&added);
    }
    println!("Added phase {}: {}", added.padded, added.name);
    println!("Directory: {}", added.directory);
    Ok(())
}

fn complete(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let done = roadmap::complete_phase(root, id, today)
        .with_context(|| format!("failed to complete phase '{id}'"))?;
    if json {
        return print_json(&done);
    }
    println!("Phase {} complete ({})", done.completed_phase, done.date);
    match (&done.next_phase, &done.next_phase_name) {
        (Some(n), Some(name)) => println!("Next: Phase {n} ({name})"),
        (Some(n), None) => println!("Next: Phase {n}"),
        _ => println!("That was the last phase."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(
    root: &Path,
    kind: Option<ListKind>,
    phase_id: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(kind) = kind {
        let files = phase::list_artifacts(root, kind.into(), phase_id);
        if json {
            return print_json(&serde_json::json!({ "files": files, "count": files.len() }));
        }
        for f in &files {
            println!("{f}");
        }
        return Ok(());
    }

    let phases = phase::list_phases(root);
    if json {
        return print_json(&serde_json::json!({ "phases": phases, "count": phases.len() }));
    }
    if phases.is_empty() {
        println!("No phases.");
        return Ok(());
    }
    let rows = phases
        .iter()
        .map(|p| {
            vec![
                p.number.clone(),
                or_dash(p.display_name().as_deref()),
                p.dir_name.clone(),
            ]
        })
        .collect();
    print_table(&["NUMBER", "NAME", "DIRECTORY"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// find-phase / phase-plan-index
// ---------------------------------------------------------------------------

pub fn find(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    match phase::resolve(root, id) {
        Some(found) => {
            if json {
                #[derive(serde::Serialize)]
                struct Found<'a> {
                    found: bool,
                    #[serde(flatten)]
                    phase: &'a phase::PhaseDescriptor,
                }
                return print_json(&Found {
                    found: true,
                    phase: &found,
                });
            }
            println!("{}", found.directory);
            Ok(())
        }
        None => print_value(
            json,
            &serde_json::json!({ "found": false, "directory": null }),
            "",
        ),
    }
}

pub fn plan_index(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let index = phase::plan_index(root, id)
        .with_context(|| format!("failed to index plans of phase '{id}'"))?;
    if json {
        return print_json(&index);
    }
    let rows = index
        .plans
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.wave.to_string(),
                p.task_count.to_string(),
                if p.has_summary { "yes" } else { "no" }.to_string(),
                or_dash(p.objective.as_deref()),
            ]
        })
        .collect();
    print_table(&["PLAN", "WAVE", "TASKS", "DONE", "OBJECTIVE"], rows);
    Ok(())
}
