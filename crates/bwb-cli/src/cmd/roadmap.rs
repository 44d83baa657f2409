use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use bwb_core::{roadmap, status};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum RoadmapSubcommand {
    /// Show one phase section of the roadmap
    GetPhase {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },

    /// Every roadmap phase with its on-disk status, plus overall progress
    Analyze,
}

pub fn run(root: &Path, subcmd: RoadmapSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RoadmapSubcommand::GetPhase { phase } => get_phase(root, &phase, json),
        RoadmapSubcommand::Analyze => analyze(root, json),
    }
}

fn get_phase(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let found = roadmap::get_phase(root, id).context("failed to read roadmap")?;
    if json {
        let value = match &found {
            Some(p) => serde_json::json!({
                "found": true,
                "phase_number": p.number,
                "phase_name": p.name,
                "goal": p.goal,
                "depends_on": p.depends_on,
                "section": p.section,
            }),
            None => serde_json::json!({ "found": false, "phase_number": id }),
        };
        return print_json(&value);
    }
    match found {
        Some(p) => println!("{}", p.section.trim_end()),
        None => println!("Phase {id} not in roadmap."),
    }
    Ok(())
}

fn analyze(root: &Path, json: bool) -> anyhow::Result<()> {
    let analysis = roadmap::analyze(root).context("failed to analyze roadmap")?;
    if json {
        return print_json(&analysis);
    }
    let rows = analysis
        .phases
        .iter()
        .map(|p| {
            vec![
                p.number.clone(),
                p.name.clone(),
                p.disk_status.to_string(),
                format!("{}/{}", p.summary_count, p.plan_count),
                if p.roadmap_complete { "x" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["PHASE", "NAME", "STATUS", "PLANS", "DONE"], rows);
    let progress = &analysis.progress;
    println!();
    println!("{}", status::progress_bar(progress.progress_percent));
    println!(
        "Current: {}  Next: {}",
        or_dash(progress.current_phase.as_deref()),
        or_dash(progress.next_phase.as_deref())
    );
    Ok(())
}
