use crate::output::{print_json, print_value};
use anyhow::Context;
use bwb_core::{
    config::Config,
    paths,
    state::{self, Metric},
};
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Show config, the raw status document and which planning files exist
    Load,

    /// Print the whole status document, one field, or one `##` section
    Get {
        /// Field label or section heading
        section: Option<String>,
    },

    /// Rewrite a single `**Field:**` value
    Update { field: String, value: String },

    /// Rewrite several fields at once: `--status Done --current-plan 2`
    Patch {
        /// Alternating `--field value` pairs; dashes in field names become spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
        pairs: Vec<String>,
    },

    /// Move to the next plan, or mark the phase ready for validation
    AdvancePlan,

    /// Append a row to the Performance Metrics table
    RecordMetric {
        #[arg(long)]
        phase: String,
        #[arg(long)]
        plan: String,
        #[arg(long)]
        duration: String,
        #[arg(long)]
        tasks: Option<String>,
        #[arg(long)]
        files: Option<String>,
    },

    /// Recompute progress from phase directories and write the bar
    UpdateProgress,

    /// Append an entry to the decisions section
    AddDecision {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        phase: Option<String>,
        #[arg(long)]
        rationale: Option<String>,
    },

    /// Append an entry to the blockers section
    AddBlocker {
        #[arg(long)]
        text: String,
    },

    /// Remove blockers containing the given text
    ResolveBlocker {
        #[arg(long)]
        text: String,
    },

    /// Stamp the session fields
    RecordSession {
        #[arg(long)]
        stopped_at: Option<String>,
        #[arg(long)]
        resume_file: Option<String>,
    },

    /// Structured view of the status document
    Snapshot,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: StateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StateSubcommand::Load => load(root, json),
        StateSubcommand::Get { section } => get(root, section.as_deref(), json),
        StateSubcommand::Update { field, value } => update(root, &field, &value, json),
        StateSubcommand::Patch { pairs } => patch(root, &pairs, json),
        StateSubcommand::AdvancePlan => advance_plan(root, json),
        StateSubcommand::RecordMetric {
            phase,
            plan,
            duration,
            tasks,
            files,
        } => record_metric(
            root,
            Metric {
                phase,
                plan,
                duration,
                tasks,
                files,
            },
            json,
        ),
        StateSubcommand::UpdateProgress => update_progress(root, json),
        StateSubcommand::AddDecision {
            summary,
            phase,
            rationale,
        } => add_decision(root, phase.as_deref(), &summary, rationale.as_deref(), json),
        StateSubcommand::AddBlocker { text } => add_blocker(root, &text, json),
        StateSubcommand::ResolveBlocker { text } => resolve_blocker(root, &text, json),
        StateSubcommand::RecordSession {
            stopped_at,
            resume_file,
        } => record_session(root, stopped_at.as_deref(), resume_file.as_deref(), json),
        StateSubcommand::Snapshot => snapshot(root, json),
    }
}

// ---------------------------------------------------------------------------
// load / get
// ---------------------------------------------------------------------------

fn load(root: &Path, json: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct StateLoad {
        config: Config,
        state_raw: Option<String>,
        state_exists: bool,
        roadmap_exists: bool,
        config_exists: bool,
    }

    let config = Config::load_or_default(root);
    let state_raw = state::read(root).ok();
    let out = StateLoad {
        config,
        state_exists: state_raw.is_some(),
        state_raw,
        roadmap_exists: paths::exists(root, paths::ROADMAP_FILE),
        config_exists: paths::exists(root, paths::CONFIG_FILE),
    };

    if json {
        return print_json(&out);
    }
    println!("model_profile={}", out.config.model_profile);
    println!("commit_docs={}", out.config.commit_docs);
    println!("state_exists={}", out.state_exists);
    println!("roadmap_exists={}", out.roadmap_exists);
    println!("config_exists={}", out.config_exists);
    Ok(())
}

fn get(root: &Path, section: Option<&str>, json: bool) -> anyhow::Result<()> {
    let text = state::read(root).context("failed to read status document")?;
    let Some(key) = section else {
        return print_value(json, &serde_json::json!({ "content": text }), text.trim_end());
    };
    let value = state::get(&text, key)?;
    print_value(json, &serde_json::json!({ key: value }), &value)
}

// ---------------------------------------------------------------------------
// Field updates
// ---------------------------------------------------------------------------

fn update(root: &Path, field: &str, value: &str, json: bool) -> anyhow::Result<()> {
    let updated = state::update(root, field, value)
        .with_context(|| format!("failed to update '{field}'"))?;
    let out = if updated {
        serde_json::json!({ "updated": true })
    } else {
        serde_json::json!({ "updated": false, "reason": format!("field '{field}' not found") })
    };
    print_value(json, &out, updated)
}

/// `--current-plan 2 --status Done` → `[("Current Plan", "2"), ("Status", "Done")]`.
fn parse_pairs(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut iter = pairs.iter();
    while let Some(flag) = iter.next() {
        let name = flag
            .strip_prefix("--")
            .with_context(|| format!("expected --field, got '{flag}'"))?;
        let value = iter
            .next()
            .with_context(|| format!("missing value for --{name}"))?;
        out.push((field_label(name), value.clone()));
    }
    Ok(out)
}

/// `current-plan` → `Current Plan`.
fn field_label(flag: &str) -> String {
    flag.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn patch(root: &Path, pairs: &[String], json: bool) -> anyhow::Result<()> {
    let updates = parse_pairs(pairs)?;
    let borrowed: Vec<(&str, &str)> = updates
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let outcome = state::patch(root, &borrowed).context("failed to patch status document")?;
    if json {
        return print_json(&outcome);
    }
    for label in &outcome.updated {
        println!("updated: {label}");
    }
    for label in &outcome.failed {
        println!("not found: {label}");
    }
    Ok(())
}

fn advance_plan(root: &Path, json: bool) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let outcome = state::advance_plan(root, today).context("failed to advance plan")?;
    if json {
        return print_json(&outcome);
    }
    if outcome.advanced {
        println!(
            "Plan {} → {} of {}",
            outcome.previous_plan, outcome.current_plan, outcome.total_plans
        );
    } else {
        println!("{}", outcome.status);
    }
    Ok(())
}

fn record_metric(root: &Path, metric: Metric, json: bool) -> anyhow::Result<()> {
    let recorded = state::record_metric(root, &metric).context("failed to record metric")?;
    let out = if recorded {
        serde_json::json!({ "recorded": true, "phase": metric.phase, "plan": metric.plan, "duration": metric.duration })
    } else {
        serde_json::json!({ "recorded": false, "reason": "Performance Metrics table not found" })
    };
    print_value(json, &out, recorded)
}

fn update_progress(root: &Path, json: bool) -> anyhow::Result<()> {
    let outcome = state::update_progress(root).context("failed to update progress")?;
    print_value(json, &outcome, &outcome.bar)
}

// ---------------------------------------------------------------------------
// Decisions, blockers, session
// ---------------------------------------------------------------------------

fn add_decision(
    root: &Path,
    phase: Option<&str>,
    summary: &str,
    rationale: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let added = state::add_decision(root, phase, summary, rationale)
        .context("failed to add decision")?;
    let out = if added {
        serde_json::json!({ "added": true, "decision": state::decision_line(phase, summary, rationale) })
    } else {
        serde_json::json!({ "added": false, "reason": "Decisions section not found" })
    };
    print_value(json, &out, added)
}

fn add_blocker(root: &Path, text: &str, json: bool) -> anyhow::Result<()> {
    let added = state::add_blocker(root, text).context("failed to add blocker")?;
    let out = if added {
        serde_json::json!({ "added": true, "blocker": text })
    } else {
        serde_json::json!({ "added": false, "reason": "Blockers section not found" })
    };
    print_value(json, &out, added)
}

fn resolve_blocker(root: &Path, text: &str, json: bool) -> anyhow::Result<()> {
    let resolved = state::resolve_blocker(root, text).context("failed to resolve blocker")?;
    let out = if resolved {
        serde_json::json!({ "resolved": true, "blocker": text })
    } else {
        serde_json::json!({ "resolved": false, "reason": "Blockers section not found" })
    };
    print_value(json, &out, resolved)
}

fn record_session(
    root: &Path,
    stopped_at: Option<&str>,
    resume_file: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let updated = state::record_session(root, chrono::Utc::now(), stopped_at, resume_file)
        .context("failed to record session")?;
    let recorded = !updated.is_empty();
    let out = serde_json::json!({ "recorded": recorded, "updated": updated });
    print_value(json, &out, recorded)
}

fn snapshot(root: &Path, json: bool) -> anyhow::Result<()> {
    let text = state::read(root).context("failed to read status document")?;
    let snap = state::snapshot(&text);
    if json {
        return print_json(&snap);
    }
    let phase = match (&snap.current_phase, &snap.current_phase_name) {
        (Some(n), Some(name)) => format!("{n} ({name})"),
        (Some(n), None) => n.clone(),
        _ => "-".to_string(),
    };
    println!("Phase:    {phase}");
    println!(
        "Plan:     {} of {}",
        snap.current_plan.as_deref().unwrap_or("-"),
        snap.total_plans_in_phase
            .map_or_else(|| "-".to_string(), |n| n.to_string())
    );
    println!("Status:   {}", snap.status.as_deref().unwrap_or("-"));
    if let Some(p) = snap.progress_percent {
        println!("Progress: {p}%");
    }
    println!("Decisions: {}  Blockers: {}", snap.decisions.len(), snap.blockers.len());
    Ok(())
}
