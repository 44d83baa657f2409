//! Operations on the status document, `.planning/STATE.md`.
//!
//! Everything here is a field or section patch over the prose; the document
//! has no metadata block.

use crate::error::{BwbError, Result};
use crate::fields::{self, BLOCKERS_SECTION, DECISIONS_SECTION};
use crate::paths;
use crate::phase;
use crate::status;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

pub const STATUS_READY_TO_EXECUTE: &str = "Ready to execute";
pub const STATUS_READY_FOR_VALIDATION: &str = "Phase complete — ready for validation";

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn read(root: &Path) -> Result<String> {
    crate::io::read_optional(&paths::state_path(root))
        .ok_or_else(|| BwbError::DocumentNotFound(paths::STATE_FILE.to_string()))
}

pub fn write(root: &Path, text: &str) -> Result<()> {
    crate::io::atomic_write(&paths::state_path(root), text.as_bytes())
}

/// Field value, or the trimmed body of a `##` section of that name.
pub fn get(text: &str, key: &str) -> Result<String> {
    if let Some(v) = fields::extract_field(text, key) {
        return Ok(v);
    }
    fields::section_body_literal(text, key)
        .map(|b| b.trim().to_string())
        .ok_or_else(|| BwbError::SectionNotFound {
            section: key.to_string(),
            document: paths::STATE_FILE.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Field updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

/// Apply `(label, value)` rewrites in order. Missing labels are reported,
/// not fatal.
pub fn patch_text(text: &str, updates: &[(&str, &str)]) -> (String, PatchOutcome) {
    let mut out = text.to_string();
    let mut outcome = PatchOutcome::default();
    for (label, value) in updates {
        match fields::replace_field(&out, label, value) {
            Some(next) => {
                out = next;
                outcome.updated.push(label.to_string());
            }
            None => outcome.failed.push(label.to_string()),
        }
    }
    (out, outcome)
}

pub fn patch(root: &Path, updates: &[(&str, &str)]) -> Result<PatchOutcome> {
    let text = read(root)?;
    let (next, outcome) = patch_text(&text, updates);
    if !outcome.updated.is_empty() {
        write(root, &next)?;
    }
    Ok(outcome)
}

pub fn update(root: &Path, label: &str, value: &str) -> Result<bool> {
    Ok(!patch(root, &[(label, value)])?.updated.is_empty())
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn numeric_field(text: &str, label: &str) -> Result<u32> {
    fields::extract_field(text, label)
        .as_deref()
        .and_then(leading_number)
        .ok_or_else(|| BwbError::InvalidField {
            field: label.to_string(),
            document: paths::STATE_FILE.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Plan advancement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub advanced: bool,
    pub previous_plan: u32,
    pub current_plan: u32,
    pub total_plans: u32,
    pub status: String,
}

pub fn advance_plan_text(text: &str, today: NaiveDate) -> Result<(String, AdvanceOutcome)> {
    let current = numeric_field(text, "Current Plan")?;
    let total = numeric_field(text, "Total Plans in Phase")?;
    let today = today.to_string();

    let (next_plan, status) = if current >= total {
        (current, STATUS_READY_FOR_VALIDATION)
    } else {
        (current + 1, STATUS_READY_TO_EXECUTE)
    };
    let mut out = text.to_string();
    if next_plan != current {
        out = fields::replace_field(&out, "Current Plan", &next_plan.to_string()).unwrap_or(out);
    }
    let (out, _) = patch_text(&out, &[("Status", status), ("Last Activity", today.as_str())]);

    Ok((
        out,
        AdvanceOutcome {
            advanced: next_plan != current,
            previous_plan: current,
            current_plan: next_plan,
            total_plans: total,
            status: status.to_string(),
        },
    ))
}

pub fn advance_plan(root: &Path, today: NaiveDate) -> Result<AdvanceOutcome> {
    let text = read(root)?;
    let (next, outcome) = advance_plan_text(&text, today)?;
    write(root, &next)?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Performance metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub phase: String,
    pub plan: String,
    pub duration: String,
    pub tasks: Option<String>,
    pub files: Option<String>,
}

impl Metric {
    pub fn row(&self) -> String {
        format!(
            "| Phase {} P{} | {} | {} tasks | {} files |",
            self.phase,
            self.plan,
            self.duration,
            self.tasks.as_deref().unwrap_or("-"),
            self.files.as_deref().unwrap_or("-"),
        )
    }
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Add `row` after the last data row of the first table in `body`, dropping
/// a `None yet` row. `None` when the body holds no table.
fn append_table_row(body: &str, row: &str) -> Option<String> {
    let lines: Vec<&str> = body.split_inclusive('\n').collect();
    let sep = lines.iter().position(|l| is_separator_row(l))?;
    if sep == 0 || !lines[sep - 1].trim().starts_with('|') {
        return None;
    }
    let rows_end = lines[sep + 1..]
        .iter()
        .position(|l| !l.trim().starts_with('|'))
        .map_or(lines.len(), |p| sep + 1 + p);

    let mut out = String::new();
    for l in &lines[..=sep] {
        out.push_str(l);
    }
    for l in &lines[sep + 1..rows_end] {
        if !l.to_lowercase().contains("none yet") {
            out.push_str(l);
            if !l.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out.push_str(row);
    out.push('\n');
    for l in &lines[rows_end..] {
        out.push_str(l);
    }
    Some(out)
}

pub fn record_metric_text(text: &str, metric: &Metric) -> Option<String> {
    let section = fields::find_section(text, "Performance Metrics")?;
    let body = append_table_row(&text[section.body.clone()], &metric.row())?;
    Some(format!(
        "{}{}{}",
        &text[..section.body.start],
        body,
        &text[section.body.end..]
    ))
}

/// `false` when the document has no metrics table.
pub fn record_metric(root: &Path, metric: &Metric) -> Result<bool> {
    let text = read(root)?;
    match record_metric_text(&text, metric) {
        Some(next) => {
            write(root, &next)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressOutcome {
    pub updated: bool,
    pub percent: u32,
    pub completed: usize,
    pub total: usize,
    pub bar: String,
}

/// Recompute progress over every phase directory and write the bar into
/// `**Progress:**`.
pub fn update_progress(root: &Path) -> Result<ProgressOutcome> {
    let text = read(root)?;
    let agg = status::aggregate(&phase::disk_progress(root));
    let bar = status::progress_bar(agg.progress_percent);
    let next = fields::replace_field(&text, "Progress", &bar);
    if let Some(next) = &next {
        write(root, next)?;
    }
    Ok(ProgressOutcome {
        updated: next.is_some(),
        percent: agg.progress_percent,
        completed: agg.total_summaries,
        total: agg.total_plans,
        bar,
    })
}

// ---------------------------------------------------------------------------
// Decisions and blockers
// ---------------------------------------------------------------------------

pub fn decision_line(phase: Option<&str>, summary: &str, rationale: Option<&str>) -> String {
    let mut line = format!("- [Phase {}]: {}", phase.unwrap_or("?"), summary);
    if let Some(r) = rationale.filter(|r| !r.is_empty()) {
        line.push_str(" — ");
        line.push_str(r);
    }
    line
}

fn rewrite(root: &Path, f: impl FnOnce(&str) -> Option<String>) -> Result<bool> {
    let text = read(root)?;
    match f(&text) {
        Some(next) => {
            write(root, &next)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `false` when the document has no decisions section.
pub fn add_decision(
    root: &Path,
    phase: Option<&str>,
    summary: &str,
    rationale: Option<&str>,
) -> Result<bool> {
    let line = decision_line(phase, summary, rationale);
    rewrite(root, |text| {
        fields::append_to_section(
            text,
            DECISIONS_SECTION,
            &line,
            fields::DECISION_PLACEHOLDERS,
        )
    })
}

pub fn add_blocker(root: &Path, text: &str) -> Result<bool> {
    let line = format!("- {text}");
    rewrite(root, |doc| {
        fields::append_to_section(doc, BLOCKERS_SECTION, &line, fields::BLOCKER_PLACEHOLDERS)
    })
}

pub fn resolve_blocker(root: &Path, fragment: &str) -> Result<bool> {
    rewrite(root, |doc| {
        fields::remove_from_section(
            doc,
            BLOCKERS_SECTION,
            fragment,
            fields::EMPTY_PLACEHOLDER,
        )
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub fn record_session_text(
    text: &str,
    now: DateTime<Utc>,
    stopped_at: Option<&str>,
    resume_file: Option<&str>,
) -> (String, Vec<String>) {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut out = text.to_string();
    let mut updated = Vec::new();

    let mut apply = |labels: &[&str], value: &str| {
        for label in labels {
            if let Some(next) = fields::replace_field(&out, label, value) {
                out = next;
                updated.push(label.to_string());
                return;
            }
        }
    };
    apply(&["Last session"], stamp.as_str());
    apply(&["Last Date"], stamp.as_str());
    if let Some(s) = stopped_at {
        apply(&["Stopped At"], s);
    }
    apply(&["Resume File"], resume_file.unwrap_or("None"));

    (out, updated)
}

pub fn record_session(
    root: &Path,
    now: DateTime<Utc>,
    stopped_at: Option<&str>,
    resume_file: Option<&str>,
) -> Result<Vec<String>> {
    let text = read(root)?;
    let (next, updated) = record_session_text(&text, now, stopped_at, resume_file);
    if !updated.is_empty() {
        write(root, &next)?;
    }
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

static DECISION_RE: OnceLock<Regex> = OnceLock::new();
static PERCENT_RE: OnceLock<Regex> = OnceLock::new();

fn decision_re() -> &'static Regex {
    DECISION_RE.get_or_init(|| {
        Regex::new(r"^\[Phase ([^\]]*)\]:\s*(.*?)(?:\s+—\s+(.*))?$").unwrap()
    })
}

fn percent_re() -> &'static Regex {
    PERCENT_RE.get_or_init(|| Regex::new(r"(\d+)%").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionEntry {
    /// `None` for bullets not written in the `[Phase N]: …` form.
    pub phase: Option<String>,
    pub summary: String,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub current_phase: Option<String>,
    pub current_phase_name: Option<String>,
    pub total_phases: Option<u32>,
    pub current_plan: Option<String>,
    pub total_plans_in_phase: Option<u32>,
    pub status: Option<String>,
    pub step: Option<String>,
    pub progress_percent: Option<u32>,
    pub last_activity: Option<String>,
    pub decisions: Vec<DecisionEntry>,
    pub blockers: Vec<String>,
}

pub fn snapshot(text: &str) -> StateSnapshot {
    let field = |label: &str| fields::extract_field(text, label);
    let decisions = fields::section_body(text, DECISIONS_SECTION)
        .map(fields::bullet_items)
        .unwrap_or_default()
        .iter()
        .map(|item| match decision_re().captures(item) {
            Some(caps) => DecisionEntry {
                phase: Some(caps[1].to_string()),
                summary: caps[2].to_string(),
                rationale: caps.get(3).map(|m| m.as_str().to_string()),
            },
            None => DecisionEntry {
                phase: None,
                summary: item.clone(),
                rationale: None,
            },
        })
        .collect();
    let blockers = fields::section_body(text, BLOCKERS_SECTION)
        .map(fields::bullet_items)
        .unwrap_or_default()
        .into_iter()
        .filter(|b| !b.trim_end_matches('.').eq_ignore_ascii_case("none"))
        .collect();

    StateSnapshot {
        current_phase: field("Current Phase"),
        current_phase_name: field("Current Phase Name"),
        total_phases: field("Total Phases").as_deref().and_then(leading_number),
        current_plan: field("Current Plan"),
        total_plans_in_phase: field("Total Plans in Phase")
            .as_deref()
            .and_then(leading_number),
        status: field("Status"),
        step: field("Step"),
        progress_percent: field("Progress")
            .and_then(|p| percent_re().captures(&p).and_then(|c| c[1].parse().ok())),
        last_activity: field("Last Activity"),
        decisions,
        blockers,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
