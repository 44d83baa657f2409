//! `.planning/ROADMAP.md`: one `### Phase N: Name` section per phase.

use crate::error::{BwbError, Result};
use crate::fields;
use crate::paths;
use crate::phase::{self, PhaseNumber};
use crate::state;
use crate::status::{self, PhaseProgress, PhaseStatus, Progress};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

static PHASE_HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn phase_heading_re() -> &'static Regex {
    PHASE_HEADING_RE.get_or_init(|| {
        Regex::new(r"(?m)^#{2,4}\s*Phase\s+(\d+(?:\.\d+)?)\s*:\s*([^\n]+?)\s*$").unwrap()
    })
}

/// Regex fragment matching `n` with or without zero padding, not followed
/// by more digits or a fractional part.
fn number_pattern(n: PhaseNumber) -> String {
    let mut p = format!("0*{}", n.major);
    if let Some(minor) = n.minor {
        p.push_str(&format!(r"\.{minor}"));
    }
    p.push_str(r"(?:[^\d.].*)?");
    p
}

fn checkbox_re(n: PhaseNumber) -> Option<Regex> {
    Regex::new(&format!(
        r"(?m)^([ \t]*-[ \t]*\[)([xX ])(\][ \t]*.*?Phase[ \t]+{})$",
        number_pattern(n)
    ))
    .ok()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadmapPhase {
    pub number: String,
    pub name: String,
    pub goal: Option<String>,
    pub depends_on: Option<String>,
    pub section: String,
}

/// Phase sections in document order.
pub fn phases(text: &str) -> Vec<RoadmapPhase> {
    let headings: Vec<_> = phase_heading_re().captures_iter(text).collect();
    headings
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let start = caps.get(0).map_or(0, |m| m.start());
            let end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let section = text[start..end].trim_end().to_string();
            RoadmapPhase {
                number: caps[1].to_string(),
                name: caps[2].to_string(),
                goal: fields::extract_field(&section, "Goal"),
                depends_on: fields::extract_field(&section, "Depends on"),
                section,
            }
        })
        .collect()
}

pub fn find_phase(text: &str, id: &str) -> Option<RoadmapPhase> {
    let wanted = PhaseNumber::parse_prefix(id)?;
    phases(text)
        .into_iter()
        .find(|p| PhaseNumber::parse_prefix(&p.number) == Some(wanted))
}

/// Checklist state for a phase: `Some(true)` for `- [x] ... Phase N`.
pub fn checkbox(text: &str, id: &str) -> Option<bool> {
    let re = checkbox_re(PhaseNumber::parse_prefix(id)?)?;
    re.captures(text).map(|c| !c[2].trim().is_empty())
}

pub fn read(root: &Path) -> Result<String> {
    crate::io::read_optional(&paths::roadmap_path(root))
        .ok_or_else(|| BwbError::DocumentNotFound(paths::ROADMAP_FILE.to_string()))
}

pub fn get_phase(root: &Path, id: &str) -> Result<Option<RoadmapPhase>> {
    Ok(find_phase(&read(root)?, id))
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseAnalysis {
    pub number: String,
    pub name: String,
    pub goal: Option<String>,
    pub depends_on: Option<String>,
    pub directory: Option<String>,
    pub plan_count: usize,
    pub summary_count: usize,
    pub has_research: bool,
    pub has_context: bool,
    pub has_contracts: bool,
    pub disk_status: PhaseStatus,
    pub roadmap_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadmapAnalysis {
    pub phases: Vec<PhaseAnalysis>,
    pub phase_count: usize,
    #[serde(flatten)]
    pub progress: Progress,
}

/// Every roadmap phase joined with its directory evidence, plus the
/// aggregate in roadmap order.
pub fn analyze(root: &Path) -> Result<RoadmapAnalysis> {
    let text = read(root)?;
    let mut rows = Vec::new();
    let mut progress = Vec::new();

    for rp in phases(&text) {
        let disk = phase::resolve(root, &rp.number);
        let ev = disk.as_ref().map(|d| &d.evidence);
        progress.push(PhaseProgress::new(
            rp.number.clone(),
            Some(rp.name.clone()),
            ev,
        ));
        rows.push(PhaseAnalysis {
            disk_status: status::classify_dir(ev),
            roadmap_complete: checkbox(&text, &rp.number).unwrap_or(false),
            directory: disk.as_ref().map(|d| d.directory.clone()),
            plan_count: ev.map_or(0, |e| e.plan_count()),
            summary_count: ev.map_or(0, |e| e.summary_count()),
            has_research: ev.is_some_and(|e| e.has_research),
            has_context: ev.is_some_and(|e| e.has_context),
            has_contracts: ev.is_some_and(|e| e.has_contracts),
            number: rp.number,
            name: rp.name,
            goal: rp.goal,
            depends_on: rp.depends_on,
        });
    }

    Ok(RoadmapAnalysis {
        phase_count: rows.len(),
        phases: rows,
        progress: status::aggregate(&progress),
    })
}

// ---------------------------------------------------------------------------
// Phase add
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedPhase {
    pub phase_number: u64,
    pub padded: String,
    pub name: String,
    pub slug: String,
    pub directory: String,
}

fn phase_entry(number: u64, description: &str, previous: u64) -> String {
    let depends = if previous == 0 {
        "Nothing (first phase)".to_string()
    } else {
        format!("Phase {previous}")
    };
    format!(
        "\n### Phase {number}: {description}\n\n\
         **Goal:** [To be planned]\n\
         **Depends on:** {depends}\n\
         **Contracts:** TBD\n\
         **Plans:** 0 plans\n\n\
         Plans:\n\
         - [ ] TBD (run /bwb:plan {number} to break down)\n"
    )
}

/// Insert before the final `---` separator, or append.
fn insert_entry(text: &str, entry: &str) -> String {
    match text.rfind("\n---") {
        Some(idx) => format!("{}{}{}", &text[..idx], entry, &text[idx..]),
        None => format!("{}\n{}", text.trim_end_matches('\n'), entry),
    }
}

/// Append an integer phase after the highest existing one and create its
/// directory.
pub fn add_phase(root: &Path, description: &str) -> Result<AddedPhase> {
    let description = description.trim();
    if description.is_empty() {
        return Err(BwbError::MissingArgument("description"));
    }
    let text = read(root)?;
    let highest = phases(&text)
        .iter()
        .filter_map(|p| PhaseNumber::parse_prefix(&p.number))
        .map(|n| n.major)
        .max()
        .unwrap_or(0);
    let number = highest + 1;
    let padded = format!("{number:02}");
    let slug = paths::slugify(description);
    let dir_name = if slug.is_empty() {
        padded.clone()
    } else {
        format!("{padded}-{slug}")
    };

    crate::io::ensure_dir(&paths::phase_dir(root, &dir_name))?;
    let next = insert_entry(&text, &phase_entry(number, description, highest));
    crate::io::atomic_write(&paths::roadmap_path(root), next.as_bytes())?;
    tracing::debug!(phase = number, dir = %dir_name, "phase added");

    Ok(AddedPhase {
        phase_number: number,
        padded,
        name: description.to_string(),
        slug,
        directory: paths::phase_dir_relative(&dir_name),
    })
}

// ---------------------------------------------------------------------------
// Phase complete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedPhase {
    pub completed_phase: String,
    pub phase_name: Option<String>,
    pub plans_executed: String,
    pub next_phase: Option<String>,
    pub next_phase_name: Option<String>,
    pub is_last_phase: bool,
    pub date: String,
    pub roadmap_updated: bool,
    pub state_updated: bool,
}

/// Tick the first unchecked checklist line for the phase.
pub fn tick_checkbox(text: &str, id: &str, date: &str) -> Option<String> {
    let re = checkbox_re(PhaseNumber::parse_prefix(id)?)?;
    let caps = re.captures_iter(text).find(|c| c[2].trim().is_empty())?;
    let whole = caps.get(0)?;
    Some(format!(
        "{}{}x{} (completed {date}){}",
        &text[..whole.start()],
        &caps[1],
        &caps[3],
        &text[whole.end()..]
    ))
}

pub fn complete_phase(root: &Path, id: &str, today: NaiveDate) -> Result<CompletedPhase> {
    let done = phase::require(root, id)?;
    let date = today.to_string();

    let mut roadmap_updated = false;
    if let Some(text) = crate::io::read_optional(&paths::roadmap_path(root)) {
        if let Some(next) = tick_checkbox(&text, &done.phase_number, &date) {
            crate::io::atomic_write(&paths::roadmap_path(root), next.as_bytes())?;
            roadmap_updated = true;
        }
    }

    let next = phase::next_phase_after(root, &done.phase_number);
    let next_name = next.as_ref().and_then(|n| n.display_name());

    let mut state_updated = false;
    if let Ok(text) = state::read(root) {
        let current = next
            .as_ref()
            .map_or(done.phase_number.as_str(), |n| n.number.as_str());
        let (status_text, step) = if next.is_some() {
            ("Ready to research", "research")
        } else {
            ("Project complete", "complete")
        };
        let (patched, outcome) = state::patch_text(
            &text,
            &[
                ("Current Phase", current),
                ("Current Phase Name", next_name.as_deref().unwrap_or("")),
                ("Status", status_text),
                ("Step", step),
                ("Current Plan", "Not started"),
                ("Last Activity", date.as_str()),
            ],
        );
        if !outcome.updated.is_empty() {
            state::write(root, &patched)?;
            state_updated = true;
        }
    }

    Ok(CompletedPhase {
        plans_executed: format!(
            "{}/{}",
            done.evidence.summary_count(),
            done.evidence.plan_count()
        ),
        completed_phase: done.phase_number,
        phase_name: done.phase_name,
        is_last_phase: next.is_none(),
        next_phase: next.map(|n| n.number),
        next_phase_name: next_name,
        date,
        roadmap_updated,
        state_updated,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
