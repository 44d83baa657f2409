//! Phase lifecycle inference.
//!
//! Status is never stored: it is a total function of a phase's [`Evidence`].

use crate::evidence::Evidence;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

/// Declaration order is the precedence order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    NoDirectory,
    Empty,
    Researched,
    Discussed,
    Contracted,
    Planned,
    Partial,
    Complete,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::NoDirectory => "no_directory",
            PhaseStatus::Empty => "empty",
            PhaseStatus::Researched => "researched",
            PhaseStatus::Discussed => "discussed",
            PhaseStatus::Contracted => "contracted",
            PhaseStatus::Planned => "planned",
            PhaseStatus::Partial => "partial",
            PhaseStatus::Complete => "complete",
        }
    }

    /// Work has started but not finished.
    pub fn is_current(self) -> bool {
        matches!(self, PhaseStatus::Planned | PhaseStatus::Partial)
    }

    /// Nothing has been planned yet.
    pub fn is_upcoming(self) -> bool {
        matches!(
            self,
            PhaseStatus::NoDirectory
                | PhaseStatus::Empty
                | PhaseStatus::Researched
                | PhaseStatus::Discussed
                | PhaseStatus::Contracted
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(ev: &Evidence) -> PhaseStatus {
    let plans = ev.plan_count();
    let summaries = ev.summary_count();
    if plans > 0 && summaries >= plans {
        PhaseStatus::Complete
    } else if summaries > 0 {
        PhaseStatus::Partial
    } else if plans > 0 {
        PhaseStatus::Planned
    } else if ev.has_contracts {
        PhaseStatus::Contracted
    } else if ev.has_context {
        PhaseStatus::Discussed
    } else if ev.has_research {
        PhaseStatus::Researched
    } else {
        PhaseStatus::Empty
    }
}

/// `None` stands for a phase without a directory.
pub fn classify_dir(ev: Option<&Evidence>) -> PhaseStatus {
    ev.map(classify).unwrap_or(PhaseStatus::NoDirectory)
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// The next workflow command a phase is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Research,
    Discuss,
    Contracts,
    Plan,
    Build,
    Prepare,
    Validate,
    Complete,
}

impl WorkflowStep {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::Research => "research",
            WorkflowStep::Discuss => "discuss",
            WorkflowStep::Contracts => "contracts",
            WorkflowStep::Plan => "plan",
            WorkflowStep::Build => "build",
            WorkflowStep::Prepare => "prepare",
            WorkflowStep::Validate => "validate",
            WorkflowStep::Complete => "complete",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn workflow_step(ev: &Evidence) -> WorkflowStep {
    let plans = ev.plan_count();
    let built = plans > 0 && ev.summary_count() >= plans;
    if ev.has_validation {
        WorkflowStep::Complete
    } else if ev.has_preparation && built {
        WorkflowStep::Validate
    } else if built {
        WorkflowStep::Prepare
    } else if plans > 0 {
        WorkflowStep::Build
    } else if ev.has_contracts {
        WorkflowStep::Plan
    } else if ev.has_context {
        WorkflowStep::Contracts
    } else if ev.has_research {
        WorkflowStep::Discuss
    } else {
        WorkflowStep::Research
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub number: String,
    pub name: Option<String>,
    pub status: PhaseStatus,
    pub plans: usize,
    pub summaries: usize,
}

impl PhaseProgress {
    pub fn new(number: impl Into<String>, name: Option<String>, ev: Option<&Evidence>) -> Self {
        Self {
            number: number.into(),
            name,
            status: classify_dir(ev),
            plans: ev.map_or(0, Evidence::plan_count),
            summaries: ev.map_or(0, Evidence::summary_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub progress_percent: u32,
    pub total_plans: usize,
    pub total_summaries: usize,
    pub completed_phases: usize,
    pub current_phase: Option<String>,
    pub next_phase: Option<String>,
}

/// Fold phases, in document order, into overall progress. Current and next
/// phase are first matches, not best matches.
pub fn aggregate(phases: &[PhaseProgress]) -> Progress {
    let total_plans: usize = phases.iter().map(|p| p.plans).sum();
    let total_summaries: usize = phases.iter().map(|p| p.summaries).sum();
    Progress {
        progress_percent: percent(total_summaries, total_plans),
        total_plans,
        total_summaries,
        completed_phases: phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Complete)
            .count(),
        current_phase: phases
            .iter()
            .find(|p| p.status.is_current())
            .map(|p| p.number.clone()),
        next_phase: phases
            .iter()
            .find(|p| p.status.is_upcoming())
            .map(|p| p.number.clone()),
    }
}

/// `round(100 * done / total)`, 0 for no work. Orphan summaries can push it
/// past 100.
pub fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * done as f64 / total as f64).round() as u32
}

/// Ten-cell bar, e.g. `[████░░░░░░] 40%`. The bar fills at 100 while the
/// label keeps the real figure.
pub fn progress_bar(percent: u32) -> String {
    let filled = ((percent.min(100) as f64) / 10.0).round() as usize;
    format!(
        "[{}{}] {}%",
        "█".repeat(filled),
        "░".repeat(10 - filled),
        percent
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
