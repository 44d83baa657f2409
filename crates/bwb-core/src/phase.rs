//! Phase identifiers, directory resolution and per-phase indexes.

use crate::error::{BwbError, Result};
use crate::evidence::{ArtifactKind, Evidence};
use crate::frontmatter::{self, Mapping};
use crate::paths;
use crate::status::{self, PhaseProgress, PhaseStatus, WorkflowStep};
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// PhaseNumber
// ---------------------------------------------------------------------------

static PHASE_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static DIR_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn phase_prefix_re() -> &'static Regex {
    PHASE_PREFIX_RE.get_or_init(|| Regex::new(r"^(\d+)(?:\.(\d+))?").unwrap())
}

fn dir_name_re() -> &'static Regex {
    DIR_NAME_RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)-?(.*)$").unwrap())
}

/// Numeric phase identity, ordered `3 < 3.1 < 3.2 < 3.10 < 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhaseNumber {
    pub major: u64,
    pub minor: Option<u64>,
}

impl PhaseNumber {
    /// Parse the leading `digits(.digits)?` of `s`.
    pub fn parse_prefix(s: &str) -> Option<PhaseNumber> {
        let caps = phase_prefix_re().captures(s.trim())?;
        let major = caps[1].parse().ok()?;
        let minor = match caps.get(2) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        Some(PhaseNumber { major, minor })
    }

    pub fn is_integer(&self) -> bool {
        self.minor.is_none()
    }
}

impl fmt::Display for PhaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{:02}.{minor}", self.major),
            None => write!(f, "{:02}", self.major),
        }
    }
}

/// Zero-pad the integer part of a phase identifier to two digits, keeping
/// any fractional part as written: `3` → `03`, `3.1` → `03.1`.
pub fn normalize_phase(id: &str) -> Result<String> {
    let trimmed = id.trim();
    let caps = phase_prefix_re()
        .captures(trimmed)
        .ok_or_else(|| BwbError::InvalidPhaseNumber(id.to_string()))?;
    let major = &caps[1];
    let padded = if major.len() < 2 {
        format!("0{major}")
    } else {
        major.to_string()
    };
    Ok(match caps.get(2) {
        Some(minor) => format!("{padded}.{}", minor.as_str()),
        None => padded,
    })
}

fn unpad(normalized: &str) -> &str {
    let stripped = normalized.trim_start_matches('0');
    if stripped.is_empty() || stripped.starts_with('.') {
        // keep one digit: "00" → "0", "00.5" → "0.5"
        &normalized[normalized.len() - stripped.len() - 1..]
    } else {
        stripped
    }
}

// ---------------------------------------------------------------------------
// PhaseEntry
// ---------------------------------------------------------------------------

/// A phase directory's name split into number and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseEntry {
    #[serde(rename = "directory")]
    pub dir_name: String,
    pub number: String,
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl PhaseEntry {
    pub fn from_dir_name(dir_name: &str) -> Self {
        let (number, name) = match dir_name_re().captures(dir_name) {
            Some(caps) => {
                let name = caps[2].trim();
                (
                    caps[1].to_string(),
                    (!name.is_empty()).then(|| name.to_string()),
                )
            }
            None => (dir_name.to_string(), None),
        };
        let slug = name.as_deref().map(paths::slugify);
        PhaseEntry {
            dir_name: dir_name.to_string(),
            number,
            name,
            slug,
        }
    }

    pub fn phase_number(&self) -> Option<PhaseNumber> {
        PhaseNumber::parse_prefix(&self.number)
    }

    /// The name with dashes read as spaces.
    pub fn display_name(&self) -> Option<String> {
        self.name.as_ref().map(|n| n.replace('-', " "))
    }
}

fn numeric_order(a: &PhaseEntry, b: &PhaseEntry) -> Ordering {
    match (a.phase_number(), b.phase_number()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.dir_name.cmp(&b.dir_name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.dir_name.cmp(&b.dir_name),
    }
}

/// Every phase directory, in numeric order.
pub fn list_phases(root: &Path) -> Vec<PhaseEntry> {
    let mut entries: Vec<PhaseEntry> = crate::io::list_subdirs(&paths::phases_dir(root))
        .iter()
        .map(|d| PhaseEntry::from_dir_name(d))
        .collect();
    entries.sort_by(numeric_order);
    entries
}

/// First phase directory numerically greater than `number`.
pub fn next_phase_after(root: &Path, number: &str) -> Option<PhaseEntry> {
    let current = PhaseNumber::parse_prefix(number)?;
    list_phases(root)
        .into_iter()
        .find(|e| e.phase_number().is_some_and(|n| n > current))
}

/// Artifact filenames of `kind`, for one phase or across all phases.
pub fn list_artifacts(root: &Path, kind: ArtifactKind, phase: Option<&str>) -> Vec<String> {
    let dirs: Vec<String> = match phase {
        Some(id) => resolve(root, id).map(|d| vec![d.dir_name]).unwrap_or_default(),
        None => list_phases(root).into_iter().map(|e| e.dir_name).collect(),
    };
    dirs.iter()
        .flat_map(|d| crate::io::list_files(&paths::phase_dir(root, d)))
        .filter(|f| kind.matches(f))
        .collect()
}

// ---------------------------------------------------------------------------
// PhaseDescriptor
// ---------------------------------------------------------------------------

/// One phase, computed fresh from its directory on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDescriptor {
    pub directory: String,
    #[serde(skip)]
    pub dir_name: String,
    pub phase_number: String,
    pub phase_name: Option<String>,
    pub phase_slug: Option<String>,
    #[serde(flatten)]
    pub evidence: Evidence,
    pub incomplete_plans: Vec<String>,
}

impl PhaseDescriptor {
    pub fn path(&self, root: &Path) -> PathBuf {
        paths::phase_dir(root, &self.dir_name)
    }

    pub fn status(&self) -> PhaseStatus {
        status::classify(&self.evidence)
    }

    pub fn step(&self) -> WorkflowStep {
        status::workflow_step(&self.evidence)
    }

    pub fn artifact_path(&self, root: &Path, kind: ArtifactKind) -> Option<PathBuf> {
        let dir = self.path(root);
        crate::evidence::find_artifact(&dir, kind).map(|f| dir.join(f))
    }
}

/// Describe a phase directory by name.
pub fn describe(root: &Path, dir_name: &str) -> PhaseDescriptor {
    let entry = PhaseEntry::from_dir_name(dir_name);
    let evidence = Evidence::scan(&paths::phase_dir(root, dir_name));
    let incomplete_plans = evidence.incomplete_plans();
    PhaseDescriptor {
        directory: paths::phase_dir_relative(dir_name),
        dir_name: entry.dir_name,
        phase_number: entry.number,
        phase_name: entry.name,
        phase_slug: entry.slug,
        evidence,
        incomplete_plans,
    }
}

/// Map a phase identifier (`3`, `03`, `3.1`) to its directory. Among the
/// lexicographically sorted directories, the first one named exactly like
/// the padded or unpadded identifier, or starting with it plus `-`, wins.
pub fn resolve(root: &Path, id: &str) -> Option<PhaseDescriptor> {
    let normalized = match normalize_phase(id) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(error = %e, "unresolvable phase identifier");
            return None;
        }
    };
    let unpadded = unpad(&normalized);
    let padded_prefix = format!("{normalized}-");
    let unpadded_prefix = format!("{unpadded}-");

    let dir = crate::io::list_subdirs(&paths::phases_dir(root))
        .into_iter()
        .find(|d| {
            d.starts_with(&padded_prefix)
                || d.starts_with(&unpadded_prefix)
                || *d == normalized
                || d == unpadded
        })?;
    Some(describe(root, &dir))
}

pub fn require(root: &Path, id: &str) -> Result<PhaseDescriptor> {
    resolve(root, id).ok_or_else(|| BwbError::PhaseNotFound(id.to_string()))
}

/// Per-directory progress rows, numeric order.
pub fn disk_progress(root: &Path) -> Vec<PhaseProgress> {
    list_phases(root)
        .into_iter()
        .map(|e| {
            let ev = Evidence::scan(&paths::phase_dir(root, &e.dir_name));
            PhaseProgress::new(e.number, e.name, Some(&ev))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Plan index
// ---------------------------------------------------------------------------

static TASK_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static TASK_ELEMENT_RE: OnceLock<Regex> = OnceLock::new();
static OBJECTIVE_RE: OnceLock<Regex> = OnceLock::new();

fn task_heading_re() -> &'static Regex {
    TASK_HEADING_RE.get_or_init(|| Regex::new(r"(?m)^##\s*Task\s*\d+").unwrap())
}

fn task_element_re() -> &'static Regex {
    TASK_ELEMENT_RE.get_or_init(|| Regex::new(r"<task[\s>]").unwrap())
}

fn objective_re() -> &'static Regex {
    OBJECTIVE_RE.get_or_init(|| Regex::new(r"(?s)<objective>(.*?)</objective>").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub id: String,
    pub file: String,
    pub wave: u32,
    pub autonomous: bool,
    pub objective: Option<String>,
    pub files_modified: Vec<String>,
    pub task_count: usize,
    pub contracts: Vec<String>,
    pub has_summary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanIndex {
    pub phase: String,
    pub plans: Vec<PlanEntry>,
    pub waves: BTreeMap<u32, Vec<String>>,
    pub incomplete: Vec<String>,
}

/// Count `## Task N` headings, falling back to `<task>` elements.
pub fn count_tasks(content: &str) -> usize {
    match task_heading_re().find_iter(content).count() {
        0 => task_element_re().find_iter(content).count(),
        n => n,
    }
}

fn objective(fm: &Mapping, content: &str) -> Option<String> {
    if let Some(o) = fm.get_str("objective") {
        return Some(o.to_string());
    }
    let caps = objective_re().captures(content)?;
    caps[1]
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn plan_entry(dir: &Path, file: &str, id: &str, summarized: &HashSet<&str>) -> PlanEntry {
    let (content, fm) = frontmatter::read(&dir.join(file)).unwrap_or_default();
    let list = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| fm.get(k))
            .map(|v| v.items())
            .unwrap_or_default()
    };
    PlanEntry {
        id: id.to_string(),
        file: file.to_string(),
        wave: fm
            .get_str("wave")
            .and_then(|w| w.trim().parse().ok())
            .unwrap_or(1),
        autonomous: fm.get_str("autonomous").map_or(true, |v| v == "true"),
        objective: objective(&fm, &content),
        files_modified: list(&["files_modified", "files-modified"]),
        task_count: count_tasks(&content),
        contracts: list(&["contracts"]),
        has_summary: summarized.contains(id),
    }
}

pub fn plan_index(root: &Path, id: &str) -> Result<PlanIndex> {
    let phase = require(root, id)?;
    let dir = phase.path(root);
    let summarized: HashSet<&str> = phase.evidence.summary_ids().into_iter().collect();

    let plans: Vec<PlanEntry> = phase
        .evidence
        .plans
        .iter()
        .filter_map(|file| {
            let plan_id = ArtifactKind::Plan.strip(file)?;
            Some(plan_entry(&dir, file, plan_id, &summarized))
        })
        .collect();

    let mut waves: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for p in &plans {
        waves.entry(p.wave).or_default().push(p.id.clone());
    }

    Ok(PlanIndex {
        phase: phase.phase_number.clone(),
        incomplete: phase.incomplete_plans.clone(),
        plans,
        waves,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
