//! Contracts (`FEAT-NN` feature entries) and validation reports
//! (`FEAT-NN` level tables and `GAP-NN` entries) of a phase.

use crate::error::{BwbError, Result};
use crate::evidence::ArtifactKind;
use crate::fields;
use crate::frontmatter;
use crate::phase;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

static ENTRY_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static ANY_HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn entry_heading_re() -> &'static Regex {
    ENTRY_HEADING_RE.get_or_init(|| {
        Regex::new(r"(?m)^###[ \t]*((?:FEAT|GAP)-\d+)[ \t]*:?[ \t]*(.*?)[ \t]*$").unwrap()
    })
}

fn any_heading_re() -> &'static Regex {
    ANY_HEADING_RE.get_or_init(|| Regex::new(r"(?m)^#{1,3}[ \t]").unwrap())
}

struct Entry<'a> {
    id: &'a str,
    title: &'a str,
    body: &'a str,
}

/// `### PREFIX-NN: Title` entries; each body runs to the next heading of
/// level three or higher.
fn entries<'a>(text: &'a str, prefix: &str) -> Vec<Entry<'a>> {
    entry_heading_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let id = caps.get(1)?;
            if !id.as_str().starts_with(prefix) {
                return None;
            }
            let whole = caps.get(0)?;
            let rest = &text[whole.end()..];
            let end = any_heading_re()
                .find(rest)
                .map_or(rest.len(), |m| m.start());
            Some(Entry {
                id: id.as_str(),
                title: caps.get(2).map_or("", |m| m.as_str()),
                body: &rest[..end],
            })
        })
        .collect()
}

/// Bullets following a `**Label:**` line, up to the first line that is
/// neither a bullet nor blank. A value on the label line itself counts too.
fn labeled_list(body: &str, label: &str) -> Vec<String> {
    let marker = format!("**{}:**", label.to_ascii_lowercase());
    let mut lines = body.lines();
    let mut items = Vec::new();
    for line in lines.by_ref() {
        let lower = line.to_ascii_lowercase();
        if let Some(idx) = lower.find(&marker) {
            let inline = line[idx + marker.len()..].trim();
            if !inline.is_empty() {
                items.push(inline.to_string());
            }
            break;
        }
    }
    for line in lines {
        let t = line.trim();
        if t.is_empty() {
            if items.is_empty() {
                continue;
            }
            break;
        }
        match t.strip_prefix("- ") {
            Some(item) => items.push(item.trim().to_string()),
            None => break,
        }
    }
    items
}

fn phase_document(root: &Path, id: &str, kind: ArtifactKind) -> Result<(String, String, String)> {
    let phase = phase::require(root, id)?;
    let path = phase
        .artifact_path(root, kind)
        .ok_or_else(|| BwbError::DocumentNotFound(format!("{}/{}", phase.directory, kind.suffix())))?;
    let content = crate::io::read_optional(&path)
        .ok_or_else(|| BwbError::DocumentNotFound(path.display().to_string()))?;
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((phase.phase_number, file, content))
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub what: Option<String>,
    pub expected: Option<String>,
    pub source: Option<String>,
    pub depends: Option<String>,
    pub acceptance: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractsAnalysis {
    pub phase: String,
    pub file: String,
    pub feature_count: usize,
    pub total_acceptance: usize,
    pub features: Vec<Feature>,
}

pub fn parse_features(text: &str) -> Vec<Feature> {
    entries(text, "FEAT")
        .into_iter()
        .map(|e| Feature {
            id: e.id.to_string(),
            name: e.title.to_string(),
            what: fields::extract_field(e.body, "What"),
            expected: fields::extract_field(e.body, "Expected"),
            source: fields::extract_field(e.body, "Source"),
            depends: fields::extract_field(e.body, "Depends"),
            acceptance: labeled_list(e.body, "Acceptance"),
        })
        .collect()
}

pub fn analyze(root: &Path, id: &str) -> Result<ContractsAnalysis> {
    let (phase, file, content) = phase_document(root, id, ArtifactKind::Contracts)?;
    let features = parse_features(&content);
    Ok(ContractsAnalysis {
        phase,
        file,
        feature_count: features.len(),
        total_acceptance: features.iter().map(|f| f.acceptance.len()).sum(),
        features,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub const LEVELS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureResult {
    pub id: String,
    pub levels: Vec<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub id: String,
    pub title: String,
    pub contract: Option<String>,
    pub failed_level: Option<String>,
    pub proposed_fix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub gaps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub phase: String,
    pub file: String,
    pub status: Option<String>,
    pub features: Vec<FeatureResult>,
    pub gaps: Vec<Gap>,
    pub summary: ValidationSummary,
}

fn level_passes(level: &str) -> bool {
    let l = level.trim();
    l.eq_ignore_ascii_case("PASS") || l == "-" || l.eq_ignore_ascii_case("N/A")
}

/// `| FEAT-NN | L1 | ... | L6 |` rows.
pub fn parse_feature_rows(text: &str) -> Vec<FeatureResult> {
    text.lines()
        .filter_map(|line| {
            let t = line.trim();
            let inner = t.strip_prefix('|')?.strip_suffix('|')?;
            let cells: Vec<&str> = inner.split('|').map(str::trim).collect();
            if cells.len() != LEVELS + 1 || !cells[0].starts_with("FEAT-") {
                return None;
            }
            let levels: Vec<String> = cells[1..].iter().map(|c| c.to_string()).collect();
            Some(FeatureResult {
                id: cells[0].to_string(),
                passed: levels.iter().all(|l| level_passes(l)),
                levels,
            })
        })
        .collect()
}

pub fn parse_gaps(text: &str) -> Vec<Gap> {
    entries(text, "GAP")
        .into_iter()
        .map(|e| Gap {
            id: e.id.to_string(),
            title: e.title.to_string(),
            contract: fields::extract_field(e.body, "Contract"),
            failed_level: fields::extract_field(e.body, "Failed Level"),
            proposed_fix: fields::extract_field(e.body, "Proposed Fix"),
        })
        .collect()
}

pub fn validation_status(root: &Path, id: &str) -> Result<ValidationReport> {
    let (phase, file, content) = phase_document(root, id, ArtifactKind::Validation)?;
    let fm = frontmatter::decode(&content);
    let features = parse_feature_rows(&content);
    let gaps = parse_gaps(&content);
    let passed = features.iter().filter(|f| f.passed).count();
    Ok(ValidationReport {
        phase,
        file,
        status: fm.get_str("status").map(str::to_string),
        summary: ValidationSummary {
            total: features.len(),
            passed,
            failed: features.len() - passed,
            gaps: gaps.len(),
        },
        features,
        gaps,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
