//! Cross-phase history folded from summary metadata.

use crate::error::{BwbError, Result};
use crate::evidence::ArtifactKind;
use crate::frontmatter::{self, Mapping, Value};
use crate::paths;
use crate::phase::PhaseEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Push unless already present; keeps first-seen order.
fn push_unique(set: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !set.contains(&item) {
            set.push(item);
        }
    }
}

/// `parent.child` lookup.
fn nested<'a>(fm: &'a Mapping, parent: &str, child: &str) -> Option<&'a Value> {
    fm.get(parent).and_then(Value::as_map).and_then(|m| m.get(child))
}

fn items_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Map(m)) => m.iter().flat_map(|(_, v)| v.items()).collect(),
        Some(v) => v.items(),
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// History digest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseDigest {
    pub name: String,
    pub provides: Vec<String>,
    pub affects: Vec<String>,
    pub patterns: Vec<String>,
    pub contracts_addressed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub phase: String,
    pub decision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryDigest {
    pub phases: BTreeMap<String, PhaseDigest>,
    pub decisions: Vec<Decision>,
    pub tech_stack: Vec<String>,
}

impl HistoryDigest {
    fn fold(&mut self, entry: &PhaseEntry, fm: &Mapping) {
        let key = fm
            .get_str("phase")
            .map(str::to_string)
            .unwrap_or_else(|| entry.number.clone());

        let phase = self.phases.entry(key.clone()).or_insert_with(|| PhaseDigest {
            name: fm
                .get_str("name")
                .map(str::to_string)
                .or_else(|| entry.display_name())
                .unwrap_or_else(|| "Unknown".to_string()),
            ..PhaseDigest::default()
        });

        let provides = nested(fm, "dependency-graph", "provides").or_else(|| fm.get("provides"));
        push_unique(&mut phase.provides, items_of(provides));
        push_unique(
            &mut phase.affects,
            items_of(nested(fm, "dependency-graph", "affects")),
        );
        push_unique(
            &mut phase.patterns,
            items_of(fm.get("patterns-established")),
        );
        push_unique(
            &mut phase.contracts_addressed,
            items_of(fm.get("contracts_addressed")),
        );

        self.decisions.extend(
            items_of(fm.get("key-decisions"))
                .into_iter()
                .map(|decision| Decision {
                    phase: key.clone(),
                    decision,
                }),
        );
        push_unique(
            &mut self.tech_stack,
            items_of(nested(fm, "tech-stack", "added")),
        );
    }
}

/// Walk every summary of every phase directory (both sorted) and fold its
/// metadata. Unreadable documents are skipped.
pub fn history_digest(root: &Path) -> HistoryDigest {
    let mut digest = HistoryDigest::default();
    for dir_name in crate::io::list_subdirs(&paths::phases_dir(root)) {
        let entry = PhaseEntry::from_dir_name(&dir_name);
        let dir = paths::phase_dir(root, &dir_name);
        for file in crate::io::list_files(&dir) {
            if !ArtifactKind::Summary.matches(&file) {
                continue;
            }
            let Some((_, fm)) = frontmatter::read(&dir.join(&file)) else {
                tracing::debug!(file = %file, "skipping unreadable summary");
                continue;
            };
            if fm.is_empty() {
                tracing::debug!(file = %file, "summary has no metadata block");
                continue;
            }
            digest.fold(&entry, &fm);
        }
    }
    digest
}

// ---------------------------------------------------------------------------
// Summary extract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDecision {
    pub summary: String,
    pub rationale: Option<String>,
}

impl KeyDecision {
    /// Split on the first colon: `JWT: stateless` → (`JWT`, `stateless`).
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((summary, rationale)) => KeyDecision {
                summary: summary.trim().to_string(),
                rationale: Some(rationale.trim().to_string()),
            },
            None => KeyDecision {
                summary: text.trim().to_string(),
                rationale: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryExtract {
    pub path: String,
    pub one_liner: Option<String>,
    pub key_files: Vec<String>,
    pub tech_added: Vec<String>,
    pub patterns: Vec<String>,
    pub contracts_addressed: Vec<String>,
    #[serde(rename = "type")]
    pub summary_type: String,
    pub decisions: Vec<KeyDecision>,
}

impl SummaryExtract {
    pub fn from_mapping(path: &str, fm: &Mapping) -> Self {
        SummaryExtract {
            path: path.to_string(),
            one_liner: fm.get_str("one-liner").map(str::to_string),
            key_files: items_of(fm.get("key-files")),
            tech_added: items_of(nested(fm, "tech-stack", "added")),
            patterns: items_of(fm.get("patterns-established")),
            contracts_addressed: items_of(fm.get("contracts_addressed")),
            summary_type: fm.get_str("type").unwrap_or("execute").to_string(),
            decisions: items_of(fm.get("key-decisions"))
                .iter()
                .map(|d| KeyDecision::parse(d))
                .collect(),
        }
    }
}

pub fn summary_extract(root: &Path, target: &str) -> Result<SummaryExtract> {
    let path = paths::resolve(root, target);
    let (_, fm) =
        frontmatter::read(&path).ok_or_else(|| BwbError::DocumentNotFound(target.to_string()))?;
    Ok(SummaryExtract::from_mapping(target, &fm))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
