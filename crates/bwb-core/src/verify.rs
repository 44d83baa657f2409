use crate::error::{BwbError, Result};
use crate::frontmatter::{self, Mapping, Value};
use crate::paths;
use crate::phase;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    Plan,
    Summary,
    Validation,
}

impl Schema {
    pub fn all() -> &'static [Schema] {
        &[Schema::Plan, Schema::Summary, Schema::Validation]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Schema::Plan => "plan",
            Schema::Summary => "summary",
            Schema::Validation => "validation",
        }
    }

    pub fn required(self) -> &'static [&'static str] {
        match self {
            Schema::Plan => &[
                "phase",
                "plan",
                "type",
                "wave",
                "depends_on",
                "files_modified",
                "autonomous",
                "contracts",
            ],
            Schema::Summary => &[
                "phase",
                "plan",
                "subsystem",
                "tags",
                "duration",
                "completed",
                "contracts_addressed",
            ],
            Schema::Validation => &["phase", "validated", "status"],
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Schema {
    type Err = BwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Schema::all()
            .iter()
            .copied()
            .find(|schema| schema.as_str() == s)
            .ok_or_else(|| BwbError::UnknownSchema {
                name: s.to_string(),
                available: Schema::all()
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub schema: Schema,
    pub valid: bool,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

pub fn check_schema(fm: &Mapping, schema: Schema) -> SchemaReport {
    let (present, missing): (Vec<&str>, Vec<&str>) = schema
        .required()
        .iter()
        .copied()
        .partition(|key| fm.contains_key(key));
    SchemaReport {
        schema,
        valid: missing.is_empty(),
        present: present.into_iter().map(str::to_string).collect(),
        missing: missing.into_iter().map(str::to_string).collect(),
    }
}

pub fn validate_document(root: &Path, target: &str, schema: Schema) -> Result<SchemaReport> {
    let (_, fm) = frontmatter::read(&paths::resolve(root, target))
        .ok_or_else(|| BwbError::DocumentNotFound(target.to_string()))?;
    Ok(check_schema(&fm, schema))
}

// ---------------------------------------------------------------------------
// Plan structure
// ---------------------------------------------------------------------------

static TASK_RE: OnceLock<Regex> = OnceLock::new();
static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn task_re() -> &'static Regex {
    TASK_RE.get_or_init(|| Regex::new(r"(?s)<task(?:\s[^>]*)?>(.*?)</task>").unwrap())
}

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"(?s)<name>(.*?)</name>").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCheck {
    pub name: String,
    pub has_files: bool,
    pub has_action: bool,
    pub has_verify: bool,
    pub has_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStructureReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub task_count: usize,
    pub tasks: Vec<TaskCheck>,
    pub frontmatter_fields: Vec<String>,
}

fn is_empty_list(v: Option<&Value>) -> bool {
    match v {
        None => true,
        Some(Value::List(items)) => items.is_empty(),
        Some(Value::Scalar(s)) => s.trim().is_empty() || s.trim() == "[]",
        Some(Value::Map(m)) => m.is_empty(),
    }
}

pub fn check_plan_structure(content: &str) -> PlanStructureReport {
    let fm = frontmatter::decode(content);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for key in check_schema(&fm, Schema::Plan).missing {
        errors.push(format!("missing required frontmatter field: {key}"));
    }
    let has_contracts = matches!(fm.get("contracts"), Some(Value::List(l)) if !l.is_empty());
    if fm.contains_key("contracts") && !has_contracts {
        warnings.push("contracts should be a non-empty list".to_string());
    }

    let mut tasks = Vec::new();
    for caps in task_re().captures_iter(content) {
        let body = &caps[1];
        let name = name_re().captures(body).map(|n| n[1].trim().to_string());
        let check = TaskCheck {
            name: name.clone().unwrap_or_else(|| "unnamed".to_string()),
            has_files: body.contains("<files>"),
            has_action: body.contains("<action>"),
            has_verify: body.contains("<verify>"),
            has_done: body.contains("<done>"),
        };
        if name.is_none() {
            errors.push("task missing <name> element".to_string());
        }
        if !check.has_action {
            errors.push(format!("task '{}' missing <action>", check.name));
        }
        for (present, element) in [
            (check.has_verify, "<verify>"),
            (check.has_done, "<done>"),
            (check.has_files, "<files>"),
        ] {
            if !present {
                warnings.push(format!("task '{}' missing {element}", check.name));
            }
        }
        tasks.push(check);
    }
    if tasks.is_empty() {
        warnings.push("no <task> elements found".to_string());
    }

    let wave: u32 = fm
        .get_str("wave")
        .and_then(|w| w.trim().parse().ok())
        .unwrap_or(1);
    if wave > 1 && is_empty_list(fm.get("depends_on")) {
        warnings.push("wave > 1 but depends_on is empty".to_string());
    }

    PlanStructureReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        task_count: tasks.len(),
        tasks,
        frontmatter_fields: fm.keys().map(str::to_string).collect(),
    }
}

pub fn verify_plan_structure(root: &Path, target: &str) -> Result<PlanStructureReport> {
    let content = crate::io::read_optional(&paths::resolve(root, target))
        .ok_or_else(|| BwbError::DocumentNotFound(target.to_string()))?;
    Ok(check_plan_structure(&content))
}

// ---------------------------------------------------------------------------
// Phase completeness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub complete: bool,
    pub phase: String,
    pub plan_count: usize,
    pub summary_count: usize,
    pub incomplete_plans: Vec<String>,
    pub orphan_summaries: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn verify_phase_completeness(root: &Path, id: &str) -> Result<CompletenessReport> {
    let phase = phase::require(root, id)?;
    let orphans = phase.evidence.orphan_summaries();
    let errors: Vec<String> = phase
        .incomplete_plans
        .iter()
        .map(|p| format!("plan {p} has no summary"))
        .collect();
    let warnings = orphans
        .iter()
        .map(|s| format!("summary {s} has no matching plan"))
        .collect();

    Ok(CompletenessReport {
        complete: errors.is_empty(),
        phase: phase.phase_number.clone(),
        plan_count: phase.evidence.plan_count(),
        summary_count: phase.evidence.summary_count(),
        incomplete_plans: phase.incomplete_plans.clone(),
        orphan_summaries: orphans,
        errors,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD_PLAN: &str = "---
phase: 02-auth
plan: 01
type: execute
wave: 1
depends_on: []
files_modified: [src/auth.rs]
autonomous: true
contracts: [FEAT-01]
---

<tasks>
<task type=\"auto\">
  <name>Add login route</name>
  <files>src/auth.rs</files>
  <action>Implement POST /login</action>
  <verify>cargo test auth</verify>
  <done>Route returns a token</done>
</task>
</tasks>
";

    #[test]
    fn schema_from_str() {
        assert_eq!("plan".parse::<Schema>().unwrap(), Schema::Plan);
        let err = "roadmap".parse::<Schema>().unwrap_err();
        assert!(err.to_string().contains("plan, summary, validation"));
    }

    #[test]
    fn schema_report_lists_missing() {
        let fm = frontmatter::decode("---\nphase: 1\nvalidated: 2026-01-01\n---\n");
        let r = check_schema(&fm, Schema::Validation);
        assert!(!r.valid);
        assert_eq!(r.present, vec!["phase", "validated"]);
        assert_eq!(r.missing, vec!["status"]);
    }

    #[test]
    fn good_plan_is_valid() {
        let r = check_plan_structure(GOOD_PLAN);
        assert!(r.valid, "{:?}", r.errors);
        assert!(r.warnings.is_empty(), "{:?}", r.warnings);
        assert_eq!(r.task_count, 1);
        assert_eq!(r.tasks[0].name, "Add login route");
    }

    #[test]
    fn missing_elements_are_reported() {
        let plan = GOOD_PLAN
            .replace("<action>Implement POST /login</action>", "")
            .replace("<done>Route returns a token</done>", "")
            .replace("type: execute\n", "");
        let r = check_plan_structure(&plan);
        assert!(!r.valid);
        assert!(r.errors.contains(&"missing required frontmatter field: type".to_string()));
        assert!(r.errors.contains(&"task 'Add login route' missing <action>".to_string()));
        assert_eq!(r.warnings, vec!["task 'Add login route' missing <done>"]);
    }

    #[test]
    fn later_wave_needs_dependencies() {
        let plan = GOOD_PLAN.replace("wave: 1", "wave: 2");
        let r = check_plan_structure(&plan);
        assert!(r.valid);
        assert_eq!(r.warnings, vec!["wave > 1 but depends_on is empty"]);
    }

    #[test]
    fn empty_contracts_warn() {
        let plan = GOOD_PLAN.replace("contracts: [FEAT-01]", "contracts: []");
        let r = check_plan_structure(&plan);
        assert!(r.warnings.contains(&"contracts should be a non-empty list".to_string()));
    }

    #[test]
    fn plan_without_tasks_warns() {
        let r = check_plan_structure("# Plan\n");
        assert!(r.warnings.contains(&"no <task> elements found".to_string()));
        assert_eq!(r.errors.len(), Schema::Plan.required().len());
    }

    #[test]
    fn completeness_reports_gaps() {
        let dir = TempDir::new().unwrap();
        let phase = dir.path().join(".planning/phases/03-billing");
        std::fs::create_dir_all(&phase).unwrap();
        for f in ["03-01-PLAN.md", "03-02-PLAN.md", "03-01-SUMMARY.md", "03-07-SUMMARY.md"] {
            std::fs::write(phase.join(f), "").unwrap();
        }
        let r = verify_phase_completeness(dir.path(), "3").unwrap();
        assert!(!r.complete);
        assert_eq!(r.incomplete_plans, vec!["03-02"]);
        assert_eq!(r.orphan_summaries, vec!["03-07"]);
        assert_eq!(r.errors, vec!["plan 03-02 has no summary"]);
        assert_eq!(r.warnings, vec!["summary 03-07 has no matching plan"]);
    }

    #[test]
    fn validate_missing_document_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            validate_document(dir.path(), "x.md", Schema::Plan),
            Err(BwbError::DocumentNotFound(_))
        ));
    }
}
