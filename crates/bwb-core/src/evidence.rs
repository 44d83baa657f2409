use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Plan,
    Summary,
    Research,
    Context,
    Contracts,
    Validation,
    Preparation,
}

impl ArtifactKind {
    pub fn all() -> &'static [ArtifactKind] {
        &[
            ArtifactKind::Plan,
            ArtifactKind::Summary,
            ArtifactKind::Research,
            ArtifactKind::Context,
            ArtifactKind::Contracts,
            ArtifactKind::Validation,
            ArtifactKind::Preparation,
        ]
    }

    /// Bare filename of the artifact; `<id>-<suffix>` is the prefixed form.
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "PLAN.md",
            ArtifactKind::Summary => "SUMMARY.md",
            ArtifactKind::Research => "RESEARCH.md",
            ArtifactKind::Context => "CONTEXT.md",
            ArtifactKind::Contracts => "CONTRACTS.md",
            ArtifactKind::Validation => "VALIDATION.md",
            ArtifactKind::Preparation => "PREPARATION.md",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "plan",
            ArtifactKind::Summary => "summary",
            ArtifactKind::Research => "research",
            ArtifactKind::Context => "context",
            ArtifactKind::Contracts => "contracts",
            ArtifactKind::Validation => "validation",
            ArtifactKind::Preparation => "preparation",
        }
    }

    /// The identifier left after removing the suffix, or `None` when the
    /// filename is not of this kind. The bare form has the empty identifier.
    pub fn strip<'a>(self, filename: &'a str) -> Option<&'a str> {
        let suffix = self.suffix();
        if filename == suffix {
            return Some("");
        }
        filename
            .strip_suffix(suffix)
            .and_then(|rest| rest.strip_suffix('-'))
    }

    pub fn matches(self, filename: &str) -> bool {
        self.strip(filename).is_some()
    }

    pub fn classify(filename: &str) -> Option<ArtifactKind> {
        ArtifactKind::all().iter().copied().find(|k| k.matches(filename))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Facts derivable from a phase directory's filenames alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub plans: Vec<String>,
    pub summaries: Vec<String>,
    pub has_research: bool,
    pub has_context: bool,
    pub has_contracts: bool,
    pub has_validation: bool,
    pub has_preparation: bool,
}

impl Evidence {
    /// Scan a phase directory. A missing directory yields empty evidence.
    pub fn scan(dir: &Path) -> Evidence {
        Evidence::from_files(crate::io::list_files(dir))
    }

    /// Classify filenames. Plan and summary lists come out sorted.
    pub fn from_files<I, S>(files: I) -> Evidence
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ev = Evidence::default();
        for file in files {
            let name = file.as_ref();
            match ArtifactKind::classify(name) {
                Some(ArtifactKind::Plan) => ev.plans.push(name.to_string()),
                Some(ArtifactKind::Summary) => ev.summaries.push(name.to_string()),
                Some(ArtifactKind::Research) => ev.has_research = true,
                Some(ArtifactKind::Context) => ev.has_context = true,
                Some(ArtifactKind::Contracts) => ev.has_contracts = true,
                Some(ArtifactKind::Validation) => ev.has_validation = true,
                Some(ArtifactKind::Preparation) => ev.has_preparation = true,
                None => {}
            }
        }
        ev.plans.sort();
        ev.summaries.sort();
        ev
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }

    pub fn has(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Plan => !self.plans.is_empty(),
            ArtifactKind::Summary => !self.summaries.is_empty(),
            ArtifactKind::Research => self.has_research,
            ArtifactKind::Context => self.has_context,
            ArtifactKind::Contracts => self.has_contracts,
            ArtifactKind::Validation => self.has_validation,
            ArtifactKind::Preparation => self.has_preparation,
        }
    }

    pub fn plan_ids(&self) -> Vec<&str> {
        ids(&self.plans, ArtifactKind::Plan)
    }

    pub fn summary_ids(&self) -> Vec<&str> {
        ids(&self.summaries, ArtifactKind::Summary)
    }

    /// Plan identifiers with no summary of the same identifier, in plan order.
    pub fn incomplete_plans(&self) -> Vec<String> {
        let done: HashSet<&str> = self.summary_ids().into_iter().collect();
        self.plan_ids()
            .into_iter()
            .filter(|id| !done.contains(id))
            .map(str::to_string)
            .collect()
    }

    /// Summary identifiers with no plan of the same identifier.
    pub fn orphan_summaries(&self) -> Vec<String> {
        let planned: HashSet<&str> = self.plan_ids().into_iter().collect();
        self.summary_ids()
            .into_iter()
            .filter(|id| !planned.contains(id))
            .map(str::to_string)
            .collect()
    }
}

fn ids(files: &[String], kind: ArtifactKind) -> Vec<&str> {
    files.iter().filter_map(|f| kind.strip(f)).collect()
}

/// First file of `kind` in `dir`, in sorted order.
pub fn find_artifact(dir: &Path, kind: ArtifactKind) -> Option<String> {
    crate::io::list_files(dir)
        .into_iter()
        .find(|f| kind.matches(f))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classify_bare_and_prefixed() {
        assert_eq!(ArtifactKind::classify("PLAN.md"), Some(ArtifactKind::Plan));
        assert_eq!(
            ArtifactKind::classify("02-01-PLAN.md"),
            Some(ArtifactKind::Plan)
        );
        assert_eq!(
            ArtifactKind::classify("02-CONTRACTS.md"),
            Some(ArtifactKind::Contracts)
        );
        assert_eq!(ArtifactKind::classify("02-01PLAN.md"), None);
        assert_eq!(ArtifactKind::classify("plan.md"), None);
        assert_eq!(ArtifactKind::classify("NOTES.md"), None);
    }

    #[test]
    fn strip_yields_identity() {
        assert_eq!(ArtifactKind::Plan.strip("02-01-PLAN.md"), Some("02-01"));
        assert_eq!(ArtifactKind::Summary.strip("SUMMARY.md"), Some(""));
        assert_eq!(ArtifactKind::Summary.strip("02-01-PLAN.md"), None);
    }

    #[test]
    fn scan_auth_phase() {
        let dir = TempDir::new().unwrap();
        let phase = dir.path().join("02-auth");
        std::fs::create_dir_all(&phase).unwrap();
        std::fs::write(phase.join("02-01-PLAN.md"), "").unwrap();
        std::fs::write(phase.join("02-01-SUMMARY.md"), "").unwrap();

        let ev = Evidence::scan(&phase);
        assert_eq!(ev.plans, vec!["02-01-PLAN.md"]);
        assert_eq!(ev.summaries, vec!["02-01-SUMMARY.md"]);
        assert!(ev.incomplete_plans().is_empty());
    }

    #[test]
    fn scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Evidence::scan(&dir.path().join("nope")), Evidence::default());
    }

    #[test]
    fn scan_ignores_subdirectories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("01-PLAN.md")).unwrap();
        std::fs::write(dir.path().join("RESEARCH.md"), "").unwrap();
        let ev = Evidence::scan(dir.path());
        assert!(ev.plans.is_empty());
        assert!(ev.has_research);
    }

    #[test]
    fn flags_follow_files() {
        let ev = Evidence::from_files([
            "03-CONTEXT.md",
            "03-VALIDATION.md",
            "PREPARATION.md",
            "03-02-PLAN.md",
            "03-01-PLAN.md",
        ]);
        assert!(ev.has_context && ev.has_validation && ev.has_preparation);
        assert!(!ev.has_research && !ev.has_contracts);
        assert_eq!(ev.plans, vec!["03-01-PLAN.md", "03-02-PLAN.md"]);
        assert!(ev.has(ArtifactKind::Plan));
        assert!(!ev.has(ArtifactKind::Summary));
    }

    #[test]
    fn incomplete_and_orphans() {
        let ev = Evidence::from_files([
            "01-01-PLAN.md",
            "01-02-PLAN.md",
            "01-03-PLAN.md",
            "01-02-SUMMARY.md",
            "01-09-SUMMARY.md",
        ]);
        assert_eq!(ev.incomplete_plans(), vec!["01-01", "01-03"]);
        assert_eq!(ev.orphan_summaries(), vec!["01-09"]);
    }

    // Bare and hyphen-only names reduce to the same empty identifier. No
    // stricter rule exists: one summary satisfies both plans.
    #[test]
    fn colliding_identities_share_a_summary() {
        let ev = Evidence::from_files(["PLAN.md", "-PLAN.md", "SUMMARY.md"]);
        assert_eq!(ev.plan_ids(), vec!["", ""]);
        assert!(ev.incomplete_plans().is_empty());
        assert!(ev.orphan_summaries().is_empty());
    }

    #[test]
    fn find_artifact_first_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b-RESEARCH.md"), "").unwrap();
        std::fs::write(dir.path().join("a-RESEARCH.md"), "").unwrap();
        assert_eq!(
            find_artifact(dir.path(), ArtifactKind::Research).as_deref(),
            Some("a-RESEARCH.md")
        );
        assert_eq!(find_artifact(dir.path(), ArtifactKind::Context), None);
    }
}
