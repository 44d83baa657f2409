//! Context bundles handed to workflow steps: configuration, resolved models,
//! phase evidence and, on request, the text of planning documents.

use crate::config::{Config, ModelTier};
use crate::error::Result;
use crate::evidence::ArtifactKind;
use crate::paths;
use crate::phase::{self, PhaseDescriptor};
use crate::status::WorkflowStep;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Includes
// ---------------------------------------------------------------------------

/// Document names requested with `--include a,b,c`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Includes(BTreeSet<String>);

impl Includes {
    pub fn parse(list: &str) -> Self {
        Includes(
            list.split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

/// Inlined document bodies keyed `<name>_content`. Unreadable documents are
/// left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Documents(BTreeMap<String, String>);

impl Documents {
    fn add(&mut self, name: &str, path: &Path) {
        if let Some(text) = crate::io::read_optional(path) {
            self.0.insert(format!("{name}_content"), text);
        }
    }

    fn add_planning(&mut self, root: &Path, name: &str, file: &str) {
        self.add(name, &root.join(file));
    }

    fn add_artifact(&mut self, root: &Path, phase: Option<&PhaseDescriptor>, kind: ArtifactKind) {
        if let Some(path) = phase.and_then(|p| p.artifact_path(root, kind)) {
            self.add(kind.as_str(), &path);
        }
    }

    /// Every summary of the phase, joined with a `---` rule.
    fn add_summaries(&mut self, root: &Path, phase: Option<&PhaseDescriptor>) {
        let Some(phase) = phase else { return };
        let dir = phase.path(root);
        let bodies: Vec<String> = phase
            .evidence
            .summaries
            .iter()
            .filter_map(|f| crate::io::read_optional(&dir.join(f)))
            .collect();
        if !bodies.is_empty() {
            self.0
                .insert("summaries_content".to_string(), bodies.join("\n---\n"));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn add_requested(docs: &mut Documents, root: &Path, includes: &Includes, names: &[&str]) {
    for name in names {
        if !includes.has(name) {
            continue;
        }
        let file = match *name {
            "state" => paths::STATE_FILE,
            "roadmap" => paths::ROADMAP_FILE,
            "config" => paths::CONFIG_FILE,
            "project" => paths::PROJECT_FILE,
            _ => continue,
        };
        docs.add_planning(root, name, file);
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Phase fields shared by every phase-centric bundle. A phase that does not
/// resolve yields `phase_found: false` with empty evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseContext {
    pub phase_found: bool,
    pub phase_dir: Option<String>,
    pub phase_number: Option<String>,
    pub phase_name: Option<String>,
    pub phase_slug: Option<String>,
    pub padded_phase: Option<String>,
    pub has_research: bool,
    pub has_context: bool,
    pub has_contracts: bool,
    pub has_validation: bool,
    pub has_preparation: bool,
    pub has_plans: bool,
    pub plan_count: usize,
    pub summary_count: usize,
}

impl PhaseContext {
    pub fn new(phase: Option<&PhaseDescriptor>) -> Self {
        let ev = phase.map(|p| &p.evidence);
        PhaseContext {
            phase_found: phase.is_some(),
            phase_dir: phase.map(|p| p.directory.clone()),
            phase_number: phase.map(|p| p.phase_number.clone()),
            phase_name: phase.and_then(|p| p.phase_name.clone()),
            phase_slug: phase.and_then(|p| p.phase_slug.clone()),
            padded_phase: phase.map(|p| pad(&p.phase_number)),
            has_research: ev.is_some_and(|e| e.has_research),
            has_context: ev.is_some_and(|e| e.has_context),
            has_contracts: ev.is_some_and(|e| e.has_contracts),
            has_validation: ev.is_some_and(|e| e.has_validation),
            has_preparation: ev.is_some_and(|e| e.has_preparation),
            has_plans: ev.is_some_and(|e| e.plan_count() > 0),
            plan_count: ev.map_or(0, |e| e.plan_count()),
            summary_count: ev.map_or(0, |e| e.summary_count()),
        }
    }
}

/// Left-pad the integer part to two digits.
fn pad(number: &str) -> String {
    match number.split_once('.') {
        Some((major, minor)) => format!("{major:0>2}.{minor}"),
        None => format!("{number:0>2}"),
    }
}

fn exists(root: &Path, rel: &str) -> bool {
    root.join(rel).exists()
}

fn model(config: &Config, agent: &str) -> Result<ModelTier> {
    config.model_for(agent)
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProjectContext {
    pub researcher_model: ModelTier,
    pub roadmapper_model: ModelTier,
    pub commit_docs: bool,
    pub project_exists: bool,
    pub planning_exists: bool,
    pub has_existing_code: bool,
    pub has_package_file: bool,
    pub is_brownfield: bool,
    pub has_git: bool,
}

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "go", "rs", "swift", "java"];
const PACKAGE_FILES: &[(&str, &str)] = &[
    ("package.json", "node"),
    ("requirements.txt", "python"),
    ("Pipfile", "python"),
    ("pyproject.toml", "python"),
    ("Cargo.toml", "rust"),
    ("go.mod", "go"),
    ("Package.swift", "swift"),
    ("build.gradle", "java"),
    ("pom.xml", "java"),
    ("Gemfile", "ruby"),
    ("composer.json", "php"),
];

fn has_extension(file: &str, extensions: &[&str]) -> bool {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

/// Project types named by the package files at the root, first seen first.
fn detect_types(root: &Path) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for (file, kind) in PACKAGE_FILES {
        if exists(root, file) && !types.iter().any(|t| t == kind) {
            types.push(kind.to_string());
        }
    }
    types
}

/// Source files within three levels of `dir`, skipping `.git`,
/// `node_modules` and the planning directory.
fn has_source_files(dir: &Path, depth: usize) -> bool {
    let has_here = crate::io::list_files(dir)
        .iter()
        .any(|f| has_extension(f, SOURCE_EXTENSIONS));
    if has_here {
        return true;
    }
    if depth == 0 {
        return false;
    }
    crate::io::list_subdirs(dir)
        .iter()
        .filter(|d| !matches!(d.as_str(), ".git" | "node_modules" | paths::PLANNING_DIR))
        .any(|d| has_source_files(&dir.join(d), depth - 1))
}

pub fn new_project(root: &Path) -> Result<NewProjectContext> {
    let config = Config::load_or_default(root);
    let has_existing_code = has_source_files(root, 2);
    let has_package_file = PACKAGE_FILES.iter().any(|(f, _)| exists(root, f));
    Ok(NewProjectContext {
        researcher_model: model(&config, "bwb-researcher")?,
        roadmapper_model: model(&config, "bwb-roadmapper")?,
        commit_docs: config.commit_docs,
        project_exists: exists(root, paths::PROJECT_FILE),
        planning_exists: exists(root, paths::PLANNING_DIR),
        has_existing_code,
        has_package_file,
        is_brownfield: has_existing_code || has_package_file,
        has_git: exists(root, ".git"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanPhaseContext {
    pub planner_model: ModelTier,
    pub builder_model: ModelTier,
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub planning_exists: bool,
    pub roadmap_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

pub fn plan_phase(root: &Path, id: &str, includes: &Includes) -> Result<PlanPhaseContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["state", "roadmap"]);
    for kind in [
        ArtifactKind::Context,
        ArtifactKind::Research,
        ArtifactKind::Contracts,
        ArtifactKind::Validation,
    ] {
        if includes.has(kind.as_str()) {
            documents.add_artifact(root, found.as_ref(), kind);
        }
    }
    Ok(PlanPhaseContext {
        planner_model: model(&config, "bwb-planner")?,
        builder_model: model(&config, "bwb-builder")?,
        commit_docs: config.commit_docs,
        phase: PhaseContext::new(found.as_ref()),
        planning_exists: exists(root, paths::PLANNING_DIR),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutePhaseContext {
    pub builder_model: ModelTier,
    pub validator_model: ModelTier,
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub plans: Vec<String>,
    pub summaries: Vec<String>,
    pub incomplete_plans: Vec<String>,
    pub incomplete_count: usize,
    pub state_exists: bool,
    pub roadmap_exists: bool,
    pub config_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

pub fn execute_phase(root: &Path, id: &str, includes: &Includes) -> Result<ExecutePhaseContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["state", "roadmap", "config"]);
    let (plans, summaries, incomplete_plans) = match &found {
        Some(p) => (
            p.evidence.plans.clone(),
            p.evidence.summaries.clone(),
            p.incomplete_plans.clone(),
        ),
        None => Default::default(),
    };
    Ok(ExecutePhaseContext {
        builder_model: model(&config, "bwb-builder")?,
        validator_model: model(&config, "bwb-validator")?,
        commit_docs: config.commit_docs,
        phase: PhaseContext::new(found.as_ref()),
        incomplete_count: incomplete_plans.len(),
        plans,
        summaries,
        incomplete_plans,
        state_exists: exists(root, paths::STATE_FILE),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        config_exists: exists(root, paths::CONFIG_FILE),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractsContext {
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub planning_exists: bool,
    pub roadmap_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

/// Context and research are always inlined when present.
pub fn contracts(root: &Path, id: &str, includes: &Includes) -> Result<ContractsContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["roadmap", "state"]);
    documents.add_artifact(root, found.as_ref(), ArtifactKind::Context);
    documents.add_artifact(root, found.as_ref(), ArtifactKind::Research);
    Ok(ContractsContext {
        commit_docs: config.commit_docs,
        phase: PhaseContext::new(found.as_ref()),
        planning_exists: exists(root, paths::PLANNING_DIR),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateContext {
    pub validator_model: ModelTier,
    pub fixer_model: ModelTier,
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub planning_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

/// Contracts, context, validation, preparation and every summary are always
/// inlined when present.
pub fn validate(root: &Path, id: &str, includes: &Includes) -> Result<ValidateContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["state", "roadmap"]);
    for kind in [
        ArtifactKind::Contracts,
        ArtifactKind::Context,
        ArtifactKind::Validation,
        ArtifactKind::Preparation,
    ] {
        documents.add_artifact(root, found.as_ref(), kind);
    }
    documents.add_summaries(root, found.as_ref());
    Ok(ValidateContext {
        validator_model: model(&config, "bwb-validator")?,
        fixer_model: model(&config, "bwb-fixer")?,
        commit_docs: config.commit_docs,
        phase: PhaseContext::new(found.as_ref()),
        planning_exists: exists(root, paths::PLANNING_DIR),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareContext {
    pub preparer_model: ModelTier,
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub has_summaries: bool,
    pub detected_types: Vec<String>,
    pub has_env: bool,
    pub has_env_example: bool,
    pub has_test_dir: bool,
    pub planning_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

pub fn prepare(root: &Path, id: &str, includes: &Includes) -> Result<PrepareContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["state", "roadmap"]);
    documents.add_artifact(root, found.as_ref(), ArtifactKind::Contracts);
    documents.add_artifact(root, found.as_ref(), ArtifactKind::Preparation);
    documents.add_summaries(root, found.as_ref());

    let detected_types = detect_types(root);
    let phase = PhaseContext::new(found.as_ref());
    Ok(PrepareContext {
        preparer_model: model(&config, "bwb-preparer")?,
        commit_docs: config.commit_docs,
        has_summaries: phase.summary_count > 0,
        phase,
        detected_types,
        has_env: exists(root, ".env"),
        has_env_example: exists(root, ".env.example"),
        has_test_dir: ["test", "tests", "__tests__"]
            .iter()
            .any(|d| exists(root, d)),
        planning_exists: exists(root, paths::PLANNING_DIR),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressPhase {
    pub number: String,
    pub name: Option<String>,
    pub directory: String,
    pub step: WorkflowStep,
    pub plan_count: usize,
    pub summary_count: usize,
    pub has_research: bool,
    pub has_context: bool,
    pub has_contracts: bool,
    pub has_validation: bool,
    pub has_preparation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressContext {
    pub builder_model: ModelTier,
    pub planner_model: ModelTier,
    pub commit_docs: bool,
    pub phases: Vec<ProgressPhase>,
    pub phase_count: usize,
    pub completed_count: usize,
    pub current_phase: Option<ProgressPhase>,
    pub next_phase: Option<ProgressPhase>,
    pub has_work_in_progress: bool,
    pub project_exists: bool,
    pub roadmap_exists: bool,
    pub state_exists: bool,
    #[serde(flatten)]
    pub documents: Documents,
}

/// Current phase: first phase not yet validated or complete. Next phase:
/// first phase still at research.
pub fn progress(root: &Path, includes: &Includes) -> Result<ProgressContext> {
    let config = Config::load_or_default(root);
    let phases: Vec<ProgressPhase> = phase::list_phases(root)
        .iter()
        .map(|entry| {
            let d = phase::describe(root, &entry.dir_name);
            let ev = &d.evidence;
            ProgressPhase {
                step: d.step(),
                plan_count: ev.plan_count(),
                summary_count: ev.summary_count(),
                has_research: ev.has_research,
                has_context: ev.has_context,
                has_contracts: ev.has_contracts,
                has_validation: ev.has_validation,
                has_preparation: ev.has_preparation,
                number: d.phase_number,
                name: d.phase_name,
                directory: d.directory,
            }
        })
        .collect();

    let current_phase = phases
        .iter()
        .find(|p| !matches!(p.step, WorkflowStep::Complete | WorkflowStep::Validate))
        .cloned();
    let next_phase = phases
        .iter()
        .find(|p| p.step == WorkflowStep::Research)
        .cloned();

    let mut documents = Documents::default();
    add_requested(&mut documents, root, includes, &["state", "roadmap", "project"]);

    Ok(ProgressContext {
        builder_model: model(&config, "bwb-builder")?,
        planner_model: model(&config, "bwb-planner")?,
        commit_docs: config.commit_docs,
        phase_count: phases.len(),
        completed_count: phases
            .iter()
            .filter(|p| p.step == WorkflowStep::Complete)
            .count(),
        has_work_in_progress: current_phase.is_some(),
        current_phase,
        next_phase,
        phases,
        project_exists: exists(root, paths::PROJECT_FILE),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        state_exists: exists(root, paths::STATE_FILE),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeContext {
    pub state_exists: bool,
    pub roadmap_exists: bool,
    pub project_exists: bool,
    pub planning_exists: bool,
    pub has_interrupted_agent: bool,
    pub interrupted_agent_id: Option<String>,
    pub commit_docs: bool,
}

pub fn resume(root: &Path) -> Result<ResumeContext> {
    let config = Config::load_or_default(root);
    let interrupted_agent_id = crate::io::read_optional(&root.join(paths::AGENT_ID_FILE))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    Ok(ResumeContext {
        state_exists: exists(root, paths::STATE_FILE),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        project_exists: exists(root, paths::PROJECT_FILE),
        planning_exists: exists(root, paths::PLANNING_DIR),
        has_interrupted_agent: interrupted_agent_id.is_some(),
        interrupted_agent_id,
        commit_docs: config.commit_docs,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOpContext {
    pub commit_docs: bool,
    #[serde(flatten)]
    pub phase: PhaseContext,
    pub roadmap_exists: bool,
    pub planning_exists: bool,
    pub fix_max_iterations: u32,
    pub fix_auto_retry: bool,
}

pub fn phase_op(root: &Path, id: &str) -> Result<PhaseOpContext> {
    let config = Config::load_or_default(root);
    let found = phase::resolve(root, id);
    Ok(PhaseOpContext {
        commit_docs: config.commit_docs,
        phase: PhaseContext::new(found.as_ref()),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        planning_exists: exists(root, paths::PLANNING_DIR),
        fix_max_iterations: config.fix_max_iterations,
        fix_auto_retry: config.fix_auto_retry,
    })
}

// ---------------------------------------------------------------------------
// Quick tasks
// ---------------------------------------------------------------------------

const QUICK_SLUG_MAX: usize = 40;

static QUICK_ENTRY_RE: OnceLock<Regex> = OnceLock::new();

fn quick_entry_re() -> &'static Regex {
    QUICK_ENTRY_RE.get_or_init(|| Regex::new(r"^(\d+)-").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickContext {
    pub planner_model: ModelTier,
    pub builder_model: ModelTier,
    pub validator_model: ModelTier,
    pub commit_docs: bool,
    pub next_num: u32,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub date: String,
    pub timestamp: String,
    pub quick_dir: String,
    pub task_dir: Option<String>,
    pub roadmap_exists: bool,
    pub planning_exists: bool,
}

/// One past the highest `N-` prefix under the quick directory, 1 when empty.
fn next_quick_number(root: &Path) -> u32 {
    let dir = root.join(paths::QUICK_DIR);
    crate::io::list_subdirs(&dir)
        .into_iter()
        .chain(crate::io::list_files(&dir))
        .filter_map(|name| quick_entry_re().captures(&name)?[1].parse::<u32>().ok())
        .max()
        .map_or(1, |n| n.saturating_add(1))
}

pub fn quick(root: &Path, description: Option<&str>, now: DateTime<Utc>) -> Result<QuickContext> {
    let config = Config::load_or_default(root);
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let slug = description
        .as_deref()
        .map(|d| paths::slugify(d).chars().take(QUICK_SLUG_MAX).collect::<String>())
        .filter(|s| !s.is_empty());
    let next_num = next_quick_number(root);
    Ok(QuickContext {
        planner_model: model(&config, "bwb-planner")?,
        builder_model: model(&config, "bwb-builder")?,
        validator_model: model(&config, "bwb-validator")?,
        commit_docs: config.commit_docs,
        next_num,
        task_dir: slug
            .as_ref()
            .map(|s| format!("{}/{next_num}-{s}", paths::QUICK_DIR)),
        slug,
        description,
        date: now.format("%Y-%m-%d").to_string(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        quick_dir: paths::QUICK_DIR.to_string(),
        roadmap_exists: exists(root, paths::ROADMAP_FILE),
        planning_exists: exists(root, paths::PLANNING_DIR),
    })
}

// ---------------------------------------------------------------------------
// Existing codebases
// ---------------------------------------------------------------------------

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build"];
const AREA_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "go", "rs"];
const KEY_DIRS: &[&str] = &[
    "src", "lib", "app", "pages", "components", "api", "server", "client", "test", "tests",
    "__tests__",
];
const AREA_DIRS: &[&str] = &[
    "src", "lib", "app", "pages", "components", "api", "server", "client", "routes", "handlers",
    "services", "modules", "features",
];
const NON_AREA_SRC_DIRS: &[&str] = &[
    "__tests__", "__mocks__", "test", "tests", "types", "utils", "helpers", "config", "styles",
    "assets",
];
const FRAMEWORKS: &[(&str, &str)] = &[
    ("react", "React"),
    ("next", "Next.js"),
    ("vue", "Vue"),
    ("nuxt", "Nuxt"),
    ("angular", "Angular"),
    ("svelte", "Svelte"),
    ("express", "Express"),
    ("fastify", "Fastify"),
    ("react-native", "React Native"),
    ("expo", "Expo"),
    ("electron", "Electron"),
    ("tailwindcss", "Tailwind CSS"),
];
const SOURCE_COUNT_DEPTH: usize = 5;
const AREA_COUNT_DEPTH: usize = 3;
const AREA_MIN_FILES: usize = 2;

/// Files with one of `extensions` at most `levels` directories below `dir`,
/// never descending into dependency or build output directories.
fn count_source_files(dir: &Path, levels: usize, extensions: &[&str]) -> usize {
    if levels == 0 {
        return 0;
    }
    let here = crate::io::list_files(dir)
        .iter()
        .filter(|f| has_extension(f, extensions))
        .count();
    let below: usize = crate::io::list_subdirs(dir)
        .iter()
        .filter(|d| !SKIPPED_DIRS.contains(&d.as_str()))
        .map(|d| count_source_files(&dir.join(d), levels - 1, extensions))
        .sum();
    here + below
}

fn package_json(root: &Path) -> Option<serde_json::Value> {
    let text = crate::io::read_optional(&root.join("package.json"))?;
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "package.json is not valid JSON");
            None
        }
    }
}

fn package_name(pkg: Option<&serde_json::Value>) -> Option<String> {
    pkg?.get("name")?
        .as_str()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Display names of known frameworks listed in `dependencies` or
/// `devDependencies`.
fn frameworks(pkg: Option<&serde_json::Value>) -> Vec<String> {
    let Some(pkg) = pkg else { return Vec::new() };
    let declared = |dep: &str| {
        ["dependencies", "devDependencies"]
            .iter()
            .any(|table| pkg.get(table).and_then(|t| t.get(dep)).is_some())
    };
    FRAMEWORKS
        .iter()
        .filter(|&&(dep, _)| declared(dep))
        .map(|&(_, name)| name.to_string())
        .collect()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrownfieldContext {
    pub commit_docs: bool,
    pub project_name: Option<String>,
    pub detected_types: Vec<String>,
    pub frameworks: Vec<String>,
    pub detections: BTreeMap<String, bool>,
    pub source_file_count: usize,
    pub key_directories: Vec<String>,
    pub has_git: bool,
    pub has_readme: bool,
    pub planning_exists: bool,
}

pub fn brownfield(root: &Path) -> Result<BrownfieldContext> {
    let config = Config::load_or_default(root);
    let pkg = package_json(root);
    let detections = PACKAGE_FILES
        .iter()
        .filter(|(file, _)| exists(root, file))
        .map(|(file, _)| (file.to_string(), true))
        .collect();
    Ok(BrownfieldContext {
        commit_docs: config.commit_docs,
        project_name: package_name(pkg.as_ref()),
        detected_types: detect_types(root),
        frameworks: frameworks(pkg.as_ref()),
        detections,
        source_file_count: count_source_files(root, SOURCE_COUNT_DEPTH, SOURCE_EXTENSIONS),
        key_directories: KEY_DIRS
            .iter()
            .filter(|d| exists(root, d))
            .map(|d| d.to_string())
            .collect(),
        has_git: exists(root, ".git"),
        has_readme: exists(root, "README.md"),
        planning_exists: exists(root, paths::PLANNING_DIR),
    })
}

/// A slice of the codebase a baseline phase can describe on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeArea {
    pub name: String,
    pub path: String,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineContext {
    pub areas: Vec<CodeArea>,
    pub has_phase_00: bool,
    pub project_name: String,
    pub detected_types: Vec<String>,
    pub source_file_count: usize,
    pub commit_docs: bool,
    pub planning_exists: bool,
}

fn area(root: &Path, rel: String, dir_name: &str) -> Option<CodeArea> {
    let files = count_source_files(&root.join(&rel), AREA_COUNT_DEPTH, AREA_EXTENSIONS);
    (files >= AREA_MIN_FILES).then(|| CodeArea {
        name: capitalize(dir_name),
        path: rel,
        files,
    })
}

/// Areas are the subdirectories of `src/`; when none qualifies, the
/// conventional top-level source directories. Largest first.
fn code_areas(root: &Path) -> Vec<CodeArea> {
    let mut areas: Vec<CodeArea> = crate::io::list_subdirs(&root.join("src"))
        .iter()
        .filter(|d| !NON_AREA_SRC_DIRS.contains(&d.as_str()))
        .filter_map(|d| area(root, format!("src/{d}"), d))
        .collect();
    if areas.is_empty() {
        areas = AREA_DIRS
            .iter()
            .filter(|d| root.join(d).is_dir())
            .filter_map(|d| area(root, d.to_string(), d))
            .collect();
    }
    areas.sort_by(|a, b| b.files.cmp(&a.files));
    areas
}

pub fn baseline(root: &Path) -> Result<BaselineContext> {
    let config = Config::load_or_default(root);
    let project_name = package_name(package_json(root).as_ref()).unwrap_or_else(|| {
        let abs = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        abs.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok(BaselineContext {
        areas: code_areas(root),
        has_phase_00: exists(root, paths::BASELINE_PHASE_DIR),
        project_name,
        detected_types: detect_types(root),
        source_file_count: count_source_files(root, SOURCE_COUNT_DEPTH, SOURCE_EXTENSIONS),
        commit_docs: config.commit_docs,
        planning_exists: exists(root, paths::PLANNING_DIR),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let planning = dir.path().join(".planning");
        std::fs::create_dir_all(planning.join("phases/01-setup")).unwrap();
        std::fs::create_dir_all(planning.join("phases/02-auth")).unwrap();
        std::fs::write(planning.join("STATE.md"), "**Status:** Ready\n").unwrap();
        std::fs::write(planning.join("ROADMAP.md"), "# Roadmap\n").unwrap();
        let one = planning.join("phases/01-setup");
        for f in ["01-01-PLAN.md", "01-01-SUMMARY.md", "01-VALIDATION.md"] {
            std::fs::write(one.join(f), format!("{f} body")).unwrap();
        }
        let two = planning.join("phases/02-auth");
        for f in ["02-CONTEXT.md", "02-CONTRACTS.md", "02-01-PLAN.md", "02-02-PLAN.md", "02-01-SUMMARY.md"] {
            std::fs::write(two.join(f), format!("{f} body")).unwrap();
        }
        dir
    }

    #[test]
    fn includes_parse_trims_and_lowercases() {
        let inc = Includes::parse(" State,ROADMAP,,context ");
        assert!(inc.has("state"));
        assert!(inc.has("roadmap"));
        assert!(inc.has("context"));
        assert!(!inc.has("config"));
    }

    #[test]
    fn pad_phase_numbers() {
        assert_eq!(pad("3"), "03");
        assert_eq!(pad("12"), "12");
        assert_eq!(pad("3.1"), "03.1");
    }

    #[test]
    fn plan_phase_inlines_requested_documents() {
        let dir = project();
        let ctx = plan_phase(dir.path(), "2", &Includes::parse("state,contracts")).unwrap();
        assert!(ctx.phase.phase_found);
        assert_eq!(ctx.phase.padded_phase.as_deref(), Some("02"));
        assert_eq!(ctx.phase.plan_count, 2);
        assert!(ctx.phase.has_contracts);
        assert_eq!(ctx.documents.get("state_content"), Some("**Status:** Ready\n"));
        assert_eq!(
            ctx.documents.get("contracts_content"),
            Some("02-CONTRACTS.md body")
        );
        assert_eq!(ctx.documents.get("roadmap_content"), None);
        assert_eq!(ctx.planner_model, ModelTier::Opus);
    }

    #[test]
    fn execute_phase_lists_incomplete_plans() {
        let dir = project();
        let ctx = execute_phase(dir.path(), "02", &Includes::default()).unwrap();
        assert_eq!(ctx.incomplete_plans, vec!["02-02"]);
        assert_eq!(ctx.incomplete_count, 1);
        assert!(ctx.state_exists);
        assert!(!ctx.config_exists);
        assert!(ctx.documents.is_empty());
    }

    #[test]
    fn unknown_phase_is_not_found() {
        let dir = project();
        let ctx = phase_op(dir.path(), "9").unwrap();
        assert!(!ctx.phase.phase_found);
        assert_eq!(ctx.phase.phase_dir, None);
        assert_eq!(ctx.fix_max_iterations, 5);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["phase_found"], false);
        assert!(json["phase_dir"].is_null());
    }

    #[test]
    fn validate_joins_summaries() {
        let dir = project();
        let two = dir.path().join(".planning/phases/02-auth");
        std::fs::write(two.join("02-02-SUMMARY.md"), "second").unwrap();
        let ctx = validate(dir.path(), "2", &Includes::default()).unwrap();
        assert_eq!(
            ctx.documents.get("summaries_content"),
            Some("02-01-SUMMARY.md body\n---\nsecond")
        );
        assert!(ctx.documents.get("context_content").is_some());
    }

    #[test]
    fn progress_current_and_next() {
        let dir = project();
        std::fs::create_dir_all(dir.path().join(".planning/phases/03-billing")).unwrap();
        let ctx = progress(dir.path(), &Includes::default()).unwrap();
        assert_eq!(ctx.phase_count, 3);
        assert_eq!(ctx.completed_count, 1);
        assert_eq!(ctx.current_phase.as_ref().unwrap().number, "02");
        assert_eq!(ctx.next_phase.as_ref().unwrap().number, "03");
        assert!(ctx.has_work_in_progress);
    }

    #[test]
    fn resume_reads_agent_id() {
        let dir = project();
        std::fs::write(dir.path().join(paths::AGENT_ID_FILE), "agent-7\n").unwrap();
        let ctx = resume(dir.path()).unwrap();
        assert!(ctx.has_interrupted_agent);
        assert_eq!(ctx.interrupted_agent_id.as_deref(), Some("agent-7"));
    }

    #[test]
    fn new_project_detects_code() {
        let dir = TempDir::new().unwrap();
        let ctx = new_project(dir.path()).unwrap();
        assert!(!ctx.is_brownfield);
        assert!(!ctx.planning_exists);

        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        let ctx = new_project(dir.path()).unwrap();
        assert!(ctx.has_existing_code);
        assert!(ctx.is_brownfield);
    }

    #[test]
    fn prepare_detects_project_types() {
        let dir = project();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        let ctx = prepare(dir.path(), "2", &Includes::default()).unwrap();
        assert_eq!(ctx.detected_types, vec!["rust"]);
        assert!(ctx.has_test_dir);
        assert!(ctx.has_summaries);
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn noon() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 30, 0).unwrap()
    }

    #[test]
    fn quick_numbers_after_the_highest_entry() {
        let dir = project();
        let quick_dir = dir.path().join(paths::QUICK_DIR);
        for d in ["1-fix-typo", "7-bump-deps", "notes"] {
            std::fs::create_dir_all(quick_dir.join(d)).unwrap();
        }
        std::fs::write(quick_dir.join("3-draft.md"), "").unwrap();

        let ctx = quick(dir.path(), Some("Fix login redirect"), noon()).unwrap();
        assert_eq!(ctx.next_num, 8);
        assert_eq!(ctx.slug.as_deref(), Some("fix-login-redirect"));
        assert_eq!(ctx.task_dir.as_deref(), Some(".planning/quick/8-fix-login-redirect"));
        assert_eq!(ctx.date, "2026-03-04");
        assert_eq!(ctx.timestamp, "2026-03-04T12:30:00.000Z");
        assert!(ctx.roadmap_exists);
        assert_eq!(ctx.validator_model, ModelTier::Sonnet);
    }

    #[test]
    fn quick_without_description_has_no_task_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = quick(dir.path(), None, noon()).unwrap();
        assert_eq!(ctx.next_num, 1);
        assert_eq!(ctx.slug, None);
        assert_eq!(ctx.task_dir, None);
        assert_eq!(ctx.quick_dir, ".planning/quick");
        assert!(!ctx.planning_exists);
    }

    #[test]
    fn quick_slug_is_truncated() {
        let dir = TempDir::new().unwrap();
        let long = "word ".repeat(20);
        let ctx = quick(dir.path(), Some(&long), noon()).unwrap();
        assert_eq!(ctx.slug.as_ref().unwrap().chars().count(), 40);
    }

    #[test]
    fn brownfield_reports_stack_and_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "Cargo.toml", "[package]\n");
        write(
            root,
            "package.json",
            r#"{"name":"shop","dependencies":{"react":"^18"},"devDependencies":{"tailwindcss":"^3"}}"#,
        );
        write(root, "src/main.rs", "");
        write(root, "src/ui/app.tsx", "");
        write(root, "node_modules/react/index.js", "");
        write(root, "build/out.js", "");
        write(root, "README.md", "# Shop\n");
        std::fs::create_dir_all(root.join("tests")).unwrap();

        let ctx = brownfield(root).unwrap();
        assert_eq!(ctx.project_name.as_deref(), Some("shop"));
        assert_eq!(ctx.detected_types, vec!["node", "rust"]);
        assert_eq!(ctx.frameworks, vec!["React", "Tailwind CSS"]);
        assert_eq!(ctx.detections.get("Cargo.toml"), Some(&true));
        assert_eq!(ctx.source_file_count, 2);
        assert_eq!(ctx.key_directories, vec!["src", "tests"]);
        assert!(ctx.has_readme);
        assert!(!ctx.has_git);
    }

    #[test]
    fn baseline_groups_src_subdirectories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for f in ["a.rs", "b.rs", "c.rs"] {
            write(root, &format!("src/billing/{f}"), "");
        }
        write(root, "src/auth/login.rs", "");
        write(root, "src/auth/nested/token.rs", "");
        write(root, "src/utils/x.rs", "");
        write(root, "src/utils/y.rs", "");
        write(root, "src/docs/readme.md", "");
        std::fs::create_dir_all(root.join(paths::BASELINE_PHASE_DIR)).unwrap();

        let ctx = baseline(root).unwrap();
        assert_eq!(
            ctx.areas,
            vec![
                CodeArea { name: "Billing".into(), path: "src/billing".into(), files: 3 },
                CodeArea { name: "Auth".into(), path: "src/auth".into(), files: 2 },
            ]
        );
        assert!(ctx.has_phase_00);
        assert_eq!(ctx.source_file_count, 7);
        let dir_name = root.canonicalize().unwrap();
        assert_eq!(ctx.project_name, dir_name.file_name().unwrap().to_string_lossy());
    }

    #[test]
    fn baseline_falls_back_to_top_level_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "package.json", r#"{"name":"api"}"#);
        write(root, "server/index.js", "");
        write(root, "server/routes.js", "");
        write(root, "lib/one.py", "");

        let ctx = baseline(root).unwrap();
        assert_eq!(ctx.project_name, "api");
        assert_eq!(ctx.detected_types, vec!["node"]);
        assert_eq!(
            ctx.areas,
            vec![CodeArea { name: "Server".into(), path: "server".into(), files: 2 }]
        );
        assert!(!ctx.has_phase_00);
    }
}
