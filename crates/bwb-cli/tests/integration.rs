#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bwb(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bwb").unwrap();
    cmd.current_dir(dir.path())
        .env("BWB_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn json_of(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let out = bwb(dir).arg("--json").args(args).output().unwrap();
    assert!(
        out.status.success(),
        "bwb {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(dir: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(dir.path().join(rel)).unwrap()
}

const STATE: &str = "# Project State

## Current Position

**Current Phase:** 01
**Current Phase Name:** setup
**Current Plan:** 1
**Total Plans in Phase:** 2
**Status:** Ready to execute
**Step:** build
**Progress:** [░░░░░░░░░░] 0%
**Last Activity:** 2026-01-01

## Performance Metrics

| Plan | Duration | Tasks | Files |
|------|----------|-------|-------|
| None yet | - | - | - |

## Accumulated Context

### Decisions

None yet.

### Blockers/Concerns

None

## Session Continuity

**Last session:** never
**Stopped At:** nothing
**Resume File:** None
";

const ROADMAP: &str = "# Roadmap

## Phases

- [ ] **Phase 1: Setup** - scaffolding
- [ ] **Phase 2: Auth** - login

## Phase Details

### Phase 1: Setup
**Goal:** Running skeleton
**Depends on:** Nothing (first phase)

### Phase 2: Auth
**Goal:** Users can log in
**Depends on:** Phase 1

---
*Last updated: 2026-01-01*
";

/// Phase 1 complete (one plan, one summary), phase 2 planned.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(&dir, ".planning/STATE.md", STATE);
    write(&dir, ".planning/ROADMAP.md", ROADMAP);
    write(&dir, ".planning/phases/01-setup/01-01-PLAN.md", "---\nwave: 1\n---\n");
    write(
        &dir,
        ".planning/phases/01-setup/01-01-SUMMARY.md",
        "---\nphase: 01-setup\none-liner: Skeleton builds\nprovides: [cli]\n---\n",
    );
    write(&dir, ".planning/phases/02-auth/02-01-PLAN.md", "---\nwave: 1\n---\n");
    dir
}

// ---------------------------------------------------------------------------
// find-phase / phases
// ---------------------------------------------------------------------------

#[test]
fn find_phase_ignores_padding() {
    let dir = project();
    let a = json_of(&dir, &["find-phase", "2"]);
    let b = json_of(&dir, &["find-phase", "02"]);
    assert_eq!(a, b);
    assert_eq!(a["found"], true);
    assert_eq!(a["directory"], ".planning/phases/02-auth");
    assert_eq!(a["phase_number"], "02");
    assert_eq!(a["incomplete_plans"], serde_json::json!(["02-01"]));
}

#[test]
fn find_phase_missing_is_not_an_error() {
    let dir = project();
    let v = json_of(&dir, &["find-phase", "9"]);
    assert_eq!(v["found"], false);
}

#[test]
fn phases_list_in_numeric_order() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".planning/phases/10-later")).unwrap();
    let v = json_of(&dir, &["phases", "list"]);
    let numbers: Vec<&str> = v["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["01", "02", "10"]);
}

#[test]
fn phases_list_summaries() {
    let dir = project();
    bwb(&dir)
        .args(["phases", "list", "--type", "summaries"])
        .assert()
        .success()
        .stdout("01-01-SUMMARY.md\n");
}

// ---------------------------------------------------------------------------
// roadmap
// ---------------------------------------------------------------------------

#[test]
fn roadmap_analyze_reports_progress() {
    let dir = project();
    let v = json_of(&dir, &["roadmap", "analyze"]);
    assert_eq!(v["phase_count"], 2);
    assert_eq!(v["phases"][0]["disk_status"], "complete");
    assert_eq!(v["phases"][1]["disk_status"], "planned");
    assert_eq!(v["progress_percent"], 50);
    assert_eq!(v["current_phase"], "2");
}

#[test]
fn roadmap_get_phase() {
    let dir = project();
    let v = json_of(&dir, &["roadmap", "get-phase", "02"]);
    assert_eq!(v["found"], true);
    assert_eq!(v["phase_name"], "Auth");
    assert_eq!(v["goal"], "Users can log in");
}

#[test]
fn phase_add_creates_directory_and_section() {
    let dir = project();
    let v = json_of(&dir, &["phase", "add", "Billing", "and", "Invoices"]);
    assert_eq!(v["phase_number"], 3);
    assert_eq!(v["directory"], ".planning/phases/03-billing-and-invoices");
    assert!(dir.path().join(".planning/phases/03-billing-and-invoices").is_dir());

    let roadmap = read(&dir, ".planning/ROADMAP.md");
    let section = roadmap.find("### Phase 3: Billing and Invoices").unwrap();
    assert!(section < roadmap.rfind("\n---").unwrap());
    assert!(roadmap.contains("**Depends on:** Phase 2"));
}

#[test]
fn phase_complete_ticks_roadmap_and_moves_state() {
    let dir = project();
    let v = json_of(&dir, &["phase", "complete", "1"]);
    assert_eq!(v["next_phase"], "02");
    assert_eq!(v["is_last_phase"], false);
    assert_eq!(v["roadmap_updated"], true);

    let roadmap = read(&dir, ".planning/ROADMAP.md");
    assert!(roadmap.contains("- [x] **Phase 1: Setup**"));
    assert!(roadmap.contains("- [ ] **Phase 2: Auth**"));

    let state = read(&dir, ".planning/STATE.md");
    assert!(state.contains("**Current Phase:** 02"));
    assert!(state.contains("**Current Phase Name:** auth"));
    assert!(state.contains("**Status:** Ready to research"));
}

#[test]
fn phase_complete_unknown_phase_fails() {
    let dir = project();
    bwb(&dir)
        .args(["phase", "complete", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("phase not found: 7"));
}

// ---------------------------------------------------------------------------
// state
// ---------------------------------------------------------------------------

#[test]
fn state_get_field_and_section() {
    let dir = project();
    bwb(&dir)
        .args(["state", "get", "Status"])
        .assert()
        .success()
        .stdout("Ready to execute\n");
    bwb(&dir)
        .args(["state", "get", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("section 'Nope' not found"));
}

#[test]
fn state_update_and_patch() {
    let dir = project();
    bwb(&dir)
        .args(["state", "update", "Status", "Building"])
        .assert()
        .success()
        .stdout("true\n");

    let v = json_of(
        &dir,
        &["state", "patch", "--step", "validate", "--missing-field", "x"],
    );
    assert_eq!(v["updated"], serde_json::json!(["Step"]));
    assert_eq!(v["failed"], serde_json::json!(["Missing Field"]));

    let state = read(&dir, ".planning/STATE.md");
    assert!(state.contains("**Status:** Building\n"));
    assert!(state.contains("**Step:** validate\n"));
}

#[test]
fn state_advance_plan_then_ready_for_validation() {
    let dir = project();
    let v = json_of(&dir, &["state", "advance-plan"]);
    assert_eq!(v["advanced"], true);
    assert_eq!(v["current_plan"], 2);

    let v = json_of(&dir, &["state", "advance-plan"]);
    assert_eq!(v["advanced"], false);
    assert!(v["status"].as_str().unwrap().contains("ready for validation"));
}

#[test]
fn state_decisions_and_blockers() {
    let dir = project();
    bwb(&dir)
        .args([
            "state",
            "add-decision",
            "--phase",
            "1",
            "--summary",
            "Use SQLite",
            "--rationale",
            "single file",
        ])
        .assert()
        .success();
    bwb(&dir)
        .args(["state", "add-blocker", "--text", "flaky CI"])
        .assert()
        .success();

    let state = read(&dir, ".planning/STATE.md");
    assert!(state.contains("- [Phase 1]: Use SQLite — single file"));
    assert!(!state.contains("None yet."));
    assert!(state.contains("- flaky CI"));

    let snap = json_of(&dir, &["state", "snapshot"]);
    assert_eq!(snap["decisions"][0]["summary"], "Use SQLite");
    assert_eq!(snap["blockers"], serde_json::json!(["flaky CI"]));

    bwb(&dir)
        .args(["state", "resolve-blocker", "--text", "flaky"])
        .assert()
        .success();
    let state = read(&dir, ".planning/STATE.md");
    assert!(!state.contains("flaky CI"));
    assert!(state.contains("### Blockers/Concerns\n\nNone\n"));
}

#[test]
fn state_record_metric_replaces_placeholder() {
    let dir = project();
    bwb(&dir)
        .args([
            "state",
            "record-metric",
            "--phase",
            "1",
            "--plan",
            "01",
            "--duration",
            "12min",
            "--tasks",
            "3",
        ])
        .assert()
        .success()
        .stdout("true\n");
    let state = read(&dir, ".planning/STATE.md");
    assert!(state.contains("| Phase 1 P01 | 12min | 3 tasks | - files |"));
    assert!(!state.contains("| None yet |"));
}

#[test]
fn state_update_progress_writes_bar() {
    let dir = project();
    bwb(&dir)
        .args(["state", "update-progress"])
        .assert()
        .success()
        .stdout("[█████░░░░░] 50%\n");
    assert!(read(&dir, ".planning/STATE.md").contains("**Progress:** [█████░░░░░] 50%"));
}

#[test]
fn state_commands_without_document_fail() {
    let dir = TempDir::new().unwrap();
    bwb(&dir)
        .args(["state", "snapshot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));
}

// ---------------------------------------------------------------------------
// frontmatter
// ---------------------------------------------------------------------------

#[test]
fn frontmatter_set_get_merge() {
    let dir = project();
    let plan = ".planning/phases/02-auth/02-01-PLAN.md";
    bwb(&dir)
        .args(["frontmatter", "set", plan, "--field", "autonomous", "--value", "true"])
        .assert()
        .success();
    bwb(&dir)
        .args([
            "frontmatter",
            "merge",
            plan,
            "--data",
            r#"{"contracts": ["FEAT-01", "FEAT-02"], "type": "execute"}"#,
        ])
        .assert()
        .success();

    let v = json_of(&dir, &["frontmatter", "get", plan]);
    assert_eq!(v["wave"], "1");
    assert_eq!(v["autonomous"], "true");
    assert_eq!(v["contracts"], serde_json::json!(["FEAT-01", "FEAT-02"]));

    bwb(&dir)
        .args(["frontmatter", "get", plan, "--field", "type"])
        .assert()
        .success()
        .stdout("execute\n");
}

#[test]
fn frontmatter_get_missing_is_reported_not_failed() {
    let dir = project();
    let v = json_of(&dir, &["frontmatter", "get", "nope.md"]);
    assert_eq!(v["error"], "File not found");
    let v = json_of(
        &dir,
        &["frontmatter", "get", ".planning/phases/02-auth/02-01-PLAN.md", "--field", "x"],
    );
    assert_eq!(v["error"], "Field not found");
}

#[test]
fn frontmatter_merge_rejects_bad_json() {
    let dir = project();
    bwb(&dir)
        .args([
            "frontmatter",
            "merge",
            ".planning/phases/02-auth/02-01-PLAN.md",
            "--data",
            "{not json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON for --data"));
}

#[test]
fn frontmatter_validate_schema() {
    let dir = project();
    let v = json_of(
        &dir,
        &[
            "frontmatter",
            "validate",
            ".planning/phases/01-setup/01-01-SUMMARY.md",
            "--schema",
            "summary",
        ],
    );
    assert_eq!(v["valid"], false);
    assert_eq!(v["present"], serde_json::json!(["phase"]));

    bwb(&dir)
        .args(["frontmatter", "validate", "x.md", "--schema", "roadmap"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown schema 'roadmap'"));
}

// ---------------------------------------------------------------------------
// config / models
// ---------------------------------------------------------------------------

#[test]
fn config_ensure_section_is_idempotent() {
    let dir = TempDir::new().unwrap();
    bwb(&dir)
        .args(["config", "ensure-section"])
        .assert()
        .success()
        .stdout("created\n");
    bwb(&dir)
        .args(["config", "ensure-section"])
        .assert()
        .success()
        .stdout("already_exists\n");
    assert!(dir.path().join(".planning/config.json").exists());
}

#[test]
fn config_set_and_resolve_model() {
    let dir = TempDir::new().unwrap();
    bwb(&dir)
        .args(["config", "set", "model_profile", "budget"])
        .assert()
        .success();
    bwb(&dir)
        .args(["config", "set", "workflow.research", "false"])
        .assert()
        .success();

    let raw: serde_json::Value =
        serde_json::from_str(&read(&dir, ".planning/config.json")).unwrap();
    assert_eq!(raw["workflow"]["research"], false);

    bwb(&dir)
        .args(["resolve-model", "bwb-researcher"])
        .assert()
        .success()
        .stdout("haiku\n");
    bwb(&dir)
        .args(["resolve-model", "bwb-nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown agent 'bwb-nobody'"));
}

#[test]
fn config_set_rejects_unknown_profile() {
    let dir = TempDir::new().unwrap();
    bwb(&dir)
        .args(["config", "set", "model_profile", "turbo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config key 'model_profile'"));
    assert!(!dir.path().join(".planning/config.json").exists());
}

#[test]
fn one_bad_config_value_keeps_the_rest() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".planning/config.json",
        r#"{"model_profile": "budget", "commit_docs": false, "fix_max_iterations": -1}"#,
    );
    bwb(&dir)
        .args(["resolve-model", "bwb-researcher"])
        .assert()
        .success()
        .stdout("haiku\n");
    let v = json_of(&dir, &["init", "phase-op", "1"]);
    assert_eq!(v["commit_docs"], false);
    assert_eq!(v["fix_max_iterations"], 5);
}

// ---------------------------------------------------------------------------
// verify / digest / index
// ---------------------------------------------------------------------------

#[test]
fn verify_phase_completeness() {
    let dir = project();
    let v = json_of(&dir, &["verify", "phase-completeness", "2"]);
    assert_eq!(v["complete"], false);
    assert_eq!(v["incomplete_plans"], serde_json::json!(["02-01"]));

    let v = json_of(&dir, &["verify", "phase-completeness", "1"]);
    assert_eq!(v["complete"], true);
}

#[test]
fn history_digest_collects_summaries() {
    let dir = project();
    let v = json_of(&dir, &["history-digest"]);
    assert_eq!(v["phases"]["01-setup"]["provides"], serde_json::json!(["cli"]));
}

#[test]
fn summary_extract_filters_fields() {
    let dir = project();
    let v = json_of(
        &dir,
        &[
            "summary-extract",
            ".planning/phases/01-setup/01-01-SUMMARY.md",
            "--fields",
            "one_liner",
        ],
    );
    assert_eq!(v["one_liner"], "Skeleton builds");
    assert!(v.get("key_files").is_none());
    assert!(v.get("path").is_some());
}

#[test]
fn phase_plan_index_groups_waves() {
    let dir = project();
    let v = json_of(&dir, &["phase-plan-index", "2"]);
    assert_eq!(v["waves"]["1"], serde_json::json!(["02-01"]));
    assert_eq!(v["incomplete"], serde_json::json!(["02-01"]));
}

// ---------------------------------------------------------------------------
// init bundles / utilities
// ---------------------------------------------------------------------------

#[test]
fn init_plan_phase_inlines_state() {
    let dir = project();
    let out = bwb(&dir)
        .args(["init", "plan-phase", "2", "--include", "state"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["phase_found"], true);
    assert_eq!(v["padded_phase"], "02");
    assert_eq!(v["plan_count"], 1);
    assert_eq!(v["state_content"], STATE);
    assert!(v.get("roadmap_content").is_none());
}

#[test]
fn init_progress_current_phase() {
    let dir = project();
    let v = json_of(&dir, &["init", "progress"]);
    assert_eq!(v["phase_count"], 2);
    assert_eq!(v["current_phase"]["number"], "01");
    assert_eq!(v["current_phase"]["step"], "prepare");
}

#[test]
fn init_quick_numbers_task_directories() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".planning/quick/4-old-task")).unwrap();
    let v = json_of(&dir, &["init", "quick", "Tidy", "the", "README"]);
    assert_eq!(v["next_num"], 5);
    assert_eq!(v["slug"], "tidy-the-readme");
    assert_eq!(v["description"], "Tidy the README");
    assert_eq!(v["task_dir"], ".planning/quick/5-tidy-the-readme");

    let v = json_of(&dir, &["init", "quick"]);
    assert!(v["task_dir"].is_null());
}

#[test]
fn init_brownfield_and_baseline_describe_the_codebase() {
    let dir = TempDir::new().unwrap();
    write(&dir, "Cargo.toml", "[package]\n");
    write(&dir, "src/store/mod.rs", "");
    write(&dir, "src/store/disk.rs", "");
    write(&dir, "src/main.rs", "");

    let v = json_of(&dir, &["init", "brownfield"]);
    assert_eq!(v["detected_types"], serde_json::json!(["rust"]));
    assert_eq!(v["source_file_count"], 3);
    assert_eq!(v["key_directories"], serde_json::json!(["src"]));

    let v = json_of(&dir, &["init", "baseline"]);
    assert_eq!(v["areas"][0]["name"], "Store");
    assert_eq!(v["areas"][0]["files"], 2);
    assert_eq!(v["has_phase_00"], false);
}

#[test]
fn generate_slug_and_verify_path() {
    let dir = project();
    bwb(&dir)
        .args(["generate-slug", "Hello,", "World!"])
        .assert()
        .success()
        .stdout("hello-world\n");

    let v = json_of(&dir, &["verify-path-exists", ".planning/phases"]);
    assert_eq!(v["exists"], true);
    assert_eq!(v["type"], "directory");
    bwb(&dir)
        .args(["verify-path-exists", "missing.txt"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn current_timestamp_date_format() {
    let dir = TempDir::new().unwrap();
    bwb(&dir)
        .args(["current-timestamp", "date"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d{4}-\d{2}-\d{2}\n$").unwrap());
}
