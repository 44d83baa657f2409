use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PLANNING_DIR: &str = ".planning";
pub const PHASES_DIR: &str = ".planning/phases";

pub const CONFIG_FILE: &str = ".planning/config.json";
pub const STATE_FILE: &str = ".planning/STATE.md";
pub const ROADMAP_FILE: &str = ".planning/ROADMAP.md";
pub const PROJECT_FILE: &str = ".planning/PROJECT.md";
pub const AGENT_ID_FILE: &str = ".planning/current-agent-id.txt";
pub const QUICK_DIR: &str = ".planning/quick";
pub const BASELINE_PHASE_DIR: &str = ".planning/phases/00-baseline";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn planning_dir(root: &Path) -> PathBuf {
    root.join(PLANNING_DIR)
}

pub fn phases_dir(root: &Path) -> PathBuf {
    root.join(PHASES_DIR)
}

pub fn phase_dir(root: &Path, dir_name: &str) -> PathBuf {
    phases_dir(root).join(dir_name)
}

/// Root-relative form used in descriptors, e.g. `.planning/phases/02-auth`.
pub fn phase_dir_relative(dir_name: &str) -> String {
    format!("{PHASES_DIR}/{dir_name}")
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn roadmap_path(root: &Path) -> PathBuf {
    root.join(ROADMAP_FILE)
}

pub fn project_path(root: &Path) -> PathBuf {
    root.join(PROJECT_FILE)
}

/// Resolve a caller-supplied path against `root` unless it is already absolute.
pub fn resolve(root: &Path, target: &str) -> PathBuf {
    let p = Path::new(target);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn exists(root: &Path, target: &str) -> bool {
    resolve(root, target).exists()
}

// ---------------------------------------------------------------------------
// Slugs
// ---------------------------------------------------------------------------

static NON_SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn non_slug_re() -> &'static Regex {
    NON_SLUG_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Lowercase, collapse every non-alphanumeric run to `-`, trim dashes.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    non_slug_re()
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
