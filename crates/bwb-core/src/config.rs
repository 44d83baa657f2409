use crate::error::{BwbError, Result};
use crate::paths;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// ModelProfile / ModelTier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    Quality,
    #[default]
    Balanced,
    Budget,
}

impl ModelProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelProfile::Quality => "quality",
            ModelProfile::Balanced => "balanced",
            ModelProfile::Budget => "budget",
        }
    }

    fn column(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Opus,
    Sonnet,
    Haiku,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Opus => "opus",
            ModelTier::Sonnet => "sonnet",
            ModelTier::Haiku => "haiku",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use ModelTier::{Haiku, Opus, Sonnet};

/// Model tier per agent role, in `quality`, `balanced`, `budget` order.
const AGENT_MODELS: &[(&str, [ModelTier; 3])] = &[
    ("bwb-researcher", [Opus, Sonnet, Haiku]),
    ("bwb-planner", [Opus, Opus, Sonnet]),
    ("bwb-builder", [Opus, Sonnet, Sonnet]),
    ("bwb-validator", [Opus, Sonnet, Haiku]),
    ("bwb-fixer", [Opus, Sonnet, Sonnet]),
    ("bwb-roadmapper", [Opus, Sonnet, Sonnet]),
    ("bwb-preparer", [Sonnet, Sonnet, Haiku]),
    ("bwb-analyzer", [Opus, Sonnet, Haiku]),
];

pub fn agent_names() -> impl Iterator<Item = &'static str> {
    AGENT_MODELS.iter().map(|(name, _)| *name)
}

pub fn resolve_model(agent: &str, profile: ModelProfile) -> Result<ModelTier> {
    AGENT_MODELS
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, tiers)| tiers[profile.column()])
        .ok_or_else(|| BwbError::UnknownAgent(agent.to_string()))
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub model_profile: ModelProfile,
    pub commit_docs: bool,
    pub search_gitignored: bool,
    pub fix_max_iterations: u32,
    pub fix_auto_retry: bool,
}

fn default_fix_max_iterations() -> u32 {
    5
}

/// One top-level field of the raw document. Absent or `null` is `None`; a
/// value of the wrong type is logged and also `None`.
fn field<T: DeserializeOwned>(doc: &serde_json::Value, key: &str) -> Option<T> {
    let raw = doc.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(field = key, error = %e, "invalid config value, using default");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_profile: ModelProfile::default(),
            commit_docs: true,
            search_gitignored: false,
            fix_max_iterations: default_fix_max_iterations(),
            fix_auto_retry: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

impl Config {
    /// Defaults when the file is absent; a malformed file is an error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let doc: serde_json::Value = serde_json::from_str(&data)?;
        Ok(Config::from_json(&doc))
    }

    /// Each field resolves on its own, so one bad value does not discard
    /// the rest of the document.
    pub fn from_json(doc: &serde_json::Value) -> Self {
        let d = Config::default();
        Config {
            model_profile: field(doc, "model_profile").unwrap_or(d.model_profile),
            commit_docs: field(doc, "commit_docs").unwrap_or(d.commit_docs),
            search_gitignored: field(doc, "search_gitignored").unwrap_or(d.search_gitignored),
            fix_max_iterations: field(doc, "fix_max_iterations").unwrap_or(d.fix_max_iterations),
            fix_auto_retry: field(doc, "fix_auto_retry").unwrap_or(d.fix_auto_retry),
        }
    }

    pub fn load_or_default(root: &Path) -> Self {
        Config::load(root).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config.json unreadable, using defaults");
            Config::default()
        })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&paths::config_path(root), data.as_bytes())
    }

    pub fn model_for(&self, agent: &str) -> Result<ModelTier> {
        resolve_model(agent, self.model_profile)
    }
}

/// Create `.planning/config.json` with the user-facing defaults unless it
/// already exists.
pub fn ensure_section(root: &Path) -> Result<EnsureOutcome> {
    let path = paths::config_path(root);
    if path.exists() {
        return Ok(EnsureOutcome::AlreadyExists);
    }
    crate::io::ensure_dir(&paths::planning_dir(root))?;
    let defaults = Config::default();
    let doc = serde_json::json!({
        "model_profile": defaults.model_profile,
        "commit_docs": defaults.commit_docs,
        "search_gitignored": defaults.search_gitignored,
    });
    crate::io::atomic_write(&path, serde_json::to_string_pretty(&doc)?.as_bytes())?;
    Ok(EnsureOutcome::Created)
}

/// Set a dotted key path (`workflow.research`) in the raw config document,
/// creating intermediate objects. Returns the coerced value written.
pub fn set_key_path(root: &Path, key_path: &str, raw: &str) -> Result<serde_json::Value> {
    if key_path.is_empty() || key_path.split('.').any(str::is_empty) {
        return Err(BwbError::InvalidKey(key_path.to_string()));
    }
    let path = paths::config_path(root);
    let mut doc: serde_json::Value = match crate::io::read_optional(&path) {
        Some(data) => serde_json::from_str(&data)?,
        None => serde_json::Value::Object(Default::default()),
    };
    let value = coerce(raw);
    if !key_path.contains('.') {
        check_known_field(key_path, &value)?;
    }

    let mut parts: Vec<&str> = key_path.split('.').collect();
    let last = parts.pop().unwrap_or(key_path);
    let mut cursor = &mut doc;
    for part in parts {
        if !cursor.is_object() {
            *cursor = serde_json::Value::Object(Default::default());
        }
        cursor = cursor
            .as_object_mut()
            .map(|obj| {
                obj.entry(part)
                    .or_insert_with(|| serde_json::Value::Object(Default::default()))
            })
            .ok_or_else(|| BwbError::InvalidKey(key_path.to_string()))?;
    }
    if !cursor.is_object() {
        *cursor = serde_json::Value::Object(Default::default());
    }
    if let Some(obj) = cursor.as_object_mut() {
        obj.insert(last.to_string(), value.clone());
    }

    crate::io::atomic_write(&path, serde_json::to_string_pretty(&doc)?.as_bytes())?;
    Ok(value)
}

/// Top-level keys `Config` reads must hold a value of the right type.
fn check_known_field(key: &str, value: &serde_json::Value) -> Result<()> {
    let ok = match key {
        "model_profile" => ModelProfile::deserialize(value).is_ok(),
        "commit_docs" | "search_gitignored" | "fix_auto_retry" => value.is_boolean(),
        "fix_max_iterations" => u32::deserialize(value).is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(BwbError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn coerce(raw: &str) -> serde_json::Value {
    match raw {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return n.into();
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && !raw.trim().is_empty() => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(raw.to_string())),
        _ => serde_json::Value::String(raw.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
