//! Metadata block ("frontmatter") codec.
//!
//! A document may open with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! phase: 02-auth
//! tags: [api, jwt]
//! dependency-graph:
//!   provides:
//!     - session tokens
//! ---
//! # Body
//! ```
//!
//! Only a restricted shape is understood: string scalars, inline lists,
//! block lists and nested mappings. Values are never coerced; callers decide
//! what a `"true"` or `"3"` means. Text written by [`encode`] decodes back to
//! the same [`Mapping`]; arbitrary hand-written blocks decode best-effort.

use crate::error::{BwbError, Result};
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Value / Mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
    Map(Mapping),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// List items, with a lone scalar treated as a one-item list.
    pub fn items(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::List(items) => items.clone(),
            Value::Map(_) => Vec::new(),
        }
    }

    /// Convert a JSON value. `null` has no representation and yields `None`;
    /// numbers and booleans become their textual form, and non-string array
    /// items are stored as compact JSON.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::Scalar(s.clone())),
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
                Some(Value::Scalar(value.to_string()))
            }
            serde_json::Value::Array(items) => Some(Value::List(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            serde_json::Value::Object(obj) => Some(Value::Map(Mapping::from_json_object(obj))),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

/// Insertion-ordered string-keyed mapping. Keys are unique; re-inserting a
/// key replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow merge: every key of `other` overwrites or extends `self`.
    pub fn merge(&mut self, other: Mapping) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }

    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut m = Mapping::new();
        for (k, v) in obj {
            if let Some(v) = Value::from_json(v) {
                m.insert(k.clone(), v);
            }
        }
        m
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

static KEY_LINE_RE: OnceLock<Regex> = OnceLock::new();
static VALID_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_line_re() -> &'static Regex {
    KEY_LINE_RE.get_or_init(|| Regex::new(r"^(\s*)([a-zA-Z0-9_-]+):\s*(.*)").unwrap())
}

fn valid_key_re() -> &'static Regex {
    VALID_KEY_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_-]*$").unwrap())
}

/// Reject keys that would not survive an encode/decode cycle.
pub fn validate_key(key: &str) -> Result<()> {
    if valid_key_re().is_match(key) {
        Ok(())
    } else {
        Err(BwbError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Block location
// ---------------------------------------------------------------------------

struct Block {
    body: Range<usize>,
    end: usize,
}

const OPEN: &str = "---\n";
const CLOSE: &str = "\n---";

/// The block must open the document; it closes at the first line starting
/// with `---`.
fn locate(text: &str) -> Option<Block> {
    let rest = text.strip_prefix(OPEN)?;
    let close = rest.find(CLOSE)?;
    let body_start = OPEN.len();
    Some(Block {
        body: body_start..body_start + close,
        end: body_start + close + CLOSE.len(),
    })
}

pub fn has_block(text: &str) -> bool {
    locate(text).is_some()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

enum Slot {
    Value(Value),
    Child(usize),
}

enum Node {
    Map(Vec<(String, Slot)>),
    List(Vec<String>),
}

struct Frame {
    node: usize,
    indent: isize,
}

/// Decode the metadata block of a document. No block, or an unreadable one,
/// yields an empty mapping.
pub fn decode(text: &str) -> Mapping {
    match locate(text) {
        Some(block) => decode_block(&text[block.body]),
        None => Mapping::new(),
    }
}

/// Decode block content (the text between the delimiters).
pub fn decode_block(body: &str) -> Mapping {
    let mut nodes = vec![Node::Map(Vec::new())];
    let mut stack = vec![Frame { node: 0, indent: -1 }];

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.chars().take_while(|c| c.is_whitespace()).count() as isize;
        while stack.len() > 1 && stack.last().is_some_and(|f| indent <= f.indent) {
            stack.pop();
        }
        let current = stack.last().map(|f| f.node).unwrap_or(0);

        if let Some(caps) = key_line_re().captures(line) {
            let key = caps[2].to_string();
            let value = caps[3].trim();
            if value.is_empty() || value == "[" {
                let child = nodes.len();
                nodes.push(if value == "[" {
                    Node::List(Vec::new())
                } else {
                    Node::Map(Vec::new())
                });
                set_slot(&mut nodes[current], key, Slot::Child(child));
                stack.push(Frame {
                    node: child,
                    indent,
                });
            } else if value.starts_with('[') && value.ends_with(']') {
                let items = split_inline(&value[1..value.len() - 1]);
                set_slot(&mut nodes[current], key, Slot::Value(Value::List(items)));
            } else {
                let scalar = Value::Scalar(unquote(value).to_string());
                set_slot(&mut nodes[current], key, Slot::Value(scalar));
            }
        } else if let Some(item) = line.trim().strip_prefix("- ") {
            let item = unquote(item).to_string();
            match &mut nodes[current] {
                // A container opened by `key:` is a mapping until its first
                // list item shows up; rewrite it in place.
                Node::Map(entries) if entries.is_empty() => {
                    if stack.len() > 1 {
                        nodes[current] = Node::List(vec![item]);
                    }
                }
                Node::List(items) => items.push(item),
                Node::Map(_) => {}
            }
        }
    }

    match materialize(&nodes, 0) {
        Value::Map(m) => m,
        _ => Mapping::new(),
    }
}

fn set_slot(node: &mut Node, key: String, slot: Slot) {
    if let Node::Map(entries) = node {
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = slot,
            None => entries.push((key, slot)),
        }
    }
}

fn materialize(nodes: &[Node], idx: usize) -> Value {
    match &nodes[idx] {
        Node::List(items) => Value::List(items.clone()),
        Node::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, slot)| {
                    let v = match slot {
                        Slot::Value(v) => v.clone(),
                        Slot::Child(child) => materialize(nodes, *child),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
    }
}

fn split_inline(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(|s| unquote(s.trim()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strip at most one leading and one trailing quote character.
fn unquote(s: &str) -> &str {
    let s = s
        .strip_prefix('"')
        .or_else(|| s.strip_prefix('\''))
        .unwrap_or(s);
    s.strip_suffix('"')
        .or_else(|| s.strip_suffix('\''))
        .unwrap_or(s)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

const INLINE_MAX_ITEMS: usize = 3;
const INLINE_MAX_WIDTH: usize = 60;

/// Serialize a mapping as block content (without delimiters), two spaces of
/// indentation per nesting level.
pub fn encode(map: &Mapping) -> String {
    let mut lines = Vec::new();
    write_mapping(map, 0, &mut lines);
    lines.join("\n")
}

fn write_mapping(map: &Mapping, depth: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for (key, value) in map.iter() {
        match value {
            Value::Scalar(s) => lines.push(format!("{pad}{key}: {}", quote(s))),
            Value::List(items) if items.is_empty() => lines.push(format!("{pad}{key}: []")),
            Value::List(items) if fits_inline(items) => {
                lines.push(format!("{pad}{key}: [{}]", items.join(", ")))
            }
            Value::List(items) => {
                lines.push(format!("{pad}{key}:"));
                for item in items {
                    lines.push(format!("{pad}  - {}", quote(item)));
                }
            }
            Value::Map(m) => {
                lines.push(format!("{pad}{key}:"));
                write_mapping(m, depth + 1, lines);
            }
        }
    }
}

fn fits_inline(items: &[String]) -> bool {
    items.len() <= INLINE_MAX_ITEMS
        && items.join(", ").len() < INLINE_MAX_WIDTH
        && items
            .iter()
            .all(|i| !needs_quotes(i) && !i.contains([',', '[', ']']))
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.contains([':', '#'])
        || s.starts_with(['[', '{', '"', '\''])
        || s.ends_with(['"', '\''])
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
}

fn quote(s: &str) -> String {
    if needs_quotes(s) {
        format!("\"{s}\"")
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Splicing
// ---------------------------------------------------------------------------

/// Replace the document's metadata block with `map`, leaving everything
/// after the closing delimiter untouched. A document without a block gets
/// one prepended.
pub fn splice(text: &str, map: &Mapping) -> String {
    let yaml = encode(map);
    match locate(text) {
        Some(block) => format!("---\n{yaml}\n---{}", &text[block.end..]),
        None => format!("---\n{yaml}\n---\n\n{text}"),
    }
}

// ---------------------------------------------------------------------------
// Document operations
// ---------------------------------------------------------------------------

/// Read a document and decode its block. `None` when the file is unreadable.
pub fn read(path: &Path) -> Option<(String, Mapping)> {
    let content = crate::io::read_optional(path)?;
    let fm = decode(&content);
    Some((content, fm))
}

/// Set one key on a document's block. `raw` is parsed as JSON when it can be,
/// otherwise stored as a plain string. Returns the stored value, or `None`
/// for a JSON `null` (which removes the key).
pub fn set_field(path: &Path, key: &str, raw: &str) -> Result<Option<Value>> {
    validate_key(key)?;
    let (content, mut fm) =
        read(path).ok_or_else(|| BwbError::DocumentNotFound(path.display().to_string()))?;
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Some(Value::Scalar(raw.to_string())),
    };
    match &value {
        Some(v) => {
            fm.insert(key, v.clone());
        }
        None => {
            fm.remove(key);
        }
    }
    crate::io::atomic_write(path, splice(&content, &fm).as_bytes())?;
    Ok(value)
}

/// Shallow-merge a JSON object into a document's block. Returns merged keys.
/// Unparseable `data` is a hard error.
pub fn merge_json(path: &Path, data: &str) -> Result<Vec<String>> {
    let parsed: serde_json::Value =
        serde_json::from_str(data).map_err(|e| BwbError::InvalidPayload {
            what: "--data".to_string(),
            reason: e.to_string(),
        })?;
    let serde_json::Value::Object(obj) = parsed else {
        return Err(BwbError::InvalidPayload {
            what: "--data".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };
    for key in obj.keys() {
        validate_key(key)?;
    }
    let (content, mut fm) =
        read(path).ok_or_else(|| BwbError::DocumentNotFound(path.display().to_string()))?;
    let keys: Vec<String> = obj.keys().cloned().collect();
    for (k, v) in &obj {
        match Value::from_json(v) {
            Some(v) => {
                fm.insert(k.clone(), v);
            }
            None => {
                fm.remove(k);
            }
        }
    }
    crate::io::atomic_write(path, splice(&content, &fm).as_bytes())?;
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
