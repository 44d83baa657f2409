//! Labeled-field and section patching inside document prose.
//!
//! Fields follow the `**Label:** value` convention and are matched
//! case-insensitively. Sections are markdown headings; a section body runs
//! to the next heading of equal or higher rank, or to the end of the text.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;

/// Label pattern of the decisions section in the status document.
pub const DECISIONS_SECTION: &str = r"Decisions|Decisions Made|Accumulated.*Decisions";
/// Label pattern of the blockers section in the status document.
pub const BLOCKERS_SECTION: &str = r"Blockers|Blockers/Concerns|Concerns";

pub const DECISION_PLACEHOLDERS: &[&str] = &["None yet", "No decisions yet", "None"];
pub const BLOCKER_PLACEHOLDERS: &[&str] = &["None yet", "None"];
/// Written back when the last bullet of a section is removed.
pub const EMPTY_PLACEHOLDER: &str = "None";

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

fn field_re(label: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)(\*\*{}:\*\*[ \t]*)([^\r\n]*)",
        regex::escape(label)
    ))
    .ok()
}

/// Value of the first `**Label:**` line, trimmed. An empty value is `None`.
pub fn extract_field(text: &str, label: &str) -> Option<String> {
    let caps = field_re(label)?.captures(text)?;
    let value = caps[2].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Rewrite the value of the first `**Label:**` line, keeping everything on
/// the line before the value. `None` when the label does not occur; callers
/// treat that as a no-op.
pub fn replace_field(text: &str, label: &str, value: &str) -> Option<String> {
    let re = field_re(label)?;
    if !re.is_match(text) {
        return None;
    }
    Some(
        re.replacen(text, 1, |caps: &Captures| format!("{}{}", &caps[1], value))
            .into_owned(),
    )
}

/// Try each label in order and rewrite the first one present.
pub fn replace_any_field(text: &str, labels: &[&str], value: &str) -> Option<String> {
    labels
        .iter()
        .find_map(|label| replace_field(text, label, value))
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t]*$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub level: usize,
    /// Byte range of the body, starting after the heading line.
    pub body: Range<usize>,
}

/// Locate the first heading whose whole label matches `label_pattern`
/// (a case-insensitive regex alternation).
pub fn find_section(text: &str, label_pattern: &str) -> Option<Section> {
    let label_re = Regex::new(&format!(r"(?i)^(?:{label_pattern})$")).ok()?;
    let mut offset = 0;
    let mut found: Option<(usize, usize)> = None;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let Some(caps) = heading_re().captures(line.trim_end_matches(['\n', '\r'])) else {
            continue;
        };
        let level = caps[1].len();
        match found {
            None if label_re.is_match(&caps[2]) => found = Some((level, offset)),
            Some((open_level, body_start)) if level <= open_level => {
                return Some(Section {
                    level: open_level,
                    body: body_start..start,
                });
            }
            _ => {}
        }
    }

    found.map(|(level, body_start)| Section {
        level,
        body: body_start..text.len(),
    })
}

pub fn section_body<'a>(text: &'a str, label_pattern: &str) -> Option<&'a str> {
    find_section(text, label_pattern).map(|s| &text[s.body])
}

/// Section body for a literal heading label.
pub fn section_body_literal<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    section_body(text, &regex::escape(label))
}

fn rewrite_section(
    text: &str,
    label_pattern: &str,
    f: impl FnOnce(&str) -> String,
) -> Option<String> {
    let section = find_section(text, label_pattern)?;
    let body = f(&text[section.body.clone()]);
    Some(format!(
        "{}{}{}",
        &text[..section.body.start],
        body,
        &text[section.body.end..]
    ))
}

/// Append `line` to a section, dropping placeholder lines first. `None` when
/// the section does not exist.
pub fn append_to_section(
    text: &str,
    label_pattern: &str,
    line: &str,
    placeholders: &[&str],
) -> Option<String> {
    rewrite_section(text, label_pattern, |body| {
        append_line(body, line, placeholders)
    })
}

/// Remove bullets containing `fragment` from a section. `None` when the
/// section does not exist.
pub fn remove_from_section(
    text: &str,
    label_pattern: &str,
    fragment: &str,
    placeholder: &str,
) -> Option<String> {
    rewrite_section(text, label_pattern, |body| {
        remove_matching(body, fragment, placeholder)
    })
}

// ---------------------------------------------------------------------------
// Body transforms
// ---------------------------------------------------------------------------

/// Split a body into leading blank lines, content, and trailing blank lines
/// (minus the newline that terminates the last content line).
fn split_padding(body: &str) -> (&str, &str, &str) {
    let lead_len = body.len() - body.trim_start_matches(['\n', '\r']).len();
    let (lead, rest) = body.split_at(lead_len);
    let core = rest.trim_end_matches(['\n', '\r']);
    let mut trail = &rest[core.len()..];
    trail = trail
        .strip_prefix("\r\n")
        .or_else(|| trail.strip_prefix('\n'))
        .unwrap_or(trail);
    (lead, core, trail)
}

fn is_placeholder(line: &str, placeholders: &[&str]) -> bool {
    let t = line.trim();
    let t = t.strip_suffix('.').unwrap_or(t);
    placeholders.iter().any(|p| p.eq_ignore_ascii_case(t))
}

pub fn append_line(body: &str, line: &str, placeholders: &[&str]) -> String {
    let (lead, core, trail) = split_padding(body);
    let mut lines: Vec<&str> = core
        .lines()
        .filter(|l| !is_placeholder(l, placeholders))
        .collect();
    lines.push(line);
    format!("{lead}{}\n{trail}", lines.join("\n"))
}

/// Drop `- ` bullets containing `fragment` (case-insensitive). When no bullet
/// remains the content becomes the placeholder line.
pub fn remove_matching(body: &str, fragment: &str, placeholder: &str) -> String {
    let (lead, core, trail) = split_padding(body);
    let needle = fragment.to_lowercase();
    let kept: Vec<&str> = core
        .lines()
        .filter(|l| !(l.starts_with("- ") && l.to_lowercase().contains(&needle)))
        .collect();
    let content = if kept.iter().any(|l| l.starts_with("- ")) {
        kept.join("\n")
    } else {
        placeholder.to_string()
    };
    format!("{lead}{content}\n{trail}")
}

/// `- ` bullet texts of a body, without the marker.
pub fn bullet_items(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.trim_start().strip_prefix("- "))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
