use bwb_core::evidence::Evidence;
use bwb_core::frontmatter::{self, Mapping, Value};
use bwb_core::phase;
use bwb_core::status;
use proptest::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// YAML core-schema keywords are left out so the YAML cross-check sees
/// every key as a string.
fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("yaml keyword", |k| {
        !matches!(k.as_str(), "true" | "false" | "null")
    })
}

fn text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]",
        "[a-z][a-z0-9 _./-]{0,14}[a-z0-9]",
    ]
}

/// Scalars and lists; lists long enough to cover both the inline and the
/// block form.
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        text().prop_map(Value::Scalar),
        prop::collection::vec(text(), 0..7).prop_map(Value::List),
    ]
}

fn mapping_of<S>(values: S) -> impl Strategy<Value = Mapping>
where
    S: Strategy<Value = Value>,
{
    prop::collection::btree_map(key(), values, 0..6).prop_map(|m| m.into_iter().collect())
}

/// Top-level mappings with at most one level of nesting.
fn mapping() -> impl Strategy<Value = Mapping> {
    mapping_of(prop_oneof![
        3 => leaf(),
        1 => mapping_of(leaf()).prop_map(Value::Map),
    ])
}

fn prose() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 #*\n]{0,80}"
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn encode_then_decode_is_identity(m in mapping()) {
        prop_assert_eq!(frontmatter::decode_block(&frontmatter::encode(&m)), m);
    }

    #[test]
    fn splice_is_idempotent(body in prose(), m in mapping()) {
        let once = frontmatter::splice(&body, &m);
        prop_assert_eq!(frontmatter::splice(&once, &m), once.clone());
        prop_assert_eq!(frontmatter::decode(&once), m);
    }

    #[test]
    fn splice_replaces_existing_block(first in mapping(), second in mapping(), body in prose()) {
        let doc = frontmatter::splice(&body, &first);
        let replaced = frontmatter::splice(&doc, &second);
        prop_assert_eq!(frontmatter::decode(&replaced), second);
        prop_assert!(replaced.ends_with(&body));
    }

    #[test]
    fn encoded_block_is_valid_yaml(m in mapping()) {
        let yaml = frontmatter::encode(&m);
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml)
            .map_err(|e| TestCaseError::fail(format!("{e}\n{yaml}")))?;
        if m.is_empty() {
            prop_assert!(parsed.is_null());
        } else {
            let obj = parsed.as_mapping().ok_or_else(|| TestCaseError::fail("not a mapping"))?;
            prop_assert_eq!(obj.len(), m.len());
            for k in m.keys() {
                prop_assert!(obj.contains_key(k), "missing key {k}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

fn evidence(plans: usize, summaries: usize) -> Evidence {
    let files = (1..=plans)
        .map(|i| format!("01-{i:02}-PLAN.md"))
        .chain((1..=summaries).map(|i| format!("01-{i:02}-SUMMARY.md")));
    Evidence::from_files(files)
}

proptest! {
    #[test]
    fn status_never_regresses_as_summaries_land(plans in 1usize..12) {
        let mut previous = status::classify(&evidence(plans, 0));
        for summaries in 1..=plans {
            let next = status::classify(&evidence(plans, summaries));
            prop_assert!(next >= previous, "{next:?} < {previous:?} at {summaries}/{plans}");
            previous = next;
        }
        prop_assert_eq!(previous, status::PhaseStatus::Complete);
    }

    #[test]
    fn percent_stays_in_range_without_orphans(total in 0usize..500, frac in 0.0f64..=1.0) {
        let done = (total as f64 * frac).floor() as usize;
        prop_assert!(status::percent(done, total) <= 100);
    }

    #[test]
    fn bar_always_has_ten_cells(done in 0usize..500, total in 0usize..500) {
        let bar = status::progress_bar(status::percent(done, total));
        prop_assert_eq!(bar.chars().filter(|c| *c == '█' || *c == '░').count(), 10);
    }
}

// ---------------------------------------------------------------------------
// Phase resolution
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn resolution_ignores_zero_padding(major in 0u64..120, minor in proptest::option::of(1u64..20)) {
        let dir = TempDir::new().unwrap();
        let number = match minor {
            Some(m) => format!("{major:02}.{m}"),
            None => format!("{major:02}"),
        };
        let name = format!("{number}-feature");
        std::fs::create_dir_all(dir.path().join(".planning/phases").join(&name)).unwrap();

        let bare = match minor {
            Some(m) => format!("{major}.{m}"),
            None => major.to_string(),
        };
        let a = phase::resolve(dir.path(), &bare);
        let b = phase::resolve(dir.path(), &number);
        prop_assert!(a.is_some());
        prop_assert_eq!(a.map(|d| d.directory), b.map(|d| d.directory));
    }
}
