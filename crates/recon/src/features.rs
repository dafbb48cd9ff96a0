use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::config::FeatureConfig;
use crate::model::{Corpus, Document, Issue, IssueKind};
use crate::normalize::{parse_filename, Normalizer};

static RE_JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("Invalid regex"));

/// Build a [`Document`] from a file name and its text.
///
/// `doc_ref` is the path relative to the corpus root; only its file name is
/// parsed for an identifier. Soft problems come back as issues.
pub fn extract_document(
    corpus: Corpus,
    doc_ref: &str,
    raw_text: &str,
    normalizer: &Normalizer,
    config: &FeatureConfig,
) -> (Document, Vec<Issue>) {
    let mut issues = Vec::new();
    let parsed = parse_filename(doc_ref);
    if parsed.malformed_id {
        issues.push(Issue::new(
            IssueKind::MalformedIdentifier,
            doc_ref,
            "leading digits are not followed by a separator; treated as title-only",
        ));
    }

    let normalized_text = normalizer.normalize_text(raw_text);
    let keyword_set = keyword_windows(&normalized_text, config);
    let fingerprint = fingerprint(&normalized_text, config.fingerprint_len);
    let (focus_text, core_fields) = embedded_fields(raw_text, normalizer, config);

    let doc = Document {
        corpus,
        doc_ref: doc_ref.to_string(),
        raw_id: parsed.raw_id,
        extracted_numeric_id: parsed.numeric_id,
        clean_title: normalizer.normalize_fragment(&parsed.title),
        title: parsed.title,
        normalized_text,
        keyword_set,
        fingerprint,
        focus_text,
        core_fields,
    };
    (doc, issues)
}

/// Contiguous substrings of `min_keyword_len..=max_keyword_len` chars, by
/// start position, shortest first, until `max_keywords` distinct ones exist.
pub fn keyword_windows(text: &str, config: &FeatureConfig) -> BTreeSet<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut set = BTreeSet::new();
    'outer: for start in 0..chars.len() {
        for len in config.min_keyword_len..=config.max_keyword_len {
            let end = start + len;
            if end > chars.len() {
                break;
            }
            set.insert(chars[start..end].iter().collect::<String>());
            if set.len() >= config.max_keywords {
                break 'outer;
            }
        }
    }
    set
}

pub fn fingerprint(text: &str, len: usize) -> String {
    text.chars().take(len).collect()
}

/// Pull the focus field and core fields out of the first fenced JSON object.
/// Anything unparseable yields nothing.
fn embedded_fields(
    raw_text: &str,
    normalizer: &Normalizer,
    config: &FeatureConfig,
) -> (Option<String>, BTreeMap<String, String>) {
    let mut core = BTreeMap::new();
    let Some(body) = RE_JSON_BLOCK.captures(raw_text).and_then(|c| c.get(1)) else {
        return (None, core);
    };
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body.as_str()) else {
        return (None, core);
    };

    let focus = config
        .focus_field
        .as_ref()
        .and_then(|key| map.get(key))
        .and_then(field_text)
        .map(|text| normalizer.normalize_fragment(&text))
        .filter(|text| !text.is_empty());

    for key in &config.core_fields {
        if let Some(text) = map.get(key).and_then(field_text) {
            core.insert(key.clone(), normalizer.normalize_fragment(&text));
        }
    }
    (focus, core)
}

/// Strings as-is; arrays of strings joined (drill steps are often lists).
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(""))
        }
        _ => None,
    }
}
