//! Similarity signals and their combination.
//!
//! Each signal is a free function over two documents so it can be tested on
//! its own. [`score_pair`] blends them into one [`Candidate`].

use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::model::{Candidate, Document, Signals};

/// 1.0 iff both identifiers are present and equal.
pub fn exact_id_signal(source: &Document, target: &Document) -> f64 {
    match (source.extracted_numeric_id, target.extracted_numeric_id) {
        (Some(a), Some(b)) if a == b => 1.0,
        _ => 0.0,
    }
}

/// |A ∩ B| / |A ∪ B|; 0 when either side is empty.
pub fn keyword_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Edit similarity over the leading `window` chars of each side.
pub fn edit_similarity(a: &str, b: &str, window: usize) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: String = a.chars().take(window).collect();
    let b: String = b.chars().take(window).collect();
    strsim::normalized_levenshtein(&a, &b)
}

/// Source text against the target's body, or its focus field when that
/// scores higher.
pub fn text_similarity(source: &Document, target: &Document, window: usize) -> f64 {
    let body = edit_similarity(&source.normalized_text, &target.normalized_text, window);
    match target.focus_text {
        Some(ref focus) => body.max(edit_similarity(&source.normalized_text, focus, window)),
        None => body,
    }
}

pub fn title_similarity(source: &Document, target: &Document) -> f64 {
    edit_similarity(&source.clean_title, &target.clean_title, usize::MAX)
}

/// Score one pair. Exact id short-circuits to 1.0; otherwise the combined
/// score is the better of the content blend and the title signal.
pub fn score_pair<'a>(
    source: &'a Document,
    target: &'a Document,
    config: &ScoringConfig,
    text_window: usize,
) -> Candidate<'a> {
    let exact_id = exact_id_signal(source, target);
    let keyword = keyword_jaccard(&source.keyword_set, &target.keyword_set);
    let gated = config.keyword_gate > 0.0 && keyword < config.keyword_gate;
    let text = if gated {
        0.0
    } else {
        text_similarity(source, target, text_window)
    };
    let title = title_similarity(source, target);

    let signals = Signals {
        exact_id,
        keyword_jaccard: keyword,
        text_similarity: text,
        title_similarity: title,
    };

    let content_score = if gated {
        0.0
    } else {
        let weight = config.text_weight + config.keyword_weight;
        (config.text_weight * text + config.keyword_weight * keyword) / weight
    };

    let combined_score = if exact_id >= 1.0 {
        1.0
    } else {
        content_score.max(title)
    };

    Candidate {
        source,
        target,
        signals,
        content_score,
        combined_score,
    }
}
