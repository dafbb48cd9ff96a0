use std::cmp::Ordering;

use rayon::prelude::*;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::ledger::Ledger;
use crate::model::{
    Document, Issue, IssueKind, ManualOverride, MappingEntry, MatchStage, MatchType, PassReport,
};
use crate::score::{exact_id_signal, keyword_jaccard, score_pair};

/// One above-threshold pairing, detached from the ledger borrow so the
/// commit loop can mutate.
#[derive(Debug, Clone)]
struct Proposal {
    score: f64,
    source_ref: String,
    target_ref: String,
    target_id: Option<u32>,
}

/// Descending score, then source ref, then target id (absent last), then
/// target ref. Total and deterministic regardless of scoring order.
fn proposal_order(a: &Proposal, b: &Proposal) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.source_ref.cmp(&b.source_ref))
        .then_with(|| match (a.target_id, b.target_id) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.target_ref.cmp(&b.target_ref))
}

/// Score every unassigned pair in parallel, keep those at or above
/// `threshold` under `rank`, then commit greedily. A target is never
/// reassigned; a source takes its best still-free target.
fn scored_pass<F>(
    ledger: &mut Ledger,
    stage: MatchStage,
    match_type: MatchType,
    threshold: f64,
    rank: F,
) -> Result<PassReport, ReconError>
where
    F: Fn(&Document, &Document) -> f64 + Sync,
{
    ledger.advance(stage)?;

    let sources: Vec<_> = ledger.unassigned_sources().collect();
    let targets: Vec<_> = ledger.unassigned_targets().collect();
    let considered_sources = sources.len();

    let mut proposals: Vec<Proposal> = sources
        .par_iter()
        .flat_map_iter(|&source| {
            let rank = &rank;
            targets.iter().filter_map(move |&target| {
                let score = rank(source, target);
                (score >= threshold).then(|| Proposal {
                    score,
                    source_ref: source.doc_ref.clone(),
                    target_ref: target.doc_ref.clone(),
                    target_id: target.extracted_numeric_id,
                })
            })
        })
        .collect();
    proposals.sort_by(proposal_order);

    let mut committed = 0;
    for p in proposals {
        if ledger.is_source_assigned(&p.source_ref) || ledger.is_target_assigned(&p.target_ref) {
            continue;
        }
        log::debug!(
            "{stage}: {} -> {} ({match_type}, {:.3})",
            p.source_ref,
            p.target_ref,
            p.score
        );
        ledger.commit(MappingEntry {
            source_ref: p.source_ref,
            target_ref: p.target_ref,
            target_numeric_id: p.target_id,
            match_type,
            confidence: p.score.clamp(0.0, 1.0),
            pass: stage,
            variant: None,
        })?;
        committed += 1;
    }

    Ok(pass_report(ledger, stage, considered_sources, committed))
}

fn pass_report(ledger: &Ledger, stage: MatchStage, considered: usize, committed: usize) -> PassReport {
    PassReport {
        stage,
        considered_sources: considered,
        committed,
        duplicates_absorbed: 0,
        remaining_sources: ledger.unassigned_sources().count(),
        remaining_targets: ledger.unassigned_targets().count(),
    }
}

// ---------------------------------------------------------------------------
// Passes, in decreasing order of trust
// ---------------------------------------------------------------------------

/// Pair documents whose filenames carry the same numeric identifier.
pub fn pass_exact_id(ledger: &mut Ledger) -> Result<PassReport, ReconError> {
    scored_pass(ledger, MatchStage::ExactId, MatchType::ExactId, 1.0, exact_id_signal)
}

/// Text/keyword blend at or above `content_threshold`.
pub fn pass_content(ledger: &mut Ledger, config: &ReconConfig) -> Result<PassReport, ReconError> {
    scored_pass(
        ledger,
        MatchStage::Content,
        MatchType::ContentVerified,
        config.passes.content_threshold,
        |s, t| score_pair(s, t, &config.scoring, config.features.text_window).content_score,
    )
}

/// Keyword overlap alone. Only runs when `keyword_threshold` is configured.
pub fn pass_keyword(
    ledger: &mut Ledger,
    config: &ReconConfig,
) -> Result<Option<PassReport>, ReconError> {
    let Some(threshold) = config.passes.keyword_threshold else {
        return Ok(None);
    };
    scored_pass(
        ledger,
        MatchStage::Keyword,
        MatchType::KeywordOverlap,
        threshold,
        |s, t| keyword_jaccard(&s.keyword_set, &t.keyword_set),
    )
    .map(Some)
}

/// Last scored pass: the combined score, so a paraphrased title is enough.
pub fn pass_title(ledger: &mut Ledger, config: &ReconConfig) -> Result<PassReport, ReconError> {
    scored_pass(
        ledger,
        MatchStage::Title,
        MatchType::TitleMatch,
        config.passes.title_threshold,
        |s, t| score_pair(s, t, &config.scoring, config.features.text_window).combined_score,
    )
}

/// Apply explicit pairs regardless of score. A pair whose source or target
/// is already assigned is recorded as an `AssignmentConflict` and skipped;
/// a pair naming an unknown document is recorded and skipped.
pub fn pass_manual(
    ledger: &mut Ledger,
    overrides: &[ManualOverride],
) -> Result<PassReport, ReconError> {
    ledger.advance(MatchStage::Manual)?;
    let considered = ledger.unassigned_sources().count();
    let mut committed = 0;

    for pair in overrides {
        if ledger.source(&pair.source).is_none() {
            ledger.record_issue(Issue::new(
                IssueKind::UnknownOverrideEndpoint,
                &pair.source,
                "override names a source that was not loaded",
            ))?;
            continue;
        }
        let Some((target_ref, target_id)) = resolve_target(ledger, &pair.target) else {
            ledger.record_issue(Issue::new(
                IssueKind::UnknownOverrideEndpoint,
                &pair.target,
                format!("override for '{}' names a target that was not loaded", pair.source),
            ))?;
            continue;
        };

        if let Some(existing) = ledger.entry_for_source(&pair.source) {
            let detail = format!(
                "source already assigned to '{}' by {}; override to '{target_ref}' skipped",
                existing.target_ref, existing.pass
            );
            ledger.record_issue(Issue::new(IssueKind::AssignmentConflict, &pair.source, detail))?;
            continue;
        }
        if let Some(existing) = ledger.primary_for_target(&target_ref) {
            let detail = format!(
                "target already assigned to '{}' by {}; override from '{}' skipped",
                existing.source_ref, existing.pass, pair.source
            );
            ledger.record_issue(Issue::new(IssueKind::AssignmentConflict, &target_ref, detail))?;
            continue;
        }

        log::debug!("pass_manual: {} -> {target_ref} ({})", pair.source, pair.match_type);
        ledger.commit(MappingEntry {
            source_ref: pair.source.clone(),
            target_ref,
            target_numeric_id: target_id,
            match_type: pair.match_type,
            confidence: 1.0,
            pass: MatchStage::Manual,
            variant: None,
        })?;
        committed += 1;
    }

    Ok(pass_report(ledger, MatchStage::Manual, considered, committed))
}

/// A numeric target names the loaded target with that identifier. When the
/// number is shared, the first free one in `doc_ref` order wins, falling
/// back to the first overall. Anything else is a `doc_ref`.
fn resolve_target(ledger: &Ledger, target: &str) -> Option<(String, Option<u32>)> {
    if let Ok(id) = target.trim().parse::<u32>() {
        let mut numbered = ledger
            .targets()
            .filter(|t| t.extracted_numeric_id == Some(id))
            .peekable();
        let first = numbered.peek().map(|t| t.doc_ref.clone());
        return numbered
            .find(|t| !ledger.is_target_assigned(&t.doc_ref))
            .map(|t| t.doc_ref.clone())
            .or(first)
            .map(|doc_ref| (doc_ref, Some(id)));
    }
    ledger
        .target(target)
        .map(|t| (t.doc_ref.clone(), t.extracted_numeric_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_document;
    use crate::model::{Corpus, Document};
    use crate::normalize::Normalizer;

    fn doc(corpus: Corpus, name: &str, text: &str) -> Document {
        let config = ReconConfig::default();
        extract_document(corpus, name, text, &Normalizer::default(), &config.features).0
    }

    #[test]
    fn exact_id_pass_pairs_matching_numbers() {
        let mut ledger = Ledger::new(
            vec![doc(Corpus::Source, "07 换刃卡顿.txt", "今天讲换刃")],
            vec![
                doc(Corpus::Target, "07_解決換刃卡頓__L-int__S-blue.md", "整理稿"),
                doc(Corpus::Target, "08_別的.md", "今天讲换刃"),
            ],
        );
        let report = pass_exact_id(&mut ledger).unwrap();
        assert_eq!(report.committed, 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.target_ref, "07_解決換刃卡頓__L-int__S-blue.md");
        assert_eq!(entry.match_type, MatchType::ExactId);
        assert_eq!(entry.confidence, 1.0);
        assert_eq!(entry.target_numeric_id, Some(7));
        assert_eq!(report.remaining_targets, 1);
    }

    #[test]
    fn tie_goes_to_the_smaller_identifier() {
        let config = ReconConfig::default();
        let text = "后脚送转别掰髋的练习方法";
        let mut ledger = Ledger::new(
            vec![doc(Corpus::Source, "练习.txt", text)],
            vec![
                doc(Corpus::Target, "30_b.md", text),
                doc(Corpus::Target, "12_a.md", text),
            ],
        );
        pass_content(&mut ledger, &config).unwrap();
        assert_eq!(ledger.entries()[0].target_ref, "12_a.md");
    }

    #[test]
    fn content_pass_skips_weak_pairs() {
        let config = ReconConfig::default();
        let mut ledger = Ledger::new(
            vec![doc(Corpus::Source, "a.txt", "甲乙丙丁戊己庚辛壬癸")],
            vec![doc(Corpus::Target, "1_b.md", "子丑寅卯辰巳午未申酉")],
        );
        let report = pass_content(&mut ledger, &config).unwrap();
        assert_eq!(report.committed, 0);
        assert_eq!(report.remaining_sources, 1);
    }

    #[test]
    fn passes_cannot_run_backwards() {
        let config = ReconConfig::default();
        let mut ledger = Ledger::new(Vec::new(), Vec::new());
        pass_title(&mut ledger, &config).unwrap();
        assert!(matches!(
            pass_content(&mut ledger, &config),
            Err(ReconError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn keyword_pass_is_off_by_default() {
        let config = ReconConfig::default();
        let mut ledger = Ledger::new(Vec::new(), Vec::new());
        assert!(pass_keyword(&mut ledger, &config).unwrap().is_none());
        assert_eq!(ledger.stage(), MatchStage::Unprocessed);
    }

    #[test]
    fn manual_override_conflict_is_recorded_and_skipped() {
        let config = ReconConfig::default();
        let text = "后脚送转别掰髋的练习方法";
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "a.txt", text),
                doc(Corpus::Source, "b.txt", "完全不同"),
            ],
            vec![doc(Corpus::Target, "215_x.md", text)],
        );
        pass_content(&mut ledger, &config).unwrap();
        let overrides = vec![ManualOverride {
            source: "b.txt".into(),
            target: "215".into(),
            match_type: MatchType::Manual,
        }];
        let report = pass_manual(&mut ledger, &overrides).unwrap();
        assert_eq!(report.committed, 0);
        assert_eq!(ledger.issues().len(), 1);
        assert_eq!(ledger.issues()[0].kind, IssueKind::AssignmentConflict);
        let entry = ledger.primary_for_target("215_x.md").unwrap();
        assert_eq!(entry.source_ref, "a.txt");
        assert_eq!(entry.match_type, MatchType::ContentVerified);
    }

    #[test]
    fn numeric_override_prefers_free_target_sharing_the_id() {
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "40 立刃.txt", "立刃"),
                doc(Corpus::Source, "立刃补录.txt", "补录"),
            ],
            vec![
                doc(Corpus::Target, "040_立刃.md", "立刃"),
                doc(Corpus::Target, "040_立刃補錄.md", "整理"),
            ],
        );
        pass_exact_id(&mut ledger).unwrap();
        assert!(ledger.is_target_assigned("040_立刃.md"));

        let overrides = vec![ManualOverride {
            source: "立刃补录.txt".into(),
            target: "40".into(),
            match_type: MatchType::Manual,
        }];
        let report = pass_manual(&mut ledger, &overrides).unwrap();
        assert_eq!(report.committed, 1);
        assert!(ledger.issues().is_empty());
        let entry = ledger.entry_for_source("立刃补录.txt").unwrap();
        assert_eq!(entry.target_ref, "040_立刃補錄.md");
        assert_eq!(entry.target_numeric_id, Some(40));
    }

    #[test]
    fn manual_override_by_ref_commits() {
        let mut ledger = Ledger::new(
            vec![doc(Corpus::Source, "基础：转弯别掰弯.txt", "x")],
            vec![doc(Corpus::Target, "215_後腳送轉別掰髖__L-adv__S-powder.md", "y")],
        );
        let overrides = vec![
            ManualOverride {
                source: "基础：转弯别掰弯.txt".into(),
                target: "215_後腳送轉別掰髖__L-adv__S-powder.md".into(),
                match_type: MatchType::NewlyProcessed,
            },
            ManualOverride {
                source: "ghost.txt".into(),
                target: "1".into(),
                match_type: MatchType::Manual,
            },
        ];
        let report = pass_manual(&mut ledger, &overrides).unwrap();
        assert_eq!(report.committed, 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.match_type, MatchType::NewlyProcessed);
        assert_eq!(entry.target_numeric_id, Some(215));
        assert_eq!(ledger.issues()[0].kind, IssueKind::UnknownOverrideEndpoint);
    }
}
