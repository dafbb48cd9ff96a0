// Property-based tests for the ledger invariants.
// CI: 64 cases (default). Soak: PROPTEST_CASES=2000 cargo test --release

use std::collections::BTreeMap;

use proptest::prelude::*;

use concord_recon::config::{FeatureConfig, ScoringConfig};
use concord_recon::engine::{run, run_passes, ReconInput};
use concord_recon::features::extract_document;
use concord_recon::ledger::Ledger;
use concord_recon::matcher::{pass_content, pass_exact_id, pass_title};
use concord_recon::model::{Corpus, Document, MatchStage};
use concord_recon::normalize::Normalizer;
use concord_recon::score::score_pair;
use concord_recon::{MappingArtifact, ReconConfig};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_64() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Short text over a tiny alphabet so collisions and near-duplicates are common.
fn arb_text() -> impl Strategy<Value = String> {
    "[换刃后脚送转髋弯]{0,24}"
}

/// Optional identifier from a small range so ids collide across corpora.
fn arb_doc() -> impl Strategy<Value = (Option<u32>, String, String)> {
    (prop::option::of(1u32..12), "[换刃转弯]{1,4}", arb_text())
}

fn build(corpus: Corpus, specs: &[(Option<u32>, String, String)]) -> Vec<Document> {
    let normalizer = Normalizer::default();
    let features = FeatureConfig::default();
    let ext = match corpus {
        Corpus::Source => "txt",
        Corpus::Target => "md",
    };
    specs
        .iter()
        .enumerate()
        .map(|(i, (id, title, text))| {
            let name = match id {
                Some(id) => format!("{id:02}_{title}{i}.{ext}"),
                None => format!("{title}{i}.{ext}"),
            };
            extract_document(corpus, &name, text, &normalizer, &features).0
        })
        .collect()
}

fn arb_corpora() -> impl Strategy<Value = (Vec<Document>, Vec<Document>)> {
    (
        prop::collection::vec(arb_doc(), 0..8),
        prop::collection::vec(arb_doc(), 0..8),
    )
        .prop_map(|(s, t)| (build(Corpus::Source, &s), build(Corpus::Target, &t)))
}

fn input(sources: Vec<Document>, targets: Vec<Document>) -> ReconInput {
    ReconInput {
        sources,
        targets,
        ..ReconInput::default()
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    #[test]
    fn every_target_has_at_most_one_primary((sources, targets) in arb_corpora()) {
        let result = run(&ReconConfig::default(), input(sources, targets)).unwrap();

        let mut primaries: BTreeMap<&str, usize> = BTreeMap::new();
        let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
        for e in &result.entries {
            *per_source.entry(&e.source_ref).or_default() += 1;
            if e.is_primary() {
                *primaries.entry(&e.target_ref).or_default() += 1;
            }
        }
        prop_assert!(primaries.values().all(|&n| n == 1));
        prop_assert!(per_source.values().all(|&n| n == 1));
        for e in result.entries.iter().filter(|e| !e.is_primary()) {
            prop_assert!(primaries.contains_key(e.target_ref.as_str()));
        }
        for e in &result.entries {
            prop_assert!((0.0..=1.0).contains(&e.confidence));
        }
    }

    #[test]
    fn equal_identifiers_always_score_one(
        id in 1u32..500,
        a in arb_text(),
        b in arb_text(),
    ) {
        let normalizer = Normalizer::default();
        let features = FeatureConfig::default();
        let s = extract_document(Corpus::Source, &format!("{id} 源.txt"), &a, &normalizer, &features).0;
        let t = extract_document(Corpus::Target, &format!("{id:03}_目标.md"), &b, &normalizer, &features).0;
        let c = score_pair(&s, &t, &ScoringConfig::default(), 600);
        prop_assert_eq!(c.signals.exact_id, 1.0);
        prop_assert_eq!(c.combined_score, 1.0);
    }

    #[test]
    fn rerunning_passes_changes_nothing((sources, targets) in arb_corpora()) {
        let config = ReconConfig::default();
        let result = run(&config, input(sources.clone(), targets.clone())).unwrap();

        let mut ledger =
            Ledger::restore(result.entries.clone(), Vec::new(), sources, targets).unwrap();
        run_passes(&mut ledger, &config, &[]).unwrap();
        prop_assert_eq!(ledger.entries(), result.entries.as_slice());
    }

    #[test]
    fn title_pass_never_reassigns((sources, targets) in arb_corpora()) {
        let config = ReconConfig::default();
        let mut ledger = Ledger::new(sources, targets);
        pass_exact_id(&mut ledger).unwrap();
        pass_content(&mut ledger, &config).unwrap();
        let before = ledger.entries().to_vec();

        pass_title(&mut ledger, &config).unwrap();
        let after = ledger.entries();
        prop_assert_eq!(&after[..before.len()], before.as_slice());
        for e in &after[before.len()..] {
            prop_assert_eq!(e.pass, MatchStage::Title);
            prop_assert!(before.iter().all(|b| b.target_ref != e.target_ref));
        }
    }

    #[test]
    fn artifact_json_round_trips((sources, targets) in arb_corpora()) {
        let result = run(&ReconConfig::default(), input(sources, targets)).unwrap();
        let json = MappingArtifact::from_result(&result).to_json().unwrap();
        let back = MappingArtifact::from_json(&json).unwrap();
        prop_assert_eq!(&back.entries, &result.entries);
        prop_assert_eq!(&back.duplicate_groups, &result.duplicate_groups);

        let ledger = back.into_ledger(Vec::new(), Vec::new()).unwrap();
        let restored: Vec<_> = ledger.primary_entries().cloned().collect();
        let saved: Vec<_> = result.entries.iter().filter(|e| e.is_primary()).cloned().collect();
        prop_assert_eq!(restored, saved);
    }
}
