//! Duplicate detection, run after every pass.
//!
//! Two jobs:
//! 1. *Twin absorption*: an unassigned source that is a near copy of an
//!    assigned source (or of its target) joins that target as a variant
//!    entry (`b`, `c`, ...) instead of staying unmatched.
//! 2. *Grouping*: entries sharing a target, or whose targets are near
//!    identical or carry identical core fields, form a [`DuplicateGroup`].
//!
//! Nothing is ever removed from the ledger.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::DuplicateConfig;
use crate::error::ReconError;
use crate::ledger::Ledger;
use crate::model::{Document, DuplicateGroup, DuplicateReason, MappingEntry, MatchStage, MatchType};
use crate::score::edit_similarity;

pub fn fingerprint_similarity(a: &Document, b: &Document) -> f64 {
    edit_similarity(&a.fingerprint, &b.fingerprint, usize::MAX)
}

/// `b`, `c`, ... `z`, then `z2`, `z3`, ... for the n-th variant (0-based).
pub fn variant_suffix(index: usize) -> String {
    if index < 25 {
        char::from(b'b' + index as u8).to_string()
    } else {
        format!("z{}", index - 23)
    }
}

#[derive(Debug, Clone)]
struct TargetLink {
    a: String,
    b: String,
    reason: DuplicateReason,
}

#[derive(Debug, Clone)]
struct Twin {
    similarity: f64,
    /// Never above the primary's own score for the target.
    confidence: f64,
    source_ref: String,
    target_ref: String,
    target_id: Option<u32>,
    match_type: MatchType,
}

pub struct DuplicateDetector {
    threshold: f64,
    /// Target documents never change during a run, so their pairwise links
    /// are computed once.
    target_links: Option<Vec<TargetLink>>,
}

impl DuplicateDetector {
    pub fn new(config: &DuplicateConfig) -> Self {
        Self {
            threshold: config.threshold,
            target_links: None,
        }
    }

    /// Absorb twins, then rebuild the duplicate groups. Returns the number of
    /// variant entries committed.
    pub fn detect(&mut self, ledger: &mut Ledger) -> Result<usize, ReconError> {
        let absorbed = self.absorb_twins(ledger)?;
        let groups = self.group(ledger);
        for g in groups.iter().filter(|g| g.suspect) {
            log::warn!(
                "suspect duplicate group around '{}' ({} variants, {:?}); a title-pass match is involved",
                g.canonical.target_ref,
                g.variants.len(),
                g.reason
            );
        }
        ledger.set_duplicate_groups(groups)?;
        Ok(absorbed)
    }

    fn absorb_twins(&self, ledger: &mut Ledger) -> Result<usize, ReconError> {
        let stage = ledger.stage();
        let threshold = self.threshold;
        let unassigned: Vec<&Document> = ledger.unassigned_sources().collect();
        let free_targets: Vec<&Document> = ledger.unassigned_targets().collect();
        let primaries: Vec<(&MappingEntry, Option<&Document>, Option<&Document>)> = ledger
            .primary_entries()
            .map(|e| (e, ledger.source(&e.source_ref), ledger.target(&e.target_ref)))
            .collect();

        let mut twins: Vec<Twin> = unassigned
            .par_iter()
            .filter_map(|&doc| {
                let mut best: Option<(f64, &MappingEntry)> = None;
                for &(entry, source, target) in &primaries {
                    let sim = source
                        .map(|s| fingerprint_similarity(doc, s))
                        .unwrap_or(0.0)
                        .max(target.map(|t| fingerprint_similarity(doc, t)).unwrap_or(0.0));
                    let better = match best {
                        None => true,
                        Some((b, e)) => sim > b || (sim == b && entry.target_ref < e.target_ref),
                    };
                    if better {
                        best = Some((sim, entry));
                    }
                }
                let (similarity, entry) = best.filter(|(sim, _)| *sim >= threshold)?;
                // A free target at least as close is left to the passes.
                if free_targets
                    .iter()
                    .any(|&t| fingerprint_similarity(doc, t) >= similarity)
                {
                    return None;
                }
                Some(Twin {
                    similarity,
                    confidence: similarity.min(entry.confidence),
                    source_ref: doc.doc_ref.clone(),
                    target_ref: entry.target_ref.clone(),
                    target_id: entry.target_numeric_id,
                    match_type: entry.match_type,
                })
            })
            .collect();

        twins.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.source_ref.cmp(&b.source_ref))
        });

        let absorbed = twins.len();
        for twin in twins {
            let suffix = variant_suffix(ledger.variant_count(&twin.target_ref));
            log::debug!(
                "{stage}: {} absorbed as variant '{suffix}' of {} ({:.3})",
                twin.source_ref,
                twin.target_ref,
                twin.similarity
            );
            ledger.commit(MappingEntry {
                source_ref: twin.source_ref,
                target_ref: twin.target_ref,
                target_numeric_id: twin.target_id,
                match_type: twin.match_type,
                confidence: twin.confidence.clamp(0.0, 1.0),
                pass: stage,
                variant: Some(suffix),
            })?;
        }
        Ok(absorbed)
    }

    fn links(&mut self, ledger: &Ledger) -> &[TargetLink] {
        let threshold = self.threshold;
        self.target_links.get_or_insert_with(|| {
            let targets: Vec<&Document> = ledger.targets().collect();
            (0..targets.len())
                .into_par_iter()
                .flat_map_iter(|i| {
                    let targets = &targets;
                    (i + 1..targets.len()).filter_map(move |j| {
                        let (a, b) = (targets[i], targets[j]);
                        let reason = if !a.core_fields.is_empty() && a.core_fields == b.core_fields {
                            DuplicateReason::IdenticalCoreFields
                        } else if fingerprint_similarity(a, b) >= threshold {
                            DuplicateReason::NearIdenticalTargets
                        } else {
                            return None;
                        };
                        Some(TargetLink {
                            a: a.doc_ref.clone(),
                            b: b.doc_ref.clone(),
                            reason,
                        })
                    })
                })
                .collect()
        })
    }

    fn group(&mut self, ledger: &Ledger) -> Vec<DuplicateGroup> {
        let entries = ledger.entries();
        let mut uf = UnionFind::new(entries.len());
        let mut edges: Vec<(usize, DuplicateReason)> = Vec::new();

        let mut by_target: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, e) in entries.iter().enumerate() {
            by_target.entry(e.target_ref.as_str()).or_default().push(idx);
        }
        for members in by_target.values() {
            for &m in &members[1..] {
                uf.union(members[0], m);
                edges.push((m, DuplicateReason::SharedTarget));
            }
        }

        let primary_of: BTreeMap<&str, usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_primary())
            .map(|(idx, e)| (e.target_ref.as_str(), idx))
            .collect();
        for link in self.links(ledger) {
            if let (Some(&x), Some(&y)) =
                (primary_of.get(link.a.as_str()), primary_of.get(link.b.as_str()))
            {
                uf.union(x, y);
                edges.push((x, link.reason));
            }
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in 0..entries.len() {
            components.entry(uf.find(idx)).or_default().push(idx);
        }
        let mut reasons: BTreeMap<usize, DuplicateReason> = BTreeMap::new();
        for (idx, reason) in edges {
            let root = uf.find(idx);
            let slot = reasons.entry(root).or_insert(reason);
            if reason_rank(reason) > reason_rank(*slot) {
                *slot = reason;
            }
        }

        let mut groups: Vec<DuplicateGroup> = components
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(root, members)| {
                let mut members: Vec<&MappingEntry> = members.iter().map(|&i| &entries[i]).collect();
                members.sort_by(|a, b| member_order(a, b));
                let canonical = members[0];
                let variants: Vec<&MappingEntry> = members[1..].to_vec();
                DuplicateGroup {
                    canonical: canonical.clone(),
                    similarity_to_canonical: variants
                        .iter()
                        .map(|v| member_similarity(ledger, canonical, v))
                        .collect(),
                    variants: variants.into_iter().cloned().collect(),
                    reason: reasons
                        .get(&root)
                        .copied()
                        .unwrap_or(DuplicateReason::SharedTarget),
                    suspect: members.iter().any(|m| m.pass == MatchStage::Title),
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            a.canonical
                .target_ref
                .cmp(&b.canonical.target_ref)
                .then_with(|| a.canonical.source_ref.cmp(&b.canonical.source_ref))
        });
        groups
    }
}

/// Primaries before suffixed variants, so the canonical is never a
/// variant; then highest confidence; ties by source ref.
fn member_order(a: &MappingEntry, b: &MappingEntry) -> Ordering {
    a.variant
        .is_some()
        .cmp(&b.variant.is_some())
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.source_ref.cmp(&b.source_ref))
}

fn reason_rank(reason: DuplicateReason) -> u8 {
    match reason {
        DuplicateReason::SharedTarget => 2,
        DuplicateReason::IdenticalCoreFields => 1,
        DuplicateReason::NearIdenticalTargets => 0,
    }
}

/// Same target: how close the two sources are. Different targets: how
/// close the targets are.
fn member_similarity(ledger: &Ledger, canonical: &MappingEntry, variant: &MappingEntry) -> f64 {
    if canonical.target_ref == variant.target_ref {
        match (ledger.source(&canonical.source_ref), ledger.source(&variant.source_ref)) {
            (Some(a), Some(b)) => fingerprint_similarity(a, b),
            _ => variant.confidence,
        }
    } else {
        match (ledger.target(&canonical.target_ref), ledger.target(&variant.target_ref)) {
            (Some(a), Some(b)) => fingerprint_similarity(a, b),
            _ => 0.0,
        }
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // smaller index stays root so components are keyed stably
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureConfig, ReconConfig};
    use crate::features::extract_document;
    use crate::matcher::{pass_content, pass_exact_id, pass_title};
    use crate::model::Corpus;
    use crate::normalize::Normalizer;

    const LESSON: &str = "换刃的时候前手不要烙饼，后脚往前送，髋部带动上半身转过去，视线看向下一个弯的出口。";

    fn doc(corpus: Corpus, name: &str, text: &str) -> Document {
        extract_document(corpus, name, text, &Normalizer::default(), &FeatureConfig::default()).0
    }

    #[test]
    fn suffixes_run_b_to_z_then_numbered() {
        assert_eq!(variant_suffix(0), "b");
        assert_eq!(variant_suffix(1), "c");
        assert_eq!(variant_suffix(24), "z");
        assert_eq!(variant_suffix(25), "z2");
    }

    #[test]
    fn twin_source_joins_as_variant() {
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "024 换刃.txt", LESSON),
                doc(Corpus::Source, "024 换刃_Sam.txt", LESSON),
            ],
            vec![doc(Corpus::Target, "024_換刃__L-int__S-blue.md", LESSON)],
        );
        pass_exact_id(&mut ledger).unwrap();
        let mut detector = DuplicateDetector::new(&DuplicateConfig::default());
        let absorbed = detector.detect(&mut ledger).unwrap();
        assert_eq!(absorbed, 1);
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.primary_entries().count(), 1);

        let twin = ledger.entry_for_source("024 换刃_Sam.txt").unwrap();
        assert_eq!(twin.variant.as_deref(), Some("b"));
        assert_eq!(twin.match_type, MatchType::ExactId);

        let groups = ledger.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical.source_ref, "024 换刃.txt");
        assert_eq!(groups[0].variants.len(), 1);
        assert_eq!(groups[0].similarity_to_canonical, vec![1.0]);
        assert_eq!(groups[0].reason, DuplicateReason::SharedTarget);
        assert!(!groups[0].suspect);
    }

    #[test]
    fn twin_of_weaker_primary_stays_a_variant() {
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "a.txt", LESSON),
                doc(Corpus::Source, "b.txt", LESSON),
            ],
            vec![doc(Corpus::Target, "030_x.md", LESSON)],
        );
        ledger.advance(MatchStage::Content).unwrap();
        ledger
            .commit(MappingEntry {
                source_ref: "a.txt".into(),
                target_ref: "030_x.md".into(),
                target_numeric_id: Some(30),
                match_type: MatchType::ContentVerified,
                confidence: 0.798,
                pass: MatchStage::Content,
                variant: None,
            })
            .unwrap();

        let mut detector = DuplicateDetector::new(&DuplicateConfig::default());
        assert_eq!(detector.detect(&mut ledger).unwrap(), 1);

        let twin = ledger.entry_for_source("b.txt").unwrap();
        assert_eq!(twin.variant.as_deref(), Some("b"));
        assert_eq!(twin.match_type, MatchType::ContentVerified);
        assert_eq!(twin.confidence, 0.798);

        let groups = ledger.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical.source_ref, "a.txt");
        assert!(groups[0].canonical.variant.is_none());
        assert_eq!(groups[0].variants[0].variant.as_deref(), Some("b"));
        assert_eq!(groups[0].similarity_to_canonical, vec![1.0]);
    }

    #[test]
    fn canonical_is_the_primary_even_when_a_variant_scores_higher() {
        let primary = MappingEntry {
            source_ref: "z.txt".into(),
            target_ref: "1_x.md".into(),
            target_numeric_id: Some(1),
            match_type: MatchType::TitleMatch,
            confidence: 0.2,
            pass: MatchStage::Title,
            variant: None,
        };
        let variant = MappingEntry {
            source_ref: "a.txt".into(),
            confidence: 0.9,
            variant: Some("b".into()),
            ..primary.clone()
        };
        assert_eq!(member_order(&primary, &variant), Ordering::Less);
        assert_eq!(member_order(&variant, &primary), Ordering::Greater);
    }

    #[test]
    fn free_target_blocks_absorption() {
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "01 a.txt", LESSON),
                doc(Corpus::Source, "b.txt", LESSON),
            ],
            vec![
                doc(Corpus::Target, "01_a.md", LESSON),
                doc(Corpus::Target, "02_a.md", LESSON),
            ],
        );
        pass_exact_id(&mut ledger).unwrap();
        let mut detector = DuplicateDetector::new(&DuplicateConfig::default());
        assert_eq!(detector.detect(&mut ledger).unwrap(), 0);
        pass_content(&mut ledger, &ReconConfig::default()).unwrap();
        assert_eq!(
            ledger.entry_for_source("b.txt").unwrap().target_ref,
            "02_a.md"
        );
        // two near-identical targets now form a group
        detector.detect(&mut ledger).unwrap();
        let groups = ledger.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, DuplicateReason::NearIdenticalTargets);
    }

    #[test]
    fn identical_core_fields_group_targets() {
        let block = "```json\n{\"Fault_What\": \"前手烙饼\", \"Goal_Why\": \"稳定换刃\"}\n```";
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "01 a.txt", "甲"),
                doc(Corpus::Source, "02 b.txt", "乙"),
            ],
            vec![
                doc(Corpus::Target, "01_a.md", &format!("第一种写法，完全不一样的正文内容。\n{block}")),
                doc(Corpus::Target, "02_b.md", &format!("另外一篇整理稿，措辞全部改过了。\n{block}")),
            ],
        );
        pass_exact_id(&mut ledger).unwrap();
        DuplicateDetector::new(&DuplicateConfig::default())
            .detect(&mut ledger)
            .unwrap();
        let groups = ledger.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, DuplicateReason::IdenticalCoreFields);
        assert_eq!(groups[0].canonical.source_ref, "01 a.txt");
    }

    #[test]
    fn title_pass_members_mark_group_suspect() {
        let config = ReconConfig::default();
        let mut ledger = Ledger::new(
            vec![
                doc(Corpus::Source, "05 后脚送.txt", LESSON),
                doc(Corpus::Source, "后脚送转.txt", "另一段完全不同的口述内容"),
            ],
            vec![
                doc(Corpus::Target, "05_後腳送__L-int.md", LESSON),
                doc(Corpus::Target, "06_後腳送轉__L-int.md", LESSON),
            ],
        );
        let mut detector = DuplicateDetector::new(&DuplicateConfig::default());
        pass_exact_id(&mut ledger).unwrap();
        detector.detect(&mut ledger).unwrap();
        pass_content(&mut ledger, &config).unwrap();
        detector.detect(&mut ledger).unwrap();
        pass_title(&mut ledger, &config).unwrap();
        detector.detect(&mut ledger).unwrap();

        let late = ledger.entry_for_source("后脚送转.txt").unwrap();
        assert_eq!(late.match_type, MatchType::TitleMatch);
        let groups = ledger.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].suspect);
    }
}
