use std::collections::{BTreeMap, BTreeSet};

use crate::ledger::Ledger;
use crate::model::{CompletenessReport, MatchType};

/// Compare assigned target identifiers with the expected set.
///
/// Read-only. Only primary entries count as assignments; variants are
/// reported through the duplicate groups. Without an expected set, `missing`
/// and `extra` stay empty.
pub fn audit(ledger: &Ledger, expected: Option<&BTreeSet<u32>>) -> CompletenessReport {
    let mut counts_by_match_type: BTreeMap<String, usize> =
        MatchType::ALL.iter().map(|mt| (mt.to_string(), 0)).collect();
    let mut assigned_ids = BTreeSet::new();
    let mut unnumbered_targets = Vec::new();
    let mut assigned_count = 0;

    for entry in ledger.primary_entries() {
        assigned_count += 1;
        *counts_by_match_type
            .entry(entry.match_type.to_string())
            .or_insert(0) += 1;
        match entry.target_numeric_id {
            Some(id) => {
                assigned_ids.insert(id);
            }
            None => unnumbered_targets.push(entry.target_ref.clone()),
        }
    }
    unnumbered_targets.sort();

    let (missing, extra, expected_count) = match expected {
        Some(expected) => (
            expected.difference(&assigned_ids).copied().collect::<Vec<_>>(),
            assigned_ids.difference(expected).copied().collect::<Vec<_>>(),
            expected.len(),
        ),
        None => (Vec::new(), Vec::new(), 0),
    };

    let groups = ledger.duplicate_groups();
    let complete = missing.is_empty() && extra.is_empty();

    CompletenessReport {
        expected_count,
        assigned_count,
        missing,
        extra,
        counts_by_match_type,
        unassigned_sources: ledger.unassigned_source_refs().iter().cloned().collect(),
        unassigned_targets: ledger.unassigned_target_refs().iter().cloned().collect(),
        unnumbered_targets,
        duplicate_groups: groups.len(),
        suspect_groups: groups.iter().filter(|g| g.suspect).count(),
        issues: ledger.issues().to_vec(),
        complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpectedIds;
    use crate::config::Exclusion;
    use crate::model::{MappingEntry, MatchStage};

    fn entry(source: &str, id: Option<u32>, variant: Option<&str>) -> MappingEntry {
        MappingEntry {
            source_ref: source.into(),
            target_ref: match id {
                Some(id) => format!("{id:03}_t.md"),
                None => "t.md".into(),
            },
            target_numeric_id: id,
            match_type: MatchType::ExactId,
            confidence: 1.0,
            pass: MatchStage::ExactId,
            variant: variant.map(String::from),
        }
    }

    fn expected() -> BTreeSet<u32> {
        ExpectedIds {
            start: 1,
            end: 224,
            exclude: vec![
                Exclusion::Id(65),
                Exclusion::Span("167-175".into()),
                Exclusion::Id(205),
            ],
        }
        .id_set()
        .unwrap()
    }

    #[test]
    fn reports_exactly_the_missing_identifiers() {
        let expected = expected();
        let missing = [3u32, 64, 176, 224];
        let entries: Vec<MappingEntry> = expected
            .iter()
            .filter(|id| !missing.contains(id))
            .map(|&id| entry(&format!("s{id}.txt"), Some(id), None))
            .collect();
        assert_eq!(entries.len(), 209);
        let ledger = Ledger::restore(entries, Vec::new(), Vec::new(), Vec::new()).unwrap();

        let report = audit(&ledger, Some(&expected));
        assert_eq!(report.expected_count, 213);
        assert_eq!(report.assigned_count, 209);
        assert_eq!(report.missing, missing.to_vec());
        assert!(report.extra.is_empty());
        assert!(!report.complete);
        assert_eq!(report.counts_by_match_type["exact_id"], 209);
        assert_eq!(report.counts_by_match_type["title_match"], 0);
    }

    #[test]
    fn excluded_and_unnumbered_assignments() {
        let entries = vec![
            entry("a.txt", Some(65), None),
            entry("b.txt", Some(1), None),
            entry("c.txt", Some(1), Some("b")),
            entry("d.txt", None, None),
        ];
        let ledger = Ledger::restore(entries, Vec::new(), Vec::new(), Vec::new()).unwrap();
        let report = audit(&ledger, Some(&expected()));
        assert_eq!(report.extra, vec![65]);
        assert_eq!(report.assigned_count, 3);
        assert_eq!(report.unnumbered_targets, vec!["t.md".to_string()]);
        assert!(!report.missing.contains(&1));
    }

    #[test]
    fn no_expected_set_is_trivially_complete() {
        let ledger = Ledger::restore(vec![entry("a.txt", Some(9), None)], Vec::new(), Vec::new(), Vec::new())
            .unwrap();
        let report = audit(&ledger, None);
        assert!(report.complete);
        assert_eq!(report.expected_count, 0);
        assert_eq!(report.assigned_count, 1);
    }
}
