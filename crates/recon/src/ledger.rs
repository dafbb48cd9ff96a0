use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReconError;
use crate::model::{Document, DuplicateGroup, Issue, MappingEntry, MatchStage};

/// The single owned reconciliation state, threaded through every pass.
///
/// Entries are append-only. A source holds at most one entry of any kind; a
/// target holds at most one primary entry and any number of variant entries,
/// which require a primary to exist first. Once finalized, every mutation
/// fails with [`ReconError::LedgerFinalized`].
#[derive(Debug, Clone)]
pub struct Ledger {
    stage: MatchStage,
    entries: Vec<MappingEntry>,
    /// source_ref -> index into `entries`
    by_source: BTreeMap<String, usize>,
    /// target_ref -> index of the primary entry
    by_target: BTreeMap<String, usize>,
    sources: BTreeMap<String, Document>,
    targets: BTreeMap<String, Document>,
    unassigned_sources: BTreeSet<String>,
    unassigned_targets: BTreeSet<String>,
    duplicate_groups: Vec<DuplicateGroup>,
    issues: Vec<Issue>,
}

impl Ledger {
    pub fn new(sources: Vec<Document>, targets: Vec<Document>) -> Self {
        let sources: BTreeMap<String, Document> =
            sources.into_iter().map(|d| (d.doc_ref.clone(), d)).collect();
        let targets: BTreeMap<String, Document> =
            targets.into_iter().map(|d| (d.doc_ref.clone(), d)).collect();
        Self {
            stage: MatchStage::Unprocessed,
            entries: Vec::new(),
            by_source: BTreeMap::new(),
            by_target: BTreeMap::new(),
            unassigned_sources: sources.keys().cloned().collect(),
            unassigned_targets: targets.keys().cloned().collect(),
            sources,
            targets,
            duplicate_groups: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Rebuild a ledger from saved entries, keeping their order. A variant
    /// listed before its primary is held back until the primary is in. The
    /// ledger is left at `Unprocessed` so passes can be re-run over it.
    /// Documents are optional (an audit needs none).
    pub fn restore(
        entries: Vec<MappingEntry>,
        duplicate_groups: Vec<DuplicateGroup>,
        sources: Vec<Document>,
        targets: Vec<Document>,
    ) -> Result<Self, ReconError> {
        let mut ledger = Self::new(sources, targets);
        let mut deferred = Vec::new();
        for entry in entries {
            if !entry.is_primary() && !ledger.is_target_assigned(&entry.target_ref) {
                deferred.push(entry);
            } else {
                ledger.commit(entry)?;
            }
        }
        for entry in deferred {
            ledger.commit(entry)?;
        }
        ledger.duplicate_groups = duplicate_groups;
        Ok(ledger)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Move to `stage`. Re-entering the current stage is a no-op.
    pub fn advance(&mut self, stage: MatchStage) -> Result<(), ReconError> {
        self.ensure_open()?;
        if stage < self.stage {
            return Err(ReconError::InvalidTransition {
                from: self.stage,
                to: stage,
            });
        }
        self.stage = stage;
        Ok(())
    }

    pub fn commit(&mut self, entry: MappingEntry) -> Result<(), ReconError> {
        self.ensure_open()?;
        if let Some(&idx) = self.by_source.get(&entry.source_ref) {
            return Err(ReconError::DoubleAssignment {
                doc_ref: entry.source_ref,
                existing: self.entries[idx].target_ref.clone(),
            });
        }
        let primary = self.by_target.get(&entry.target_ref).copied();
        match (entry.is_primary(), primary) {
            (true, Some(idx)) => {
                return Err(ReconError::DoubleAssignment {
                    doc_ref: entry.target_ref,
                    existing: self.entries[idx].source_ref.clone(),
                });
            }
            (false, None) => {
                return Err(ReconError::DoubleAssignment {
                    doc_ref: entry.target_ref,
                    existing: "no primary entry to attach a variant to".into(),
                });
            }
            _ => {}
        }

        let idx = self.entries.len();
        self.unassigned_sources.remove(&entry.source_ref);
        self.by_source.insert(entry.source_ref.clone(), idx);
        if entry.is_primary() {
            self.unassigned_targets.remove(&entry.target_ref);
            self.by_target.insert(entry.target_ref.clone(), idx);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Replace the duplicate annotations with a fresh detection round.
    pub fn set_duplicate_groups(&mut self, groups: Vec<DuplicateGroup>) -> Result<(), ReconError> {
        self.ensure_open()?;
        self.duplicate_groups = groups;
        Ok(())
    }

    pub fn record_issue(&mut self, issue: Issue) -> Result<(), ReconError> {
        self.ensure_open()?;
        log::warn!("{}: {} ({})", issue.kind, issue.subject, issue.detail);
        self.issues.push(issue);
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), ReconError> {
        self.ensure_open()?;
        self.stage = MatchStage::Finalized;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ReconError> {
        if self.stage == MatchStage::Finalized {
            Err(ReconError::LedgerFinalized)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn stage(&self) -> MatchStage {
        self.stage
    }

    pub fn is_finalized(&self) -> bool {
        self.stage == MatchStage::Finalized
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn primary_entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().filter(|e| e.is_primary())
    }

    pub fn entry_for_source(&self, source_ref: &str) -> Option<&MappingEntry> {
        self.by_source.get(source_ref).map(|&idx| &self.entries[idx])
    }

    pub fn primary_for_target(&self, target_ref: &str) -> Option<&MappingEntry> {
        self.by_target.get(target_ref).map(|&idx| &self.entries[idx])
    }

    pub fn variant_count(&self, target_ref: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_primary() && e.target_ref == target_ref)
            .count()
    }

    pub fn is_source_assigned(&self, source_ref: &str) -> bool {
        self.by_source.contains_key(source_ref)
    }

    pub fn is_target_assigned(&self, target_ref: &str) -> bool {
        self.by_target.contains_key(target_ref)
    }

    pub fn source(&self, doc_ref: &str) -> Option<&Document> {
        self.sources.get(doc_ref)
    }

    pub fn target(&self, doc_ref: &str) -> Option<&Document> {
        self.targets.get(doc_ref)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Document> {
        self.sources.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Document> {
        self.targets.values()
    }

    /// Unassigned sources with a loaded document, in `doc_ref` order.
    pub fn unassigned_sources(&self) -> impl Iterator<Item = &Document> {
        self.unassigned_sources
            .iter()
            .filter_map(|r| self.sources.get(r))
    }

    pub fn unassigned_targets(&self) -> impl Iterator<Item = &Document> {
        self.unassigned_targets
            .iter()
            .filter_map(|r| self.targets.get(r))
    }

    pub fn unassigned_source_refs(&self) -> &BTreeSet<String> {
        &self.unassigned_sources
    }

    pub fn unassigned_target_refs(&self) -> &BTreeSet<String> {
        &self.unassigned_targets
    }

    pub fn duplicate_groups(&self) -> &[DuplicateGroup] {
        &self.duplicate_groups
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}
