//! Output artifacts: the mapping (JSON record form and CSV tabular form)
//! and the completeness report. The JSON mapping reads back into a
//! [`Ledger`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::ledger::Ledger;
use crate::model::{
    CompletenessReport, Document, DuplicateGroup, Issue, MappingEntry, ReconMeta, ReconResult,
};

pub const MAPPING_JSON: &str = "mapping.json";
pub const MAPPING_CSV: &str = "mapping.csv";
pub const REPORT_JSON: &str = "report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingArtifact {
    pub meta: ReconMeta,
    pub entries: Vec<MappingEntry>,
    #[serde(default)]
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Batch issues of the run, so a later audit sees the same blockers.
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// One row of the tabular form.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    target_id: Option<u32>,
    target_ref: &'a str,
    source_ref: &'a str,
    match_type: String,
    confidence: String,
    variant: &'a str,
}

impl MappingArtifact {
    pub fn from_result(result: &ReconResult) -> Self {
        Self {
            meta: result.meta.clone(),
            entries: result.entries.clone(),
            duplicate_groups: result.duplicate_groups.clone(),
            issues: result.report.issues.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| ReconError::Io(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::ArtifactParse(e.to_string()))
    }

    /// Rows ordered by target id (unnumbered last), target ref, then
    /// primary before its variants.
    pub fn to_csv(&self) -> Result<String, ReconError> {
        let mut rows: Vec<&MappingEntry> = self.entries.iter().collect();
        rows.sort_by(|a, b| {
            a.target_numeric_id
                .is_none()
                .cmp(&b.target_numeric_id.is_none())
                .then_with(|| a.target_numeric_id.cmp(&b.target_numeric_id))
                .then_with(|| a.target_ref.cmp(&b.target_ref))
                .then_with(|| a.variant.cmp(&b.variant))
        });

        let mut writer = csv::Writer::from_writer(Vec::new());
        for e in rows {
            writer
                .serialize(CsvRow {
                    target_id: e.target_numeric_id,
                    target_ref: &e.target_ref,
                    source_ref: &e.source_ref,
                    match_type: e.match_type.to_string(),
                    confidence: format!("{:.4}", e.confidence),
                    variant: e.variant.as_deref().unwrap_or(""),
                })
                .map_err(|e| ReconError::Io(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReconError::Io(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ReconError::Io(e.to_string()))
    }

    /// Rebuild a ledger. Documents may be empty when only auditing.
    pub fn into_ledger(
        self,
        sources: Vec<Document>,
        targets: Vec<Document>,
    ) -> Result<Ledger, ReconError> {
        let inconsistent = |e: ReconError| ReconError::ArtifactParse(format!("inconsistent mapping: {e}"));
        let mut ledger = Ledger::restore(self.entries, self.duplicate_groups, sources, targets)
            .map_err(inconsistent)?;
        for issue in self.issues {
            ledger.record_issue(issue).map_err(inconsistent)?;
        }
        Ok(ledger)
    }
}

pub fn report_json(report: &CompletenessReport) -> Result<String, ReconError> {
    serde_json::to_string_pretty(report).map_err(|e| ReconError::Io(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    pub mapping_json: PathBuf,
    pub mapping_csv: PathBuf,
    pub report_json: PathBuf,
}

/// Write `mapping.json`, `mapping.csv` and `report.json` into `dir`,
/// creating it when needed.
pub fn write_artifacts(result: &ReconResult, dir: &Path) -> Result<WrittenArtifacts, ReconError> {
    let io = |path: &Path, e: std::io::Error| ReconError::Io(format!("{}: {e}", path.display()));
    std::fs::create_dir_all(dir).map_err(|e| io(dir, e))?;

    let artifact = MappingArtifact::from_result(result);
    let written = WrittenArtifacts {
        mapping_json: dir.join(MAPPING_JSON),
        mapping_csv: dir.join(MAPPING_CSV),
        report_json: dir.join(REPORT_JSON),
    };
    std::fs::write(&written.mapping_json, artifact.to_json()?)
        .map_err(|e| io(&written.mapping_json, e))?;
    std::fs::write(&written.mapping_csv, artifact.to_csv()?)
        .map_err(|e| io(&written.mapping_csv, e))?;
    std::fs::write(&written.report_json, report_json(&result.report)?)
        .map_err(|e| io(&written.report_json, e))?;

    log::info!("wrote {} entries to {}", result.entries.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueKind, MatchStage, MatchType};

    fn artifact() -> MappingArtifact {
        let entry = |source: &str, target: &str, id: Option<u32>, variant: Option<&str>| MappingEntry {
            source_ref: source.into(),
            target_ref: target.into(),
            target_numeric_id: id,
            match_type: MatchType::ContentVerified,
            confidence: 0.8123456,
            pass: MatchStage::Content,
            variant: variant.map(String::from),
        };
        MappingArtifact {
            meta: ReconMeta {
                config_name: "t".into(),
                engine_version: "0.0.0".into(),
                run_at: "2026-01-01T00:00:00Z".into(),
                source_count: 4,
                target_count: 3,
            },
            entries: vec![
                entry("z.txt", "x.md", None, None),
                entry("b.txt", "024_a.md", Some(24), Some("b")),
                entry("a.txt", "024_a.md", Some(24), None),
                entry("c.txt", "007_c.md", Some(7), None),
            ],
            duplicate_groups: Vec::new(),
            issues: Vec::new(),
        }
    }

    #[test]
    fn csv_orders_by_target_id_then_variant() {
        let csv = artifact().to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "target_id,target_ref,source_ref,match_type,confidence,variant"
        );
        assert_eq!(lines[1], "7,007_c.md,c.txt,content_verified,0.8123,");
        assert_eq!(lines[2], "24,024_a.md,a.txt,content_verified,0.8123,");
        assert_eq!(lines[3], "24,024_a.md,b.txt,content_verified,0.8123,b");
        assert_eq!(lines[4], ",x.md,z.txt,content_verified,0.8123,");
    }

    #[test]
    fn json_restores_into_ledger() {
        let json = artifact().to_json().unwrap();
        let back = MappingArtifact::from_json(&json).unwrap();
        assert_eq!(back.entries, artifact().entries);
        let ledger = back.into_ledger(Vec::new(), Vec::new()).unwrap();
        assert_eq!(ledger.primary_entries().count(), 3);
        assert_eq!(ledger.primary_for_target("024_a.md").unwrap().source_ref, "a.txt");
    }

    #[test]
    fn issues_travel_with_the_mapping() {
        let mut a = artifact();
        a.issues.push(Issue::new(
            IssueKind::AssignmentConflict,
            "024_a.md",
            "already assigned to 'a.txt'",
        ));
        let back = MappingArtifact::from_json(&a.to_json().unwrap()).unwrap();
        let ledger = back.into_ledger(Vec::new(), Vec::new()).unwrap();
        assert_eq!(ledger.issues(), a.issues.as_slice());

        // mappings written before issues were recorded still load
        let mut value: serde_json::Value = serde_json::from_str(&a.to_json().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("issues");
        let old = MappingArtifact::from_json(&value.to_string()).unwrap();
        assert!(old.issues.is_empty());
    }

    #[test]
    fn garbage_is_an_artifact_error() {
        let err = MappingArtifact::from_json("{\"entries\": 3}").unwrap_err();
        assert!(matches!(err, ReconError::ArtifactParse(_)));
    }

    #[test]
    fn conflicting_entries_are_rejected_on_restore() {
        let mut a = artifact();
        a.entries.push(MappingEntry {
            source_ref: "d.txt".into(),
            ..a.entries[2].clone()
        });
        let err = a.into_ledger(Vec::new(), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("inconsistent mapping"));
    }
}
