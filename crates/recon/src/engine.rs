use std::path::Path;

use crate::audit::audit;
use crate::config::ReconConfig;
use crate::corpus::{load_corpus, load_overrides};
use crate::dedup::DuplicateDetector;
use crate::error::ReconError;
use crate::ledger::Ledger;
use crate::matcher::{pass_content, pass_exact_id, pass_keyword, pass_manual, pass_title};
use crate::model::{Corpus, Document, Issue, ManualOverride, PassReport, ReconMeta, ReconResult};
use crate::normalize::Normalizer;
use crate::script::ScriptFolder;

/// Pre-loaded inputs for [`run`].
#[derive(Debug, Default)]
pub struct ReconInput {
    pub sources: Vec<Document>,
    pub targets: Vec<Document>,
    /// Soft issues raised while loading.
    pub issues: Vec<Issue>,
    pub overrides: Vec<ManualOverride>,
}

impl ReconInput {
    /// Load both corpora and all overrides, resolving relative paths
    /// against `base_dir` (the config file's directory).
    pub fn load(config: &ReconConfig, base_dir: &Path) -> Result<Self, ReconError> {
        let normalizer = normalizer_for(config);
        let source = load_corpus(
            &base_dir.join(&config.corpora.source.dir),
            Corpus::Source,
            &config.corpora.source,
            &normalizer,
            &config.features,
        )?;
        let target = load_corpus(
            &base_dir.join(&config.corpora.target.dir),
            Corpus::Target,
            &config.corpora.target,
            &normalizer,
            &config.features,
        )?;

        let mut overrides = config.overrides.pairs.clone();
        if let Some(ref file) = config.overrides.file {
            overrides.extend(load_overrides(&base_dir.join(file))?);
        }

        let mut issues = source.issues;
        issues.extend(target.issues);
        Ok(Self {
            sources: source.documents,
            targets: target.documents,
            issues,
            overrides,
        })
    }
}

pub fn normalizer_for(config: &ReconConfig) -> Normalizer {
    Normalizer::new(ScriptFolder::new(&config.normalize.fold_pairs()))
}

/// Run every pass with duplicate detection after each, then finalize and
/// audit.
pub fn run(config: &ReconConfig, input: ReconInput) -> Result<ReconResult, ReconError> {
    let source_count = input.sources.len();
    let target_count = input.targets.len();

    let mut ledger = Ledger::new(input.sources, input.targets);
    for issue in input.issues {
        ledger.record_issue(issue)?;
    }

    let passes = run_passes(&mut ledger, config, &input.overrides)?;
    ledger.finalize()?;

    let expected = config.expected.as_ref().map(|e| e.id_set()).transpose()?;
    let report = audit(&ledger, expected.as_ref());
    log::info!(
        "audit: {} assigned, {} missing, {} extra, {} duplicate groups ({} suspect), {} issues",
        report.assigned_count,
        report.missing.len(),
        report.extra.len(),
        report.duplicate_groups,
        report.suspect_groups,
        report.issues.len()
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            source_count,
            target_count,
        },
        passes,
        entries: ledger.entries().to_vec(),
        duplicate_groups: ledger.duplicate_groups().to_vec(),
        report,
    })
}

/// The pass sequence over an open ledger. Safe to repeat on a ledger that
/// has not moved past `Unprocessed` (a restored one): nothing already
/// assigned is touched.
pub fn run_passes(
    ledger: &mut Ledger,
    config: &ReconConfig,
    overrides: &[ManualOverride],
) -> Result<Vec<PassReport>, ReconError> {
    let mut detector = DuplicateDetector::new(&config.duplicates);
    let mut reports = Vec::new();

    let mut finish = |ledger: &mut Ledger, mut report: PassReport| -> Result<(), ReconError> {
        report.duplicates_absorbed = detector.detect(ledger)?;
        report.remaining_sources = ledger.unassigned_sources().count();
        log::info!(
            "{}: {} committed, {} absorbed as duplicates, {} sources / {} targets left",
            report.stage,
            report.committed,
            report.duplicates_absorbed,
            report.remaining_sources,
            report.remaining_targets
        );
        reports.push(report);
        Ok(())
    };

    let report = pass_exact_id(ledger)?;
    finish(ledger, report)?;
    let report = pass_content(ledger, config)?;
    finish(ledger, report)?;
    if let Some(report) = pass_keyword(ledger, config)? {
        finish(ledger, report)?;
    }
    let report = pass_title(ledger, config)?;
    finish(ledger, report)?;
    let report = pass_manual(ledger, overrides)?;
    finish(ledger, report)?;

    Ok(reports)
}
