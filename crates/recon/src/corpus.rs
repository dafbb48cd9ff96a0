//! Filesystem inputs: the two corpus trees and the override CSV.

use std::path::Path;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{CorpusConfig, FeatureConfig};
use crate::error::ReconError;
use crate::features::extract_document;
use crate::model::{Corpus, Document, Issue, IssueKind, ManualOverride, MatchType};
use crate::normalize::Normalizer;

#[derive(Debug, Default)]
pub struct LoadedCorpus {
    /// Sorted by `doc_ref`.
    pub documents: Vec<Document>,
    pub issues: Vec<Issue>,
}

/// Walk `root`, read every file with an accepted extension and extract it.
///
/// A missing root is a hard error. Unreadable or non-UTF-8 files become
/// `ReadFailure` issues and are left out.
pub fn load_corpus(
    root: &Path,
    corpus: Corpus,
    config: &CorpusConfig,
    normalizer: &Normalizer,
    features: &FeatureConfig,
) -> Result<LoadedCorpus, ReconError> {
    if !root.is_dir() {
        return Err(ReconError::Io(format!(
            "{corpus} directory not found: {}",
            root.display()
        )));
    }

    let mut issues = Vec::new();
    let mut raw: Vec<(String, String)> = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let subject = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                issues.push(Issue::new(IssueKind::ReadFailure, subject, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() || !accepts(entry.path(), &config.extensions) {
            continue;
        }
        let doc_ref = relative_ref(root, entry.path());
        match std::fs::read(entry.path()) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => raw.push((doc_ref, text)),
                Err(_) => issues.push(Issue::new(IssueKind::ReadFailure, doc_ref, "not valid UTF-8")),
            },
            Err(e) => issues.push(Issue::new(IssueKind::ReadFailure, doc_ref, e.to_string())),
        }
    }

    let extracted: Vec<(Document, Vec<Issue>)> = raw
        .par_iter()
        .map(|(doc_ref, text)| extract_document(corpus, doc_ref, text, normalizer, features))
        .collect();

    let mut documents = Vec::with_capacity(extracted.len());
    for (doc, doc_issues) in extracted {
        issues.extend(doc_issues);
        documents.push(doc);
    }
    documents.sort_by(|a, b| a.doc_ref.cmp(&b.doc_ref));

    log::info!(
        "{corpus}: loaded {} documents from {} ({} issues)",
        documents.len(),
        root.display(),
        issues.len()
    );

    Ok(LoadedCorpus { documents, issues })
}

fn accepts(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext)))
}

/// Path relative to the corpus root, `/`-separated on every platform.
fn relative_ref(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read `source,target[,match_type]` rows. An empty `match_type` means
/// `manual`; scored match types are rejected.
pub fn load_overrides(path: &Path) -> Result<Vec<ManualOverride>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(source_col), Some(target_col)) = (column("source"), column("target")) else {
        return Err(ReconError::ConfigValidation(format!(
            "{}: override file needs 'source' and 'target' columns",
            path.display()
        )));
    };
    let type_col = column("match_type");

    let mut overrides = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
        let line = row + 2;
        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let source = field(source_col);
        let target = field(target_col);
        if source.is_empty() || target.is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{} line {line}: source and target are required",
                path.display()
            )));
        }
        let match_type = match type_col.map(field).filter(|s| !s.is_empty()) {
            None => MatchType::Manual,
            Some(text) => text.parse::<MatchType>().map_err(|e| {
                ReconError::ConfigValidation(format!("{} line {line}: {e}", path.display()))
            })?,
        };
        if !matches!(match_type, MatchType::Manual | MatchType::NewlyProcessed) {
            return Err(ReconError::ConfigValidation(format!(
                "{} line {line}: only manual or newly_processed are allowed, got '{match_type}'",
                path.display()
            )));
        }
        overrides.push(ManualOverride {
            source,
            target,
            match_type,
        });
    }
    Ok(overrides)
}
