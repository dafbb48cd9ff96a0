use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    Source,
    Target,
}

impl std::fmt::Display for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// One extracted document. Immutable once built by
/// [`crate::features::extract_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub corpus: Corpus,
    /// File name relative to the corpus root. Stable reference used in
    /// entries, overrides and reports.
    pub doc_ref: String,
    /// Leading digits exactly as written in the filename (`"07"`).
    pub raw_id: Option<String>,
    pub extracted_numeric_id: Option<u32>,
    pub title: String,
    pub clean_title: String,
    pub normalized_text: String,
    pub keyword_set: BTreeSet<String>,
    pub fingerprint: String,
    /// Normalized "how-to" field of an embedded JSON block, when present.
    pub focus_text: Option<String>,
    /// Normalized derived-content core fields of an embedded JSON block.
    pub core_fields: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// The four independent similarity signals of one (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Signals {
    pub exact_id: f64,
    pub keyword_jaccard: f64,
    pub text_similarity: f64,
    pub title_similarity: f64,
}

/// A scored pair. Lives only for the duration of one pass.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub source: &'a Document,
    pub target: &'a Document,
    pub signals: Signals,
    /// Text/keyword blend without the title fallback.
    pub content_score: f64,
    pub combined_score: f64,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactId,
    ContentVerified,
    TitleMatch,
    KeywordOverlap,
    Manual,
    NewlyProcessed,
}

impl MatchType {
    pub const ALL: [MatchType; 6] = [
        Self::ExactId,
        Self::ContentVerified,
        Self::TitleMatch,
        Self::KeywordOverlap,
        Self::Manual,
        Self::NewlyProcessed,
    ];
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactId => write!(f, "exact_id"),
            Self::ContentVerified => write!(f, "content_verified"),
            Self::TitleMatch => write!(f, "title_match"),
            Self::KeywordOverlap => write!(f, "keyword_overlap"),
            Self::Manual => write!(f, "manual"),
            Self::NewlyProcessed => write!(f, "newly_processed"),
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchType::ALL
            .into_iter()
            .find(|mt| mt.to_string() == s.trim())
            .ok_or_else(|| format!("unknown match type '{s}'"))
    }
}

/// Ledger stages. Ordering is the pass order; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Unprocessed,
    ExactId,
    Content,
    Keyword,
    Title,
    Manual,
    Finalized,
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unprocessed => write!(f, "unprocessed"),
            Self::ExactId => write!(f, "pass_exact_id"),
            Self::Content => write!(f, "pass_content"),
            Self::Keyword => write!(f, "pass_keyword"),
            Self::Title => write!(f, "pass_title"),
            Self::Manual => write!(f, "pass_manual"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source_ref: String,
    pub target_ref: String,
    pub target_numeric_id: Option<u32>,
    pub match_type: MatchType,
    pub confidence: f64,
    pub pass: MatchStage,
    /// `None` for the primary entry of a target; `b`, `c`, ... for entries
    /// explicitly marked as duplicates of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl MappingEntry {
    pub fn is_primary(&self) -> bool {
        self.variant.is_none()
    }
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Several sources explicitly attached to one target.
    SharedTarget,
    /// Distinct targets whose fingerprints are near-identical.
    NearIdenticalTargets,
    /// Distinct targets with byte-identical core fields.
    IdenticalCoreFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub canonical: MappingEntry,
    pub variants: Vec<MappingEntry>,
    pub similarity_to_canonical: Vec<f64>,
    pub reason: DuplicateReason,
    /// At least one member came from the title pass.
    pub suspect: bool,
}

// ---------------------------------------------------------------------------
// Batch issues (soft errors)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ReadFailure,
    MalformedIdentifier,
    AssignmentConflict,
    UnknownOverrideEndpoint,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailure => write!(f, "read_failure"),
            Self::MalformedIdentifier => write!(f, "malformed_identifier"),
            Self::AssignmentConflict => write!(f, "assignment_conflict"),
            Self::UnknownOverrideEndpoint => write!(f, "unknown_override_endpoint"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// One externally supplied (source, target) pair for the manual pass.
/// `target` is a numeric identifier or a target `doc_ref`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManualOverride {
    pub source: String,
    #[serde(deserialize_with = "string_or_number")]
    pub target: String,
    #[serde(default = "default_override_type")]
    pub match_type: MatchType,
}

fn default_override_type() -> MatchType {
    MatchType::Manual
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

// ---------------------------------------------------------------------------
// Pass + audit output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub stage: MatchStage,
    pub considered_sources: usize,
    pub committed: usize,
    pub duplicates_absorbed: usize,
    pub remaining_sources: usize,
    pub remaining_targets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub expected_count: usize,
    pub assigned_count: usize,
    pub missing: Vec<u32>,
    pub extra: Vec<u32>,
    pub counts_by_match_type: BTreeMap<String, usize>,
    pub unassigned_sources: Vec<String>,
    pub unassigned_targets: Vec<String>,
    pub unnumbered_targets: Vec<String>,
    pub duplicate_groups: usize,
    pub suspect_groups: usize,
    pub issues: Vec<Issue>,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub source_count: usize,
    pub target_count: usize,
}

/// Everything one run produces. The mapping artifact and the completeness
/// report are rendered from this by [`crate::artifact`].
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub passes: Vec<PassReport>,
    pub entries: Vec<MappingEntry>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub report: CompletenessReport,
}
