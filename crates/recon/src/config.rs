use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{ManualOverride, MatchType};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default)]
    pub corpora: CorporaConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub passes: PassConfig,
    #[serde(default)]
    pub duplicates: DuplicateConfig,
    #[serde(default)]
    pub expected: Option<ExpectedIds>,
    #[serde(default)]
    pub overrides: OverrideConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "recon".into(),
            corpora: CorporaConfig::default(),
            normalize: NormalizeConfig::default(),
            features: FeatureConfig::default(),
            scoring: ScoringConfig::default(),
            passes: PassConfig::default(),
            duplicates: DuplicateConfig::default(),
            expected: None,
            overrides: OverrideConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Corpora
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CorporaConfig {
    pub source: CorpusConfig,
    pub target: CorpusConfig,
}

impl Default for CorporaConfig {
    fn default() -> Self {
        Self {
            source: CorpusConfig {
                dir: "source".into(),
                extensions: vec!["txt".into()],
            },
            target: CorpusConfig {
                dir: "target".into(),
                extensions: vec!["md".into()],
            },
        }
    }
}

/// A directory tree of text files. Empty `extensions` accepts every file.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusConfig {
    pub dir: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Normalizer + features
// ---------------------------------------------------------------------------

/// Extra script-variant folds (`"髖" = "髋"`), applied on top of the
/// built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub folds: BTreeMap<String, String>,
}

impl NormalizeConfig {
    /// Fold pairs as chars. Only valid after [`ReconConfig::validate`].
    pub fn fold_pairs(&self) -> Vec<(char, char)> {
        self.folds
            .iter()
            .filter_map(|(from, to)| Some((single_char(from)?, single_char(to)?)))
            .collect()
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
    #[serde(default = "default_max_keyword_len")]
    pub max_keyword_len: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_fingerprint_len")]
    pub fingerprint_len: usize,
    #[serde(default = "default_text_window")]
    pub text_window: usize,
    #[serde(default = "default_focus_field")]
    pub focus_field: Option<String>,
    #[serde(default = "default_core_fields")]
    pub core_fields: Vec<String>,
}

fn default_min_keyword_len() -> usize {
    3
}
fn default_max_keyword_len() -> usize {
    8
}
fn default_max_keywords() -> usize {
    48
}
fn default_fingerprint_len() -> usize {
    200
}
fn default_text_window() -> usize {
    600
}
fn default_focus_field() -> Option<String> {
    Some("Drill_How".into())
}
fn default_core_fields() -> Vec<String> {
    vec!["Fault_What".into(), "Goal_Why".into()]
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_keyword_len: default_min_keyword_len(),
            max_keyword_len: default_max_keyword_len(),
            max_keywords: default_max_keywords(),
            fingerprint_len: default_fingerprint_len(),
            text_window: default_text_window(),
            focus_field: default_focus_field(),
            core_fields: default_core_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring + passes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    /// Jaccard below this skips text similarity entirely. 0 disables the gate.
    #[serde(default)]
    pub keyword_gate: f64,
}

fn default_text_weight() -> f64 {
    0.7
}
fn default_keyword_weight() -> f64 {
    0.3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            text_weight: default_text_weight(),
            keyword_weight: default_keyword_weight(),
            keyword_gate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassConfig {
    #[serde(default = "default_content_threshold")]
    pub content_threshold: f64,
    /// Enables the keyword-overlap pass between content and title.
    #[serde(default)]
    pub keyword_threshold: Option<f64>,
    #[serde(default = "default_title_threshold")]
    pub title_threshold: f64,
}

fn default_content_threshold() -> f64 {
    0.7
}
fn default_title_threshold() -> f64 {
    0.15
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            content_threshold: default_content_threshold(),
            keyword_threshold: None,
            title_threshold: default_title_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateConfig {
    #[serde(default = "default_duplicate_threshold")]
    pub threshold: f64,
}

fn default_duplicate_threshold() -> f64 {
    0.8
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            threshold: default_duplicate_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Expected identifier space
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedIds {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub exclude: Vec<Exclusion>,
}

/// A retired identifier (`65`) or an inclusive span (`"167-175"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Exclusion {
    Id(u32),
    Span(String),
}

impl Exclusion {
    pub fn resolve(&self) -> Result<RangeInclusive<u32>, ReconError> {
        match self {
            Self::Id(id) => Ok(*id..=*id),
            Self::Span(text) => {
                let bad = || {
                    ReconError::ConfigValidation(format!(
                        "expected.exclude: cannot parse '{text}' (use 65 or \"167-175\")"
                    ))
                };
                let (lo, hi) = match text.split_once('-') {
                    Some((lo, hi)) => (lo, hi),
                    None => (text.as_str(), text.as_str()),
                };
                let lo: u32 = lo.trim().parse().map_err(|_| bad())?;
                let hi: u32 = hi.trim().parse().map_err(|_| bad())?;
                if lo > hi {
                    return Err(bad());
                }
                Ok(lo..=hi)
            }
        }
    }
}

impl ExpectedIds {
    /// The expected identifier set: `start..=end` minus every exclusion.
    pub fn id_set(&self) -> Result<BTreeSet<u32>, ReconError> {
        let mut ids: BTreeSet<u32> = (self.start..=self.end).collect();
        for exclusion in &self.exclude {
            for id in exclusion.resolve()? {
                ids.remove(&id);
            }
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Overrides + output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideConfig {
    /// CSV with `source,target[,match_type]` columns, relative to the config.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub pairs: Vec<ManualOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "out".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));

        // Thresholds: strictly decreasing trust, content > keyword > title > 0
        let p = &self.passes;
        if !(p.content_threshold > 0.0 && p.content_threshold <= 1.0) {
            return invalid(format!(
                "passes.content_threshold must be in (0, 1], got {}",
                p.content_threshold
            ));
        }
        if !(p.title_threshold > 0.0 && p.title_threshold < p.content_threshold) {
            return invalid(format!(
                "passes.title_threshold must be in (0, content_threshold), got {}",
                p.title_threshold
            ));
        }
        if let Some(k) = p.keyword_threshold {
            if !(k > p.title_threshold && k < p.content_threshold) {
                return invalid(format!(
                    "passes.keyword_threshold must lie between title_threshold ({}) and content_threshold ({}), got {k}",
                    p.title_threshold, p.content_threshold
                ));
            }
        }

        let s = &self.scoring;
        if s.text_weight < 0.0 || s.keyword_weight < 0.0 || s.text_weight + s.keyword_weight <= 0.0 {
            return invalid("scoring weights must be non-negative with a positive sum".into());
        }
        if s.text_weight < s.keyword_weight {
            return invalid(format!(
                "scoring.text_weight ({}) must dominate keyword_weight ({})",
                s.text_weight, s.keyword_weight
            ));
        }
        if !(0.0..=1.0).contains(&s.keyword_gate) {
            return invalid(format!("scoring.keyword_gate must be in [0, 1], got {}", s.keyword_gate));
        }

        let f = &self.features;
        if f.min_keyword_len == 0 || f.min_keyword_len > f.max_keyword_len {
            return invalid(format!(
                "features: need 1 <= min_keyword_len <= max_keyword_len, got {}..{}",
                f.min_keyword_len, f.max_keyword_len
            ));
        }
        if f.max_keywords == 0 || f.fingerprint_len == 0 || f.text_window == 0 {
            return invalid(
                "features: max_keywords, fingerprint_len and text_window must be positive".into(),
            );
        }

        let d = self.duplicates.threshold;
        if !(d > 0.0 && d <= 1.0) {
            return invalid(format!("duplicates.threshold must be in (0, 1], got {d}"));
        }

        for (from, to) in &self.normalize.folds {
            if single_char(from).is_none() || single_char(to).is_none() {
                return invalid(format!(
                    "normalize.folds: '{from}' = '{to}' must map one character to one character"
                ));
            }
        }

        if let Some(ref expected) = self.expected {
            if expected.start > expected.end {
                return invalid(format!(
                    "expected: start ({}) must not exceed end ({})",
                    expected.start, expected.end
                ));
            }
            expected.id_set()?;
        }

        for pair in &self.overrides.pairs {
            if !matches!(pair.match_type, MatchType::Manual | MatchType::NewlyProcessed) {
                return invalid(format!(
                    "overrides: '{}' uses match_type '{}'; only manual or newly_processed are allowed",
                    pair.source, pair.match_type
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
